use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::tilemap::{TileLayer, Tileset, TilemapError, World, COLLISION_LAYER_NAME, EMPTY_TILE};
use super::{tiled_json, tiled_xml};

/// Layers a dungeon map is authored with besides the collision layer.
pub const EXPECTED_LAYER_NAMES: [&str; 3] = ["floor", "walls", "objects"];

// Tiled stores horizontal, vertical, diagonal and hex-rotation flags in the top four bits.
const GID_FLAG_MASK: u32 = 0x0FFF_FFFF;

/// Upper bound on tiles in one layer; larger declared sizes are rejected before parsing data.
pub(crate) const MAX_LAYER_TILES: usize = 4096 * 4096;

/// Tile count of a `width` x `height` layer, or `None` past [`MAX_LAYER_TILES`].
pub(crate) fn checked_layer_tiles(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .filter(|count| *count <= MAX_LAYER_TILES)
}

#[derive(Debug, Error)]
pub enum AssetLoadError {
    #[error("failed to read map descriptor {path}: {source}")]
    ReadMap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported map format {path}; expected .json, .tmj or .tmx")]
    UnsupportedFormat { path: PathBuf },
    #[error("malformed JSON in {path}: {source}")]
    MalformedJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed XML in {path} at {line}:{column}: {message}")]
    MalformedXml {
        path: PathBuf,
        line: u32,
        column: u32,
        message: String,
    },
    #[error("invalid map {path}: {message}")]
    InvalidMap { path: PathBuf, message: String },
    #[error("layer '{layer}' in {path} uses unsupported encoding '{encoding}'; only CSV is supported")]
    UnsupportedEncoding {
        path: PathBuf,
        layer: String,
        encoding: String,
    },
    #[error("invalid layer in {path}: {source}")]
    Layer {
        path: PathBuf,
        #[source]
        source: TilemapError,
    },
    #[error("failed to read tileset {path}: {source}")]
    ReadTileset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("tileset '{tileset}' image {path} could not be loaded: {source}")]
    TilesetImage {
        tileset: String,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Format-neutral result of parsing a map descriptor, before tileset images are checked.
#[derive(Debug)]
pub(crate) struct MapDocument {
    pub tile_width: u32,
    pub tile_height: u32,
    pub layers: Vec<TileLayer>,
    pub tilesets: Vec<TilesetDecl>,
}

#[derive(Debug)]
pub(crate) enum TilesetDecl {
    Inline(TilesetImageDecl),
    External { first_gid: u32, source: PathBuf },
}

#[derive(Debug)]
pub(crate) struct TilesetImageDecl {
    pub name: String,
    pub first_gid: u32,
    pub image: PathBuf,
    pub tile_width: Option<u32>,
    pub tile_height: Option<u32>,
    pub columns: Option<u32>,
    pub tile_count: Option<u32>,
}

pub(crate) fn gid_to_tile_index(gid: u32) -> i32 {
    match gid & GID_FLAG_MASK {
        0 => EMPTY_TILE,
        id => id as i32,
    }
}

/// Loads maps once per path; later loads of the same descriptor share the parsed world.
#[derive(Debug, Default)]
pub struct WorldLoader {
    cache: HashMap<PathBuf, Arc<World>>,
}

impl WorldLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, path: &Path) -> Result<Arc<World>, AssetLoadError> {
        let key = normalize_path(path);
        if let Some(world) = self.cache.get(&key) {
            debug!(path = %key.display(), "world_cache_hit");
            return Ok(Arc::clone(world));
        }

        let world = Arc::new(load_world(&key)?);
        self.cache.insert(key, Arc::clone(&world));
        Ok(world)
    }

    pub fn is_cached(&self, path: &Path) -> bool {
        self.cache.contains_key(&normalize_path(path))
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

/// Reads a Tiled map (JSON or TMX), resolves its tilesets and validates their images.
pub fn load_world(path: &Path) -> Result<World, AssetLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| AssetLoadError::ReadMap {
        path: path.to_path_buf(),
        source,
    })?;

    let document = match extension_of(path).as_deref() {
        Some("json") | Some("tmj") => tiled_json::parse_map(path, &raw)?,
        Some("tmx") => tiled_xml::parse_map(path, &raw)?,
        _ => {
            return Err(AssetLoadError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };

    let tilesets = document
        .tilesets
        .into_iter()
        .map(|decl| resolve_tileset(decl, document.tile_width, document.tile_height))
        .collect::<Result<Vec<_>, _>>()?;

    for expected in EXPECTED_LAYER_NAMES {
        if !document.layers.iter().any(|layer| layer.name() == expected) {
            warn!(path = %path.display(), layer = expected, "world_layer_missing");
        }
    }

    let world = World::new(
        document.tile_width,
        document.tile_height,
        document.layers,
        tilesets,
    );
    if !world.has_collision() {
        warn!(
            path = %path.display(),
            layer = COLLISION_LAYER_NAME,
            "world_collision_layer_missing"
        );
    }

    info!(
        path = %path.display(),
        layers = world.layers().len(),
        tilesets = world.tilesets().len(),
        width_px = world.width_px(),
        height_px = world.height_px(),
        "world_loaded"
    );
    Ok(world)
}

fn resolve_tileset(
    decl: TilesetDecl,
    map_tile_width: u32,
    map_tile_height: u32,
) -> Result<Tileset, AssetLoadError> {
    let decl = match decl {
        TilesetDecl::Inline(decl) => decl,
        TilesetDecl::External { first_gid, source } => {
            let raw = fs::read_to_string(&source).map_err(|error| AssetLoadError::ReadTileset {
                path: source.clone(),
                source: error,
            })?;
            match extension_of(&source).as_deref() {
                Some("tsx") => tiled_xml::parse_tileset(&source, &raw, first_gid)?,
                Some("json") | Some("tsj") => tiled_json::parse_tileset(&source, &raw, first_gid)?,
                _ => return Err(AssetLoadError::UnsupportedFormat { path: source }),
            }
        }
    };

    let (image_width, image_height) =
        image::image_dimensions(&decl.image).map_err(|source| AssetLoadError::TilesetImage {
            tileset: decl.name.clone(),
            path: decl.image.clone(),
            source,
        })?;

    let tile_width = decl.tile_width.unwrap_or(map_tile_width).max(1);
    let tile_height = decl.tile_height.unwrap_or(map_tile_height).max(1);
    let columns = decl.columns.unwrap_or(image_width / tile_width);
    let tile_count = decl
        .tile_count
        .unwrap_or(columns * (image_height / tile_height));

    debug!(
        tileset = %decl.name,
        image = %decl.image.display(),
        first_gid = decl.first_gid,
        tile_count,
        "tileset_resolved"
    );
    Ok(Tileset {
        name: decl.name,
        first_gid: decl.first_gid,
        image: decl.image,
        image_width,
        image_height,
        tile_width,
        tile_height,
        columns,
        tile_count,
    })
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Rect, Vec2};
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        image::RgbaImage::new(width, height)
            .save(path)
            .expect("write png");
    }

    fn layer_json(name: &str, data: &[u32]) -> String {
        let tiles = data
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            r#"{{"type":"tilelayer","name":"{name}","width":2,"height":2,"data":[{tiles}]}}"#
        )
    }

    fn write_json_map(dir: &Path, layers: &[String]) -> PathBuf {
        let map_path = dir.join("maps").join("dungeon.json");
        fs::create_dir_all(map_path.parent().expect("parent")).expect("mkdir");
        let raw = format!(
            r#"{{"width":2,"height":2,"tilewidth":16,"tileheight":16,
                "layers":[{}],
                "tilesets":[{{"firstgid":1,"name":"dungeon","image":"../tileset/dungeon.png",
                              "tilewidth":16,"tileheight":16}}]}}"#,
            layers.join(",")
        );
        fs::write(&map_path, raw).expect("write map");
        map_path
    }

    fn full_layers() -> Vec<String> {
        vec![
            layer_json("floor", &[1, 1, 1, 1]),
            layer_json("walls", &[2, 0, 0, 0]),
            layer_json("objects", &[0, 0, 0, 3]),
            layer_json("collisions", &[5, 0, 0, 0]),
        ]
    }

    #[test]
    fn loads_json_map_with_tileset_image() {
        let temp = TempDir::new().expect("temp");
        write_png(&temp.path().join("tileset").join("dungeon.png"), 64, 32);
        let map_path = write_json_map(temp.path(), &full_layers());

        let world = load_world(&map_path).expect("world");
        assert_eq!(world.bounds(), Rect::new(0.0, 0.0, 32.0, 32.0));
        assert!(world.has_collision());
        let tileset = &world.tilesets()[0];
        assert_eq!(tileset.columns, 4);
        assert_eq!(tileset.tile_count, 8);
        assert_eq!(
            world.solid_tiles_overlapping(&Rect::new(4.0, 4.0, 4.0, 4.0)),
            vec![Rect::new(0.0, 0.0, 16.0, 16.0)]
        );
        let rendered: Vec<&str> = world.render_layers().map(TileLayer::name).collect();
        assert_eq!(rendered, vec!["floor", "walls", "objects"]);
    }

    #[test]
    fn loading_same_path_twice_returns_cached_world() {
        let temp = TempDir::new().expect("temp");
        write_png(&temp.path().join("tileset").join("dungeon.png"), 64, 32);
        let map_path = write_json_map(temp.path(), &full_layers());

        let mut loader = WorldLoader::new();
        let first = loader.load(&map_path).expect("first");
        // The descriptor is not re-read on a cache hit.
        fs::remove_file(&map_path).expect("remove");
        let second = loader.load(&map_path).expect("second");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.cached_count(), 1);
    }

    #[test]
    fn missing_layers_and_collisions_still_load() {
        let temp = TempDir::new().expect("temp");
        write_png(&temp.path().join("tileset").join("dungeon.png"), 64, 32);
        let map_path = write_json_map(temp.path(), &[layer_json("floor", &[1, 1, 1, 1])]);

        let world = load_world(&map_path).expect("world");
        assert!(!world.has_collision());
        assert_eq!(world.layers().len(), 1);
    }

    #[test]
    fn missing_descriptor_is_an_error() {
        let temp = TempDir::new().expect("temp");
        let err = load_world(&temp.path().join("nope.json")).expect_err("err");
        assert!(matches!(err, AssetLoadError::ReadMap { .. }));
    }

    #[test]
    fn missing_tileset_image_is_an_error() {
        let temp = TempDir::new().expect("temp");
        let map_path = write_json_map(temp.path(), &full_layers());
        let err = load_world(&map_path).expect_err("err");
        assert!(matches!(
            err,
            AssetLoadError::TilesetImage { ref tileset, .. } if tileset == "dungeon"
        ));
    }

    #[test]
    fn undecodable_tileset_image_is_an_error() {
        let temp = TempDir::new().expect("temp");
        let image_path = temp.path().join("tileset").join("dungeon.png");
        fs::create_dir_all(image_path.parent().expect("parent")).expect("mkdir");
        fs::write(&image_path, b"not a png").expect("write");
        let map_path = write_json_map(temp.path(), &full_layers());
        let err = load_world(&map_path).expect_err("err");
        assert!(matches!(err, AssetLoadError::TilesetImage { .. }));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("dungeon.yaml");
        fs::write(&path, "width: 1").expect("write");
        let err = load_world(&path).expect_err("err");
        assert!(matches!(err, AssetLoadError::UnsupportedFormat { .. }));
    }

    #[test]
    fn loads_tmx_with_external_tsx_tileset() {
        let temp = TempDir::new().expect("temp");
        write_png(&temp.path().join("tileset").join("dungeon.png"), 32, 32);
        fs::write(
            temp.path().join("tileset").join("dungeon.tsx"),
            r#"<tileset name="dungeon" tilewidth="16" tileheight="16" tilecount="4" columns="2">
 <image source="dungeon.png" width="32" height="32"/>
</tileset>"#,
        )
        .expect("write tsx");
        let map_dir = temp.path().join("maps");
        fs::create_dir_all(&map_dir).expect("mkdir");
        let map_path = map_dir.join("dungeon.tmx");
        fs::write(
            &map_path,
            r#"<map width="2" height="1" tilewidth="16" tileheight="16">
 <tileset firstgid="1" source="../tileset/dungeon.tsx"/>
 <layer name="floor" width="2" height="1" offsetx="-16"><data encoding="csv">1,2</data></layer>
 <layer name="collisions" width="2" height="1"><data encoding="csv">0,4</data></layer>
</map>"#,
        )
        .expect("write tmx");

        let world = load_world(&map_path).expect("world");
        assert_eq!(world.bounds(), Rect::new(-16.0, 0.0, 48.0, 16.0));
        let floor = world.layer("floor").expect("floor");
        assert_eq!(floor.offset(), Vec2::new(-16.0, 0.0));
        let tileset = world.tileset_for(2).expect("tileset");
        assert_eq!(tileset.source_origin(2), Some((16, 0)));
    }
}
