use std::path::Path;

use serde::Deserialize;

use crate::sim::Vec2;

use super::loader::{
    checked_layer_tiles, gid_to_tile_index, AssetLoadError, MapDocument, TilesetDecl,
    TilesetImageDecl,
};
use super::tilemap::TileLayer;

#[derive(Debug, Deserialize)]
struct JsonMap {
    width: u32,
    height: u32,
    tilewidth: u32,
    tileheight: u32,
    #[serde(default)]
    infinite: bool,
    #[serde(default)]
    layers: Vec<JsonLayer>,
    #[serde(default)]
    tilesets: Vec<JsonTilesetRef>,
}

#[derive(Debug, Deserialize)]
struct JsonLayer {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
    #[serde(default)]
    offsetx: f32,
    #[serde(default)]
    offsety: f32,
    #[serde(default = "default_visible")]
    visible: bool,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    data: Option<JsonLayerData>,
    #[serde(default)]
    layers: Vec<JsonLayer>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonLayerData {
    Gids(Vec<u32>),
    Encoded(String),
}

#[derive(Debug, Deserialize)]
struct JsonTilesetRef {
    firstgid: u32,
    #[serde(default)]
    source: Option<String>,
    #[serde(flatten)]
    inline: JsonTileset,
}

/// Tileset body, shared by embedded tilesets and external `.tsj`/`.json` files.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct JsonTileset {
    #[serde(default)]
    name: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    tilewidth: Option<u32>,
    #[serde(default)]
    tileheight: Option<u32>,
    #[serde(default)]
    columns: Option<u32>,
    #[serde(default)]
    tilecount: Option<u32>,
}

fn default_visible() -> bool {
    true
}

pub(crate) fn parse_map(path: &Path, raw: &str) -> Result<MapDocument, AssetLoadError> {
    let map: JsonMap =
        serde_json::from_str(raw).map_err(|source| AssetLoadError::MalformedJson {
            path: path.to_path_buf(),
            source,
        })?;
    if map.infinite {
        return Err(AssetLoadError::InvalidMap {
            path: path.to_path_buf(),
            message: "infinite (chunked) maps are not supported".to_string(),
        });
    }
    if map.tilewidth == 0 || map.tileheight == 0 {
        return Err(AssetLoadError::InvalidMap {
            path: path.to_path_buf(),
            message: format!(
                "tile size must be non-zero, got {}x{}",
                map.tilewidth, map.tileheight
            ),
        });
    }

    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let mut layers = Vec::new();
    collect_layers(
        path,
        &map,
        &map.layers,
        Vec2::ZERO,
        true,
        &mut layers,
    )?;

    let tilesets = map
        .tilesets
        .into_iter()
        .map(|tileset| match tileset.source {
            Some(source) => Ok(TilesetDecl::External {
                first_gid: tileset.firstgid,
                source: base_dir.join(source),
            }),
            None => Ok(TilesetDecl::Inline(inline_tileset(
                path,
                base_dir,
                tileset.firstgid,
                tileset.inline,
            )?)),
        })
        .collect::<Result<Vec<_>, AssetLoadError>>()?;

    Ok(MapDocument {
        tile_width: map.tilewidth,
        tile_height: map.tileheight,
        layers,
        tilesets,
    })
}

/// Parses an external JSON tileset; the image path is relative to the tileset file.
pub(crate) fn parse_tileset(
    path: &Path,
    raw: &str,
    first_gid: u32,
) -> Result<TilesetImageDecl, AssetLoadError> {
    let tileset: JsonTileset =
        serde_json::from_str(raw).map_err(|source| AssetLoadError::MalformedJson {
            path: path.to_path_buf(),
            source,
        })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    inline_tileset(path, base_dir, first_gid, tileset)
}

fn inline_tileset(
    path: &Path,
    base_dir: &Path,
    first_gid: u32,
    tileset: JsonTileset,
) -> Result<TilesetImageDecl, AssetLoadError> {
    let image = tileset.image.ok_or_else(|| AssetLoadError::InvalidMap {
        path: path.to_path_buf(),
        message: format!("tileset '{}' has no image", tileset.name),
    })?;
    Ok(TilesetImageDecl {
        name: tileset.name,
        first_gid,
        image: base_dir.join(image),
        tile_width: tileset.tilewidth,
        tile_height: tileset.tileheight,
        columns: tileset.columns,
        tile_count: tileset.tilecount,
    })
}

fn collect_layers(
    path: &Path,
    map: &JsonMap,
    layers: &[JsonLayer],
    parent_offset: Vec2,
    parent_visible: bool,
    out: &mut Vec<TileLayer>,
) -> Result<(), AssetLoadError> {
    for layer in layers {
        let offset = parent_offset
            + Vec2::new(
                layer.x as f32 * map.tilewidth as f32 + layer.offsetx,
                layer.y as f32 * map.tileheight as f32 + layer.offsety,
            );
        let visible = parent_visible && layer.visible;
        match layer.kind.as_str() {
            "tilelayer" => out.push(build_tile_layer(path, map, layer, offset, visible)?),
            "group" => collect_layers(path, map, &layer.layers, offset, visible, out)?,
            // Object and image layers carry no tile geometry.
            _ => {}
        }
    }
    Ok(())
}

fn build_tile_layer(
    path: &Path,
    map: &JsonMap,
    layer: &JsonLayer,
    offset: Vec2,
    visible: bool,
) -> Result<TileLayer, AssetLoadError> {
    let gids = match (&layer.data, layer.encoding.as_deref()) {
        (Some(JsonLayerData::Gids(gids)), None | Some("csv")) => gids,
        (Some(JsonLayerData::Encoded(_)), encoding) | (Some(JsonLayerData::Gids(_)), encoding) => {
            return Err(AssetLoadError::UnsupportedEncoding {
                path: path.to_path_buf(),
                layer: layer.name.clone(),
                encoding: encoding.unwrap_or("unknown").to_string(),
            });
        }
        (None, _) => {
            return Err(AssetLoadError::InvalidMap {
                path: path.to_path_buf(),
                message: format!("tile layer '{}' has no data", layer.name),
            });
        }
    };

    let width = if layer.width == 0 { map.width } else { layer.width };
    let height = if layer.height == 0 { map.height } else { layer.height };
    if checked_layer_tiles(width, height).is_none() {
        return Err(AssetLoadError::InvalidMap {
            path: path.to_path_buf(),
            message: format!(
                "layer '{}' declares an oversized grid of {width}x{height} tiles",
                layer.name
            ),
        });
    }
    let tiles = gids.iter().copied().map(gid_to_tile_index).collect();
    let tile_layer =
        TileLayer::new(layer.name.clone(), width, height, tiles).map_err(|source| {
            AssetLoadError::Layer {
                path: path.to_path_buf(),
                source,
            }
        })?;
    Ok(tile_layer.with_offset(offset).with_visible(visible))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::world::EMPTY_TILE;

    fn map_path() -> PathBuf {
        PathBuf::from("maps").join("dungeon.json")
    }

    #[test]
    fn parses_layers_groups_and_offsets() {
        let raw = r#"{
            "width": 2, "height": 2, "tilewidth": 16, "tileheight": 16,
            "layers": [
                {"type": "tilelayer", "name": "floor", "width": 2, "height": 2, "data": [1, 2, 0, 3]},
                {"type": "group", "name": "deco", "offsetx": 8, "layers": [
                    {"type": "tilelayer", "name": "trees", "width": 2, "height": 2,
                     "offsety": 4, "data": [0, 0, 0, 2147483653]}
                ]},
                {"type": "objectgroup", "name": "spawns"}
            ],
            "tilesets": [
                {"firstgid": 1, "name": "dungeon", "image": "../tileset/dungeon.png",
                 "tilewidth": 16, "tileheight": 16, "columns": 4, "tilecount": 16}
            ]
        }"#;
        let doc = parse_map(&map_path(), raw).expect("map");
        assert_eq!(doc.layers.len(), 2);
        assert_eq!(doc.layers[0].tile_at(0, 1), Some(EMPTY_TILE));
        assert_eq!(doc.layers[0].tile_at(1, 1), Some(3));
        assert_eq!(doc.layers[1].name(), "trees");
        assert_eq!(doc.layers[1].offset(), Vec2::new(8.0, 4.0));
        // Horizontal flip flag is masked off.
        assert_eq!(doc.layers[1].tile_at(1, 1), Some(5));
        match &doc.tilesets[0] {
            TilesetDecl::Inline(decl) => {
                assert_eq!(decl.image, PathBuf::from("maps").join("../tileset/dungeon.png"));
                assert_eq!(decl.columns, Some(4));
            }
            other => panic!("unexpected tileset decl {other:?}"),
        }
    }

    #[test]
    fn external_tileset_reference_is_resolved_relative_to_map() {
        let raw = r#"{
            "width": 1, "height": 1, "tilewidth": 16, "tileheight": 16,
            "layers": [{"type": "tilelayer", "name": "floor", "width": 1, "height": 1, "data": [1]}],
            "tilesets": [{"firstgid": 1, "source": "terrain.tsx"}]
        }"#;
        let doc = parse_map(&map_path(), raw).expect("map");
        match &doc.tilesets[0] {
            TilesetDecl::External { first_gid, source } => {
                assert_eq!(*first_gid, 1);
                assert_eq!(source, &PathBuf::from("maps").join("terrain.tsx"));
            }
            other => panic!("unexpected tileset decl {other:?}"),
        }
    }

    #[test]
    fn base64_layers_are_rejected() {
        let raw = r#"{
            "width": 1, "height": 1, "tilewidth": 16, "tileheight": 16,
            "layers": [{"type": "tilelayer", "name": "floor", "width": 1, "height": 1,
                        "encoding": "base64", "data": "AQAAAA=="}]
        }"#;
        let err = parse_map(&map_path(), raw).expect_err("err");
        assert!(matches!(
            err,
            AssetLoadError::UnsupportedEncoding { ref encoding, .. } if encoding == "base64"
        ));
    }

    #[test]
    fn oversized_layer_is_rejected() {
        let raw = r#"{
            "width": 100000, "height": 100000, "tilewidth": 16, "tileheight": 16,
            "layers": [{"type": "tilelayer", "name": "floor", "data": [1]}]
        }"#;
        let err = parse_map(&map_path(), raw).expect_err("oversized");
        assert!(matches!(err, AssetLoadError::InvalidMap { .. }));
    }

    #[test]
    fn external_and_inline_tilesets_mix() {
        let raw = r#"{
            "width": 1, "height": 1, "tilewidth": 16, "tileheight": 16,
            "layers": [{"type": "tilelayer", "name": "floor", "width": 1, "height": 1, "data": [1]}],
            "tilesets": [
                {"firstgid": 1, "source": "terrain.tsj"},
                {"firstgid": 17, "name": "props", "image": "props.png"}
            ]
        }"#;
        let doc = parse_map(&map_path(), raw).expect("map");
        assert_eq!(doc.tilesets.len(), 2);
        assert!(matches!(doc.tilesets[0], TilesetDecl::External { first_gid: 1, .. }));
        assert!(matches!(
            &doc.tilesets[1],
            TilesetDecl::Inline(decl) if decl.first_gid == 17
        ));
    }

    #[test]
    fn inline_tileset_without_image_is_rejected() {
        let raw = r#"{
            "width": 1, "height": 1, "tilewidth": 16, "tileheight": 16,
            "layers": [{"type": "tilelayer", "name": "floor", "width": 1, "height": 1, "data": [1]}],
            "tilesets": [{"firstgid": 1, "name": "props"}]
        }"#;
        let err = parse_map(&map_path(), raw).expect_err("no image");
        assert!(matches!(err, AssetLoadError::InvalidMap { .. }));
    }

    #[test]
    fn tile_count_mismatch_is_reported() {
        let raw = r#"{
            "width": 2, "height": 2, "tilewidth": 16, "tileheight": 16,
            "layers": [{"type": "tilelayer", "name": "floor", "width": 2, "height": 2, "data": [1]}]
        }"#;
        let err = parse_map(&map_path(), raw).expect_err("err");
        assert!(matches!(err, AssetLoadError::Layer { .. }));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = parse_map(&map_path(), "{ not json").expect_err("err");
        assert!(matches!(err, AssetLoadError::MalformedJson { .. }));
    }
}
