use std::path::PathBuf;

use thiserror::Error;

use crate::sim::{Rect, Vec2};

/// Tile index stored for cells that hold no tile.
pub const EMPTY_TILE: i32 = -1;

/// Name of the layer that defines solid geometry.
pub const COLLISION_LAYER_NAME: &str = "collisions";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TilemapError {
    #[error("layer '{layer}' tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch {
        layer: String,
        expected: usize,
        actual: usize,
    },
}

/// One named grid of tile indices. Index `(x, y)` lives at `y * width + x`.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    name: String,
    width: u32,
    height: u32,
    offset: Vec2,
    tiles: Vec<i32>,
    visible: bool,
    collidable: bool,
}

impl TileLayer {
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        tiles: Vec<i32>,
    ) -> Result<Self, TilemapError> {
        let name = name.into();
        let expected = width as usize * height as usize;
        let actual = tiles.len();
        if expected != actual {
            return Err(TilemapError::TileCountMismatch {
                layer: name,
                expected,
                actual,
            });
        }
        Ok(Self {
            name,
            width,
            height,
            offset: Vec2::ZERO,
            tiles,
            visible: true,
            collidable: false,
        })
    }

    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_collidable(&self) -> bool {
        self.collidable
    }

    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn tile_at(&self, x: u32, y: u32) -> Option<i32> {
        self.index_of(x, y)
            .and_then(|index| self.tiles.get(index).copied())
    }

    /// Solidity rule of the collision layer: anything but the empty sentinel blocks.
    pub fn is_solid_tile(&self, x: u32, y: u32) -> bool {
        matches!(self.tile_at(x, y), Some(index) if index != EMPTY_TILE)
    }

    fn pixel_rect(&self, tile_width: u32, tile_height: u32) -> Rect {
        Rect::new(
            self.offset.x,
            self.offset.y,
            (self.width * tile_width) as f32,
            (self.height * tile_height) as f32,
        )
    }
}

/// Tileset image slice used to resolve a tile index to pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Tileset {
    pub name: String,
    pub first_gid: u32,
    pub image: PathBuf,
    pub image_width: u32,
    pub image_height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub columns: u32,
    pub tile_count: u32,
}

impl Tileset {
    pub fn contains(&self, index: i32) -> bool {
        if index < 0 {
            return false;
        }
        let gid = index as u32;
        gid >= self.first_gid && gid < self.first_gid.saturating_add(self.tile_count)
    }

    /// Top-left pixel of `index` inside the tileset image.
    pub fn source_origin(&self, index: i32) -> Option<(u32, u32)> {
        if !self.contains(index) || self.columns == 0 {
            return None;
        }
        let local = index as u32 - self.first_gid;
        Some((
            (local % self.columns) * self.tile_width,
            (local / self.columns) * self.tile_height,
        ))
    }
}

/// Loaded map: immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    tile_width: u32,
    tile_height: u32,
    layers: Vec<TileLayer>,
    tilesets: Vec<Tileset>,
    bounds: Rect,
}

impl World {
    /// Builds the world and designates the first layer named [`COLLISION_LAYER_NAME`]
    /// as the physical blocking layer. That layer is hidden from rendering.
    pub fn new(
        tile_width: u32,
        tile_height: u32,
        mut layers: Vec<TileLayer>,
        tilesets: Vec<Tileset>,
    ) -> Self {
        if let Some(collision) = layers
            .iter_mut()
            .find(|layer| layer.name == COLLISION_LAYER_NAME)
        {
            collision.collidable = true;
            collision.visible = false;
        }

        let bounds = layers
            .iter()
            .map(|layer| layer.pixel_rect(tile_width, tile_height))
            .reduce(|acc, rect| acc.union(&rect))
            .unwrap_or_default();

        Self {
            tile_width,
            tile_height,
            layers,
            tilesets,
            bounds,
        }
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn width_px(&self) -> f32 {
        self.bounds.size.x
    }

    pub fn height_px(&self) -> f32 {
        self.bounds.size.y
    }

    pub fn layers(&self) -> &[TileLayer] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&TileLayer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    pub fn tilesets(&self) -> &[Tileset] {
        &self.tilesets
    }

    pub fn tileset_for(&self, index: i32) -> Option<&Tileset> {
        // Tiled resolves a gid to the tileset with the highest first gid not above it.
        self.tilesets
            .iter()
            .filter(|tileset| index >= 0 && tileset.first_gid <= index as u32)
            .max_by_key(|tileset| tileset.first_gid)
            .filter(|tileset| tileset.contains(index))
    }

    /// Layers drawn by default, in document order.
    pub fn render_layers(&self) -> impl Iterator<Item = &TileLayer> {
        self.layers
            .iter()
            .filter(|layer| layer.visible && !layer.collidable)
    }

    /// Layers that participate in physical collision, in document order.
    pub fn collidable_layers(&self) -> impl Iterator<Item = &TileLayer> {
        self.layers.iter().filter(|layer| layer.collidable)
    }

    pub fn has_collision(&self) -> bool {
        self.collidable_layers().next().is_some()
    }

    /// Pixel rects of every solid tile that overlaps `area`.
    pub fn solid_tiles_overlapping(&self, area: &Rect) -> Vec<Rect> {
        let tw = self.tile_width as f32;
        let th = self.tile_height as f32;
        let mut solids = Vec::new();
        if tw <= 0.0 || th <= 0.0 {
            return solids;
        }

        for layer in self.collidable_layers() {
            let local_left = area.left() - layer.offset.x;
            let local_top = area.top() - layer.offset.y;
            let local_right = area.right() - layer.offset.x;
            let local_bottom = area.bottom() - layer.offset.y;
            if local_right <= 0.0 || local_bottom <= 0.0 {
                continue;
            }

            let x_min = (local_left / tw).floor().max(0.0) as u32;
            let y_min = (local_top / th).floor().max(0.0) as u32;
            // Exclusive right/bottom edge: a body touching a tile edge does not enter it.
            let x_max = ((local_right / tw).ceil() as u32).min(layer.width);
            let y_max = ((local_bottom / th).ceil() as u32).min(layer.height);

            for y in y_min..y_max {
                for x in x_min..x_max {
                    if !layer.is_solid_tile(x, y) {
                        continue;
                    }
                    let tile = Rect::new(
                        layer.offset.x + x as f32 * tw,
                        layer.offset.y + y as f32 * th,
                        tw,
                        th,
                    );
                    if tile.overlaps(area) {
                        solids.push(tile);
                    }
                }
            }
        }
        solids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &str, width: u32, height: u32, fill: i32) -> TileLayer {
        TileLayer::new(name, width, height, vec![fill; (width * height) as usize]).expect("layer")
    }

    #[test]
    fn layer_rejects_invalid_tile_count() {
        let err = TileLayer::new("floor", 2, 2, vec![1, 2, 3]).expect_err("err");
        assert_eq!(
            err,
            TilemapError::TileCountMismatch {
                layer: "floor".to_string(),
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn layer_indexing_and_bounds() {
        let layer = TileLayer::new("floor", 2, 2, vec![10, 11, 12, 13]).expect("layer");
        assert_eq!(layer.index_of(1, 1), Some(3));
        assert_eq!(layer.tile_at(0, 1), Some(12));
        assert_eq!(layer.tile_at(2, 0), None);
    }

    #[test]
    fn bounds_are_union_of_all_layers() {
        let world = World::new(
            16,
            16,
            vec![
                layer("floor", 10, 5, 1),
                layer("walls", 4, 8, EMPTY_TILE).with_offset(Vec2::new(-16.0, 0.0)),
            ],
            Vec::new(),
        );
        assert_eq!(world.bounds(), Rect::new(-16.0, 0.0, 176.0, 128.0));
    }

    #[test]
    fn collisions_layer_is_collidable_and_hidden() {
        let world = World::new(
            16,
            16,
            vec![
                layer("floor", 4, 4, 1),
                layer("collisions", 4, 4, EMPTY_TILE),
                layer("objects", 4, 4, EMPTY_TILE),
            ],
            Vec::new(),
        );
        let collidable: Vec<&str> = world.collidable_layers().map(TileLayer::name).collect();
        let rendered: Vec<&str> = world.render_layers().map(TileLayer::name).collect();
        assert_eq!(collidable, vec!["collisions"]);
        assert_eq!(rendered, vec!["floor", "objects"]);
        assert!(!world.layer("collisions").expect("layer").is_visible());
    }

    #[test]
    fn missing_collisions_layer_means_open_world() {
        let world = World::new(16, 16, vec![layer("floor", 4, 4, 1)], Vec::new());
        assert!(!world.has_collision());
        assert!(world
            .solid_tiles_overlapping(&Rect::new(0.0, 0.0, 64.0, 64.0))
            .is_empty());
    }

    #[test]
    fn any_non_empty_index_is_solid() {
        let mut tiles = vec![EMPTY_TILE; 9];
        tiles[4] = 0;
        let world = World::new(
            16,
            16,
            vec![TileLayer::new("collisions", 3, 3, tiles).expect("layer")],
            Vec::new(),
        );
        let hits = world.solid_tiles_overlapping(&Rect::new(10.0, 10.0, 10.0, 10.0));
        assert_eq!(hits, vec![Rect::new(16.0, 16.0, 16.0, 16.0)]);
        let touching = world.solid_tiles_overlapping(&Rect::new(0.0, 0.0, 16.0, 16.0));
        assert!(touching.is_empty());
    }

    #[test]
    fn tileset_lookup_prefers_highest_first_gid() {
        let tileset = |name: &str, first_gid: u32| Tileset {
            name: name.to_string(),
            first_gid,
            image: PathBuf::from(format!("{name}.png")),
            image_width: 64,
            image_height: 64,
            tile_width: 16,
            tile_height: 16,
            columns: 4,
            tile_count: 16,
        };
        let world = World::new(
            16,
            16,
            Vec::new(),
            vec![tileset("a", 1), tileset("b", 17)],
        );
        assert_eq!(world.tileset_for(16).map(|t| t.name.as_str()), Some("a"));
        assert_eq!(world.tileset_for(17).map(|t| t.name.as_str()), Some("b"));
        assert_eq!(world.tileset_for(40), None);
        let b = world.tileset_for(22).expect("tileset");
        assert_eq!(b.source_origin(22), Some((16, 16)));
    }
}
