mod loader;
mod tiled_json;
mod tiled_xml;
mod tilemap;

pub use loader::{load_world, AssetLoadError, WorldLoader, EXPECTED_LAYER_NAMES};
pub use tilemap::{TileLayer, TilemapError, Tileset, World, COLLISION_LAYER_NAME, EMPTY_TILE};
