use std::path::Path;
use std::str::FromStr;

use roxmltree::{Document, Node};

use crate::sim::Vec2;

use super::loader::{
    checked_layer_tiles, gid_to_tile_index, AssetLoadError, MapDocument, TilesetDecl,
    TilesetImageDecl,
};
use super::tilemap::TileLayer;

struct MapHeader {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
}

pub(crate) fn parse_map(path: &Path, raw: &str) -> Result<MapDocument, AssetLoadError> {
    let doc = parse_document(path, raw)?;
    let root = doc.root_element();
    if root.tag_name().name() != "map" {
        return Err(error_at_node(
            path,
            &doc,
            root,
            "root element must be <map>".to_string(),
        ));
    }
    if root.attribute("infinite") == Some("1") {
        return Err(error_at_node(
            path,
            &doc,
            root,
            "infinite (chunked) maps are not supported".to_string(),
        ));
    }

    let header = MapHeader {
        width: required_attr(path, &doc, root, "width")?,
        height: required_attr(path, &doc, root, "height")?,
        tile_width: required_attr(path, &doc, root, "tilewidth")?,
        tile_height: required_attr(path, &doc, root, "tileheight")?,
    };
    if header.tile_width == 0 || header.tile_height == 0 {
        return Err(error_at_node(
            path,
            &doc,
            root,
            "tilewidth and tileheight must be non-zero".to_string(),
        ));
    }

    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let mut tilesets = Vec::new();
    for node in root
        .children()
        .filter(|child| child.has_tag_name("tileset"))
    {
        let first_gid = required_attr(path, &doc, node, "firstgid")?;
        match node.attribute("source") {
            Some(source) => tilesets.push(TilesetDecl::External {
                first_gid,
                source: base_dir.join(source),
            }),
            None => tilesets.push(TilesetDecl::Inline(tileset_from_node(
                path, base_dir, &doc, node, first_gid,
            )?)),
        }
    }

    let mut layers = Vec::new();
    collect_layers(path, &doc, &header, root, Vec2::ZERO, true, &mut layers)?;

    Ok(MapDocument {
        tile_width: header.tile_width,
        tile_height: header.tile_height,
        layers,
        tilesets,
    })
}

/// Parses an external `.tsx` tileset; the image path is relative to the tileset file.
pub(crate) fn parse_tileset(
    path: &Path,
    raw: &str,
    first_gid: u32,
) -> Result<TilesetImageDecl, AssetLoadError> {
    let doc = parse_document(path, raw)?;
    let root = doc.root_element();
    if root.tag_name().name() != "tileset" {
        return Err(error_at_node(
            path,
            &doc,
            root,
            "root element must be <tileset>".to_string(),
        ));
    }
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    tileset_from_node(path, base_dir, &doc, root, first_gid)
}

fn parse_document<'a>(path: &Path, raw: &'a str) -> Result<Document<'a>, AssetLoadError> {
    Document::parse(raw).map_err(|error| AssetLoadError::MalformedXml {
        path: path.to_path_buf(),
        line: error.pos().row,
        column: error.pos().col,
        message: error.to_string(),
    })
}

fn tileset_from_node(
    path: &Path,
    base_dir: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    first_gid: u32,
) -> Result<TilesetImageDecl, AssetLoadError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let image = node
        .children()
        .find(|child| child.has_tag_name("image"))
        .ok_or_else(|| {
            error_at_node(
                path,
                doc,
                node,
                format!("tileset '{name}' has no <image>; image collections are not supported"),
            )
        })?;
    let source = image.attribute("source").ok_or_else(|| {
        error_at_node(path, doc, image, "<image> is missing 'source'".to_string())
    })?;

    Ok(TilesetImageDecl {
        name,
        first_gid,
        image: base_dir.join(source),
        tile_width: optional_attr(path, doc, node, "tilewidth")?,
        tile_height: optional_attr(path, doc, node, "tileheight")?,
        columns: optional_attr(path, doc, node, "columns")?,
        tile_count: optional_attr(path, doc, node, "tilecount")?,
    })
}

fn collect_layers(
    path: &Path,
    doc: &Document<'_>,
    header: &MapHeader,
    parent: Node<'_, '_>,
    parent_offset: Vec2,
    parent_visible: bool,
    out: &mut Vec<TileLayer>,
) -> Result<(), AssetLoadError> {
    for node in parent.children().filter(|child| child.is_element()) {
        let kind = node.tag_name().name();
        if kind != "layer" && kind != "group" {
            continue;
        }
        let offset = parent_offset
            + Vec2::new(
                optional_attr::<f32>(path, doc, node, "offsetx")?.unwrap_or(0.0),
                optional_attr::<f32>(path, doc, node, "offsety")?.unwrap_or(0.0),
            );
        let visible = parent_visible && node.attribute("visible") != Some("0");
        if kind == "group" {
            collect_layers(path, doc, header, node, offset, visible, out)?;
        } else {
            out.push(tile_layer_from_node(path, doc, header, node, offset, visible)?);
        }
    }
    Ok(())
}

fn tile_layer_from_node(
    path: &Path,
    doc: &Document<'_>,
    header: &MapHeader,
    node: Node<'_, '_>,
    offset: Vec2,
    visible: bool,
) -> Result<TileLayer, AssetLoadError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let width = optional_attr(path, doc, node, "width")?.unwrap_or(header.width);
    let height = optional_attr(path, doc, node, "height")?.unwrap_or(header.height);
    if checked_layer_tiles(width, height).is_none() {
        return Err(AssetLoadError::InvalidMap {
            path: path.to_path_buf(),
            message: format!("layer '{name}' declares an oversized grid of {width}x{height} tiles"),
        });
    }
    let data = node
        .children()
        .find(|child| child.has_tag_name("data"))
        .ok_or_else(|| error_at_node(path, doc, node, format!("layer '{name}' has no <data>")))?;

    match data.attribute("encoding") {
        Some("csv") => {}
        other => {
            return Err(AssetLoadError::UnsupportedEncoding {
                path: path.to_path_buf(),
                layer: name,
                encoding: other.unwrap_or("xml").to_string(),
            });
        }
    }
    if let Some(compression) = data.attribute("compression") {
        return Err(AssetLoadError::UnsupportedEncoding {
            path: path.to_path_buf(),
            layer: name,
            encoding: format!("csv+{compression}"),
        });
    }

    let text = data.text().unwrap_or_default();
    let mut tiles = Vec::new();
    for value in text
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        let gid = value.parse::<u32>().map_err(|_| {
            error_at_node(
                path,
                doc,
                data,
                format!("layer '{name}' has invalid tile id '{value}'"),
            )
        })?;
        tiles.push(gid_to_tile_index(gid));
    }

    let layer = TileLayer::new(name, width, height, tiles).map_err(|source| {
        AssetLoadError::Layer {
            path: path.to_path_buf(),
            source,
        }
    })?;
    Ok(layer.with_offset(offset).with_visible(visible))
}

fn required_attr<T: FromStr>(
    path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
) -> Result<T, AssetLoadError> {
    optional_attr(path, doc, node, name)?.ok_or_else(|| {
        error_at_node(
            path,
            doc,
            node,
            format!("<{}> is missing '{name}'", node.tag_name().name()),
        )
    })
}

fn optional_attr<T: FromStr>(
    path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
) -> Result<Option<T>, AssetLoadError> {
    let Some(raw) = node.attribute(name) else {
        return Ok(None);
    };
    raw.trim().parse::<T>().map(Some).map_err(|_| {
        error_at_node(
            path,
            doc,
            node,
            format!(
                "<{}> attribute '{name}' has invalid value '{raw}'",
                node.tag_name().name()
            ),
        )
    })
}

fn error_at_node(
    path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    message: String,
) -> AssetLoadError {
    let pos = doc.text_pos_at(node.range().start);
    AssetLoadError::MalformedXml {
        path: path.to_path_buf(),
        line: pos.row,
        column: pos.col,
        message,
    }
}
