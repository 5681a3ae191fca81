use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use pixels::{Error, Pixels, SurfaceTexture};
use tracing::warn;
use winit::window::Window;

use crate::app::{LoopMetricsSnapshot, Panel};
use crate::sim::{Actor, Camera, NpcState, Rect, WorldScene};
use crate::world::{World, EMPTY_TILE};

use super::canvas::{Canvas, LoadedImage, ScreenRect};
use super::text::{draw_text, glyph_advance, line_advance, text_width, wrap};

pub const PROMPT_TEXT: &str = "Press E to interact";

const CLEAR_COLOR: [u8; 4] = [18, 16, 22, 255];
const TILE_FALLBACK_COLOR: [u8; 4] = [70, 64, 78, 255];
const PLAYER_COLOR: [u8; 4] = [86, 156, 232, 255];
const PLAYER_WALK_COLOR: [u8; 4] = [128, 190, 250, 255];
const NPC_WALKING_COLOR: [u8; 4] = [214, 168, 74, 255];
const NPC_IDLE_COLOR: [u8; 4] = [150, 200, 110, 255];
const NPC_INTERACTING_COLOR: [u8; 4] = [226, 110, 150, 255];
const FACING_MARK_COLOR: [u8; 4] = [20, 20, 24, 255];
const BODY_OUTLINE_COLOR: [u8; 4] = [80, 240, 120, 255];
const NPC_OUTLINE_COLOR: [u8; 4] = [250, 220, 90, 255];
const TEXT_COLOR: [u8; 4] = [244, 248, 252, 255];
const TEXT_DIM_COLOR: [u8; 4] = [176, 198, 220, 255];
const PANEL_BG_COLOR: [u8; 4] = [10, 12, 16, 220];
const PANEL_BORDER_COLOR: [u8; 4] = [92, 106, 126, 255];
const TEXT_SCALE: i32 = 2;
const PANEL_PADDING: i32 = 12;
const FACING_MARK_PX: i32 = 4;

/// Window-backed pixel renderer. Tileset images are decoded on first use and
/// cached by path.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    width: u32,
    height: u32,
    images: TilesetImages,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            width: size.width,
            height: size.height,
            images: TilesetImages::default(),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    pub(crate) fn render(
        &mut self,
        scene: &WorldScene,
        panels: &[Panel],
        metrics: Option<&LoopMetricsSnapshot>,
    ) -> Result<(), Error> {
        if self.width == 0 || self.height == 0 {
            return Ok(());
        }
        self.images.ensure_loaded(scene.world());
        let mut canvas = Canvas::new(self.pixels.frame_mut(), self.width, self.height);
        compose_frame(&mut canvas, scene, panels, metrics, &self.images);
        self.pixels.render()
    }
}

#[derive(Debug, Default)]
pub(crate) struct TilesetImages {
    cache: HashMap<PathBuf, Option<LoadedImage>>,
    warned: HashSet<PathBuf>,
}

impl TilesetImages {
    fn ensure_loaded(&mut self, world: &World) {
        for tileset in world.tilesets() {
            if self.cache.contains_key(&tileset.image) {
                continue;
            }
            let loaded = match load_rgba(&tileset.image) {
                Ok(image) => Some(image),
                Err(reason) => {
                    if self.warned.insert(tileset.image.clone()) {
                        warn!(
                            tileset = %tileset.name,
                            path = %tileset.image.display(),
                            reason = %reason,
                            "tileset_image_unavailable_using_fallback"
                        );
                    }
                    None
                }
            };
            self.cache.insert(tileset.image.clone(), loaded);
        }
    }

    fn get(&self, path: &Path) -> Option<&LoadedImage> {
        self.cache.get(path).and_then(Option::as_ref)
    }
}

fn load_rgba(path: &Path) -> Result<LoadedImage, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    Ok(LoadedImage {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

pub(crate) fn compose_frame(
    canvas: &mut Canvas<'_>,
    scene: &WorldScene,
    panels: &[Panel],
    metrics: Option<&LoopMetricsSnapshot>,
    images: &TilesetImages,
) {
    canvas.clear(CLEAR_COLOR);
    let camera = scene.camera();
    draw_tiles(canvas, scene.world(), camera, images);
    draw_actors(canvas, scene, camera);

    if scene.prompt_visible() {
        draw_prompt(canvas, scene.player(), camera);
    }
    if scene.is_debug_visible() {
        draw_debug(canvas, scene, camera, metrics);
    }
    for panel in panels {
        draw_panel(canvas, panel);
    }
}

fn screen_rect(camera: &Camera, rect: &Rect) -> ScreenRect {
    let top_left = camera.world_to_screen(rect.min);
    let bottom_right = camera.world_to_screen(rect.min + rect.size);
    let x = top_left.x.floor() as i32;
    let y = top_left.y.floor() as i32;
    ScreenRect::new(
        x,
        y,
        bottom_right.x.ceil() as i32 - x,
        bottom_right.y.ceil() as i32 - y,
    )
}

fn draw_tiles(canvas: &mut Canvas<'_>, world: &World, camera: &Camera, images: &TilesetImages) {
    let tw = world.tile_width() as f32;
    let th = world.tile_height() as f32;
    if tw <= 0.0 || th <= 0.0 {
        return;
    }
    let view = camera.view_rect();

    for layer in world.render_layers() {
        let offset = layer.offset();
        let x_min = ((view.left() - offset.x) / tw).floor().max(0.0) as u32;
        let y_min = ((view.top() - offset.y) / th).floor().max(0.0) as u32;
        let x_max = (((view.right() - offset.x) / tw).ceil().max(0.0) as u32).min(layer.width());
        let y_max = (((view.bottom() - offset.y) / th).ceil().max(0.0) as u32).min(layer.height());

        for y in y_min..y_max {
            for x in x_min..x_max {
                let Some(index) = layer.tile_at(x, y).filter(|index| *index != EMPTY_TILE) else {
                    continue;
                };
                let world_rect = Rect::new(offset.x + x as f32 * tw, offset.y + y as f32 * th, tw, th);
                let target = screen_rect(camera, &world_rect);
                let source = world.tileset_for(index).and_then(|tileset| {
                    let (sx, sy) = tileset.source_origin(index)?;
                    let image = images.get(&tileset.image)?;
                    Some((
                        image,
                        ScreenRect::new(
                            sx as i32,
                            sy as i32,
                            tileset.tile_width as i32,
                            tileset.tile_height as i32,
                        ),
                    ))
                });
                match source {
                    Some((image, source)) => canvas.blit(image, source, target),
                    None => canvas.fill_rect(target, TILE_FALLBACK_COLOR),
                }
            }
        }
    }
}

fn draw_actors(canvas: &mut Canvas<'_>, scene: &WorldScene, camera: &Camera) {
    let player = scene.player();
    let player_color = if player.velocity.is_zero() {
        PLAYER_COLOR
    } else {
        PLAYER_WALK_COLOR
    };
    let mut draw_list: Vec<(&Actor, [u8; 4])> = scene
        .npcs()
        .iter()
        .map(|npc| (npc.actor(), npc_color(npc.state())))
        .collect();
    draw_list.push((player, player_color));
    // Painter's order: lower on screen draws later.
    draw_list.sort_by(|a, b| a.0.body_rect().bottom().total_cmp(&b.0.body_rect().bottom()));

    for (actor, color) in draw_list {
        let body = screen_rect(camera, &actor.body_rect());
        canvas.fill_rect(body, color);
        let mark_x = if actor.facing.is_flipped() {
            body.x + 2
        } else {
            body.x + body.width - 2 - FACING_MARK_PX
        };
        canvas.fill_rect(
            ScreenRect::new(mark_x, body.y + 4, FACING_MARK_PX, FACING_MARK_PX),
            FACING_MARK_COLOR,
        );
    }
}

fn npc_color(state: NpcState) -> [u8; 4] {
    match state {
        NpcState::Walking => NPC_WALKING_COLOR,
        NpcState::Idle => NPC_IDLE_COLOR,
        NpcState::Interacting => NPC_INTERACTING_COLOR,
    }
}

fn draw_prompt(canvas: &mut Canvas<'_>, player: &Actor, camera: &Camera) {
    let sprite = screen_rect(camera, &player.sprite_rect());
    let width = text_width(PROMPT_TEXT, TEXT_SCALE);
    let x = sprite.x + sprite.width / 2 - width / 2;
    let y = sprite.y - line_advance(TEXT_SCALE) - PANEL_PADDING / 2;
    let plate = ScreenRect::new(
        x - PANEL_PADDING / 2,
        y - PANEL_PADDING / 2,
        width + PANEL_PADDING,
        line_advance(TEXT_SCALE) + PANEL_PADDING / 2,
    );
    canvas.fill_rect(plate, PANEL_BG_COLOR);
    draw_text(canvas, x, y, PROMPT_TEXT, TEXT_SCALE, TEXT_COLOR);
}

fn draw_debug(
    canvas: &mut Canvas<'_>,
    scene: &WorldScene,
    camera: &Camera,
    metrics: Option<&LoopMetricsSnapshot>,
) {
    canvas.outline_rect(
        screen_rect(camera, &scene.player().body_rect()),
        BODY_OUTLINE_COLOR,
    );
    for npc in scene.npcs() {
        canvas.outline_rect(screen_rect(camera, &npc.actor().body_rect()), NPC_OUTLINE_COLOR);
    }

    let mut lines = scene.debug_lines();
    if let Some(metrics) = metrics {
        lines.insert(0, metrics.overlay_line());
    }
    draw_text_block(canvas, PANEL_PADDING, PANEL_PADDING, &lines, TEXT_DIM_COLOR);
}

fn draw_text_block(canvas: &mut Canvas<'_>, x: i32, y: i32, lines: &[String], color: [u8; 4]) {
    if lines.is_empty() {
        return;
    }
    let width = lines
        .iter()
        .map(|line| text_width(line, TEXT_SCALE))
        .max()
        .unwrap_or(0);
    let height = lines.len() as i32 * line_advance(TEXT_SCALE);
    let plate = ScreenRect::new(
        x - PANEL_PADDING / 2,
        y - PANEL_PADDING / 2,
        width + PANEL_PADDING,
        height + PANEL_PADDING / 2,
    );
    canvas.fill_rect(plate, PANEL_BG_COLOR);
    for (row, line) in lines.iter().enumerate() {
        draw_text(
            canvas,
            x,
            y + row as i32 * line_advance(TEXT_SCALE),
            line,
            TEXT_SCALE,
            color,
        );
    }
}

fn draw_panel(canvas: &mut Canvas<'_>, panel: &Panel) {
    let width = canvas.width() as i32;
    let height = canvas.height() as i32;
    match panel {
        Panel::Banner { text } => {
            let text_w = text_width(text, TEXT_SCALE);
            let x = (width - text_w) / 2;
            draw_text_block(canvas, x, PANEL_PADDING, std::slice::from_ref(text), TEXT_COLOR);
        }
        Panel::DialogueCard { title, hint } => {
            let lines = [title.clone(), hint.clone()];
            let rect = panel_rect(width, height, &lines, 0.4, PanelAnchor::Bottom);
            draw_framed_lines(canvas, rect, &lines);
        }
        Panel::DialogueExpanded { title, body, hint } => {
            let inner_w = (width as f32 * 0.7) as i32 - PANEL_PADDING * 2;
            let max_chars = (inner_w / glyph_advance(TEXT_SCALE)).max(1) as usize;
            let mut lines = vec![title.clone(), String::new()];
            lines.extend(wrap(body, max_chars));
            lines.push(String::new());
            lines.push(hint.clone());
            let rect = panel_rect(width, height, &lines, 0.7, PanelAnchor::Center);
            draw_framed_lines(canvas, rect, &lines);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanelAnchor {
    Bottom,
    Center,
}

fn panel_rect(
    width: i32,
    height: i32,
    lines: &[String],
    width_fraction: f32,
    anchor: PanelAnchor,
) -> ScreenRect {
    let panel_w = (width as f32 * width_fraction) as i32;
    let panel_h = lines.len() as i32 * line_advance(TEXT_SCALE) + PANEL_PADDING * 2;
    let x = (width - panel_w) / 2;
    let y = match anchor {
        PanelAnchor::Bottom => height - panel_h - PANEL_PADDING,
        PanelAnchor::Center => (height - panel_h) / 2,
    };
    ScreenRect::new(x, y, panel_w, panel_h)
}

fn draw_framed_lines(canvas: &mut Canvas<'_>, rect: ScreenRect, lines: &[String]) {
    canvas.fill_rect(rect, PANEL_BG_COLOR);
    canvas.outline_rect(rect, PANEL_BORDER_COLOR);
    for (row, line) in lines.iter().enumerate() {
        let color = if row == 0 { TEXT_COLOR } else { TEXT_DIM_COLOR };
        draw_text(
            canvas,
            rect.x + PANEL_PADDING,
            rect.y + PANEL_PADDING + row as i32 * line_advance(TEXT_SCALE),
            line,
            TEXT_SCALE,
            color,
        );
    }
}
