use super::config::{CAMERA_ZOOM_DEFAULT, CAMERA_ZOOM_MAX, CAMERA_ZOOM_MIN};
use super::math::{Rect, Vec2};

/// Follow camera. `center` is the world point shown at the middle of the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    center: Vec2,
    zoom: f32,
    lerp: f32,
    viewport: Vec2,
}

impl Camera {
    pub fn new(viewport: Vec2, zoom: f32, lerp: f32) -> Self {
        Self {
            center: Vec2::ZERO,
            zoom: clamp_camera_zoom(zoom),
            lerp: lerp.clamp(0.0, 1.0),
            viewport,
        }
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn snap_to(&mut self, target: Vec2, bounds: &Rect) {
        self.center = target;
        self.clamp_to(bounds);
    }

    /// Moves a `lerp` fraction of the way toward `target`, then clamps to `bounds`.
    pub fn follow(&mut self, target: Vec2, bounds: &Rect) {
        self.center = self.center + (target - self.center) * self.lerp;
        self.clamp_to(bounds);
    }

    /// World-space rectangle currently visible.
    pub fn view_rect(&self) -> Rect {
        let half = self.half_extent();
        Rect::new(
            self.center.x - half.x,
            self.center.y - half.y,
            half.x * 2.0,
            half.y * 2.0,
        )
    }

    pub fn world_to_screen(&self, point: Vec2) -> Vec2 {
        (point - self.view_rect().min) * self.zoom
    }

    fn half_extent(&self) -> Vec2 {
        Vec2::new(
            self.viewport.x * 0.5 / self.zoom,
            self.viewport.y * 0.5 / self.zoom,
        )
    }

    fn clamp_to(&mut self, bounds: &Rect) {
        if bounds.size.x <= 0.0 || bounds.size.y <= 0.0 {
            return;
        }
        let half = self.half_extent();
        self.center.x = clamp_axis(self.center.x, bounds.left(), bounds.right(), half.x);
        self.center.y = clamp_axis(self.center.y, bounds.top(), bounds.bottom(), half.y);
    }
}

fn clamp_axis(value: f32, low: f32, high: f32, half: f32) -> f32 {
    // A map narrower than the view stays centered.
    if high - low <= half * 2.0 {
        return (low + high) * 0.5;
    }
    value.clamp(low + half, high - half)
}

fn clamp_camera_zoom(zoom: f32) -> f32 {
    if !zoom.is_finite() {
        return CAMERA_ZOOM_DEFAULT;
    }
    zoom.clamp(CAMERA_ZOOM_MIN, CAMERA_ZOOM_MAX)
}
