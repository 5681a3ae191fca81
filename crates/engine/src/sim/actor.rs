use std::fmt;

use super::config::BodyShape;
use super::math::{Rect, Vec2};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NpcId(pub String);

impl NpcId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NpcId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Display metadata handed to the host when a dialogue opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcInfo {
    pub name: String,
    pub description: String,
}

impl NpcInfo {
    pub fn placeholder(id: &NpcId) -> Self {
        Self {
            name: format!("NPC {id}"),
            description: format!("This is NPC {id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    /// Whether the sprite is drawn mirrored; source art faces right.
    pub fn is_flipped(self) -> bool {
        self == Facing::Left
    }

    pub fn label(self) -> &'static str {
        match self {
            Facing::Left => "left",
            Facing::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Animation {
    #[default]
    Idle,
    Walk,
}

impl Animation {
    pub fn label(self) -> &'static str {
        match self {
            Animation::Idle => "idle",
            Animation::Walk => "walk",
        }
    }
}

/// A positioned sprite with a collision body. `position` is the sprite center.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub position: Vec2,
    pub velocity: Vec2,
    pub facing: Facing,
    pub animation: Animation,
    shape: BodyShape,
}

impl Actor {
    pub fn new(position: Vec2, shape: BodyShape) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            facing: Facing::Right,
            animation: Animation::Idle,
            shape,
        }
    }

    pub fn shape(&self) -> &BodyShape {
        &self.shape
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// Body offset inside the unscaled frame; mirrored sprites use the left offset.
    pub fn body_offset(&self) -> Vec2 {
        body_offset_for(&self.shape, self.facing)
    }

    pub fn body_rect(&self) -> Rect {
        self.body_rect_at(self.position)
    }

    pub fn body_rect_at(&self, position: Vec2) -> Rect {
        let shape = &self.shape;
        let offset = self.body_offset();
        Rect::new(
            position.x + shape.scale * (offset.x - shape.frame_width * 0.5),
            position.y + shape.scale * (offset.y - shape.frame_height * 0.5),
            shape.body_width * shape.scale,
            shape.body_height * shape.scale,
        )
    }

    /// Visual sprite bounds in world space.
    pub fn sprite_rect(&self) -> Rect {
        let width = self.shape.frame_width * self.shape.scale;
        let height = self.shape.frame_height * self.shape.scale;
        Rect::new(
            self.position.x - width * 0.5,
            self.position.y - height * 0.5,
            width,
            height,
        )
    }
}

pub fn body_offset_for(shape: &BodyShape, facing: Facing) -> Vec2 {
    match facing {
        Facing::Left => shape.offset_left,
        Facing::Right => shape.offset_right,
    }
}
