use super::actor::{body_offset_for, Actor, Animation, Facing};
use super::config::BodyShape;
use super::math::Vec2;

/// Held state of the four movement directions for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionalInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl DirectionalInput {
    pub fn is_idle(&self) -> bool {
        !(self.up || self.down || self.left || self.right)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementStep {
    pub velocity: Vec2,
    pub animation: Animation,
    pub facing: Facing,
    pub body_offset: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementController {
    speed: f32,
}

impl MovementController {
    pub fn new(speed: f32) -> Self {
        Self { speed }
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Resolves velocity, facing and animation from held directions.
    ///
    /// Left beats right and up beats down when both are held. The combined
    /// vector is rescaled to exactly `speed`, so diagonals move at full speed.
    pub fn step(
        &self,
        input: DirectionalInput,
        input_enabled: bool,
        prior_facing: Facing,
        shape: &BodyShape,
    ) -> MovementStep {
        let mut facing = prior_facing;
        let mut raw = Vec2::ZERO;

        if input_enabled {
            if input.left {
                raw.x = -1.0;
                facing = Facing::Left;
            } else if input.right {
                raw.x = 1.0;
                facing = Facing::Right;
            }

            if input.up {
                raw.y = -1.0;
            } else if input.down {
                raw.y = 1.0;
            }
        }

        let velocity = raw.normalize_or_zero() * self.speed;
        let animation = if velocity.length_squared() > 0.0 {
            Animation::Walk
        } else {
            Animation::Idle
        };

        MovementStep {
            velocity,
            animation,
            facing,
            body_offset: body_offset_for(shape, facing),
        }
    }

    pub fn apply(&self, actor: &mut Actor, input: DirectionalInput, input_enabled: bool) {
        let step = self.step(input, input_enabled, actor.facing, actor.shape());
        actor.velocity = step.velocity;
        actor.animation = step.animation;
        actor.facing = step.facing;
    }
}
