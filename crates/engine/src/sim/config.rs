use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

use super::math::Vec2;

pub const PLAYER_SPEED: f32 = 80.0;
pub const NPC_SPEED: f32 = 30.0;
pub const PROXIMITY_RADIUS: f32 = 100.0;
pub const WANDER_INTERVAL_SECS: SecondsRange = SecondsRange { min: 2.0, max: 5.0 };
pub const STOP_DELAY_SECS: SecondsRange = SecondsRange { min: 1.0, max: 3.0 };
pub const DEFAULT_MUSIC_VOLUME: f32 = 0.5;
pub const PLAYER_SPAWN: Vec2 = Vec2::new(400.0, 600.0);
pub const CAMERA_LERP: f32 = 0.05;
pub const CAMERA_ZOOM_DEFAULT: f32 = 1.0;
pub const CAMERA_ZOOM_MIN: f32 = 0.5;
pub const CAMERA_ZOOM_MAX: f32 = 4.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be finite and > 0, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    #[error("{field} range is invalid: min {min} must be > 0 and <= max {max}")]
    InvalidRange {
        field: &'static str,
        min: f32,
        max: f32,
    },
    #[error("{field} must be within 0.0..=1.0, got {value}")]
    OutOfUnitRange { field: &'static str, value: f32 },
}

/// Inclusive range of seconds a timer delay is drawn from uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecondsRange {
    pub min: f32,
    pub max: f32,
}

impl SecondsRange {
    pub fn sample(&self, rng: &mut impl Rng) -> Duration {
        let secs = if self.max > self.min {
            rng.gen_range(self.min..=self.max)
        } else {
            self.min
        };
        Duration::from_secs_f32(secs.max(0.0))
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        let valid = self.min.is_finite()
            && self.max.is_finite()
            && self.min > 0.0
            && self.min <= self.max;
        if valid {
            Ok(())
        } else {
            Err(ConfigError::InvalidRange {
                field,
                min: self.min,
                max: self.max,
            })
        }
    }
}

/// Sprite frame and collision body, in source-frame pixels before `scale`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BodyShape {
    pub frame_width: f32,
    pub frame_height: f32,
    pub scale: f32,
    pub body_width: f32,
    pub body_height: f32,
    pub offset_right: Vec2,
    pub offset_left: Vec2,
}

impl BodyShape {
    pub const PLAYER: BodyShape = BodyShape {
        frame_width: 128.0,
        frame_height: 128.0,
        scale: 0.5,
        body_width: 32.0,
        body_height: 64.0,
        offset_right: Vec2::new(32.0, 64.0),
        offset_left: Vec2::new(68.0, 64.0),
    };

    pub const NPC: BodyShape = BodyShape {
        frame_width: 64.0,
        frame_height: 64.0,
        scale: 0.5,
        body_width: 32.0,
        body_height: 64.0,
        offset_right: Vec2::new(16.0, 16.0),
        offset_left: Vec2::new(16.0, 16.0),
    };

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        for value in [
            self.frame_width,
            self.frame_height,
            self.scale,
            self.body_width,
            self.body_height,
        ] {
            positive(field, value)?;
        }
        Ok(())
    }
}

impl Default for BodyShape {
    fn default() -> Self {
        Self::PLAYER
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    pub lerp: f32,
    pub zoom: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            lerp: CAMERA_LERP,
            zoom: CAMERA_ZOOM_DEFAULT,
        }
    }
}

/// Tunables of the world simulation. Every field defaults to the shipped value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub player_speed: f32,
    pub npc_speed: f32,
    pub proximity_radius: f32,
    pub wander_interval_secs: SecondsRange,
    pub stop_delay_secs: SecondsRange,
    pub music_volume: f32,
    pub player_spawn: Vec2,
    pub player_body: BodyShape,
    pub npc_body: BodyShape,
    pub camera: CameraConfig,
    /// Fixed seed for NPC wandering; `None` seeds from the OS.
    pub rng_seed: Option<u64>,
    pub debug_visible: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            player_speed: PLAYER_SPEED,
            npc_speed: NPC_SPEED,
            proximity_radius: PROXIMITY_RADIUS,
            wander_interval_secs: WANDER_INTERVAL_SECS,
            stop_delay_secs: STOP_DELAY_SECS,
            music_volume: DEFAULT_MUSIC_VOLUME,
            player_spawn: PLAYER_SPAWN,
            player_body: BodyShape::PLAYER,
            npc_body: BodyShape::NPC,
            camera: CameraConfig::default(),
            rng_seed: None,
            debug_visible: false,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("player_speed", self.player_speed)?;
        positive("npc_speed", self.npc_speed)?;
        positive("proximity_radius", self.proximity_radius)?;
        self.wander_interval_secs.validate("wander_interval_secs")?;
        self.stop_delay_secs.validate("stop_delay_secs")?;
        if !(0.0..=1.0).contains(&self.music_volume) {
            return Err(ConfigError::OutOfUnitRange {
                field: "music_volume",
                value: self.music_volume,
            });
        }
        if !(self.camera.lerp > 0.0 && self.camera.lerp <= 1.0) {
            return Err(ConfigError::OutOfUnitRange {
                field: "camera.lerp",
                value: self.camera.lerp,
            });
        }
        positive("camera.zoom", self.camera.zoom)?;
        self.player_body.validate("player_body")?;
        self.npc_body.validate("npc_body")?;
        Ok(())
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}
