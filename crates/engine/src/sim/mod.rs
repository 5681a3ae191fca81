mod actor;
mod audio;
mod camera;
mod config;
mod interaction;
mod math;
mod movement;
mod npc;
mod physics;
mod scene;
mod schedule;

pub use actor::{Actor, Animation, Facing, NpcId, NpcInfo};
pub use audio::MusicChannel;
pub use camera::Camera;
pub use config::{
    BodyShape, CameraConfig, ConfigError, SecondsRange, SimConfig, DEFAULT_MUSIC_VOLUME,
    NPC_SPEED, PLAYER_SPEED, PROXIMITY_RADIUS,
};
pub use interaction::{
    detect, InteractionDetector, InteractionSession, NearestNpc, ProximityResult,
};
pub use math::{Rect, Vec2};
pub use movement::{DirectionalInput, MovementController, MovementStep};
pub use npc::{Npc, NpcState, NpcTimer};
pub use physics::{penetration, sweep, SweepResult};
pub use scene::{
    HostEvent, InvalidTransitionError, NpcSpawn, SceneError, TickInput, WorldScene, MUSIC_TRACK,
};
pub use schedule::{Fired, Scheduler};
