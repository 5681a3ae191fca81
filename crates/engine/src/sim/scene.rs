use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::world::{AssetLoadError, World, WorldLoader};

use super::actor::{Actor, Animation, NpcId, NpcInfo};
use super::audio::MusicChannel;
use super::camera::Camera;
use super::config::{ConfigError, SimConfig};
use super::interaction::{detect, InteractionDetector, InteractionSession, ProximityResult};
use super::math::{Rect, Vec2};
use super::movement::{DirectionalInput, MovementController};
use super::npc::{Npc, NpcTimer};
use super::physics::{penetration, sweep};
use super::schedule::Scheduler;

pub const MUSIC_TRACK: &str = "background_music";

/// Notifications the scene leaves for the host to drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Interaction { npc_id: NpcId, info: NpcInfo },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTransitionError {
    #[error("no interaction session is active (close requested for '{requested}')")]
    NoActiveSession { requested: NpcId },
    #[error("active session belongs to '{active}', not '{requested}'")]
    SessionNpcMismatch { active: NpcId, requested: NpcId },
    #[error("scene has been torn down")]
    SceneTornDown,
}

#[derive(Debug, Error)]
pub enum SceneError {
    #[error(transparent)]
    Asset(#[from] AssetLoadError),
    #[error("invalid simulation config: {0}")]
    Config(#[from] ConfigError),
    #[error("NPC roster is empty")]
    EmptyRoster,
    #[error("duplicate NPC id '{0}' in roster")]
    DuplicateNpcId(NpcId),
}

/// One roster entry to place in the world.
#[derive(Debug, Clone, PartialEq)]
pub struct NpcSpawn {
    pub id: NpcId,
    pub info: NpcInfo,
    pub position: Vec2,
}

/// Raw input sampled by the host for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickInput {
    pub movement: DirectionalInput,
    pub interact: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ControlState {
    input_enabled: bool,
    paused: bool,
    debug_visible: bool,
}

/// Owns the player, the NPCs and every control flag. Host code only reaches
/// this state through the methods below, called between ticks.
///
/// `paused` and the interaction session are independent: either one stops
/// ticking, and clearing one leaves the other as it was.
#[derive(Debug)]
pub struct WorldScene {
    world: Arc<World>,
    config: SimConfig,
    movement: MovementController,
    player: Actor,
    npcs: Vec<Npc>,
    scheduler: Scheduler<NpcTimer>,
    rng: StdRng,
    control: ControlState,
    session: Option<InteractionSession>,
    detector: InteractionDetector,
    proximity: ProximityResult,
    camera: Camera,
    music: MusicChannel,
    outbox: VecDeque<HostEvent>,
    alive: bool,
    ticks: u64,
}

impl WorldScene {
    /// Loads the map through `loader` and builds the scene. Nothing is
    /// constructed if the map or any tileset image fails to load.
    pub fn load(
        loader: &mut WorldLoader,
        map_path: &Path,
        roster: Vec<NpcSpawn>,
        config: SimConfig,
        viewport: Vec2,
    ) -> Result<Self, SceneError> {
        let world = loader.load(map_path)?;
        Self::new(world, roster, config, viewport)
    }

    pub fn new(
        world: Arc<World>,
        roster: Vec<NpcSpawn>,
        config: SimConfig,
        viewport: Vec2,
    ) -> Result<Self, SceneError> {
        config.validate()?;
        if roster.is_empty() {
            return Err(SceneError::EmptyRoster);
        }
        let mut seen = HashSet::new();
        for spawn in &roster {
            if !seen.insert(spawn.id.clone()) {
                return Err(SceneError::DuplicateNpcId(spawn.id.clone()));
            }
        }

        let mut rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut scheduler = Scheduler::new();
        let npcs = roster
            .into_iter()
            .enumerate()
            .map(|(index, spawn)| {
                let interval = config.wander_interval_secs.sample(&mut rng);
                scheduler.schedule_after(interval, NpcTimer::Wander { npc: index });
                Npc::new(
                    spawn.id,
                    spawn.info,
                    Actor::new(spawn.position, config.npc_body),
                    interval,
                )
            })
            .collect::<Vec<_>>();

        let player = Actor::new(config.player_spawn, config.player_body);
        let mut camera = Camera::new(viewport, config.camera.zoom, config.camera.lerp);
        camera.snap_to(player.position, &world.bounds());
        let mut music = MusicChannel::new(MUSIC_TRACK, config.music_volume);
        music.play();

        info!(
            npcs = npcs.len(),
            seeded = config.rng_seed.is_some(),
            collision = world.has_collision(),
            "scene_created"
        );

        Ok(Self {
            movement: MovementController::new(config.player_speed),
            control: ControlState {
                input_enabled: true,
                paused: false,
                debug_visible: config.debug_visible,
            },
            world,
            config,
            player,
            npcs,
            scheduler,
            rng,
            session: None,
            detector: InteractionDetector::new(),
            proximity: ProximityResult::default(),
            camera,
            music,
            outbox: VecDeque::new(),
            alive: true,
            ticks: 0,
        })
    }

    /// Advances the simulation by `dt`. Does nothing while paused, while a
    /// session is open, or after teardown; NPC timers freeze with it.
    pub fn tick(&mut self, dt: Duration, input: &TickInput) -> bool {
        if !self.is_ticking() {
            return false;
        }
        self.ticks += 1;

        self.movement
            .apply(&mut self.player, input.movement, self.control.input_enabled);
        self.run_timers(dt);
        self.integrate(dt.as_secs_f32());
        self.update_npc_proximity();

        self.proximity = detect(
            self.player.position,
            &self.npcs,
            self.config.proximity_radius,
        );
        if let Some(index) =
            self.detector
                .poll(input.interact, self.control.input_enabled, &self.proximity)
        {
            self.open_session(index);
        }

        self.camera.follow(self.player.position, &self.world.bounds());
        true
    }

    pub fn set_input_enabled(&mut self, enabled: bool) {
        if !self.alive {
            warn!(enabled, "input_toggle_after_teardown");
            return;
        }
        if self.control.input_enabled == enabled {
            return;
        }
        self.control.input_enabled = enabled;
        if !enabled {
            self.player.velocity = Vec2::ZERO;
        }
        info!(enabled, "input_enabled_changed");
    }

    /// External pause. Stops the music; an open session is left untouched.
    pub fn pause(&mut self) {
        if !self.alive || self.control.paused {
            return;
        }
        self.control.paused = true;
        self.music.stop();
        info!(session_active = self.session.is_some(), "scene_paused");
    }

    /// Clears the external pause. Music restarts unless muted.
    pub fn resume(&mut self) {
        if !self.alive || !self.control.paused {
            return;
        }
        self.control.paused = false;
        if !self.music.is_muted() {
            self.music.play();
        }
        info!(session_active = self.session.is_some(), "scene_resumed");
    }

    /// Mute is volume 0. Raising the volume restarts playback unless paused.
    pub fn set_music_volume(&mut self, volume: f32) {
        if !self.alive {
            warn!(volume, "music_volume_after_teardown");
            return;
        }
        if !volume.is_finite() {
            warn!(volume, "music_volume_rejected");
            return;
        }
        let applied = self.music.set_volume(volume);
        if applied > 0.0 && !self.control.paused {
            self.music.play();
        }
        info!(volume = applied, "music_volume_changed");
    }

    pub fn music_volume(&self) -> f32 {
        self.music.volume()
    }

    /// Host signals the dialogue for `npc_id` is closed. The NPC walks again
    /// and input capture comes back.
    pub fn close_session(&mut self, npc_id: &NpcId) -> Result<(), InvalidTransitionError> {
        let result = self.try_close_session(npc_id);
        if let Err(error) = &result {
            warn!(npc_id = %npc_id, error = %error, "close_session_ignored");
        }
        result
    }

    fn try_close_session(&mut self, npc_id: &NpcId) -> Result<(), InvalidTransitionError> {
        if !self.alive {
            return Err(InvalidTransitionError::SceneTornDown);
        }
        let active = match &self.session {
            None => {
                return Err(InvalidTransitionError::NoActiveSession {
                    requested: npc_id.clone(),
                })
            }
            Some(session) if &session.npc_id != npc_id => {
                return Err(InvalidTransitionError::SessionNpcMismatch {
                    active: session.npc_id.clone(),
                    requested: npc_id.clone(),
                })
            }
            Some(session) => session.npc_index,
        };

        self.session = None;
        if let Some(npc) = self.npcs.get_mut(active) {
            npc.end_interaction();
        }
        self.control.input_enabled = true;
        info!(npc_id = %npc_id, paused = self.control.paused, "session_closed");
        Ok(())
    }

    pub fn toggle_debug(&mut self) -> bool {
        self.set_debug_visible(!self.control.debug_visible);
        self.control.debug_visible
    }

    pub fn set_debug_visible(&mut self, visible: bool) {
        if !self.alive {
            warn!(visible, "debug_toggle_after_teardown");
            return;
        }
        if self.control.debug_visible != visible {
            self.control.debug_visible = visible;
            info!(visible, "debug_visibility_changed");
        }
    }

    /// Hands pending host notifications over in emission order.
    pub fn drain_events(&mut self) -> Vec<HostEvent> {
        self.outbox.drain(..).collect()
    }

    /// Cancels every pending NPC timer and drops undelivered events. Any later
    /// tick or host call is a no-op.
    pub fn teardown(&mut self) {
        if !self.alive {
            return;
        }
        self.alive = false;
        let cancelled_timers = self.scheduler.cancel_all();
        self.outbox.clear();
        self.session = None;
        self.music.stop();
        info!(cancelled_timers, ticks = self.ticks, "scene_torn_down");
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn player(&self) -> &Actor {
        &self.player
    }

    pub fn npcs(&self) -> &[Npc] {
        &self.npcs
    }

    pub fn npc(&self, id: &NpcId) -> Option<&Npc> {
        self.npcs.iter().find(|npc| npc.id() == id)
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn music(&self) -> &MusicChannel {
        &self.music
    }

    pub fn session(&self) -> Option<&InteractionSession> {
        self.session.as_ref()
    }

    pub fn proximity(&self) -> &ProximityResult {
        &self.proximity
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_paused(&self) -> bool {
        self.control.paused
    }

    pub fn is_input_enabled(&self) -> bool {
        self.control.input_enabled
    }

    pub fn is_debug_visible(&self) -> bool {
        self.control.debug_visible
    }

    pub fn is_ticking(&self) -> bool {
        self.alive && !self.control.paused && self.session.is_none()
    }

    pub fn prompt_visible(&self) -> bool {
        self.is_ticking() && self.control.input_enabled && self.proximity.any_in_range
    }

    pub fn sim_time(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.len()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn debug_lines(&self) -> Vec<String> {
        let player = &self.player;
        let body = player.body_rect();
        let mut lines = vec![
            format!("Player x: {:.0}", player.position.x),
            format!("Player y: {:.0}", player.position.y),
            format!("Velocity: {:.2}", player.speed()),
            format!("Facing: {}", player.facing.label()),
            format!("Animation: {}", player.animation.label()),
            format!("Body x: {:.0}", body.left()),
            format!("Body y: {:.0}", body.top()),
            format!("Body width: {:.0}", body.size.x),
            format!("Body height: {:.0}", body.size.y),
            format!("Input enabled: {}", self.control.input_enabled),
        ];
        for npc in &self.npcs {
            let position = npc.actor().position;
            lines.push(format!(
                "{} x: {:.0} y: {:.0} dist: {:.0} state: {}",
                npc.id(),
                position.x,
                position.y,
                self.player.position.distance(position),
                npc.state().label()
            ));
        }
        lines
    }

    fn run_timers(&mut self, dt: Duration) {
        self.scheduler.advance(dt);
        while let Some(fired) = self.scheduler.pop_due() {
            match fired.event {
                NpcTimer::Wander { npc } => {
                    let Some(target) = self.npcs.get_mut(npc) else {
                        continue;
                    };
                    self.scheduler.schedule_at(
                        fired.at + target.wander_interval(),
                        NpcTimer::Wander { npc },
                    );
                    if let Some(epoch) = target.on_wander(self.config.npc_speed, &mut self.rng) {
                        let delay = self.config.stop_delay_secs.sample(&mut self.rng);
                        self.scheduler
                            .schedule_at(fired.at + delay, NpcTimer::Stop { npc, epoch });
                        debug!(npc_id = %target.id(), velocity = ?target.actor().velocity, "npc_wander");
                    }
                }
                NpcTimer::Stop { npc, epoch } => {
                    if let Some(target) = self.npcs.get_mut(npc) {
                        if target.on_stop(epoch) {
                            debug!(npc_id = %target.id(), "npc_stop");
                        }
                    }
                }
            }
        }
    }

    fn integrate(&mut self, dt_secs: f32) {
        let npc_bodies: Vec<Rect> = self.npcs.iter().map(|npc| npc.actor().body_rect()).collect();
        let player_move = sweep(
            &self.world,
            self.player.body_rect(),
            self.player.velocity * dt_secs,
            &npc_bodies,
        );
        self.player.position += player_move.delta;
        if player_move.hit_obstacle {
            self.player.velocity = Vec2::ZERO;
        }
        zero_blocked_axes(&mut self.player, player_move.blocked_x, player_move.blocked_y);

        for npc in &mut self.npcs {
            let actor = npc.actor_mut();
            if actor.velocity.is_zero() {
                continue;
            }
            let npc_move = sweep(&self.world, actor.body_rect(), actor.velocity * dt_secs, &[]);
            actor.position += npc_move.delta;
            zero_blocked_axes(actor, npc_move.blocked_x, npc_move.blocked_y);
        }

        // NPCs are immovable: one walking into the player pushes the player out.
        for npc in &self.npcs {
            let npc_body = npc.actor().body_rect();
            if let Some(push) = penetration(&self.player.body_rect(), &npc_body) {
                let resolved = sweep(&self.world, self.player.body_rect(), push, &[]);
                self.player.position += resolved.delta;
                self.player.velocity = Vec2::ZERO;
            }
        }
    }

    fn update_npc_proximity(&mut self) {
        let radius = self.config.proximity_radius;
        for npc in &mut self.npcs {
            let distance = self.player.position.distance(npc.actor().position);
            if let Some(state) = npc.update_proximity(distance, radius) {
                debug!(npc_id = %npc.id(), state = state.label(), distance, "npc_state_changed");
            }
        }
    }

    fn open_session(&mut self, index: usize) {
        let Some(npc) = self.npcs.get_mut(index) else {
            return;
        };
        npc.begin_interaction();
        let session = InteractionSession {
            npc_id: npc.id().clone(),
            npc_index: index,
            info: npc.info().clone(),
        };

        self.control.input_enabled = false;
        self.player.velocity = Vec2::ZERO;
        self.player.animation = Animation::Idle;
        self.outbox.push_back(HostEvent::Interaction {
            npc_id: session.npc_id.clone(),
            info: session.info.clone(),
        });
        info!(npc_id = %session.npc_id, name = %session.info.name, "interaction_triggered");
        self.session = Some(session);
    }
}

fn zero_blocked_axes(actor: &mut Actor, blocked_x: bool, blocked_y: bool) {
    if blocked_x {
        actor.velocity.x = 0.0;
    }
    if blocked_y {
        actor.velocity.y = 0.0;
    }
}

impl Drop for WorldScene {
    fn drop(&mut self) {
        self.teardown();
    }
}
