use std::time::Duration;

use rand::Rng;

use super::actor::{Actor, Animation, Facing, NpcId, NpcInfo};
use super::math::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpcState {
    Walking,
    Idle,
    Interacting,
}

impl NpcState {
    pub fn label(self) -> &'static str {
        match self {
            NpcState::Walking => "walking",
            NpcState::Idle => "idle",
            NpcState::Interacting => "interacting",
        }
    }
}

/// Timer entries the scene schedules on behalf of NPCs, keyed by roster index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpcTimer {
    Wander { npc: usize },
    Stop { npc: usize, epoch: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Npc {
    id: NpcId,
    info: NpcInfo,
    actor: Actor,
    state: NpcState,
    wander_interval: Duration,
    // Bumped on every state change and every new wander leg; stop timers carry
    // the value they were scheduled with and only apply if it still matches.
    motion_epoch: u64,
}

impl Npc {
    pub fn new(id: NpcId, info: NpcInfo, actor: Actor, wander_interval: Duration) -> Self {
        Self {
            id,
            info,
            actor,
            state: NpcState::Walking,
            wander_interval,
            motion_epoch: 0,
        }
    }

    pub fn id(&self) -> &NpcId {
        &self.id
    }

    pub fn info(&self) -> &NpcInfo {
        &self.info
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn actor_mut(&mut self) -> &mut Actor {
        &mut self.actor
    }

    pub fn state(&self) -> NpcState {
        self.state
    }

    pub fn wander_interval(&self) -> Duration {
        self.wander_interval
    }

    pub fn motion_epoch(&self) -> u64 {
        self.motion_epoch
    }

    /// Starts a wander leg in a random cardinal direction if walking.
    /// Returns the epoch a follow-up stop timer must carry.
    pub fn on_wander(&mut self, speed: f32, rng: &mut impl Rng) -> Option<u64> {
        if self.state != NpcState::Walking {
            return None;
        }
        let direction = match rng.gen_range(0..4) {
            0 => Vec2::new(-1.0, 0.0),
            1 => Vec2::new(1.0, 0.0),
            2 => Vec2::new(0.0, -1.0),
            _ => Vec2::new(0.0, 1.0),
        };
        if direction.x < 0.0 {
            self.actor.facing = Facing::Left;
        } else if direction.x > 0.0 {
            self.actor.facing = Facing::Right;
        }
        self.actor.velocity = direction * speed;
        self.actor.animation = Animation::Walk;
        self.motion_epoch += 1;
        Some(self.motion_epoch)
    }

    /// Ends a wander leg. Stale timers (state or leg changed since) are ignored.
    pub fn on_stop(&mut self, epoch: u64) -> bool {
        if self.state != NpcState::Walking || epoch != self.motion_epoch {
            return false;
        }
        self.halt();
        true
    }

    /// Per-tick proximity rule. Returns the new state when it changed.
    pub fn update_proximity(&mut self, distance: f32, radius: f32) -> Option<NpcState> {
        match self.state {
            NpcState::Walking if distance < radius => {
                self.halt();
                self.set_state(NpcState::Idle);
                Some(NpcState::Idle)
            }
            // Motion resumes on the next wander trigger, not here.
            NpcState::Idle if distance >= radius => {
                self.set_state(NpcState::Walking);
                Some(NpcState::Walking)
            }
            _ => None,
        }
    }

    pub fn begin_interaction(&mut self) {
        self.halt();
        self.set_state(NpcState::Interacting);
    }

    /// Returns `false` when the NPC was not interacting.
    pub fn end_interaction(&mut self) -> bool {
        if self.state != NpcState::Interacting {
            return false;
        }
        self.set_state(NpcState::Walking);
        true
    }

    fn halt(&mut self) {
        self.actor.velocity = Vec2::ZERO;
        self.actor.animation = Animation::Idle;
    }

    fn set_state(&mut self, state: NpcState) {
        self.state = state;
        self.motion_epoch += 1;
    }
}
