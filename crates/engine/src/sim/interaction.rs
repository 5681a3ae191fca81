use super::actor::{NpcId, NpcInfo};
use super::math::Vec2;
use super::npc::Npc;

/// Outcome of one proximity scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProximityResult {
    pub any_in_range: bool,
    pub nearest: Option<NearestNpc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NearestNpc {
    pub index: usize,
    pub id: NpcId,
    pub distance: f32,
}

impl ProximityResult {
    pub fn nearest_id(&self) -> Option<&NpcId> {
        self.nearest.as_ref().map(|nearest| &nearest.id)
    }
}

/// Linear scan over every NPC. The nearest in-range NPC wins; ties keep roster order.
pub fn detect(player: Vec2, npcs: &[Npc], radius: f32) -> ProximityResult {
    let mut nearest: Option<NearestNpc> = None;
    for (index, npc) in npcs.iter().enumerate() {
        let distance = player.distance(npc.actor().position);
        if distance >= radius {
            continue;
        }
        let closer = nearest
            .as_ref()
            .map_or(true, |current| distance < current.distance);
        if closer {
            nearest = Some(NearestNpc {
                index,
                id: npc.id().clone(),
                distance,
            });
        }
    }

    ProximityResult {
        any_in_range: nearest.is_some(),
        nearest,
    }
}

/// Edge trigger for the interact key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionDetector {
    was_down: bool,
}

impl InteractionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds this tick's key state. Fires only on a released-to-pressed
    /// transition while `armed` and something is in range.
    pub fn poll(
        &mut self,
        key_down: bool,
        armed: bool,
        proximity: &ProximityResult,
    ) -> Option<usize> {
        let pressed_edge = key_down && !self.was_down;
        self.was_down = key_down;
        if !pressed_edge || !armed || !proximity.any_in_range {
            return None;
        }
        proximity.nearest.as_ref().map(|nearest| nearest.index)
    }

    pub fn is_key_held(&self) -> bool {
        self.was_down
    }
}

/// The dialogue currently owned by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionSession {
    pub npc_id: NpcId,
    pub npc_index: usize,
    pub info: NpcInfo,
}
