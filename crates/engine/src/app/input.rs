use crate::sim::{DirectionalInput, TickInput};

/// Held actions fed to the simulation every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Interact,
    Quit,
}

const ACTION_COUNT: usize = 6;

/// One-shot keys consumed by the host side, never by the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKey {
    ExpandDialogue,
    CloseDialogue,
    TogglePause,
    ToggleMute,
    ToggleDebug,
}

const HOST_KEY_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Interact => 4,
            InputAction::Quit => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct HostKeyEdges {
    pressed: [bool; HOST_KEY_COUNT],
}

impl HostKeyEdges {
    pub(crate) fn mark(&mut self, key: HostKey) {
        self.pressed[key.index()] = true;
    }

    pub(crate) fn is_pressed(&self, key: HostKey) -> bool {
        self.pressed[key.index()]
    }

    pub(crate) fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

impl HostKey {
    const fn index(self) -> usize {
        match self {
            HostKey::ExpandDialogue => 0,
            HostKey::CloseDialogue => 1,
            HostKey::TogglePause => 2,
            HostKey::ToggleMute => 3,
            HostKey::ToggleDebug => 4,
        }
    }
}

/// Input state for a single fixed tick. Held actions stay down across
/// snapshots; host keys appear in exactly one snapshot per press.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    quit_requested: bool,
    actions: ActionStates,
    host_keys: HostKeyEdges,
}

impl InputSnapshot {
    pub(crate) fn new(quit_requested: bool, actions: ActionStates, host_keys: HostKeyEdges) -> Self {
        Self {
            quit_requested,
            actions,
            host_keys,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_host_key_pressed(mut self, key: HostKey) -> Self {
        self.host_keys.mark(key);
        self
    }

    pub fn with_quit_requested(mut self) -> Self {
        self.quit_requested = true;
        self
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn host_key_pressed(&self, key: HostKey) -> bool {
        self.host_keys.is_pressed(key)
    }

    pub fn movement(&self) -> DirectionalInput {
        DirectionalInput {
            up: self.is_down(InputAction::MoveUp),
            down: self.is_down(InputAction::MoveDown),
            left: self.is_down(InputAction::MoveLeft),
            right: self.is_down(InputAction::MoveRight),
        }
    }

    /// The interact key is passed as held state; the scene's detector owns
    /// the released-to-pressed edge.
    pub fn tick_input(&self) -> TickInput {
        TickInput {
            movement: self.movement(),
            interact: self.is_down(InputAction::Interact),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_input_mirrors_held_actions() {
        let snapshot = InputSnapshot::empty()
            .with_action_down(InputAction::MoveLeft, true)
            .with_action_down(InputAction::MoveUp, true)
            .with_action_down(InputAction::Interact, true);

        let tick = snapshot.tick_input();
        assert!(tick.movement.left && tick.movement.up);
        assert!(!tick.movement.right && !tick.movement.down);
        assert!(tick.interact);
    }

    #[test]
    fn host_keys_are_independent_of_actions() {
        let snapshot = InputSnapshot::empty().with_host_key_pressed(HostKey::ToggleMute);

        assert!(snapshot.host_key_pressed(HostKey::ToggleMute));
        assert!(!snapshot.host_key_pressed(HostKey::TogglePause));
        assert!(snapshot.movement().is_idle());
    }

    #[test]
    fn taking_edges_clears_them() {
        let mut edges = HostKeyEdges::default();
        edges.mark(HostKey::CloseDialogue);

        let taken = edges.take();
        assert!(taken.is_pressed(HostKey::CloseDialogue));
        assert!(!edges.is_pressed(HostKey::CloseDialogue));
    }
}
