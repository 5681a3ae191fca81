use std::time::Duration;

use tracing::info;

use crate::sim::WorldScene;

use super::InputSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

/// Host UI drawn over the world, topmost last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Panel {
    /// Small card shown when a dialogue opens.
    DialogueCard { title: String, hint: String },
    /// Full dialogue panel with the NPC description.
    DialogueExpanded {
        title: String,
        body: String,
        hint: String,
    },
    Banner { text: String },
}

/// A hosted simulation. The runner owns the frame clock and calls `update`
/// once per fixed tick; the scene decides how host keys map onto the
/// [`WorldScene`] surface.
pub trait Scene {
    fn load(&mut self);
    fn update(&mut self, fixed_dt: Duration, input: &InputSnapshot) -> SceneCommand;
    fn world_scene(&self) -> &WorldScene;
    fn unload(&mut self);
    fn panels(&self) -> Vec<Panel> {
        Vec::new()
    }
    fn debug_title(&self) -> Option<String> {
        None
    }
}

/// Guards the load/unload pairing around a boxed scene.
pub(crate) struct SceneRunner {
    scene: Box<dyn Scene>,
    is_loaded: bool,
}

impl SceneRunner {
    pub(crate) fn new(scene: Box<dyn Scene>) -> Self {
        Self {
            scene,
            is_loaded: false,
        }
    }

    pub(crate) fn load(&mut self) {
        if self.is_loaded {
            return;
        }
        self.scene.load();
        self.is_loaded = true;
        info!(npcs = self.scene.world_scene().npcs().len(), "scene_loaded");
    }

    pub(crate) fn update(&mut self, fixed_dt: Duration, input: &InputSnapshot) -> SceneCommand {
        if !self.is_loaded {
            return SceneCommand::None;
        }
        self.scene.update(fixed_dt, input)
    }

    pub(crate) fn shutdown(&mut self) {
        if !self.is_loaded {
            return;
        }
        self.scene.unload();
        self.is_loaded = false;
    }

    pub(crate) fn world_scene(&self) -> &WorldScene {
        self.scene.world_scene()
    }

    pub(crate) fn panels(&self) -> Vec<Panel> {
        self.scene.panels()
    }

    pub(crate) fn debug_title(&self) -> Option<String> {
        self.scene.debug_title()
    }
}
