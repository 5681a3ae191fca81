use std::time::Duration;

use engine::sim::DEFAULT_MUSIC_VOLUME;
use engine::{
    HostEvent, HostKey, InputSnapshot, NpcId, NpcInfo, Panel, Scene, SceneCommand, WorldScene,
};
use tracing::{debug, info};

const WINDOW_TITLE: &str = "Dungeon Guide";
const CARD_HINT: &str = "Enter: read more   Backspace: close";
const EXPANDED_HINT: &str = "Backspace: close";
const PAUSE_BANNER: &str = "Paused - press P to resume";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Dialogue {
    npc_id: NpcId,
    info: NpcInfo,
    expanded: bool,
}

/// Host side of the dungeon scene: maps host keys onto the [`WorldScene`]
/// controls and turns interaction events into dialogue panels.
pub(crate) struct GuideHost {
    scene: WorldScene,
    dialogue: Option<Dialogue>,
    unmuted_volume: f32,
}

impl GuideHost {
    pub(crate) fn new(scene: WorldScene) -> Self {
        let unmuted_volume = scene.music_volume();
        Self {
            scene,
            dialogue: None,
            unmuted_volume,
        }
    }

    fn handle_host_keys(&mut self, input: &InputSnapshot) {
        if input.host_key_pressed(HostKey::TogglePause) {
            if self.scene.is_paused() {
                self.scene.resume();
            } else {
                self.scene.pause();
            }
        }
        if input.host_key_pressed(HostKey::ToggleMute) {
            self.toggle_mute();
        }
        if input.host_key_pressed(HostKey::ToggleDebug) {
            self.scene.toggle_debug();
        }
        if input.host_key_pressed(HostKey::ExpandDialogue) {
            if let Some(dialogue) = self.dialogue.as_mut() {
                dialogue.expanded = true;
            }
        }
        if input.host_key_pressed(HostKey::CloseDialogue) {
            self.close_dialogue();
        }
    }

    fn toggle_mute(&mut self) {
        let current = self.scene.music_volume();
        if current > 0.0 {
            self.unmuted_volume = current;
            self.scene.set_music_volume(0.0);
        } else {
            let restored = if self.unmuted_volume > 0.0 {
                self.unmuted_volume
            } else {
                DEFAULT_MUSIC_VOLUME
            };
            self.scene.set_music_volume(restored);
        }
    }

    fn close_dialogue(&mut self) {
        let Some(dialogue) = self.dialogue.take() else {
            return;
        };
        // A rejected close already logs; the card is stale either way.
        if self.scene.close_session(&dialogue.npc_id).is_ok() {
            debug!(npc_id = %dialogue.npc_id, "dialogue_closed");
        }
    }

    fn collect_events(&mut self) {
        for event in self.scene.drain_events() {
            match event {
                HostEvent::Interaction { npc_id, info } => {
                    info!(npc_id = %npc_id, name = %info.name, "dialogue_opened");
                    self.dialogue = Some(Dialogue {
                        npc_id,
                        info,
                        expanded: false,
                    });
                }
            }
        }
    }
}

impl Scene for GuideHost {
    fn load(&mut self) {
        info!(
            music_volume = self.scene.music_volume(),
            debug_visible = self.scene.is_debug_visible(),
            "guide_host_ready"
        );
    }

    fn update(&mut self, fixed_dt: Duration, input: &InputSnapshot) -> SceneCommand {
        if input.quit_requested() {
            return SceneCommand::Quit;
        }
        self.handle_host_keys(input);
        self.scene.tick(fixed_dt, &input.tick_input());
        self.collect_events();
        SceneCommand::None
    }

    fn world_scene(&self) -> &WorldScene {
        &self.scene
    }

    fn unload(&mut self) {
        self.dialogue = None;
        self.scene.teardown();
    }

    fn panels(&self) -> Vec<Panel> {
        let mut panels = Vec::new();
        if let Some(dialogue) = &self.dialogue {
            panels.push(if dialogue.expanded {
                Panel::DialogueExpanded {
                    title: dialogue.info.name.clone(),
                    body: dialogue.info.description.clone(),
                    hint: EXPANDED_HINT.to_string(),
                }
            } else {
                Panel::DialogueCard {
                    title: dialogue.info.name.clone(),
                    hint: CARD_HINT.to_string(),
                }
            });
        }
        if self.scene.is_paused() {
            panels.push(Panel::Banner {
                text: PAUSE_BANNER.to_string(),
            });
        }
        panels
    }

    fn debug_title(&self) -> Option<String> {
        let mut tags = Vec::new();
        if self.scene.is_paused() {
            tags.push("paused");
        }
        if self.scene.music().is_muted() {
            tags.push("muted");
        }
        if tags.is_empty() {
            None
        } else {
            Some(format!("{WINDOW_TITLE} ({})", tags.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use engine::world::{TileLayer, World, EMPTY_TILE};
    use engine::{InputAction, NpcSpawn, SimConfig, Vec2};

    use super::*;

    const DT: Duration = Duration::from_micros(16_667);

    fn open_world() -> Arc<World> {
        Arc::new(World::new(
            16,
            16,
            vec![
                TileLayer::new("floor", 64, 64, vec![1; 64 * 64]).expect("floor"),
                TileLayer::new("collisions", 64, 64, vec![EMPTY_TILE; 64 * 64])
                    .expect("collisions"),
            ],
            Vec::new(),
        ))
    }

    fn host() -> GuideHost {
        let id = NpcId::from("npc1");
        let roster = vec![NpcSpawn {
            info: NpcInfo {
                name: "Mira".to_string(),
                description: "Keeper of the east hall".to_string(),
            },
            id,
            position: Vec2::new(400.0, 400.0),
        }];
        let config = SimConfig {
            rng_seed: Some(3),
            player_spawn: Vec2::new(350.0, 400.0),
            ..SimConfig::default()
        };
        let scene = WorldScene::new(open_world(), roster, config, Vec2::new(800.0, 600.0))
            .expect("scene");
        GuideHost::new(scene)
    }

    fn idle() -> InputSnapshot {
        InputSnapshot::empty()
    }

    fn interact() -> InputSnapshot {
        InputSnapshot::empty().with_action_down(InputAction::Interact, true)
    }

    fn press(key: HostKey) -> InputSnapshot {
        InputSnapshot::empty().with_host_key_pressed(key)
    }

    fn open_dialogue(host: &mut GuideHost) {
        host.update(DT, &idle());
        host.update(DT, &interact());
        assert!(host.scene.session().is_some());
    }

    #[test]
    fn interaction_opens_card_then_expands_and_closes() {
        let mut host = host();
        open_dialogue(&mut host);
        assert_eq!(
            host.panels(),
            vec![Panel::DialogueCard {
                title: "Mira".to_string(),
                hint: CARD_HINT.to_string(),
            }]
        );
        assert!(!host.scene.is_input_enabled());

        host.update(DT, &press(HostKey::ExpandDialogue));
        assert_eq!(
            host.panels(),
            vec![Panel::DialogueExpanded {
                title: "Mira".to_string(),
                body: "Keeper of the east hall".to_string(),
                hint: EXPANDED_HINT.to_string(),
            }]
        );

        host.update(DT, &press(HostKey::CloseDialogue));
        assert!(host.panels().is_empty());
        assert!(host.scene.session().is_none());
        assert!(host.scene.is_input_enabled());
        assert!(host.scene.is_ticking());
    }

    #[test]
    fn holding_interact_after_close_does_not_reopen() {
        let mut host = host();
        open_dialogue(&mut host);
        host.update(DT, &interact().with_host_key_pressed(HostKey::CloseDialogue));
        host.update(DT, &interact());
        assert!(host.dialogue.is_none());
        assert!(host.scene.session().is_none());
    }

    #[test]
    fn pause_key_toggles_and_shows_banner() {
        let mut host = host();
        host.update(DT, &press(HostKey::TogglePause));
        assert!(host.scene.is_paused());
        assert!(!host.scene.music().is_playing());
        assert_eq!(
            host.panels(),
            vec![Panel::Banner {
                text: PAUSE_BANNER.to_string(),
            }]
        );
        assert_eq!(host.debug_title().as_deref(), Some("Dungeon Guide (paused)"));

        let ticks = host.scene.ticks();
        host.update(DT, &idle());
        assert_eq!(host.scene.ticks(), ticks);

        host.update(DT, &press(HostKey::TogglePause));
        assert!(!host.scene.is_paused());
        assert!(host.scene.music().is_playing());
        assert_eq!(host.debug_title(), None);
    }

    #[test]
    fn closing_dialogue_while_paused_keeps_pause() {
        let mut host = host();
        open_dialogue(&mut host);
        host.update(DT, &press(HostKey::TogglePause));
        host.update(DT, &press(HostKey::CloseDialogue));

        assert!(host.scene.session().is_none());
        assert!(host.scene.is_paused());
        assert!(!host.scene.is_ticking());
    }

    #[test]
    fn mute_restores_previous_volume() {
        let mut host = host();
        host.scene.set_music_volume(0.8);
        host.update(DT, &press(HostKey::ToggleMute));
        assert_eq!(host.scene.music_volume(), 0.0);
        assert_eq!(host.debug_title().as_deref(), Some("Dungeon Guide (muted)"));

        host.update(DT, &press(HostKey::ToggleMute));
        assert_eq!(host.scene.music_volume(), 0.8);
    }

    #[test]
    fn unmute_from_silent_start_uses_default_volume() {
        let mut host = host();
        host.scene.set_music_volume(0.0);
        host.unmuted_volume = 0.0;
        host.update(DT, &press(HostKey::ToggleMute));
        assert_eq!(host.scene.music_volume(), DEFAULT_MUSIC_VOLUME);
    }

    #[test]
    fn debug_key_toggles_overlay() {
        let mut host = host();
        assert!(!host.scene.is_debug_visible());
        host.update(DT, &press(HostKey::ToggleDebug));
        assert!(host.scene.is_debug_visible());
        host.update(DT, &press(HostKey::ToggleDebug));
        assert!(!host.scene.is_debug_visible());
    }

    #[test]
    fn expand_without_dialogue_is_ignored() {
        let mut host = host();
        host.update(DT, &press(HostKey::ExpandDialogue));
        host.update(DT, &press(HostKey::CloseDialogue));
        assert!(host.panels().is_empty());
    }

    #[test]
    fn quit_request_stops_before_ticking() {
        let mut host = host();
        let command = host.update(DT, &InputSnapshot::empty().with_quit_requested());
        assert_eq!(command, SceneCommand::Quit);
        assert_eq!(host.scene.ticks(), 0);
    }

    #[test]
    fn unload_tears_the_scene_down() {
        let mut host = host();
        open_dialogue(&mut host);
        host.unload();
        assert!(!host.scene.is_alive());
        assert!(host.panels().is_empty());
        assert_eq!(host.update(DT, &idle()), SceneCommand::None);
        assert!(!host.scene.is_ticking());
    }
}
