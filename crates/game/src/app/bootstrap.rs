use engine::{
    resolve_app_paths, AppPaths, LoopConfig, Scene, SceneError, StartupError, Vec2,
    WorldLoader, WorldScene,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::host::GuideHost;
use super::roster::{load_roster, RosterError};
use super::settings::{load_settings, SettingsError};

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Roster(#[from] RosterError),
    #[error("failed to build dungeon scene: {0}")]
    Scene(#[from] SceneError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Dungeon Guide Startup ===");

    let paths = resolve_app_paths()?;
    info!(root = %paths.root.display(), "app_root_resolved");

    let config = LoopConfig::default();
    let viewport = Vec2::new(config.window_width as f32, config.window_height as f32);
    let scene = build_scene(&paths, viewport)?;
    info!(
        map = %paths.map_path.display(),
        npcs = scene.npcs().len(),
        tile_width = scene.world().tile_width(),
        tile_height = scene.world().tile_height(),
        "dungeon_ready"
    );

    Ok(AppWiring {
        config,
        scene: Box::new(GuideHost::new(scene)),
    })
}

fn build_scene(paths: &AppPaths, viewport: Vec2) -> Result<WorldScene, BootstrapError> {
    let sim_config = load_settings(&paths.settings_path)?;
    let roster = load_roster(&paths.roster_path)?;
    let mut loader = WorldLoader::new();
    let scene = WorldScene::load(&mut loader, &paths.map_path, roster, sim_config, viewport)?;
    Ok(scene)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
