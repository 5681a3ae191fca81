use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod sim;
pub mod world;

pub use app::{
    run_app, AppError, HostKey, InputAction, InputSnapshot, LoopConfig, LoopMetricsSnapshot,
    Panel, Renderer, Scene, SceneCommand, PROMPT_TEXT, SLOW_FRAME_ENV_VAR,
};
pub use sim::{
    HostEvent, InvalidTransitionError, NpcId, NpcInfo, NpcSpawn, NpcState, SceneError, SimConfig,
    TickInput, Vec2, WorldScene,
};
pub use world::{load_world, AssetLoadError, World, WorldLoader};

pub const ROOT_ENV_VAR: &str = "DUNGEON_GUIDE_ROOT";
pub const MAP_FILE: &str = "maps/dungeon.json";
pub const ROSTER_FILE: &str = "npcs.json";
pub const SETTINGS_FILE: &str = "scene.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    pub map_path: PathBuf,
    pub roster_path: PathBuf,
    pub settings_path: PathBuf,
}

impl AppPaths {
    pub fn for_root(root: PathBuf) -> Self {
        let assets_dir = root.join("assets");
        Self {
            map_path: assets_dir.join(MAP_FILE),
            roster_path: assets_dir.join(ROSTER_FILE),
            settings_path: assets_dir.join(SETTINGS_FILE),
            assets_dir,
            root,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "DUNGEON_GUIDE_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/dungeon-guide\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
    #[error("assets directory is missing: {0}")]
    MissingAssets(PathBuf),
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let paths = AppPaths::for_root(resolve_root()?);
    if !paths.assets_dir.is_dir() {
        return Err(StartupError::MissingAssets(paths.assets_dir));
    }
    Ok(paths)
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            find_root_above(&exe_dir).ok_or_else(|| StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn find_root_above(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| is_repo_marker(candidate))
        .map(normalize_path)
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
