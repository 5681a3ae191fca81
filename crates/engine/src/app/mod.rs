mod input;
mod loop_runner;
mod metrics;
mod rendering;
mod scene;

pub use input::{HostKey, InputAction, InputSnapshot};
pub use loop_runner::{run_app, AppError, LoopConfig, SLOW_FRAME_ENV_VAR};
pub use metrics::LoopMetricsSnapshot;
pub use rendering::{Renderer, PROMPT_TEXT};
pub use scene::{Panel, Scene, SceneCommand};
