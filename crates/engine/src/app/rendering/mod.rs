mod canvas;
mod renderer;
mod text;

pub use renderer::{Renderer, PROMPT_TEXT};
