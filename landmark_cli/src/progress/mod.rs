//! Terminal rendering of core progress updates

pub mod renderer;
pub mod utils;

pub use renderer::{ProgressRenderer, render_progress};
pub use utils::{format_bytes, format_confidence, format_duration};
