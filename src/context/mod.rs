//! Edit session orchestration: outputs, the preview surface and chain-set upkeep.

pub mod display;
pub mod output;
pub mod session;

pub use display::DisplaySurface;
pub use output::{FrameConsumer, InMemoryConsumer, Output};
pub use session::{Context, ContextNotification, ContextOptions};
