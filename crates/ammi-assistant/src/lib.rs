pub mod commands;
pub mod context;
pub mod format;
pub mod handler;
pub mod intent;
mod media;

pub use commands::Command;
pub use handler::{MediaItem, MessageHandler, ReplyOutcome};
