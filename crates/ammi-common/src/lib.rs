pub mod error;
pub mod message;
pub mod phone;
pub mod text;

pub use error::{Error, Result};
pub use message::{ConversationMessage, ConversationRole};
pub use phone::{is_valid_phone, normalize_phone};
pub use text::truncate_text;
