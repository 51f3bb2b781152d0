pub mod media;
pub mod split;
pub mod traits;
pub mod twilio;

pub use media::{classify_media, MediaFetcher, MediaKind};
pub use split::{split_message, MAX_MESSAGE_LEN};
pub use traits::MessageSender;
pub use twilio::TwilioSender;
