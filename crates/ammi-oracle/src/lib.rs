pub mod oracle;
pub mod prompts;
pub mod providers;

pub use oracle::{ExtractionKind, Oracle};
pub use providers::{
    AnthropicProvider, ChatMessage, ChatRole, ContentBlock, LlmProvider, LlmRequest, LlmResponse,
    MessagePart, Usage,
};
