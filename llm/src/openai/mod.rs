pub mod api;
pub mod model;

pub use api::{ChatChoice, ChatDelta, ChatStreamChunk, DeltaRole, FinishReason};
pub use model::OpenAIChatClient;
