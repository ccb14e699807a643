//! Streaming chat-completion client.
//!
//! - **Model**: [`ChatMessage`], [`ChatRequest`] and the streamed
//!   [`ChatStreamChunk`] wire types
//! - **Framing**: [`sse`] turns a chunked body into `data:` events
//! - **Decoding**: [`decode`] pulls text fragments out of each event
//! - **Client**: [`OpenAIChatClient`] owns the HTTP exchange and hands back a
//!   cancellable [`FragmentStream`]
//!
//! # Example
//!
//! ```ignore
//! use futures::StreamExt;
//! use llm::{ChatMessage, ChatRequest, ClientConfig, OpenAIChatClient};
//!
//! let client = OpenAIChatClient::new("https://api.openai.com/v1", &ClientConfig::default())?;
//! let request = ChatRequest::new("gpt-4o", vec![ChatMessage::user("Hello")]);
//! let mut fragments = client.open_stream(&api_key, request).await?;
//! while let Some(fragment) = fragments.next().await {
//!     print!("{}", fragment?);
//! }
//! ```
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use std::sync::Arc;

pub mod api;
pub mod client;
pub mod decode;
pub mod error;
pub mod openai;
pub mod sse;
pub mod stream;
mod traffic_log;

pub use api::*;
pub use client::{Client, ClientConfig};
pub use error::{ChatError, FrameDecodeError};
pub use openai::{
    ChatChoice, ChatDelta, ChatStreamChunk, DeltaRole, FinishReason, OpenAIChatClient,
};
pub use stream::FragmentStream;

/// Text fragments of one reply; an `Err` item is terminal.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

#[async_trait]
pub trait CompletionClient {
    /// Start one streamed completion. Dropping the returned stream cancels it.
    async fn stream_completion(
        &self,
        api_key: &str,
        request: ChatRequest,
    ) -> Result<ChatStream, ChatError>;
}

// Blanket implementation for Arc<dyn CompletionClient> to make it easier to share
#[async_trait]
impl CompletionClient for Arc<dyn CompletionClient + Send + Sync> {
    async fn stream_completion(
        &self,
        api_key: &str,
        request: ChatRequest,
    ) -> Result<ChatStream, ChatError> {
        (**self).stream_completion(api_key, request).await
    }
}
