//! One chat conversation: ordered history, the reply being streamed, and the
//! background task that drives turns against a [`llm::CompletionClient`].
//!
//! ```ignore
//! let mut conversation = Conversation::new(client, credentials, ConversationConfig::default());
//! conversation.send_message("Hello");
//! while let Some(event) = conversation.next_event().await {
//!     match event {
//!         ConversationEvent::Fragment(text) => print!("{}", text),
//!         ConversationEvent::MessageComplete(_) => break,
//!         ConversationEvent::Notice(notice) => eprintln!("{}", notice),
//!         ConversationEvent::Cancelled => break,
//!     }
//! }
//! ```

mod engine;
mod state;

pub use engine::{
    Conversation, ConversationCommand, ConversationConfig, ConversationEvent, notice_for,
};
pub use state::{ConversationState, Lifecycle};
