use llm::ChatMessage;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Lifecycle {
    #[default]
    Idle,
    Streaming,
    Completed,
    Failed,
}

/// Snapshot of one conversation as seen by observers.
///
/// `history` only ever grows, and only by whole messages. Text still being
/// streamed lives in `current_output` until the turn ends.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversationState {
    history: Arc<Vec<ChatMessage>>,
    current_output: String,
    lifecycle: Lifecycle,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with earlier turns, e.g. a system message.
    pub fn with_history(history: Vec<ChatMessage>) -> Self {
        ConversationState {
            history: Arc::new(history),
            ..Self::default()
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn current_output(&self) -> &str {
        &self.current_output
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_streaming(&self) -> bool {
        self.lifecycle == Lifecycle::Streaming
    }

    /// Idle -> Streaming: record the user's turn and clear the output buffer.
    pub(crate) fn begin_turn(&mut self, text: String) {
        debug_assert!(!self.is_streaming());
        Arc::make_mut(&mut self.history).push(ChatMessage::user(text));
        self.current_output.clear();
        self.lifecycle = Lifecycle::Streaming;
    }

    pub(crate) fn push_fragment(&mut self, fragment: &str) {
        if self.is_streaming() {
            self.current_output.push_str(fragment);
        }
    }

    /// Streaming -> Completed: commit the accumulated reply as one message.
    pub(crate) fn complete(&mut self) -> ChatMessage {
        let message = ChatMessage::assistant(std::mem::take(&mut self.current_output));
        Arc::make_mut(&mut self.history).push(message.clone());
        self.lifecycle = Lifecycle::Completed;
        message
    }

    /// Streaming -> Failed: drop the partial reply.
    pub(crate) fn fail(&mut self) {
        self.current_output.clear();
        self.lifecycle = Lifecycle::Failed;
    }

    /// Drop the partial reply and go straight back to idle.
    pub(crate) fn cancel(&mut self) {
        self.current_output.clear();
        self.lifecycle = Lifecycle::Idle;
    }

    /// Completed / Failed -> Idle.
    pub(crate) fn settle(&mut self) {
        self.lifecycle = Lifecycle::Idle;
    }
}
