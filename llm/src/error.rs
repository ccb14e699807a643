use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Terminal failures of a streamed completion.
///
/// Every variant ends the stream; none of them is retried.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("API key is not set")]
    MissingCredential,

    #[error("API key is not a valid header value")]
    InvalidCredential,

    #[error("network failure: {0}")]
    NetworkFailure(#[source] BoxError),

    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("response body is empty")]
    EmptyBody,

    #[error("stream cancelled")]
    StreamCancelled,
}

impl ChatError {
    pub fn network(cause: impl Into<BoxError>) -> Self {
        ChatError::NetworkFailure(cause.into())
    }

    /// Cancellation is a normal way for a turn to end and is not reported.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, ChatError::StreamCancelled)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ChatError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::NetworkFailure(Box::new(err))
    }
}

/// A single SSE payload that could not be decoded. Never terminal.
#[derive(Debug, Error)]
#[error("failed to decode stream chunk: {source}")]
pub struct FrameDecodeError {
    #[from]
    source: serde_json::Error,
}
