//! Traffic logging for completion calls
//!
//! Request summaries and errors go to the `llm::traffic` tracing target.
//! Content is truncated to avoid leaking private data in logs. The bearer
//! credential is never part of what gets logged here.

use tracing::{debug, warn};

/// Maximum characters to log for content (to protect privacy)
pub(crate) const MAX_CONTENT_LOG_CHARS: usize = 200;

/// Truncate a string for logging, adding ellipsis if truncated
pub(crate) fn truncate_for_log(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}... ({} chars total)", truncated, char_count)
    }
}

fn summarize(value: &impl serde::Serialize) -> String {
    let json = serde_json::to_string(value).unwrap_or_else(|_| "<serialization error>".to_string());
    truncate_for_log(&json, MAX_CONTENT_LOG_CHARS)
}

/// Log the start of a streamed completion (truncated summary only)
pub(crate) fn log_stream_start(model: &str, request: &impl serde::Serialize) {
    debug!(target: "llm::traffic", model, request = %summarize(request), "STREAM_START");
}

/// Log a terminal completion error
pub(crate) fn log_error(model: &str, error: &dyn std::fmt::Display) {
    let message = truncate_for_log(&error.to_string(), MAX_CONTENT_LOG_CHARS);
    warn!(target: "llm::traffic", model, error = %message, "ERROR");
}
