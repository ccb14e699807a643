//! Per-frame decoding of streamed completion chunks.

use crate::error::FrameDecodeError;
use crate::openai::ChatStreamChunk;
use crate::traffic_log::{MAX_CONTENT_LOG_CHARS, truncate_for_log};
use tracing::debug;

pub fn decode_chunk(payload: &str) -> Result<ChatStreamChunk, FrameDecodeError> {
    Ok(serde_json::from_str(payload)?)
}

/// Text fragment carried by one `data:` payload.
///
/// Undecodable payloads are logged and skipped; they never end the stream.
pub fn extract_fragment(payload: &str) -> Option<String> {
    let chunk = match decode_chunk(payload) {
        Ok(chunk) => chunk,
        Err(err) => {
            debug!(
                error = %err,
                payload = %truncate_for_log(payload, MAX_CONTENT_LOG_CHARS),
                "skipping undecodable stream chunk"
            );
            return None;
        }
    };

    if let Some(reason) = chunk.choices.first().and_then(|c| c.finish_reason.as_ref()) {
        debug!(id = %chunk.id, ?reason, "stream reported finish reason");
    }

    chunk.first_content().map(str::to_owned)
}
