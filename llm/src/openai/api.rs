use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    FunctionCall,
    #[serde(other)]
    Other,
}

/// Role announced by a delta. Roles this client does not know decode as
/// `Other` so the frame's content is kept.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaRole {
    System,
    User,
    Assistant,
    Tool,
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ChatDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<DeltaRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ChatChoice {
    pub index: u32,
    pub delta: ChatDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// One `data:` payload of a streamed chat completion.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ChatStreamChunk {
    pub id: String,
    #[serde(default)]
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
}

impl ChatStreamChunk {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created, 0)
    }

    /// Text carried by the first choice, if any and non-empty.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .filter(|content| !content.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_decodes_openai_shape() {
        let chunk: ChatStreamChunk = serde_json::from_str(
            r#"{"id":"chatcmpl-1","object":"chat.completion.chunk","created":1700000000,"model":"gpt-4o","choices":[{"index":0,"delta":{"role":"assistant","content":"Hi"},"finish_reason":null}]}"#,
        )
        .unwrap();

        assert_eq!(chunk.first_content(), Some("Hi"));
        assert_eq!(chunk.choices[0].delta.role, Some(DeltaRole::Assistant));
        assert_eq!(chunk.choices[0].finish_reason, None);
        assert_eq!(
            chunk.created_at().unwrap().to_rfc3339(),
            "2023-11-14T22:13:20+00:00"
        );
    }

    #[test]
    fn test_empty_delta_is_not_an_error() {
        let chunk: ChatStreamChunk = serde_json::from_str(
            r#"{"id":"x","created":1,"model":"m","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
        )
        .unwrap();

        assert_eq!(chunk.first_content(), None);
        assert_eq!(chunk.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(chunk.object, "");
    }

    #[test]
    fn test_unknown_finish_reason_maps_to_other() {
        let choice: ChatChoice = serde_json::from_str(
            r#"{"index":0,"delta":{"content":""},"finish_reason":"something_new"}"#,
        )
        .unwrap();

        assert_eq!(choice.finish_reason, Some(FinishReason::Other));
    }

    #[test]
    fn test_unknown_delta_role_maps_to_other() {
        let delta: ChatDelta =
            serde_json::from_str(r#"{"role":"developer","content":"x"}"#).unwrap();

        assert_eq!(delta.role, Some(DeltaRole::Other));
        assert_eq!(delta.content.as_deref(), Some("x"));
    }
}
