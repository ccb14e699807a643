use crate::api::ChatRequest;
use crate::client::{Client, ClientConfig};
use crate::error::ChatError;
use crate::stream::FragmentStream;
use crate::{ChatStream, CompletionClient, traffic_log};
use async_trait::async_trait;
use tracing::instrument;

/// Streaming client for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone, Debug)]
pub struct OpenAIChatClient {
    client: Client,
    base_url: String,
}

impl OpenAIChatClient {
    /// `base_url` includes the API version path, e.g. `https://api.openai.com/v1`.
    pub fn new(base_url: &str, config: &ClientConfig) -> Result<Self, ChatError> {
        Ok(Self::with_client(Client::new(config)?, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        OpenAIChatClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Open a streamed completion.
    ///
    /// Fails before any I/O when `api_key` is blank. Once this returns `Ok`
    /// the status was a success and the body is read lazily by the stream.
    #[instrument(level = "debug", skip(self, api_key, request), fields(model = %request.model))]
    pub async fn open_stream(
        &self,
        api_key: &str,
        request: ChatRequest,
    ) -> Result<FragmentStream, ChatError> {
        if api_key.trim().is_empty() {
            return Err(ChatError::MissingCredential);
        }

        let request = request.into_streaming();
        traffic_log::log_stream_start(&request.model, &request);

        match self
            .client
            .post_event_stream(self.chat_url(), api_key, &request)
            .await
        {
            Ok(response) => Ok(FragmentStream::from_response(response)),
            Err(err) => {
                traffic_log::log_error(&request.model, &err);
                Err(err)
            }
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAIChatClient {
    async fn stream_completion(
        &self,
        api_key: &str,
        request: ChatRequest,
    ) -> Result<ChatStream, ChatError> {
        let stream = self.open_stream(api_key, request).await?;
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChatMessage;

    #[test]
    fn test_chat_url_tolerates_trailing_slash() {
        let client = OpenAIChatClient::new("http://localhost:8080/v1/", &ClientConfig::default())
            .unwrap();
        assert_eq!(client.chat_url(), "http://localhost:8080/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_blank_key_fails_without_io() {
        // Port 9 would refuse or hang; the key check must come first.
        let client =
            OpenAIChatClient::new("http://127.0.0.1:9/v1", &ClientConfig::default()).unwrap();
        let request = ChatRequest::new("gpt-4o", vec![ChatMessage::user("hi")]);

        let result = client.open_stream("   ", request).await;

        assert!(matches!(result, Err(ChatError::MissingCredential)));
    }
}
