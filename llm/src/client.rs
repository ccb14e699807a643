use crate::api::ChatRequest;
use crate::error::ChatError;
use bytes::BytesMut;
use futures::StreamExt;
use futures::stream::Stream;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use std::{fmt::Debug, pin::Pin, time::Duration};
use tracing::{Level, event, instrument};

/// Upper bound on how much of an error response body is kept.
const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub type BoxedStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Transport bounds. The core imposes no overall request timeout; a read
/// timeout, when set, applies between body reads.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Client {
    client: reqwest::Client,
}

impl Client {
    pub fn new(config: &ClientConfig) -> Result<Self, ChatError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.read_timeout {
            builder = builder.read_timeout(timeout);
        }
        Ok(Client {
            client: builder.build()?,
        })
    }

    /// POST a streaming request and return the response once its headers
    /// show a usable event stream.
    #[instrument(level = "debug", skip(self, api_key, request), fields(model = %request.model))]
    pub async fn post_event_stream<U>(
        &self,
        url: U,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<reqwest::Response, ChatError>
    where
        U: reqwest::IntoUrl + Debug,
    {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| ChatError::InvalidCredential)?;
        bearer.set_sensitive(true);

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, bearer)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = read_error_body(response).await;
            event!(Level::DEBUG, status = status.as_u16(), body = %body, "request rejected");
            return Err(ChatError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        if response.content_length() == Some(0) {
            return Err(ChatError::EmptyBody);
        }

        event!(Level::DEBUG, status = status.as_u16(), "event stream opened");
        Ok(response)
    }
}

/// Read at most [`MAX_ERROR_BODY_BYTES`] of an error response.
async fn read_error_body(response: reqwest::Response) -> String {
    let mut body = BytesMut::new();
    let mut chunks = response.bytes_stream();

    while let Some(chunk) = chunks.next().await {
        let Ok(chunk) = chunk else { break };
        let room = MAX_ERROR_BODY_BYTES - body.len();
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if body.len() >= MAX_ERROR_BODY_BYTES {
            break;
        }
    }

    if body.is_empty() {
        "No error details".to_string()
    } else {
        String::from_utf8_lossy(&body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_bounds_connect_only() {
        let config = ClientConfig::default();
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.read_timeout, None);
    }

    #[test]
    fn test_client_builds_with_timeouts() {
        let config = ClientConfig {
            connect_timeout: Some(Duration::from_secs(5)),
            read_timeout: Some(Duration::from_secs(60)),
        };
        assert!(Client::new(&config).is_ok());
    }

    #[tokio::test]
    async fn test_header_unsafe_key_is_rejected_before_sending() {
        let client = Client::new(&ClientConfig::default()).unwrap();
        let request = ChatRequest::new("gpt-4o", vec![]);

        let result = client
            .post_event_stream("http://127.0.0.1:9/chat/completions", "bad\nkey", &request)
            .await;

        assert!(matches!(result, Err(ChatError::InvalidCredential)));
    }
}
