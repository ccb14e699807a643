//! Turn lifecycle tests against a scripted completion client.

use async_trait::async_trait;
use config::{CredentialStore, MemoryCredentialStore};
use conversation::{Conversation, ConversationConfig, ConversationEvent, Lifecycle};
use futures::StreamExt;
use futures::stream;
use llm::{ChatError, ChatMessage, ChatRequest, ChatStream, CompletionClient};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum Reply {
    /// Yield these items, then end, or hang when `hold_open` is set.
    Stream {
        items: Vec<Result<String, ChatError>>,
        hold_open: bool,
    },
    Fail(ChatError),
}

impl Reply {
    fn text(fragments: &[&str]) -> Self {
        Reply::Stream {
            items: fragments.iter().map(|f| Ok(f.to_string())).collect(),
            hold_open: false,
        }
    }

    fn hanging(fragments: &[&str]) -> Self {
        Reply::Stream {
            items: fragments.iter().map(|f| Ok(f.to_string())).collect(),
            hold_open: true,
        }
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<(String, ChatRequest)>>,
    stream_dropped: Arc<AtomicBool>,
}

impl ScriptedClient {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(ScriptedClient {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        })
    }

    fn requests(&self) -> Vec<(String, ChatRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn stream_completion(
        &self,
        api_key: &str,
        request: ChatRequest,
    ) -> Result<ChatStream, ChatError> {
        self.requests
            .lock()
            .unwrap()
            .push((api_key.to_string(), request));

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected request");

        match reply {
            Reply::Fail(err) => Err(err),
            Reply::Stream { items, hold_open } => {
                let guard = DropFlag(self.stream_dropped.clone());
                let tail = if hold_open {
                    stream::pending().boxed()
                } else {
                    stream::empty().boxed()
                };
                let stream = stream::iter(items).chain(tail).map(move |item| {
                    let _ = &guard;
                    item
                });
                Ok(Box::pin(stream))
            }
        }
    }
}

fn start(client: Arc<ScriptedClient>) -> Conversation {
    Conversation::new(
        client,
        Arc::new(MemoryCredentialStore::with_key("test-key")),
        ConversationConfig::default(),
    )
}

async fn next_event(conversation: &mut Conversation) -> ConversationEvent {
    tokio::time::timeout(Duration::from_secs(5), conversation.next_event())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_fragments_are_committed_as_one_reply() {
    let client = ScriptedClient::new(vec![Reply::text(&["Hel", "lo"])]);
    let mut conversation = start(client.clone());

    conversation.send_message("hi");

    assert_eq!(
        next_event(&mut conversation).await,
        ConversationEvent::Fragment("Hel".to_string())
    );
    assert_eq!(
        next_event(&mut conversation).await,
        ConversationEvent::Fragment("lo".to_string())
    );
    assert_eq!(
        next_event(&mut conversation).await,
        ConversationEvent::MessageComplete(ChatMessage::assistant("Hello"))
    );

    let state = conversation.state();
    assert_eq!(
        state.history(),
        &[ChatMessage::user("hi"), ChatMessage::assistant("Hello")]
    );
    assert_eq!(state.current_output(), "");
    assert_eq!(state.lifecycle(), Lifecycle::Idle);

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "test-key");
    assert_eq!(requests[0].1.messages, vec![ChatMessage::user("hi")]);
    assert!(requests[0].1.stream);
}

#[tokio::test]
async fn test_next_turn_sends_full_history() {
    let client = ScriptedClient::new(vec![Reply::text(&["first"]), Reply::text(&["second"])]);
    let mut conversation = start(client.clone());

    conversation.send_message("one");
    while !matches!(
        next_event(&mut conversation).await,
        ConversationEvent::MessageComplete(_)
    ) {}

    conversation.send_message("two");
    while !matches!(
        next_event(&mut conversation).await,
        ConversationEvent::MessageComplete(_)
    ) {}

    let requests = client.requests();
    assert_eq!(
        requests[1].1.messages,
        vec![
            ChatMessage::user("one"),
            ChatMessage::assistant("first"),
            ChatMessage::user("two"),
        ]
    );
    assert_eq!(conversation.state().history().len(), 4);
}

#[tokio::test]
async fn test_cancel_discards_partial_reply() {
    let client = ScriptedClient::new(vec![Reply::hanging(&["partial"])]);
    let mut conversation = start(client.clone());

    conversation.send_message("hi");
    assert_eq!(
        next_event(&mut conversation).await,
        ConversationEvent::Fragment("partial".to_string())
    );
    assert_eq!(conversation.state().current_output(), "partial");
    assert!(conversation.state().is_streaming());

    conversation.cancel();
    assert_eq!(
        next_event(&mut conversation).await,
        ConversationEvent::Cancelled
    );

    let state = conversation.state();
    assert_eq!(state.history(), &[ChatMessage::user("hi")]);
    assert_eq!(state.current_output(), "");
    assert_eq!(state.lifecycle(), Lifecycle::Idle);
    assert!(client.stream_dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_second_turn_is_rejected_while_streaming() {
    let client = ScriptedClient::new(vec![Reply::hanging(&["working"])]);
    let mut conversation = start(client.clone());

    conversation.send_message("first");
    assert!(matches!(
        next_event(&mut conversation).await,
        ConversationEvent::Fragment(_)
    ));

    conversation.send_message("second");
    assert_eq!(
        next_event(&mut conversation).await,
        ConversationEvent::Notice("Error: a reply is still streaming".to_string())
    );

    let state = conversation.state();
    assert!(state.is_streaming());
    assert_eq!(state.history(), &[ChatMessage::user("first")]);
    assert_eq!(state.current_output(), "working");
    assert_eq!(client.requests().len(), 1);

    conversation.cancel();
    assert_eq!(
        next_event(&mut conversation).await,
        ConversationEvent::Cancelled
    );
}

#[tokio::test]
async fn test_mid_stream_failure_becomes_notice() {
    let client = ScriptedClient::new(vec![Reply::Stream {
        items: vec![
            Ok("par".to_string()),
            Err(ChatError::network(std::io::Error::other("connection reset"))),
        ],
        hold_open: false,
    }]);
    let mut conversation = start(client);

    conversation.send_message("hi");
    assert!(matches!(
        next_event(&mut conversation).await,
        ConversationEvent::Fragment(_)
    ));
    assert_eq!(
        next_event(&mut conversation).await,
        ConversationEvent::Notice("Error: network failure: connection reset".to_string())
    );

    let state = conversation.state();
    assert_eq!(state.history(), &[ChatMessage::user("hi")]);
    assert_eq!(state.current_output(), "");
    assert_eq!(state.lifecycle(), Lifecycle::Idle);
}

#[tokio::test]
async fn test_open_failure_becomes_notice() {
    let client = ScriptedClient::new(vec![Reply::Fail(ChatError::HttpError {
        status: 500,
        body: "upstream down".to_string(),
    })]);
    let mut conversation = start(client);

    conversation.send_message("hi");

    assert_eq!(
        next_event(&mut conversation).await,
        ConversationEvent::Notice("Error: HTTP 500: upstream down".to_string())
    );
    assert_eq!(conversation.state().history(), &[ChatMessage::user("hi")]);
}

#[tokio::test]
async fn test_blank_input_starts_no_turn() {
    let client = ScriptedClient::new(vec![Reply::text(&["ok"])]);
    let mut conversation = start(client.clone());

    conversation.send_message("   ");
    conversation.send_message("real");

    assert_eq!(
        next_event(&mut conversation).await,
        ConversationEvent::Fragment("ok".to_string())
    );
    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1.messages, vec![ChatMessage::user("real")]);
}

#[tokio::test]
async fn test_cancel_when_idle_is_ignored() {
    let client = ScriptedClient::new(vec![Reply::text(&["ok"])]);
    let mut conversation = start(client);

    conversation.cancel();
    conversation.send_message("hi");

    assert_eq!(
        next_event(&mut conversation).await,
        ConversationEvent::Fragment("ok".to_string())
    );
    assert_eq!(
        next_event(&mut conversation).await,
        ConversationEvent::MessageComplete(ChatMessage::assistant("ok"))
    );
    assert!(conversation.try_recv().is_none());
}

#[tokio::test]
async fn test_credential_is_read_per_turn() {
    let client = ScriptedClient::new(vec![Reply::text(&["a"]), Reply::text(&["b"])]);
    let credentials = Arc::new(MemoryCredentialStore::with_key("old-key"));
    let mut conversation = Conversation::new(
        client.clone(),
        credentials.clone(),
        ConversationConfig::default(),
    );

    conversation.send_message("one");
    while !matches!(
        next_event(&mut conversation).await,
        ConversationEvent::MessageComplete(_)
    ) {}

    credentials.set("new-key").await.unwrap();
    conversation.send_message("two");
    while !matches!(
        next_event(&mut conversation).await,
        ConversationEvent::MessageComplete(_)
    ) {}

    let keys: Vec<String> = client.requests().into_iter().map(|(key, _)| key).collect();
    assert_eq!(keys, vec!["old-key", "new-key"]);
}

#[tokio::test]
async fn test_observers_see_streaming_snapshots() {
    let client = ScriptedClient::new(vec![Reply::hanging(&["Hel", "lo"])]);
    let mut conversation = start(client);
    let mut states = conversation.subscribe();

    conversation.send_message("hi");
    tokio::time::timeout(
        Duration::from_secs(5),
        states.wait_for(|s| s.current_output() == "Hello"),
    )
    .await
    .expect("timed out waiting for snapshot")
    .unwrap();

    assert!(conversation.state().is_streaming());
    conversation.cancel();
    while next_event(&mut conversation).await != ConversationEvent::Cancelled {}
}
