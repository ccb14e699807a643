use crate::state::ConversationState;
use config::CredentialStore;
use futures::StreamExt;
use llm::{ChatError, ChatMessage, ChatRequest, ChatStream, CompletionClient};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const FALLBACK_NOTICE: &str = "Error: communication failed";
const BUSY_NOTICE: &str = "Error: a reply is still streaming";

pub enum ConversationCommand {
    SendMessage(String),
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    /// Text appended to the current output
    Fragment(String),
    /// The reply was committed to history
    MessageComplete(ChatMessage),
    /// Human-readable notice for a failed or rejected turn
    Notice(String),
    /// The active turn was cancelled; nothing was committed
    Cancelled,
}

/// Model and sampling options applied to every request.
#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self::from(&config::Settings::default())
    }
}

impl From<&config::Settings> for ConversationConfig {
    fn from(settings: &config::Settings) -> Self {
        ConversationConfig {
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            top_p: settings.top_p,
        }
    }
}

impl ConversationConfig {
    pub fn build_request(&self, history: &[ChatMessage]) -> ChatRequest {
        ChatRequest {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            ..ChatRequest::new(self.model.clone(), history.to_vec())
        }
    }
}

/// Notice text shown to the user for a failed turn.
pub fn notice_for(err: &ChatError) -> String {
    let message = match err {
        ChatError::NetworkFailure(cause) => cause.to_string(),
        other => other.to_string(),
    };
    if message.trim().is_empty() {
        FALLBACK_NOTICE.to_string()
    } else {
        format!("Error: {}", err)
    }
}

/// One conversation driven by a single background task.
///
/// All state changes happen inside that task. Observers read snapshots
/// through [`Conversation::subscribe`] and consume events in order. Starting
/// a turn while another is streaming is rejected with a notice.
pub struct Conversation {
    cmd_tx: mpsc::UnboundedSender<ConversationCommand>,
    event_rx: mpsc::UnboundedReceiver<ConversationEvent>,
    state_rx: watch::Receiver<ConversationState>,
    processor_handle: JoinHandle<()>,
}

impl Conversation {
    /// Must be called from within a tokio runtime.
    pub fn new(
        client: Arc<dyn CompletionClient + Send + Sync>,
        credentials: Arc<dyn CredentialStore>,
        config: ConversationConfig,
    ) -> Self {
        Self::with_state(client, credentials, config, ConversationState::new())
    }

    pub fn with_state(
        client: Arc<dyn CompletionClient + Send + Sync>,
        credentials: Arc<dyn CredentialStore>,
        config: ConversationConfig,
        initial: ConversationState,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(initial.clone());

        let processor = Processor {
            client,
            credentials,
            config,
            state: initial,
            state_tx,
            event_tx,
        };
        let processor_handle = tokio::spawn(processor.run(cmd_rx));

        Self {
            cmd_tx,
            event_rx,
            state_rx,
            processor_handle,
        }
    }

    pub fn send_message(&self, text: impl Into<String>) {
        let _ = self.cmd_tx.send(ConversationCommand::SendMessage(text.into()));
    }

    pub fn cancel(&self) {
        let _ = self.cmd_tx.send(ConversationCommand::Cancel);
    }

    /// Latest published snapshot.
    pub fn state(&self) -> ConversationState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.state_rx.clone()
    }

    pub fn try_recv(&mut self) -> Option<ConversationEvent> {
        self.event_rx.try_recv().ok()
    }

    pub async fn next_event(&mut self) -> Option<ConversationEvent> {
        self.event_rx.recv().await
    }
}

impl Drop for Conversation {
    fn drop(&mut self) {
        self.processor_handle.abort();
    }
}

struct Processor {
    client: Arc<dyn CompletionClient + Send + Sync>,
    credentials: Arc<dyn CredentialStore>,
    config: ConversationConfig,
    state: ConversationState,
    state_tx: watch::Sender<ConversationState>,
    event_tx: mpsc::UnboundedSender<ConversationEvent>,
}

impl Processor {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<ConversationCommand>) {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                ConversationCommand::SendMessage(text) => self.run_turn(text, &mut cmd_rx).await,
                ConversationCommand::Cancel => debug!("cancel requested with no active turn"),
            }
        }
        debug!("conversation handle dropped, processor exiting");
    }

    async fn run_turn(
        &mut self,
        text: String,
        cmd_rx: &mut mpsc::UnboundedReceiver<ConversationCommand>,
    ) {
        if text.trim().is_empty() {
            debug!("ignoring blank user turn");
            return;
        }

        self.state.begin_turn(text);
        self.publish();

        let api_key = self.credentials.get().await.unwrap_or_default();
        let request = self.config.build_request(self.state.history());
        info!(model = %request.model, messages = request.messages.len(), "starting turn");

        match self.stream_reply(&api_key, request, cmd_rx).await {
            Ok(()) => {
                let message = self.state.complete();
                self.publish();
                self.state.settle();
                self.publish();
                info!(chars = message.content.len(), "turn completed");
                self.emit(ConversationEvent::MessageComplete(message));
            }
            Err(err) if !err.is_user_visible() => {
                self.state.cancel();
                self.publish();
                info!("turn cancelled");
                self.emit(ConversationEvent::Cancelled);
            }
            Err(err) => {
                self.state.fail();
                self.publish();
                self.state.settle();
                self.publish();
                warn!(error = %err, "turn failed");
                self.emit(ConversationEvent::Notice(notice_for(&err)));
            }
        }
    }

    /// Drive one request to the end of its stream, applying fragments as
    /// they arrive. Commands are still served so the turn can be cancelled
    /// while connecting or streaming.
    async fn stream_reply(
        &mut self,
        api_key: &str,
        request: ChatRequest,
        cmd_rx: &mut mpsc::UnboundedReceiver<ConversationCommand>,
    ) -> Result<(), ChatError> {
        let client = Arc::clone(&self.client);
        let open = client.stream_completion(api_key, request);
        tokio::pin!(open);

        let mut stream: ChatStream = loop {
            tokio::select! {
                opened = &mut open => break opened?,
                cmd = cmd_rx.recv() => {
                    if self.interrupts(cmd) {
                        return Err(ChatError::StreamCancelled);
                    }
                }
            }
        };

        loop {
            tokio::select! {
                item = stream.next() => match item {
                    Some(Ok(fragment)) => {
                        self.state.push_fragment(&fragment);
                        self.publish();
                        self.emit(ConversationEvent::Fragment(fragment));
                    }
                    Some(Err(err)) => return Err(err),
                    None => return Ok(()),
                },
                cmd = cmd_rx.recv() => {
                    if self.interrupts(cmd) {
                        return Err(ChatError::StreamCancelled);
                    }
                }
            }
        }
    }

    /// Whether a command received mid-turn ends the turn. A closed command
    /// channel means the owning handle is gone.
    fn interrupts(&self, cmd: Option<ConversationCommand>) -> bool {
        match cmd {
            None | Some(ConversationCommand::Cancel) => true,
            Some(ConversationCommand::SendMessage(_)) => {
                debug!("rejecting new turn while streaming");
                self.emit(ConversationEvent::Notice(BUSY_NOTICE.to_string()));
                false
            }
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }

    fn emit(&self, event: ConversationEvent) {
        let _ = self.event_tx.send(event);
    }
}
