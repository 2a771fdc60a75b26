use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::actions::{ChatAction, ChatActionDispatcher, ChatCommand, ThreadRequest};
use super::session::ChatSession;
use crate::api::ApiError;
use crate::core::chat_stream::{ChatStreamService, StreamEnvelope};
use crate::core::config::Preferences;
use crate::core::repository::ChatRepository;

/// Owns a [`ChatSession`] and carries out the commands it returns.
///
/// Actions arrive from two places: the dispatcher handed out to callers and
/// background tasks, and the chunk channel of the stream service. `step`
/// waits on both and applies whichever comes first.
pub struct ChatRuntime {
    session: ChatSession,
    streams: ChatStreamService,
    stream_rx: mpsc::UnboundedReceiver<StreamEnvelope>,
    dispatcher: ChatActionDispatcher,
    action_rx: mpsc::UnboundedReceiver<ChatAction>,
    repository: Arc<dyn ChatRepository>,
    preferences_path: Option<PathBuf>,
}

impl ChatRuntime {
    pub fn new(repository: Arc<dyn ChatRepository>, session: ChatSession) -> Self {
        let (streams, stream_rx) = ChatStreamService::new(repository.clone());
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        Self {
            session,
            streams,
            stream_rx,
            dispatcher: ChatActionDispatcher::new(action_tx),
            action_rx,
            repository,
            preferences_path: None,
        }
    }

    /// Remember thread changes in the preferences file at `path`.
    pub fn with_preferences_path(mut self, path: PathBuf) -> Self {
        self.preferences_path = Some(path);
        self
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ChatSession {
        &mut self.session
    }

    pub fn dispatcher(&self) -> ChatActionDispatcher {
        self.dispatcher.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_busy()
    }

    pub fn apply(&mut self, action: ChatAction) {
        if let Some(command) = self.session.apply_action(action) {
            self.execute(command);
        }
    }

    fn execute(&mut self, command: ChatCommand) {
        match command {
            ChatCommand::SpawnStream(params) => self.streams.spawn_stream(params),
            ChatCommand::LoadThread(request) => self.spawn_thread_load(request),
            ChatCommand::PersistThreadId(thread_id) => self.persist_thread_id(thread_id),
        }
    }

    /// Wait for the next action and apply it.
    pub async fn step(&mut self) {
        let action = tokio::select! {
            Some(envelope) = self.stream_rx.recv() => ChatAction::StreamChunk(envelope),
            Some(action) = self.action_rx.recv() => action,
            else => return,
        };
        self.apply(action);
    }

    fn spawn_thread_load(&self, request: ThreadRequest) {
        let ThreadRequest {
            thread_id,
            request_id,
            cancel_token,
        } = request;
        let mut results = self.repository.get_thread_messages(&thread_id);
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            let outcome = tokio::select! {
                result = results.next() => {
                    result.unwrap_or_else(|| Err(ApiError::unknown("Empty response")))
                }
                _ = cancel_token.cancelled() => Err(ApiError::Cancelled),
            };
            let action = match outcome {
                Ok(messages) => ChatAction::ThreadLoaded {
                    request_id,
                    thread_id,
                    messages,
                },
                Err(error) => {
                    debug!(%thread_id, %error, "thread load failed");
                    ChatAction::ThreadLoadFailed {
                        request_id,
                        thread_id,
                        error,
                    }
                }
            };
            dispatcher.dispatch(action);
        });
    }

    fn persist_thread_id(&self, thread_id: Option<String>) {
        let Some(path) = self.preferences_path.as_deref() else {
            return;
        };
        if let Err(err) = Preferences::update(path, |prefs| prefs.last_thread_id = thread_id) {
            warn!(error = %err, "failed to remember current thread");
        }
    }
}
