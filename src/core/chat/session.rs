use std::collections::VecDeque;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::actions::{ChatAction, ChatCommand, ThreadRequest};
use crate::api::{ApiError, ChatMessagePayload, ChatRequest, ThreadMessage};
use crate::core::chat_stream::{StreamEnvelope, StreamParams};
use crate::core::constants::LOCAL_MESSAGE_ID_PREFIX;
use crate::core::message::{ChatMessage, MessageListState, MessageRole};
use crate::core::stream_reducer::reduce;

/// An in-flight operation that a newer one of the same kind replaces.
struct OperationSlot {
    id: u64,
    cancel_token: CancellationToken,
}

impl OperationSlot {
    fn cancel(self) {
        self.cancel_token.cancel();
    }
}

pub struct ChatSession {
    pub messages: MessageListState,
    pub thread_id: Option<String>,
    pub model: String,
    stream_slot: Option<OperationSlot>,
    thread_slot: Option<OperationSlot>,
    last_stream_id: u64,
    last_thread_request_id: u64,
    next_local_id: u64,
    notices: VecDeque<String>,
}

impl ChatSession {
    pub fn new(model: impl Into<String>, thread_id: Option<String>) -> Self {
        Self {
            messages: MessageListState::default(),
            thread_id,
            model: model.into(),
            stream_slot: None,
            thread_slot: None,
            last_stream_id: 0,
            last_thread_request_id: 0,
            next_local_id: 0,
            notices: VecDeque::new(),
        }
    }

    pub fn is_loading_thread(&self) -> bool {
        self.thread_slot.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.messages.is_streaming() || self.is_loading_thread()
    }

    /// Messages queued for the user since the last call.
    pub fn take_notices(&mut self) -> Vec<String> {
        self.notices.drain(..).collect()
    }

    fn allocate_id(&mut self) -> String {
        self.next_local_id += 1;
        format!("{LOCAL_MESSAGE_ID_PREFIX}-{}", self.next_local_id)
    }

    fn cancel_stream(&mut self) {
        if let Some(slot) = self.stream_slot.take() {
            debug!(stream_id = slot.id, "cancelling chat stream");
            slot.cancel();
        }
        self.messages.streaming_message_id = None;
        self.messages.active_assistant_task = None;
    }

    fn cancel_thread_load(&mut self) {
        if let Some(slot) = self.thread_slot.take() {
            slot.cancel();
        }
    }

    fn api_messages(&self) -> Vec<ChatMessagePayload> {
        self.messages
            .messages
            .iter()
            .filter(|message| !message.content.is_empty())
            .map(|message| ChatMessagePayload {
                role: message.role.as_str().to_string(),
                content: message.content.clone(),
            })
            .collect()
    }

    pub fn apply_action(&mut self, action: ChatAction) -> Option<ChatCommand> {
        match action {
            ChatAction::SubmitMessage { content } => self.submit_message(content),
            ChatAction::StreamChunk(envelope) => self.apply_stream_chunk(envelope),
            ChatAction::CancelStreaming => {
                self.cancel_stream();
                None
            }
            ChatAction::SelectThread { thread_id } => self.select_thread(thread_id),
            ChatAction::ThreadLoaded {
                request_id,
                thread_id,
                messages,
            } => self.thread_loaded(request_id, thread_id, messages),
            ChatAction::ThreadLoadFailed {
                request_id,
                thread_id,
                error,
            } => {
                self.thread_load_failed(request_id, &thread_id, &error);
                None
            }
            ChatAction::NewThread => {
                self.cancel_stream();
                self.cancel_thread_load();
                self.messages = MessageListState::default();
                self.thread_id = None;
                Some(ChatCommand::PersistThreadId(None))
            }
        }
    }

    fn submit_message(&mut self, content: String) -> Option<ChatCommand> {
        let content = content.trim().to_string();
        if content.is_empty() {
            return None;
        }

        // A history arriving now would replace the message being sent.
        self.cancel_thread_load();
        self.cancel_stream();
        self.messages.remove_trailing_empty_assistant();

        let user_id = self.allocate_id();
        self.messages.push(ChatMessage::user(user_id, content));
        let request = ChatRequest {
            model: self.model.clone(),
            messages: self.api_messages(),
            thread_id: self.thread_id.clone(),
            stream: true,
        };

        let assistant_id = self.allocate_id();
        self.messages
            .push(ChatMessage::assistant(assistant_id.clone(), String::new()));
        self.messages.streaming_message_id = Some(assistant_id);

        self.last_stream_id += 1;
        let cancel_token = CancellationToken::new();
        self.stream_slot = Some(OperationSlot {
            id: self.last_stream_id,
            cancel_token: cancel_token.clone(),
        });

        Some(ChatCommand::SpawnStream(StreamParams {
            request,
            cancel_token,
            stream_id: self.last_stream_id,
        }))
    }

    fn apply_stream_chunk(&mut self, envelope: StreamEnvelope) -> Option<ChatCommand> {
        let StreamEnvelope { stream_id, chunk } = envelope;
        let is_current = self
            .stream_slot
            .as_ref()
            .is_some_and(|slot| slot.id == stream_id);
        let Some(streaming_id) = self.messages.streaming_message_id.clone() else {
            debug!(stream_id, "dropping chunk: no active stream");
            return None;
        };
        if !is_current {
            debug!(stream_id, "dropping chunk from stale stream");
            return None;
        }

        let terminal = chunk.is_terminal();
        let reduction = reduce(std::mem::take(&mut self.messages), &chunk, &streaming_id);
        self.messages = reduction.state;
        if terminal {
            self.stream_slot = None;
        }
        if let Some(message) = reduction.ui_message {
            self.notices.push_back(message);
        }

        let new_thread_id = reduction.new_thread_id?;
        if self.thread_id.as_deref() == Some(new_thread_id.as_str()) {
            return None;
        }
        self.thread_id = Some(new_thread_id.clone());
        Some(ChatCommand::PersistThreadId(Some(new_thread_id)))
    }

    fn select_thread(&mut self, thread_id: String) -> Option<ChatCommand> {
        self.cancel_stream();
        self.cancel_thread_load();

        self.last_thread_request_id += 1;
        let cancel_token = CancellationToken::new();
        self.thread_slot = Some(OperationSlot {
            id: self.last_thread_request_id,
            cancel_token: cancel_token.clone(),
        });

        Some(ChatCommand::LoadThread(ThreadRequest {
            thread_id,
            request_id: self.last_thread_request_id,
            cancel_token,
        }))
    }

    fn is_current_thread_request(&self, request_id: u64) -> bool {
        self.thread_slot
            .as_ref()
            .is_some_and(|slot| slot.id == request_id)
    }

    fn thread_loaded(
        &mut self,
        request_id: u64,
        thread_id: String,
        messages: Vec<ThreadMessage>,
    ) -> Option<ChatCommand> {
        if !self.is_current_thread_request(request_id) {
            debug!(request_id, %thread_id, "dropping stale thread load");
            return None;
        }
        self.thread_slot = None;

        let history = messages.into_iter().filter_map(|message| {
            match MessageRole::try_from(message.role.as_str()) {
                Ok(role) => Some(ChatMessage::new(message.id, role, message.content)),
                Err(err) => {
                    debug!(%err, "skipping thread message");
                    None
                }
            }
        });
        self.messages = MessageListState::with_messages(history);
        self.thread_id = Some(thread_id.clone());
        Some(ChatCommand::PersistThreadId(Some(thread_id)))
    }

    fn thread_load_failed(&mut self, request_id: u64, thread_id: &str, error: &ApiError) {
        if !self.is_current_thread_request(request_id) {
            return;
        }
        self.thread_slot = None;
        if error.is_cancelled() {
            return;
        }
        self.notices
            .push_back(format!("Failed to load thread {thread_id}: {error}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StreamChunk;

    fn submit(session: &mut ChatSession, text: &str) -> StreamParams {
        match session.apply_action(ChatAction::SubmitMessage {
            content: text.into(),
        }) {
            Some(ChatCommand::SpawnStream(params)) => params,
            _ => panic!("expected stream"),
        }
    }

    fn chunk(session: &mut ChatSession, stream_id: u64, chunk: StreamChunk) -> Option<ChatCommand> {
        session.apply_action(ChatAction::StreamChunk(StreamEnvelope { stream_id, chunk }))
    }

    fn select(session: &mut ChatSession, thread_id: &str) -> ThreadRequest {
        match session.apply_action(ChatAction::SelectThread {
            thread_id: thread_id.into(),
        }) {
            Some(ChatCommand::LoadThread(request)) => request,
            _ => panic!("expected thread load"),
        }
    }

    #[test]
    fn submit_adds_user_message_and_streaming_placeholder() {
        let mut session = ChatSession::new("test-model", Some("t0".into()));
        let params = submit(&mut session, "  Hello there  ");

        assert_eq!(session.messages.messages.len(), 2);
        assert_eq!(session.messages.messages[0].content, "Hello there");
        let placeholder = &session.messages.messages[1];
        assert!(placeholder.role.is_assistant());
        assert_eq!(
            session.messages.streaming_message_id.as_deref(),
            Some(placeholder.id.as_str())
        );
        assert_eq!(params.request.messages.len(), 1);
        assert_eq!(params.request.thread_id.as_deref(), Some("t0"));
        assert_eq!(params.request.model, "test-model");
        assert!(params.request.stream);
    }

    #[test]
    fn blank_submissions_are_ignored() {
        let mut session = ChatSession::new("m", None);
        assert!(session
            .apply_action(ChatAction::SubmitMessage {
                content: "   ".into()
            })
            .is_none());
        assert!(session.messages.messages.is_empty());
    }

    #[test]
    fn chunks_fold_into_placeholder_and_done_adopts_thread() {
        let mut session = ChatSession::new("m", None);
        let params = submit(&mut session, "hi");
        chunk(&mut session, params.stream_id, StreamChunk::delta("Hello"));
        let command = chunk(
            &mut session,
            params.stream_id,
            StreamChunk::Done {
                finish_reason: None,
                usage: None,
                thread_id: Some("t-new".into()),
            },
        );

        assert!(matches!(
            command,
            Some(ChatCommand::PersistThreadId(Some(ref id))) if id == "t-new"
        ));
        assert_eq!(session.thread_id.as_deref(), Some("t-new"));
        assert_eq!(session.messages.messages[1].content, "Hello");
        assert!(!session.is_busy());
    }

    #[test]
    fn chunks_after_done_do_not_mutate_messages() {
        let mut session = ChatSession::new("m", None);
        let params = submit(&mut session, "hi");
        chunk(&mut session, params.stream_id, StreamChunk::done());
        let before = session.messages.clone();
        chunk(&mut session, params.stream_id, StreamChunk::delta("late"));
        assert_eq!(session.messages, before);
    }

    #[test]
    fn new_submission_cancels_previous_stream_and_ignores_its_chunks() {
        let mut session = ChatSession::new("m", None);
        let first = submit(&mut session, "one");
        chunk(&mut session, first.stream_id, StreamChunk::delta("partial"));
        let second = submit(&mut session, "two");

        assert!(first.cancel_token.is_cancelled());
        assert!(!second.cancel_token.is_cancelled());
        chunk(&mut session, first.stream_id, StreamChunk::delta("stale"));
        chunk(&mut session, second.stream_id, StreamChunk::delta("fresh"));

        let contents: Vec<_> = session
            .messages
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["one", "partial", "two", "fresh"]);
        assert_eq!(second.request.messages.len(), 3);
    }

    #[test]
    fn stream_error_becomes_notice_and_keeps_partial_reply() {
        let mut session = ChatSession::new("m", None);
        let params = submit(&mut session, "hi");
        chunk(&mut session, params.stream_id, StreamChunk::delta("Par"));
        chunk(&mut session, params.stream_id, StreamChunk::error("overloaded"));

        assert_eq!(session.take_notices(), vec!["overloaded".to_string()]);
        assert!(session.take_notices().is_empty());
        assert_eq!(session.messages.messages[1].content, "Par");
        assert!(!session.messages.is_streaming());
    }

    #[test]
    fn selecting_thread_cancels_stream_and_previous_selection() {
        let mut session = ChatSession::new("m", None);
        let params = submit(&mut session, "hi");
        let first = select(&mut session, "t1");
        let second = select(&mut session, "t2");

        assert!(params.cancel_token.is_cancelled());
        assert!(first.cancel_token.is_cancelled());
        assert!(session.is_loading_thread());

        session.apply_action(ChatAction::ThreadLoaded {
            request_id: first.request_id,
            thread_id: "t1".into(),
            messages: vec![],
        });
        assert!(session.is_loading_thread());

        let command = session.apply_action(ChatAction::ThreadLoaded {
            request_id: second.request_id,
            thread_id: "t2".into(),
            messages: vec![
                ThreadMessage {
                    id: "1".into(),
                    role: "user".into(),
                    content: "earlier".into(),
                },
                ThreadMessage {
                    id: "2".into(),
                    role: "tool".into(),
                    content: "skipped".into(),
                },
            ],
        });
        assert!(matches!(command, Some(ChatCommand::PersistThreadId(Some(_)))));
        assert_eq!(session.thread_id.as_deref(), Some("t2"));
        assert_eq!(session.messages.messages.len(), 1);
        assert!(!session.is_loading_thread());
    }

    #[test]
    fn submitting_during_thread_load_keeps_the_new_message() {
        let mut session = ChatSession::new("m", None);
        let request = select(&mut session, "t1");
        let params = submit(&mut session, "hello");

        assert!(request.cancel_token.is_cancelled());
        assert!(!session.is_loading_thread());

        let command = session.apply_action(ChatAction::ThreadLoaded {
            request_id: request.request_id,
            thread_id: "t1".into(),
            messages: vec![],
        });
        assert!(command.is_none());
        assert!(session.thread_id.is_none());
        assert_eq!(session.messages.messages.len(), 2);
        assert!(!params.cancel_token.is_cancelled());

        chunk(&mut session, params.stream_id, StreamChunk::delta("Hi"));
        assert_eq!(session.messages.messages[1].content, "Hi");
        assert!(session.messages.is_streaming());
    }

    #[test]
    fn cancelled_thread_load_is_silent() {
        let mut session = ChatSession::new("m", None);
        let request = select(&mut session, "t1");
        session.apply_action(ChatAction::ThreadLoadFailed {
            request_id: request.request_id,
            thread_id: "t1".into(),
            error: ApiError::Cancelled,
        });
        assert!(session.take_notices().is_empty());
        assert!(!session.is_loading_thread());

        let request = select(&mut session, "t1");
        session.apply_action(ChatAction::ThreadLoadFailed {
            request_id: request.request_id,
            thread_id: "t1".into(),
            error: ApiError::unknown("not found"),
        });
        let notices = session.take_notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("t1") && notices[0].contains("not found"));
    }

    #[test]
    fn new_thread_resets_everything() {
        let mut session = ChatSession::new("m", Some("t1".into()));
        let params = submit(&mut session, "hi");
        let command = session.apply_action(ChatAction::NewThread);
        assert!(matches!(command, Some(ChatCommand::PersistThreadId(None))));
        assert!(params.cancel_token.is_cancelled());
        assert!(session.messages.messages.is_empty());
        assert!(session.thread_id.is_none());
    }
}
