//! In-memory repositories and fixtures shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::api::{
    ApiError, ApiResult, ChatMessagePayload, ChatRequest, Session, SessionStatus, StreamChunk,
    ThreadMessage,
};
use crate::core::repository::{ChatRepository, SessionRepository};

pub fn chat_request(content: &str) -> ChatRequest {
    ChatRequest {
        model: "test-model".to_string(),
        messages: vec![ChatMessagePayload {
            role: "user".to_string(),
            content: content.to_string(),
        }],
        thread_id: None,
        stream: true,
    }
}

pub fn session(id: &str, name: &str) -> Session {
    let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single().unwrap_or_default();
    Session {
        id: id.to_string(),
        name: name.to_string(),
        status: SessionStatus::Connected,
        created_at: at,
        updated_at: at,
    }
}

/// Replays the same scripted chunks for every stream it opens.
pub struct FakeChatRepository {
    chunks: Vec<ApiResult<StreamChunk>>,
    thread_messages: ApiResult<Vec<ThreadMessage>>,
    pub streams_opened: AtomicUsize,
}

impl FakeChatRepository {
    pub fn with_chunks(chunks: Vec<ApiResult<StreamChunk>>) -> Self {
        Self {
            chunks,
            thread_messages: Ok(Vec::new()),
            streams_opened: AtomicUsize::new(0),
        }
    }

    pub fn with_thread_messages(mut self, messages: Vec<ThreadMessage>) -> Self {
        self.thread_messages = Ok(messages);
        self
    }
}

impl ChatRepository for FakeChatRepository {
    fn stream_chat(
        &self,
        _request: ChatRequest,
        _cancel: CancellationToken,
    ) -> BoxStream<'static, ApiResult<StreamChunk>> {
        self.streams_opened.fetch_add(1, Ordering::SeqCst);
        stream::iter(self.chunks.clone()).boxed()
    }

    fn get_thread_messages(
        &self,
        _thread_id: &str,
    ) -> BoxStream<'static, ApiResult<Vec<ThreadMessage>>> {
        stream::once(futures_util::future::ready(self.thread_messages.clone())).boxed()
    }
}

/// Session repository with scripted answers and call bookkeeping.
///
/// `get_sessions` pops one scripted response per call (falling back to an
/// empty list); `get_session` answers from a per-id table after an
/// optional delay.
#[derive(Default)]
pub struct FakeSessionRepository {
    sessions_responses: Mutex<VecDeque<Vec<ApiResult<Vec<Session>>>>>,
    session_responses: Mutex<HashMap<String, ApiResult<Session>>>,
    session_delay: Option<Duration>,
    force_refresh_calls: Mutex<Vec<bool>>,
    session_fetches: AtomicUsize,
}

impl FakeSessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the items emitted by the next `get_sessions` call.
    pub fn push_sessions_response(self, items: Vec<ApiResult<Vec<Session>>>) -> Self {
        if let Ok(mut queue) = self.sessions_responses.lock() {
            queue.push_back(items);
        }
        self
    }

    pub fn with_session(self, id: &str, result: ApiResult<Session>) -> Self {
        if let Ok(mut table) = self.session_responses.lock() {
            table.insert(id.to_string(), result);
        }
        self
    }

    pub fn with_session_delay(mut self, delay: Duration) -> Self {
        self.session_delay = Some(delay);
        self
    }

    pub fn force_refresh_calls(&self) -> Vec<bool> {
        self.force_refresh_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn session_fetches(&self) -> usize {
        self.session_fetches.load(Ordering::SeqCst)
    }
}

impl SessionRepository for FakeSessionRepository {
    fn get_sessions(&self, force_refresh: bool) -> BoxStream<'static, ApiResult<Vec<Session>>> {
        if let Ok(mut calls) = self.force_refresh_calls.lock() {
            calls.push(force_refresh);
        }
        let items = self
            .sessions_responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| vec![Ok(Vec::new())]);
        stream::iter(items).boxed()
    }

    fn get_session(&self, id: &str) -> BoxStream<'static, ApiResult<Session>> {
        self.session_fetches.fetch_add(1, Ordering::SeqCst);
        let result = self
            .session_responses
            .lock()
            .ok()
            .and_then(|table| table.get(id).cloned())
            .unwrap_or_else(|| Err(ApiError::from_status(404, "not found")));
        let delay = self.session_delay;
        stream::once(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        })
        .boxed()
    }
}
