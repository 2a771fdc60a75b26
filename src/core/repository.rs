//! Seams between the stores and whatever actually talks to the gateway.

use futures_util::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiResult, ChatRequest, Session, StreamChunk, ThreadMessage};

/// Source of remote terminal sessions.
///
/// Each call yields a stream: implementations may emit a cached value
/// before the fresh one, so consumers must handle more than one item.
pub trait SessionRepository: Send + Sync {
    fn get_sessions(&self, force_refresh: bool) -> BoxStream<'static, ApiResult<Vec<Session>>>;

    fn get_session(&self, id: &str) -> BoxStream<'static, ApiResult<Session>>;
}

pub trait ChatRepository: Send + Sync {
    /// Open a streaming chat completion. The stream ends after the first
    /// terminal chunk or when `cancel` fires.
    fn stream_chat(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> BoxStream<'static, ApiResult<StreamChunk>>;

    fn get_thread_messages(&self, thread_id: &str) -> BoxStream<'static, ApiResult<Vec<ThreadMessage>>>;
}
