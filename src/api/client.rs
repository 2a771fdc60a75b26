use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::error::{ApiError, ApiResult, TimeoutPhase};
use crate::api::sse::{parse_sse_line, SseEvent, SseLineBuffer};
use crate::api::{
    ChatRequest, Session, SessionsResponse, StreamChunk, ThreadMessage, ThreadMessagesResponse,
};
use crate::core::config::GatewayConfig;
use crate::core::repository::{ChatRepository, SessionRepository};
use crate::utils::auth::add_auth_headers;
use crate::utils::url::{construct_api_url, is_valid_path_segment};

type ByteChunks = BoxStream<'static, reqwest::Result<Vec<u8>>>;

/// HTTP client for the chat gateway.
///
/// Cloning is cheap: the connection pool, configuration and the
/// last-known session list are shared between clones.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    config: Arc<GatewayConfig>,
    last_sessions: Arc<Mutex<Option<Vec<Session>>>>,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|err| ApiError::unknown(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            http,
            config: Arc::new(config),
            last_sessions: Arc::new(Mutex::new(None)),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        construct_api_url(&self.config.base_url, endpoint)
    }

    async fn get_json_once<T: DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        let request = self
            .http
            .get(url)
            .timeout(self.config.request_timeout)
            .header("Accept", "application/json");
        let response = add_auth_headers(request, self.config.api_token.as_deref())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), &body));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// GET with the configured retry policy applied to retryable failures.
    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<T> {
        let url = self.url(endpoint);
        let policy = self.config.retry;
        let mut attempt = 1;
        loop {
            match self.get_json_once(&url).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < policy.attempts() => {
                    let delay = policy.backoff_for(attempt);
                    debug!(%url, attempt, ?delay, error = %err, "retrying gateway request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn cached_sessions(&self) -> Option<Vec<Session>> {
        self.last_sessions
            .lock()
            .ok()
            .and_then(|cache| cache.clone())
    }

    fn remember_sessions(&self, sessions: &[Session]) {
        if let Ok(mut cache) = self.last_sessions.lock() {
            *cache = Some(sessions.to_vec());
        }
    }

    async fn open_chat_stream(&self, request: ChatRequest) -> ApiResult<ByteChunks> {
        let http_request = self
            .http
            .post(self.url("chat/completions"))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream");
        let response = add_auth_headers(http_request, self.config.api_token.as_deref())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ApiError::from_status(status.as_u16(), &body));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed())
    }
}

fn invalid_id(kind: &str, id: &str) -> ApiError {
    ApiError::validation(format!("invalid {kind} id '{id}'"))
}

impl SessionRepository for GatewayClient {
    fn get_sessions(&self, force_refresh: bool) -> BoxStream<'static, ApiResult<Vec<Session>>> {
        let cached = if force_refresh {
            None
        } else {
            self.cached_sessions()
        };
        let client = self.clone();
        let fresh = stream::once(async move {
            let response: ApiResult<SessionsResponse> = client.get_json("terminal/sessions").await;
            response.map(|body| {
                client.remember_sessions(&body.sessions);
                body.sessions
            })
        });
        stream::iter(cached.map(Ok)).chain(fresh).boxed()
    }

    fn get_session(&self, id: &str) -> BoxStream<'static, ApiResult<Session>> {
        if !is_valid_path_segment(id) {
            return stream::iter([Err(invalid_id("session", id))]).boxed();
        }
        let client = self.clone();
        let endpoint = format!("terminal/sessions/{id}");
        stream::once(async move { client.get_json::<Session>(&endpoint).await }).boxed()
    }
}

impl ChatRepository for GatewayClient {
    fn stream_chat(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> BoxStream<'static, ApiResult<StreamChunk>> {
        let client = self.clone();
        let idle_timeout = self.config.stream_idle_timeout;
        stream::once(async move { client.open_chat_stream(request).await })
            .flat_map(move |opened| match opened {
                Ok(body) => sse_chunks(body, idle_timeout, cancel.clone()),
                Err(err) => stream::iter([Err(err)]).boxed(),
            })
            .boxed()
    }

    fn get_thread_messages(
        &self,
        thread_id: &str,
    ) -> BoxStream<'static, ApiResult<Vec<ThreadMessage>>> {
        if !is_valid_path_segment(thread_id) {
            return stream::iter([Err(invalid_id("thread", thread_id))]).boxed();
        }
        let client = self.clone();
        let endpoint = format!("threads/{thread_id}/messages");
        stream::once(async move {
            client
                .get_json::<ThreadMessagesResponse>(&endpoint)
                .await
                .map(|body| body.messages)
        })
        .boxed()
    }
}

struct SseReader {
    body: ByteChunks,
    lines: SseLineBuffer,
    pending: VecDeque<ApiResult<StreamChunk>>,
    idle_timeout: Duration,
    cancel: CancellationToken,
    finished: bool,
}

impl SseReader {
    fn handle_line(&mut self, line: &str) {
        if self.finished {
            return;
        }
        match parse_sse_line(line) {
            None => {}
            Some(SseEvent::End) => self.finished = true,
            Some(SseEvent::Chunk(chunk)) => {
                self.finished = chunk.is_terminal();
                self.pending.push_back(Ok(chunk));
            }
            Some(SseEvent::Malformed(detail)) => {
                self.finished = true;
                self.pending
                    .push_back(Err(ApiError::Serialization { message: detail }));
            }
        }
    }

    fn drain_lines(&mut self) {
        while let Some(line) = self.lines.next_line() {
            match line {
                Ok(line) => self.handle_line(&line),
                Err(raw) => debug!(len = raw.len(), "skipping non-UTF-8 stream line"),
            }
        }
    }

    async fn next_item(&mut self) -> Option<ApiResult<StreamChunk>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            if self.finished || self.cancel.is_cancelled() {
                return None;
            }

            match tokio::time::timeout(self.idle_timeout, self.body.next()).await {
                Err(_) => {
                    self.finished = true;
                    return Some(Err(ApiError::timeout(
                        TimeoutPhase::Streaming,
                        format!("no data for {}s", self.idle_timeout.as_secs()),
                    )));
                }
                Ok(None) => {
                    if let Some(rest) = self.lines.take_remainder() {
                        self.handle_line(&rest);
                    }
                    self.finished = true;
                }
                Ok(Some(Err(err))) => {
                    self.finished = true;
                    return Some(Err(ApiError::from(err)));
                }
                Ok(Some(Ok(bytes))) => {
                    self.lines.extend(&bytes);
                    self.drain_lines();
                }
            }
        }
    }
}

/// Turn an SSE body into chunks. Ends after a terminal chunk, `[DONE]`,
/// a transport failure, the idle timeout, or cancellation.
fn sse_chunks(
    body: ByteChunks,
    idle_timeout: Duration,
    cancel: CancellationToken,
) -> BoxStream<'static, ApiResult<StreamChunk>> {
    let reader = SseReader {
        body,
        lines: SseLineBuffer::default(),
        pending: VecDeque::new(),
        idle_timeout,
        cancel,
        finished: false,
    };
    stream::unfold(reader, |mut reader| async move {
        let item = reader.next_item().await?;
        Some((item, reader))
    })
    .boxed()
}
