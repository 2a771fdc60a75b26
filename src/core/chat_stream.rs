use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{ApiError, ChatRequest, StreamChunk};
use crate::core::repository::ChatRepository;

/// A chunk tagged with the stream it belongs to.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamEnvelope {
    pub stream_id: u64,
    pub chunk: StreamChunk,
}

pub struct StreamParams {
    pub request: ChatRequest,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

/// Runs chat streams in the background and forwards their chunks.
///
/// Every stream ends with exactly one terminal chunk on the channel unless
/// it was cancelled, in which case nothing more is sent for it.
#[derive(Clone)]
pub struct ChatStreamService {
    repository: Arc<dyn ChatRepository>,
    tx: mpsc::UnboundedSender<StreamEnvelope>,
}

fn transport_error_chunk(err: &ApiError) -> StreamChunk {
    StreamChunk::error(err.to_string())
}

impl ChatStreamService {
    pub fn new(
        repository: Arc<dyn ChatRepository>,
    ) -> (Self, mpsc::UnboundedReceiver<StreamEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { repository, tx }, rx)
    }

    pub fn spawn_stream(&self, params: StreamParams) {
        let StreamParams {
            request,
            cancel_token,
            stream_id,
        } = params;
        let tx = self.tx.clone();
        let mut chunks = self.repository.stream_chat(request, cancel_token.clone());

        tokio::spawn(async move {
            debug!(stream_id, "chat stream started");
            tokio::select! {
                _ = async {
                    while let Some(item) = chunks.next().await {
                        let chunk = match item {
                            Ok(chunk) => chunk,
                            Err(ApiError::Cancelled) => return,
                            Err(err) => {
                                debug!(stream_id, error = %err, "chat stream failed");
                                transport_error_chunk(&err)
                            }
                        };
                        let terminal = chunk.is_terminal();
                        if tx.send(StreamEnvelope { stream_id, chunk }).is_err() || terminal {
                            return;
                        }
                    }
                    // Body closed without a terminal chunk.
                    let _ = tx.send(StreamEnvelope {
                        stream_id,
                        chunk: StreamChunk::done(),
                    });
                } => {}
                _ = cancel_token.cancelled() => {
                    debug!(stream_id, "chat stream cancelled");
                }
            }
        });
    }
}
