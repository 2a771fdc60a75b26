use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, ThreadMessage};
use crate::core::chat_stream::{StreamEnvelope, StreamParams};

pub enum ChatAction {
    SubmitMessage {
        content: String,
    },
    StreamChunk(StreamEnvelope),
    CancelStreaming,
    SelectThread {
        thread_id: String,
    },
    ThreadLoaded {
        request_id: u64,
        thread_id: String,
        messages: Vec<ThreadMessage>,
    },
    ThreadLoadFailed {
        request_id: u64,
        thread_id: String,
        error: ApiError,
    },
    NewThread,
}

pub struct ThreadRequest {
    pub thread_id: String,
    pub request_id: u64,
    pub cancel_token: CancellationToken,
}

/// Side effects requested by a state transition.
pub enum ChatCommand {
    SpawnStream(StreamParams),
    LoadThread(ThreadRequest),
    /// Remember (or forget) the current thread across runs.
    PersistThreadId(Option<String>),
}

#[derive(Clone)]
pub struct ChatActionDispatcher {
    tx: mpsc::UnboundedSender<ChatAction>,
}

impl ChatActionDispatcher {
    pub fn new(tx: mpsc::UnboundedSender<ChatAction>) -> Self {
        Self { tx }
    }

    pub fn dispatch(&self, action: ChatAction) {
        let _ = self.tx.send(action);
    }

    pub fn dispatch_many<I>(&self, actions: I)
    where
        I: IntoIterator<Item = ChatAction>,
    {
        for action in actions {
            self.dispatch(action);
        }
    }
}
