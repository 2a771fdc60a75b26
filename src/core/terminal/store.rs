use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::executor::{Effect, ExecutorEvent, TerminalExecutor};
use super::intent::{TerminalIntent, TerminalLabel};
use super::reducer::reduce;
use super::state::TerminalState;
use crate::core::constants::LABEL_CHANNEL_CAPACITY;
use crate::core::repository::SessionRepository;

/// Handle to a running terminal store.
///
/// The state is owned by a single task; this handle only sends intents and
/// hands out receivers. Dropping the handle stops the task.
pub struct TerminalStore {
    intents: mpsc::UnboundedSender<TerminalIntent>,
    state: watch::Receiver<TerminalState>,
    labels: broadcast::Sender<TerminalLabel>,
    shutdown: CancellationToken,
}

struct StoreTask {
    state: TerminalState,
    executor: TerminalExecutor,
    state_tx: watch::Sender<TerminalState>,
    labels: broadcast::Sender<TerminalLabel>,
}

impl StoreTask {
    /// Labels go out after the state they describe has been published.
    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Message(message) => {
                    self.state = reduce(std::mem::take(&mut self.state), message);
                    self.state_tx.send_replace(self.state.clone());
                }
                Effect::Label(label) => {
                    // No subscribers is fine.
                    let _ = self.labels.send(label);
                }
            }
        }
    }

    async fn run(
        mut self,
        mut intents: mpsc::UnboundedReceiver<TerminalIntent>,
        mut events: mpsc::UnboundedReceiver<ExecutorEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            let effects = tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(intent) = intents.recv() => {
                    debug!(?intent, "terminal intent");
                    self.executor.execute_intent(intent, &self.state)
                }
                Some(event) = events.recv() => self.executor.handle_event(event),
                else => break,
            };
            self.apply(effects);
        }
        debug!("terminal store stopped");
    }
}

impl TerminalStore {
    /// Start a store with empty state and kick off the initial session load.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(repository: Arc<dyn SessionRepository>) -> Self {
        let shutdown = CancellationToken::new();
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (labels, _) = broadcast::channel(LABEL_CHANNEL_CAPACITY);

        let executor = TerminalExecutor::new(repository, event_tx, shutdown.clone());
        let (state_tx, mut state) = watch::channel(TerminalState::default());
        let mut task = StoreTask {
            state: TerminalState::default(),
            executor,
            state_tx,
            labels: labels.clone(),
        };
        // The initial load is part of the state every subscriber starts from.
        let effects = task
            .executor
            .execute_intent(TerminalIntent::LoadSessions, &task.state);
        task.apply(effects);
        state.borrow_and_update();

        tokio::spawn(task.run(intent_rx, event_rx, shutdown.clone()));

        Self {
            intents: intent_tx,
            state,
            labels,
            shutdown,
        }
    }

    pub fn dispatch(&self, intent: TerminalIntent) {
        if self.intents.send(intent).is_err() {
            debug!("terminal store already stopped");
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> TerminalState {
        self.state.borrow().clone()
    }

    /// Receiver that starts at the latest state and sees every later one.
    pub fn subscribe_state(&self) -> watch::Receiver<TerminalState> {
        self.state.clone()
    }

    pub fn subscribe_labels(&self) -> broadcast::Receiver<TerminalLabel> {
        self.labels.subscribe()
    }

    /// Stop the store task and every fetch it started.
    pub fn dispose(self) {}
}

impl Drop for TerminalStore {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
