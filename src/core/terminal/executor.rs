use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::intent::{TerminalIntent, TerminalLabel, TerminalMessage};
use super::state::TerminalState;
use crate::api::{ApiError, ApiResult, Session};
use crate::core::repository::SessionRepository;

/// Output of the executor, applied by the store in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Message(TerminalMessage),
    Label(TerminalLabel),
}

/// Results of background fetches, handed back to the store task.
#[derive(Debug)]
pub enum ExecutorEvent {
    SessionsFetched(ApiResult<Vec<Session>>),
    /// The sessions stream ended. `received` is false when it yielded nothing.
    SessionsFetchFinished { received: bool, last_ok: bool },
    SessionFetched {
        request_id: u64,
        session_id: String,
        result: ApiResult<Session>,
    },
}

struct SelectionSlot {
    request_id: u64,
    session_id: String,
    cancel_token: CancellationToken,
}

/// Turns intents into messages and labels.
///
/// Lives inside the store task; it never touches state, it only reads the
/// snapshot it is given. Repository calls run on spawned tasks and report
/// back through `events`.
pub struct TerminalExecutor {
    repository: Arc<dyn SessionRepository>,
    events: mpsc::UnboundedSender<ExecutorEvent>,
    shutdown: CancellationToken,
    selection: Option<SelectionSlot>,
    last_selection_id: u64,
}

impl TerminalExecutor {
    pub fn new(
        repository: Arc<dyn SessionRepository>,
        events: mpsc::UnboundedSender<ExecutorEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            repository,
            events,
            shutdown,
            selection: None,
            last_selection_id: 0,
        }
    }

    pub fn execute_intent(&mut self, intent: TerminalIntent, state: &TerminalState) -> Vec<Effect> {
        match intent {
            TerminalIntent::LoadSessions => self.load_sessions(false),
            TerminalIntent::RefreshSessions => self.load_sessions(true),
            TerminalIntent::SelectSession(id) => self.select_session(id, state),
            TerminalIntent::ClearSessionSelection => {
                self.cancel_selection();
                vec![Effect::Message(TerminalMessage::SessionSelectionCleared)]
            }
            TerminalIntent::ClearErrors => vec![Effect::Message(TerminalMessage::ErrorsCleared)],
        }
    }

    pub fn handle_event(&mut self, event: ExecutorEvent) -> Vec<Effect> {
        match event {
            ExecutorEvent::SessionsFetched(Ok(sessions)) => {
                debug!(count = sessions.len(), "sessions loaded");
                vec![Effect::Message(TerminalMessage::SessionsLoaded(sessions))]
            }
            ExecutorEvent::SessionsFetched(Err(err)) => {
                if err.is_cancelled() {
                    return Vec::new();
                }
                failure(format!("Failed to load sessions: {err}"))
            }
            ExecutorEvent::SessionsFetchFinished { received, last_ok } => {
                if !received {
                    failure(format!(
                        "Failed to load sessions: {}",
                        ApiError::unknown("Empty response")
                    ))
                } else if last_ok {
                    vec![Effect::Label(TerminalLabel::SessionsLoadCompleted)]
                } else {
                    Vec::new()
                }
            }
            ExecutorEvent::SessionFetched {
                request_id,
                session_id,
                result,
            } => {
                let is_current = self
                    .selection
                    .as_ref()
                    .is_some_and(|slot| slot.request_id == request_id);
                if !is_current {
                    debug!(request_id, %session_id, "dropping stale session fetch");
                    return Vec::new();
                }
                self.selection = None;
                match result {
                    Ok(session) => selected(session),
                    Err(err) if err.is_cancelled() => Vec::new(),
                    Err(err) => failure(format!("Failed to load session {session_id}: {err}")),
                }
            }
        }
    }

    fn load_sessions(&self, force_refresh: bool) -> Vec<Effect> {
        let mut results = self.repository.get_sessions(force_refresh);
        let events = self.events.clone();
        let cancel_token = self.shutdown.child_token();

        tokio::spawn(async move {
            let mut received = false;
            let mut last_ok = false;
            loop {
                let item = tokio::select! {
                    item = results.next() => item,
                    _ = cancel_token.cancelled() => return,
                };
                let Some(result) = item else { break };
                received = true;
                last_ok = result.is_ok();
                if events.send(ExecutorEvent::SessionsFetched(result)).is_err() {
                    return;
                }
            }
            let _ = events.send(ExecutorEvent::SessionsFetchFinished { received, last_ok });
        });

        vec![Effect::Message(TerminalMessage::SessionsLoadingStarted)]
    }

    fn select_session(&mut self, id: String, state: &TerminalState) -> Vec<Effect> {
        if state.is_selected(&id) {
            self.cancel_selection();
            return vec![Effect::Label(TerminalLabel::SessionSelectionCompleted(id))];
        }
        if self
            .selection
            .as_ref()
            .is_some_and(|slot| slot.session_id == id)
        {
            debug!(session_id = %id, "session fetch already in flight");
            return Vec::new();
        }
        self.cancel_selection();

        if let Some(session) = state.find_session(&id) {
            return selected(session.clone());
        }

        self.last_selection_id += 1;
        let request_id = self.last_selection_id;
        let cancel_token = self.shutdown.child_token();
        self.selection = Some(SelectionSlot {
            request_id,
            session_id: id.clone(),
            cancel_token: cancel_token.clone(),
        });

        let mut results = self.repository.get_session(&id);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                item = results.next() => {
                    item.unwrap_or_else(|| Err(ApiError::unknown("Empty response")))
                }
                _ = cancel_token.cancelled() => return,
            };
            let _ = events.send(ExecutorEvent::SessionFetched {
                request_id,
                session_id: id,
                result,
            });
        });

        Vec::new()
    }

    fn cancel_selection(&mut self) {
        if let Some(slot) = self.selection.take() {
            debug!(session_id = %slot.session_id, "cancelling session fetch");
            slot.cancel_token.cancel();
        }
    }
}

fn selected(session: Session) -> Vec<Effect> {
    let id = session.id.clone();
    vec![
        Effect::Message(TerminalMessage::SessionSelected(session)),
        Effect::Label(TerminalLabel::SessionSelectionCompleted(id)),
    ]
}

fn failure(message: String) -> Vec<Effect> {
    warn!("{message}");
    vec![
        Effect::Message(TerminalMessage::SessionsLoadFailed(message.clone())),
        Effect::Label(TerminalLabel::ErrorOccurred(message)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{session, FakeSessionRepository};
    use std::time::Duration;

    fn executor(
        repository: FakeSessionRepository,
    ) -> (
        TerminalExecutor,
        mpsc::UnboundedReceiver<ExecutorEvent>,
        Arc<FakeSessionRepository>,
    ) {
        let repository = Arc::new(repository);
        let (tx, rx) = mpsc::unbounded_channel();
        let executor = TerminalExecutor::new(repository.clone(), tx, CancellationToken::new());
        (executor, rx, repository)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<ExecutorEvent>) -> ExecutorEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for executor event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn load_emits_loading_then_results_then_completion() {
        let repo = FakeSessionRepository::new()
            .push_sessions_response(vec![Ok(vec![session("s1", "alpha")])]);
        let (mut executor, mut rx, repo) = executor(repo);

        let immediate = executor.execute_intent(TerminalIntent::LoadSessions, &TerminalState::default());
        assert_eq!(
            immediate,
            vec![Effect::Message(TerminalMessage::SessionsLoadingStarted)]
        );

        let loaded = executor.handle_event(next_event(&mut rx).await);
        assert!(matches!(
            loaded.as_slice(),
            [Effect::Message(TerminalMessage::SessionsLoaded(list))] if list.len() == 1
        ));
        let finished = executor.handle_event(next_event(&mut rx).await);
        assert_eq!(
            finished,
            vec![Effect::Label(TerminalLabel::SessionsLoadCompleted)]
        );
        assert_eq!(repo.force_refresh_calls(), vec![false]);
    }

    #[tokio::test]
    async fn refresh_forces_network() {
        let (mut executor, _rx, repo) = executor(FakeSessionRepository::new());
        executor.execute_intent(TerminalIntent::RefreshSessions, &TerminalState::default());
        assert_eq!(repo.force_refresh_calls(), vec![true]);
    }

    #[tokio::test]
    async fn load_failure_is_formatted_with_context() {
        let repo = FakeSessionRepository::new()
            .push_sessions_response(vec![Err(ApiError::network("connection refused"))]);
        let (mut executor, mut rx, _repo) = executor(repo);
        executor.execute_intent(TerminalIntent::LoadSessions, &TerminalState::default());

        let effects = executor.handle_event(next_event(&mut rx).await);
        let expected = "Failed to load sessions: Network error: connection refused".to_string();
        assert_eq!(
            effects,
            vec![
                Effect::Message(TerminalMessage::SessionsLoadFailed(expected.clone())),
                Effect::Label(TerminalLabel::ErrorOccurred(expected)),
            ]
        );
        assert!(executor.handle_event(next_event(&mut rx).await).is_empty());
    }

    #[tokio::test]
    async fn selecting_already_selected_session_only_publishes_label() {
        let (mut executor, _rx, repo) = executor(FakeSessionRepository::new());
        let state = TerminalState {
            selected_session: Some(session("s1", "alpha")),
            ..Default::default()
        };
        let effects = executor.execute_intent(TerminalIntent::SelectSession("s1".into()), &state);
        assert_eq!(
            effects,
            vec![Effect::Label(TerminalLabel::SessionSelectionCompleted(
                "s1".into()
            ))]
        );
        assert_eq!(repo.session_fetches(), 0);
    }

    #[tokio::test]
    async fn locally_known_session_is_selected_without_fetch() {
        let (mut executor, _rx, repo) = executor(FakeSessionRepository::new());
        let state = TerminalState {
            sessions: vec![session("s2", "beta")],
            ..Default::default()
        };
        let effects = executor.execute_intent(TerminalIntent::SelectSession("s2".into()), &state);
        assert_eq!(effects, selected(session("s2", "beta")));
        assert_eq!(repo.session_fetches(), 0);
    }

    #[tokio::test]
    async fn newer_selection_cancels_in_flight_fetch() {
        let repo = FakeSessionRepository::new()
            .with_session("s1", Ok(session("s1", "alpha")))
            .with_session("s2", Ok(session("s2", "beta")))
            .with_session_delay(Duration::from_millis(20));
        let (mut executor, mut rx, repo) = executor(repo);
        let state = TerminalState::default();

        executor.execute_intent(TerminalIntent::SelectSession("s1".into()), &state);
        executor.execute_intent(TerminalIntent::SelectSession("s2".into()), &state);
        assert_eq!(repo.session_fetches(), 2);

        let effects = executor.handle_event(next_event(&mut rx).await);
        assert_eq!(effects, selected(session("s2", "beta")));
    }

    #[tokio::test]
    async fn reselecting_current_session_cancels_in_flight_fetch() {
        let repo = FakeSessionRepository::new()
            .with_session("s2", Ok(session("s2", "beta")))
            .with_session_delay(Duration::from_millis(20));
        let (mut executor, mut rx, repo) = executor(repo);
        let state = TerminalState {
            selected_session: Some(session("s1", "alpha")),
            ..Default::default()
        };

        executor.execute_intent(TerminalIntent::SelectSession("s2".into()), &state);
        let effects = executor.execute_intent(TerminalIntent::SelectSession("s1".into()), &state);
        assert_eq!(
            effects,
            vec![Effect::Label(TerminalLabel::SessionSelectionCompleted(
                "s1".into()
            ))]
        );
        assert_eq!(repo.session_fetches(), 1);
        assert!(tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn clearing_selection_cancels_fetch() {
        let repo = FakeSessionRepository::new()
            .with_session("s1", Ok(session("s1", "alpha")))
            .with_session_delay(Duration::from_millis(20));
        let (mut executor, mut rx, _repo) = executor(repo);

        executor.execute_intent(TerminalIntent::SelectSession("s1".into()), &TerminalState::default());
        let effects =
            executor.execute_intent(TerminalIntent::ClearSessionSelection, &TerminalState::default());
        assert_eq!(
            effects,
            vec![Effect::Message(TerminalMessage::SessionSelectionCleared)]
        );
        assert!(tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .is_err());
    }
}
