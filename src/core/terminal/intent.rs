use crate::api::Session;

/// What a user or view asks the terminal store to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalIntent {
    LoadSessions,
    /// Same as `LoadSessions` but bypasses any cached list.
    RefreshSessions,
    SelectSession(String),
    ClearSessionSelection,
    ClearErrors,
}

/// State updates produced by the executor. Only the reducer reads these.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalMessage {
    SessionsLoadingStarted,
    SessionsLoaded(Vec<Session>),
    SessionsLoadFailed(String),
    SessionSelected(Session),
    SessionSelectionCleared,
    ErrorsCleared,
}

/// One-shot notifications for observers. Not retained in state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalLabel {
    SessionsLoadCompleted,
    SessionSelectionCompleted(String),
    ErrorOccurred(String),
}
