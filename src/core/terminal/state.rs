use crate::api::Session;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerminalState {
    pub sessions: Vec<Session>,
    pub selected_session: Option<Session>,
    pub is_loading_sessions: bool,
    /// Last load or selection failure, shown on top of the stale list.
    pub sessions_error: Option<String>,
}

impl TerminalState {
    pub fn find_session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id == id)
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected_session
            .as_ref()
            .is_some_and(|session| session.id == id)
    }
}
