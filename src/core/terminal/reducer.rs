use super::intent::TerminalMessage;
use super::state::TerminalState;

pub fn reduce(mut state: TerminalState, message: TerminalMessage) -> TerminalState {
    match message {
        TerminalMessage::SessionsLoadingStarted => {
            state.is_loading_sessions = true;
            state.sessions_error = None;
        }
        TerminalMessage::SessionsLoaded(sessions) => {
            state.sessions = sessions;
            state.is_loading_sessions = false;
            state.sessions_error = None;
        }
        TerminalMessage::SessionsLoadFailed(error) => {
            // The previous list stays visible under the error.
            state.is_loading_sessions = false;
            state.sessions_error = Some(error);
        }
        TerminalMessage::SessionSelected(session) => {
            state.selected_session = Some(session);
            state.sessions_error = None;
        }
        TerminalMessage::SessionSelectionCleared => {
            state.selected_session = None;
        }
        TerminalMessage::ErrorsCleared => {
            state.sessions_error = None;
        }
    }
    state
}
