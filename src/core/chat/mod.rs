//! Chat view state: one message list fed by at most one live stream.

pub mod actions;
pub mod runtime;
pub mod session;

pub use actions::{ChatAction, ChatActionDispatcher, ChatCommand, ThreadRequest};
pub use runtime::ChatRuntime;
pub use session::ChatSession;
