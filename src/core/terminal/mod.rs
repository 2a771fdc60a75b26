//! Terminal session management as a unidirectional store.
//!
//! Intents go to the [`executor`], which performs repository calls and
//! yields [`TerminalMessage`]s. The pure [`reducer`] folds each message into
//! [`TerminalState`] inside the store task, and [`TerminalLabel`]s are
//! broadcast to whoever is listening.

pub mod executor;
pub mod intent;
pub mod reducer;
pub mod state;
pub mod store;

pub use executor::{Effect, TerminalExecutor};
pub use intent::{TerminalIntent, TerminalLabel, TerminalMessage};
pub use reducer::reduce;
pub use state::TerminalState;
pub use store::TerminalStore;
