//! Chatline is a terminal client for a streaming LLM chat gateway that also
//! manages the gateway's remote terminal sessions.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`api`] defines the wire model, the typed error taxonomy, and the HTTP
//!   gateway client including SSE decoding.
//! - [`core`] owns runtime state: the chat stream reducer and session
//!   controller, the terminal session store, configuration, and voice input.
//! - [`auth`] keeps the gateway token in the system keyring.
//! - [`cli`] parses arguments and drives the stores for one-shot commands.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod auth;
pub mod cli;
pub mod core;
pub mod utils;
