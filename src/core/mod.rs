pub mod chat;
pub mod chat_stream;
pub mod config;
pub mod constants;
pub mod message;
pub mod repository;
pub mod stream_reducer;
pub mod terminal;
pub mod voice;
