//! Shared constants used across the application

/// Shown when the gateway reports a stream error without a message.
pub const UNKNOWN_STREAM_ERROR: &str = "Something went wrong while generating a response.";

/// Prefix for locally allocated message ids.
pub const LOCAL_MESSAGE_ID_PREFIX: &str = "local";

/// Capacity of the label broadcast channel of a terminal store.
pub const LABEL_CHANNEL_CAPACITY: usize = 32;
