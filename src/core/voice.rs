//! Start/stop guard for terminal voice input.

use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug)]
pub enum VoiceInputError {
    /// The recorder could not start (no device, permission denied, ...).
    StartFailed(String),
    StopFailed(String),
}

impl fmt::Display for VoiceInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceInputError::StartFailed(message) => {
                write!(f, "Failed to start voice input: {message}")
            }
            VoiceInputError::StopFailed(message) => {
                write!(f, "Failed to stop voice input: {message}")
            }
        }
    }
}

impl StdError for VoiceInputError {}

/// Platform audio capture.
#[async_trait]
pub trait VoiceRecorder: Send + Sync {
    async fn start(&self) -> Result<(), VoiceInputError>;
    async fn stop(&self) -> Result<(), VoiceInputError>;
}

/// Serializes start and stop so that rapid toggling never starts the
/// recorder twice.
pub struct VoiceInputController<R: VoiceRecorder> {
    recorder: R,
    active: AtomicBool,
    transition: Mutex<()>,
}

impl<R: VoiceRecorder> VoiceInputController<R> {
    pub fn new(recorder: R) -> Self {
        Self {
            recorder,
            active: AtomicBool::new(false),
            transition: Mutex::new(()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    /// Start recording unless already active. Returns whether this call
    /// started it.
    pub async fn start(&self) -> Result<bool, VoiceInputError> {
        if self.is_active() {
            return Ok(false);
        }
        let _guard = self.transition.lock().await;
        self.start_locked().await
    }

    /// Stop recording if active. Returns whether this call stopped it.
    pub async fn stop(&self) -> Result<bool, VoiceInputError> {
        let _guard = self.transition.lock().await;
        self.stop_locked().await
    }

    /// Returns the new active state.
    pub async fn toggle(&self) -> Result<bool, VoiceInputError> {
        let _guard = self.transition.lock().await;
        if self.is_active() {
            self.stop_locked().await?;
            Ok(false)
        } else {
            self.start_locked().await?;
            Ok(true)
        }
    }

    // Callers hold `transition`.
    async fn start_locked(&self) -> Result<bool, VoiceInputError> {
        if self.is_active() {
            return Ok(false);
        }
        self.recorder.start().await?;
        self.active.store(true, Ordering::Release);
        debug!("voice input started");
        Ok(true)
    }

    async fn stop_locked(&self) -> Result<bool, VoiceInputError> {
        if !self.is_active() {
            return Ok(false);
        }
        // Inactive even if the recorder fails to stop cleanly.
        self.active.store(false, Ordering::Release);
        self.recorder.stop().await?;
        debug!("voice input stopped");
        Ok(true)
    }
}
