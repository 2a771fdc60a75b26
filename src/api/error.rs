use std::error::Error as StdError;
use std::fmt;

pub type ApiResult<T> = Result<T, ApiError>;

/// Which part of a request ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    Connection,
    Request,
    Socket,
    Streaming,
}

impl TimeoutPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeoutPhase::Connection => "connection",
            TimeoutPhase::Request => "request",
            TimeoutPhase::Socket => "socket",
            TimeoutPhase::Streaming => "streaming",
        }
    }
}

/// What the user can reasonably do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Retry,
    Reauthenticate,
    ContactSupport,
    Dismiss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Failures produced by gateway calls.
///
/// Every variant keeps the underlying message so `Display` can show it
/// verbatim; callers add their own context in front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request never reached the server (DNS, refused connection, reset).
    Network { message: String },
    /// The server answered with a non-success status.
    Http { status: u16, message: String },
    /// A body could not be encoded or decoded.
    Serialization { message: String },
    /// The request was rejected locally before being sent.
    Validation { message: String },
    Timeout { phase: TimeoutPhase, message: String },
    /// The gateway rejected the credentials (401/403).
    Authentication { message: String },
    Unknown { message: String },
    /// The caller cancelled the operation. Never shown to the user.
    Cancelled,
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        ApiError::Network {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        ApiError::Unknown {
            message: message.into(),
        }
    }

    pub fn timeout(phase: TimeoutPhase, message: impl Into<String>) -> Self {
        ApiError::Timeout {
            phase,
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP status and its body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = summarize_error_body(body);
        match status {
            401 | 403 => ApiError::Authentication { message },
            _ => ApiError::Http { status, message },
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network { .. } | ApiError::Timeout { .. } => true,
            ApiError::Http { status, .. } => {
                matches!(status, 408 | 429) || (500..600).contains(status)
            }
            ApiError::Serialization { .. }
            | ApiError::Validation { .. }
            | ApiError::Authentication { .. }
            | ApiError::Unknown { .. }
            | ApiError::Cancelled => false,
        }
    }

    pub fn user_action(&self) -> UserAction {
        match self {
            ApiError::Authentication { .. } => UserAction::Reauthenticate,
            ApiError::Serialization { .. } => UserAction::ContactSupport,
            ApiError::Validation { .. } | ApiError::Cancelled => UserAction::Dismiss,
            _ if self.is_retryable() => UserAction::Retry,
            ApiError::Unknown { .. } => UserAction::ContactSupport,
            _ => UserAction::Dismiss,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ApiError::Cancelled => ErrorSeverity::Info,
            ApiError::Validation { .. } | ApiError::Network { .. } | ApiError::Timeout { .. } => {
                ErrorSeverity::Warning
            }
            ApiError::Http { .. } | ApiError::Unknown { .. } => ErrorSeverity::Error,
            ApiError::Authentication { .. } | ApiError::Serialization { .. } => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network { message } => write!(f, "Network error: {message}"),
            ApiError::Http { status, message } => write!(f, "HTTP {status}: {message}"),
            ApiError::Serialization { message } => write!(f, "Malformed response: {message}"),
            ApiError::Validation { message } => write!(f, "{message}"),
            ApiError::Timeout { phase, message } => {
                write!(f, "Timed out ({}): {message}", phase.as_str())
            }
            ApiError::Authentication { message } => {
                write!(f, "Authentication failed: {message}")
            }
            ApiError::Unknown { message } => write!(f, "{message}"),
            ApiError::Cancelled => write!(f, "Request cancelled"),
        }
    }
}

impl StdError for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            ApiError::timeout(TimeoutPhase::Request, message)
        } else if err.is_connect() {
            ApiError::Network { message }
        } else if err.is_decode() {
            ApiError::Serialization { message }
        } else if let Some(status) = err.status() {
            ApiError::from_status(status.as_u16(), &message)
        } else if err.is_request() || err.is_body() {
            ApiError::Network { message }
        } else {
            ApiError::Unknown { message }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Pull a human-readable summary out of an error body.
///
/// Gateways answer with `{"error":{"message":..}}`, `{"error":".."}` or
/// `{"message":..}`; anything else is returned trimmed and whitespace
/// collapsed.
pub fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty response>".to_string();
    }

    let summary = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
                .or_else(|| {
                    value
                        .get("error")
                        .and_then(|v| v.as_str().map(str::to_owned))
                })
                .or_else(|| {
                    value
                        .get("message")
                        .and_then(|v| v.as_str().map(str::to_owned))
                })
        })
        .unwrap_or_else(|| trimmed.to_string());

    summary.split_whitespace().collect::<Vec<_>>().join(" ")
}
