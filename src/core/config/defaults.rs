use crate::core::config::data::{Config, RetryPolicy, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::utils::url::normalize_base_url;
use std::time::Duration;

pub const ENV_BASE_URL: &str = "CHATLINE_BASE_URL";
pub const ENV_API_TOKEN: &str = "CHATLINE_API_TOKEN";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 60;

/// A zero timeout would expire on the first poll, so it is raised to one second.
fn timeout_secs(configured: Option<u64>, default: u64) -> Duration {
    Duration::from_secs(configured.unwrap_or(default).max(1))
}

/// Effective settings for talking to the gateway after defaults and
/// environment overrides have been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub model: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub stream_idle_timeout: Duration,
    pub retry: RetryPolicy,
}

impl GatewayConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: normalize_base_url(config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)),
            api_token: None,
            model: config
                .default_model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            connect_timeout: timeout_secs(
                config.connect_timeout_secs,
                DEFAULT_CONNECT_TIMEOUT_SECS,
            ),
            request_timeout: timeout_secs(
                config.request_timeout_secs,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            stream_idle_timeout: timeout_secs(
                config.stream_idle_timeout_secs,
                DEFAULT_STREAM_IDLE_TIMEOUT_SECS,
            ),
            retry: config.retry,
        }
    }

    /// Apply `CHATLINE_BASE_URL` / `CHATLINE_API_TOKEN` using `lookup`.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = normalize_base_url(url.trim());
        }
        if let Some(token) = lookup(ENV_API_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.api_token = Some(token.trim().to_string());
        }
        self
    }

    pub fn with_process_env(self) -> Self {
        self.with_env(|key| std::env::var(key).ok())
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.model = model;
        }
        self
    }

    pub fn with_token_if_missing(mut self, token: Option<String>) -> Self {
        if self.api_token.is_none() {
            self.api_token = token;
        }
        self
    }
}
