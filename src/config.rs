//! Environment configuration.

use std::env;
use std::time::Duration;

use tutor_api::url::DEFAULT_TUTOR_BASE_URL;
use tutor_api::TutorApiConfig;

use crate::session::{SessionOptions, DEFAULT_SEND_TIMEOUT};

pub const BASE_URL_VAR: &str = "TUTOR_API_BASE_URL";
pub const TOKEN_VAR: &str = "TUTOR_API_TOKEN";
pub const SEND_TIMEOUT_VAR: &str = "TUTOR_SEND_TIMEOUT_MS";
pub const LOG_VAR: &str = "TUTOR_LOG";

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub send_timeout: Duration,
    pub log_filter: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            api_base_url: env_string_opt(BASE_URL_VAR)
                .unwrap_or_else(|| DEFAULT_TUTOR_BASE_URL.to_string()),
            api_token: env_string_opt(TOKEN_VAR),
            send_timeout: env_millis(SEND_TIMEOUT_VAR).unwrap_or(DEFAULT_SEND_TIMEOUT),
            log_filter: env_string_opt(LOG_VAR),
        }
    }

    /// Client configuration for the conversation backend.
    ///
    /// A missing token is carried as empty and rejected by the client before
    /// any request leaves the process.
    pub fn api_config(&self) -> TutorApiConfig {
        TutorApiConfig::new(self.api_token.clone().unwrap_or_default())
            .with_base_url(self.api_base_url.clone())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            send_timeout: self.send_timeout,
        }
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_millis(key: &str) -> Option<Duration> {
    env_string_opt(key)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis)
}
