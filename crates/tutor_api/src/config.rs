use std::collections::BTreeMap;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::url::DEFAULT_TUTOR_BASE_URL;

/// Transport configuration for conversation backend requests.
#[derive(Debug, Clone)]
pub struct TutorApiConfig {
    /// Bearer token passed to `Authorization`.
    pub access_token: String,
    /// Base URL for conversation endpoints.
    pub base_url: String,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional per-request timeout enforced by the HTTP client.
    pub timeout: Option<Duration>,
    /// Backoff applied to conversation reads.
    pub retry: RetryPolicy,
}

impl Default for TutorApiConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            base_url: DEFAULT_TUTOR_BASE_URL.to_string(),
            user_agent: None,
            extra_headers: BTreeMap::new(),
            timeout: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl TutorApiConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_headers.extend(headers);
        self
    }
}
