use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Error as JsonError, Value};

#[derive(Debug)]
pub enum TutorApiError {
    MissingAccessToken,
    InvalidBaseUrl(String),
    InvalidHeader(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    Serde(JsonError),
    RetryExhausted {
        status: Option<StatusCode>,
        last_error: Option<String>,
    },
}

impl TutorApiError {
    /// Returns true when repeating the same call may succeed.
    ///
    /// Configuration problems and client-side rejections are not retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) | Self::RetryExhausted { .. } => true,
            Self::Status(status, _) => {
                status.is_server_error()
                    || matches!(
                        *status,
                        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT
                    )
            }
            Self::MissingAccessToken
            | Self::InvalidBaseUrl(_)
            | Self::InvalidHeader(_)
            | Self::Serde(_) => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(status, _) => Some(*status),
            Self::RetryExhausted { status, .. } => *status,
            Self::Request(error) => error.status(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    detail: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorPayload {
    fn message(&self) -> Option<String> {
        self.detail
            .as_ref()
            .and_then(detail_message)
            .or_else(|| self.error.as_ref().and_then(error_message))
            .or_else(|| self.message.as_deref().and_then(non_empty_string).map(str::to_owned))
    }
}

/// `detail` is either a plain string or a list of validation entries carrying `msg`.
fn detail_message(detail: &Value) -> Option<String> {
    match detail {
        Value::String(message) => non_empty_string(message).map(str::to_owned),
        Value::Array(entries) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(Value::as_str))
                .filter_map(non_empty_string)
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

fn error_message(error: &Value) -> Option<String> {
    match error {
        Value::String(message) => non_empty_string(message).map(str::to_owned),
        Value::Object(fields) => fields
            .get("message")
            .and_then(Value::as_str)
            .and_then(non_empty_string)
            .map(str::to_owned),
        _ => None,
    }
}

impl fmt::Display for TutorApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAccessToken => write!(f, "access token is required"),
            Self::InvalidBaseUrl(value) => write!(f, "invalid base URL: {value}"),
            Self::InvalidHeader(message) => write!(f, "invalid header: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::RetryExhausted { status, last_error } => {
                let status = status
                    .map(|status| status.as_u16().to_string())
                    .unwrap_or_else(|| "n/a".to_owned());
                write!(
                    f,
                    "retry exhausted after max attempts (status: {status}, last_error: {last_error:?})"
                )
            }
        }
    }
}

impl std::error::Error for TutorApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(error) => Some(error),
            Self::Serde(error) => Some(error),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TutorApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for TutorApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

/// Extract a human-readable message from a non-success response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let fallback = || {
        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.to_string()
        }
    };

    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(payload) => payload.message().unwrap_or_else(fallback),
        Err(_) => fallback(),
    }
}

fn non_empty_string(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
