//! Transport-only client primitives for the tutor conversation backend.
//!
//! This crate owns request building and response parsing for the conversation
//! endpoints only. It contains no token lifecycle code and knows nothing about
//! editor state or execution output beyond the fields it is asked to carry.
//!
//! Attachment fields travel as explicit JSON `null` when not attached; the
//! backend distinguishes `null` from an empty string.

pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod url;

pub use client::TutorApiClient;
pub use config::TutorApiConfig;
pub use error::TutorApiError;
pub use retry::RetryPolicy;
pub use payload::{ConversationMessage, ConversationState, MessageRole, SendMessageRequest};
pub use url::{endpoint_url, normalize_base_url};
