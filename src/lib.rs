//! Keeps a chat tutor in sync with the learner's code.
//!
//! A [`TutorSession`] owns the editor code, the latest execution result and
//! the conversation. Each outgoing message carries the code only when it
//! changed since the tutor last confirmedly saw it, and carries output only
//! when that output still describes the code being sent.
//!
//! # Public API Overview
//! - Run code through an [`ExecutionCoordinator`] backed by any
//!   [`execution_engine::ExecutionEngine`].
//! - Decide message attachments with [`prepare_send`] and
//!   [`CodeContextTracker`].
//! - Talk to the backend through a [`ConversationTransport`];
//!   [`tutor_api::TutorApiClient`] implements it over HTTP.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod session;
pub mod tracker;
pub mod transport;
pub mod workspace;

pub use crate::config::EnvConfig;
pub use crate::coordinator::ExecutionCoordinator;
pub use crate::error::{CoordinatorError, SessionError, TransportError};
pub use crate::session::{CompletedRun, SessionOptions, TutorSession, DEFAULT_SEND_TIMEOUT};
pub use crate::tracker::{prepare_send, CodeContextTracker, OutgoingMessagePayload};
pub use crate::transport::ConversationTransport;
pub use crate::workspace::{ContextSnapshot, RunApplied, RunTicket, Workspace};

/// Engine contract types.
pub use execution_engine::{EngineStatus, ExecutionResult, RunId};
/// Conversation model returned by the backend.
pub use tutor_api::{ConversationMessage, ConversationState, MessageRole};
