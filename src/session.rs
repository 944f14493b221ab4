//! One learner's session: editor code, code runs, and the tutor conversation.
//!
//! Tracker and workspace state change only when an operation completes. A send
//! that fails or times out leaves both untouched, so retrying the same message
//! produces the same payload.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use execution_engine::{EngineProfile, EngineStatus, ExecutionEngine, ExecutionResult};
use tracing::{debug, info, warn};
use tutor_api::ConversationMessage;

use crate::coordinator::{lock_unpoisoned, ExecutionCoordinator};
use crate::error::{SessionError, TransportError};
use crate::tracker::CodeContextTracker;
use crate::transport::ConversationTransport;
use crate::workspace::{RunApplied, Workspace};

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// How long a send may wait for the tutor before it is reported as failed.
    pub send_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Outcome of [`TutorSession::run_code`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRun {
    pub result: ExecutionResult,
    pub applied: RunApplied,
}

struct SessionState {
    conversation_id: String,
    workspace: Workspace,
    tracker: CodeContextTracker,
    messages: Vec<ConversationMessage>,
    /// Bumped on every write to `messages`.
    messages_version: u64,
}

impl SessionState {
    fn replace_messages(&mut self, messages: Vec<ConversationMessage>) {
        self.messages = messages;
        self.messages_version += 1;
    }
}

pub struct TutorSession {
    state: Mutex<SessionState>,
    coordinator: ExecutionCoordinator,
    transport: Arc<dyn ConversationTransport>,
    options: SessionOptions,
    sending: AtomicBool,
}

impl TutorSession {
    pub fn new(
        conversation_id: impl Into<String>,
        engine: Arc<dyn ExecutionEngine>,
        transport: Arc<dyn ConversationTransport>,
    ) -> Self {
        Self {
            state: Mutex::new(SessionState {
                conversation_id: conversation_id.into(),
                workspace: Workspace::default(),
                tracker: CodeContextTracker::new(),
                messages: Vec::new(),
                messages_version: 0,
            }),
            coordinator: ExecutionCoordinator::new(engine),
            transport,
            options: SessionOptions::default(),
            sending: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Seeds the editor, e.g. with an exercise's starter code.
    #[must_use]
    pub fn with_initial_code(self, code: impl Into<String>) -> Self {
        self.lock_state().workspace = Workspace::new(code);
        self
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn conversation_id(&self) -> String {
        self.lock_state().conversation_id.clone()
    }

    pub fn code(&self) -> String {
        self.lock_state().workspace.code().to_string()
    }

    pub fn is_stale(&self) -> bool {
        self.lock_state().workspace.is_stale()
    }

    pub fn latest_result(&self) -> Option<ExecutionResult> {
        self.lock_state().workspace.latest_result().cloned()
    }

    pub fn last_sent_code(&self) -> Option<String> {
        self.lock_state()
            .tracker
            .last_sent_code()
            .map(str::to_string)
    }

    pub fn messages(&self) -> Vec<ConversationMessage> {
        self.lock_state().messages.clone()
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    pub fn engine_status(&self) -> EngineStatus {
        self.coordinator.status()
    }

    pub fn engine_profile(&self) -> EngineProfile {
        self.coordinator.engine_profile()
    }

    pub fn edit_code(&self, code: impl Into<String>) {
        self.lock_state().workspace.edit(code);
    }

    /// Loads the engine ahead of the first run.
    pub async fn initialize_engine(&self) -> Result<(), SessionError> {
        Ok(self.coordinator.initialize().await?)
    }

    /// Runs the editor code as it is now.
    ///
    /// An infrastructure failure leaves the held result and staleness as they
    /// were. Edits made while the run is in flight keep the output stale.
    pub async fn run_code(&self) -> Result<CompletedRun, SessionError> {
        let ticket = self.lock_state().workspace.begin_run();
        let result = self.coordinator.run(ticket.run_id, &ticket.code).await?;

        let applied = self
            .lock_state()
            .workspace
            .finish_run(&ticket, result.clone());
        match applied {
            RunApplied::Fresh => debug!(run_id = ticket.run_id, "run result applied"),
            RunApplied::StaleOnArrival => {
                info!(run_id = ticket.run_id, "code changed during run; output kept stale")
            }
            RunApplied::Superseded => {
                debug!(run_id = ticket.run_id, "discarding result of superseded run")
            }
        }

        Ok(CompletedRun { result, applied })
    }

    /// Sends one chat message with whatever code context it needs.
    ///
    /// Returns the conversation as the backend reports it after the send.
    pub async fn send_message(
        &self,
        text: &str,
    ) -> Result<Vec<ConversationMessage>, SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let _sending = SendingGuard::acquire(&self.sending).ok_or(SessionError::SendInProgress)?;

        let (conversation_id, snapshot, payload) = {
            let state = self.lock_state();
            let snapshot = state.workspace.snapshot();
            let payload = state.tracker.prepare(text, &snapshot);
            (state.conversation_id.clone(), snapshot, payload)
        };
        info!(
            conversation_id = %conversation_id,
            has_code = payload.has_code(),
            has_output = payload.has_output(),
            "sending tutor message"
        );

        let transport = Arc::clone(&self.transport);
        let call_conversation = conversation_id.clone();
        let call_payload = payload.clone();
        let call = tokio::spawn(async move {
            transport
                .send_message(&call_conversation, &call_payload)
                .await
        });

        let timeout = self.options.send_timeout;
        let conversation = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(Ok(conversation))) => conversation,
            Ok(Ok(Err(error))) => {
                warn!(error = %error, "tutor message was not delivered");
                return Err(error.into());
            }
            Ok(Err(join_error)) => {
                warn!(error = %join_error, "tutor send task stopped");
                return Err(TransportError::Unavailable(join_error.to_string()).into());
            }
            Err(_) => {
                warn!(?timeout, "tutor did not answer in time");
                return Err(SessionError::Timeout(timeout));
            }
        };

        let mut state = self.lock_state();
        state.tracker.commit(&payload, &snapshot.code);
        state.replace_messages(conversation.messages.clone());
        debug!(messages = state.messages.len(), "tutor message delivered");
        Ok(conversation.messages)
    }

    /// Reloads the visible conversation from the backend.
    ///
    /// A fetch that resolves after a send, another refresh, or a conversation
    /// switch has already replaced the visible list is dropped. The returned
    /// list is always what the session shows afterwards.
    pub async fn refresh(&self) -> Result<Vec<ConversationMessage>, SessionError> {
        let (conversation_id, version) = {
            let state = self.lock_state();
            (state.conversation_id.clone(), state.messages_version)
        };
        let conversation = self
            .transport
            .fetch_conversation(&conversation_id)
            .await?;

        let mut state = self.lock_state();
        if state.conversation_id == conversation_id && state.messages_version == version {
            state.replace_messages(conversation.messages);
        } else {
            debug!(conversation_id = %conversation_id, "discarding outdated conversation fetch");
        }
        Ok(state.messages.clone())
    }

    /// Points the session at another conversation.
    ///
    /// The new conversation has not seen the code yet, so the next message
    /// carries it again. Refused while a send is in flight.
    pub fn switch_conversation(
        &self,
        conversation_id: impl Into<String>,
    ) -> Result<(), SessionError> {
        let _sending = SendingGuard::acquire(&self.sending).ok_or(SessionError::SendInProgress)?;

        let mut state = self.lock_state();
        state.conversation_id = conversation_id.into();
        state.tracker.reset();
        state.replace_messages(Vec::new());
        info!(conversation_id = %state.conversation_id, "switched conversation");
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        lock_unpoisoned(&self.state)
    }
}

/// Holds the single in-flight send slot until dropped.
struct SendingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SendingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
