//! Minimal engine-agnostic contract for running student code in a sandbox.
//!
//! This crate defines only the lifecycle and result types shared between an
//! execution engine and its host. It excludes interpreter details, output
//! presentation, and any knowledge of the tutor conversation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier for one execution run.
pub type RunId = u64;

/// Infrastructure failure raised by an engine.
///
/// Program errors raised by the executed code are never reported through this
/// type; they are carried by [`Completion::Fault`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFault {
    message: String,
}

impl EngineFault {
    /// Creates a new engine fault.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying fault message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for EngineFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EngineFault {}

impl From<String> for EngineFault {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for EngineFault {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Lifecycle state of an engine as observed by its host.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum EngineStatus {
    #[default]
    Uninitialized,
    Loading,
    Ready,
    Error(String),
}

impl EngineStatus {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Error(_) => "error",
        }
    }
}

/// Input required to execute one piece of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub run_id: RunId,
    pub code: String,
}

/// Output produced by running code, in engine emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChunk {
    Stdout(String),
    Stderr(String),
}

/// How the executed program ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The program ran to completion, optionally evaluating to a value.
    Value(Option<Value>),
    /// The program raised; the string describes the fault.
    Fault(String),
}

/// Consolidated output of one run.
///
/// A run carries either a terminal value or a fault, never both. The fields are
/// private so a result cannot be mutated once produced.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    stdout: String,
    stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    terminal_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fault: Option<String>,
}

impl ExecutionResult {
    /// Result of a program that completed normally.
    #[must_use]
    pub fn completed(
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        terminal_value: Option<Value>,
    ) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            terminal_value,
            fault: None,
        }
    }

    /// Result of a program that raised.
    #[must_use]
    pub fn faulted(
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        fault: impl Into<String>,
    ) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            terminal_value: None,
            fault: Some(fault.into()),
        }
    }

    /// Builds a result from buffered output and the engine's completion.
    #[must_use]
    pub fn from_completion(stdout: String, stderr: String, completion: Completion) -> Self {
        match completion {
            Completion::Value(value) => Self::completed(stdout, stderr, value),
            Completion::Fault(fault) => Self::faulted(stdout, stderr, fault),
        }
    }

    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    #[must_use]
    pub fn terminal_value(&self) -> Option<&Value> {
        self.terminal_value.as_ref()
    }

    #[must_use]
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// Returns true when the executed program raised.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        self.fault.is_some()
    }
}

/// Immutable metadata describing an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineProfile {
    pub engine_id: String,
    pub language: String,
}

/// Engine interface for loading a runtime and executing source text.
///
/// Both operations may block; hosts are expected to call them off their event
/// loop.
pub trait ExecutionEngine: Send + Sync + 'static {
    /// Returns engine identity metadata.
    fn profile(&self) -> EngineProfile;

    /// Loads the runtime. Called again after a failure to retry.
    fn load(&self) -> Result<(), EngineFault>;

    /// Executes a request and pushes output through `emit` as it is produced.
    ///
    /// Returns `Ok(Completion::Fault(..))` when the program itself raises and
    /// `Err(EngineFault)` only when the engine could not run the code at all.
    fn execute(
        &self,
        request: ExecutionRequest,
        emit: &mut dyn FnMut(OutputChunk),
    ) -> Result<Completion, EngineFault>;
}
