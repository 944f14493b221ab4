//! Editor code, the latest execution result, and whether that result still
//! describes the code.

use execution_engine::{ExecutionResult, RunId};

/// Point-in-time copy of the state the tracker decides on.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSnapshot {
    pub code: String,
    pub result: Option<ExecutionResult>,
    pub stale: bool,
}

/// Issued when a run starts; hands the run's source back at completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTicket {
    pub run_id: RunId,
    pub code: String,
}

/// What happened to a completed run's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunApplied {
    /// Result stored and it matches the editor code.
    Fresh,
    /// Result stored, but the code was edited while the run was in flight.
    StaleOnArrival,
    /// A newer run's result was already applied; this one was dropped.
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    code: String,
    result: Option<ExecutionResult>,
    stale: bool,
    next_run_id: RunId,
    applied_run_id: Option<RunId>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl Workspace {
    /// A workspace holding `code` that has never been run.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            result: None,
            stale: true,
            next_run_id: 1,
            applied_run_id: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn latest_result(&self) -> Option<&ExecutionResult> {
        self.result.as_ref()
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Replaces the editor content. Always marks held output stale.
    pub fn edit(&mut self, code: impl Into<String>) {
        self.code = code.into();
        self.stale = true;
    }

    pub fn begin_run(&mut self) -> RunTicket {
        let run_id = self.next_run_id;
        self.next_run_id += 1;
        RunTicket {
            run_id,
            code: self.code.clone(),
        }
    }

    /// Applies a completed run against the editor content as it is now.
    pub fn finish_run(&mut self, ticket: &RunTicket, result: ExecutionResult) -> RunApplied {
        if self
            .applied_run_id
            .is_some_and(|applied| applied > ticket.run_id)
        {
            return RunApplied::Superseded;
        }

        self.applied_run_id = Some(ticket.run_id);
        self.result = Some(result);
        self.stale = self.code != ticket.code;

        if self.stale {
            RunApplied::StaleOnArrival
        } else {
            RunApplied::Fresh
        }
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            code: self.code.clone(),
            result: self.result.clone(),
            stale: self.stale,
        }
    }
}
