//! Deterministic scripted implementation of the shared `execution_engine` contract.
//!
//! This crate contains no interpreter and is intended for local development and
//! contract-level integration testing of hosts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use execution_engine::{
    Completion, EngineFault, EngineProfile, ExecutionEngine, ExecutionRequest, OutputChunk,
};
use serde_json::Value;

/// Stable engine identifier reported by [`ScriptedEngine::profile`].
pub const SCRIPTED_ENGINE_ID: &str = "scripted";

/// Scripted outcome for one source text.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedRun {
    pub chunks: Vec<OutputChunk>,
    pub completion: Completion,
}

impl ScriptedRun {
    /// A run that prints `stdout` and finishes without a value.
    #[must_use]
    pub fn printing(stdout: impl Into<String>) -> Self {
        Self {
            chunks: vec![OutputChunk::Stdout(stdout.into())],
            completion: Completion::Value(None),
        }
    }

    /// A run that produces no output at all.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            chunks: Vec::new(),
            completion: Completion::Value(None),
        }
    }

    /// A run that writes `stderr` and raises `fault`.
    #[must_use]
    pub fn raising(stderr: impl Into<String>, fault: impl Into<String>) -> Self {
        Self {
            chunks: vec![OutputChunk::Stderr(stderr.into())],
            completion: Completion::Fault(fault.into()),
        }
    }

    #[must_use]
    pub fn with_chunk(mut self, chunk: OutputChunk) -> Self {
        self.chunks.push(chunk);
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.completion = Completion::Value(Some(value));
        self
    }
}

/// Deterministic engine used by `tutor_sync` tests and local runs.
#[derive(Debug)]
pub struct ScriptedEngine {
    scripts: Mutex<HashMap<String, ScriptedRun>>,
    fallback: ScriptedRun,
    remaining_load_failures: AtomicUsize,
    unavailable: AtomicBool,
    load_delay: Duration,
    run_delays: Mutex<HashMap<String, Duration>>,
    load_calls: AtomicUsize,
    execute_calls: AtomicUsize,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    /// Creates an engine whose unscripted runs finish silently.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: ScriptedRun::silent(),
            remaining_load_failures: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
            load_delay: Duration::ZERO,
            run_delays: Mutex::new(HashMap::new()),
            load_calls: AtomicUsize::new(0),
            execute_calls: AtomicUsize::new(0),
        }
    }

    /// Registers the outcome for an exact source text.
    #[must_use]
    pub fn with_script(self, code: impl Into<String>, run: ScriptedRun) -> Self {
        self.script(code, run);
        self
    }

    /// Sets the outcome used for source text without a script.
    #[must_use]
    pub fn with_fallback(mut self, run: ScriptedRun) -> Self {
        self.fallback = run;
        self
    }

    /// Makes the next `count` calls to `load` fail.
    #[must_use]
    pub fn with_load_failures(self, count: usize) -> Self {
        self.remaining_load_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Delays every `load` call.
    #[must_use]
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Delays runs of an exact source text.
    #[must_use]
    pub fn with_run_delay(self, code: impl Into<String>, delay: Duration) -> Self {
        lock_unpoisoned(&self.run_delays).insert(code.into(), delay);
        self
    }

    /// Registers or replaces the outcome for an exact source text.
    pub fn script(&self, code: impl Into<String>, run: ScriptedRun) {
        lock_unpoisoned(&self.scripts).insert(code.into(), run);
    }

    /// Toggles whether `execute` fails with an infrastructure fault.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    #[must_use]
    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    fn scripted_run(&self, code: &str) -> ScriptedRun {
        lock_unpoisoned(&self.scripts)
            .get(code)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn take_load_failure(&self) -> bool {
        self.remaining_load_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }
}

impl ExecutionEngine for ScriptedEngine {
    fn profile(&self) -> EngineProfile {
        EngineProfile {
            engine_id: SCRIPTED_ENGINE_ID.to_string(),
            language: "python".to_string(),
        }
    }

    fn load(&self) -> Result<(), EngineFault> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            thread::sleep(self.load_delay);
        }

        if self.take_load_failure() {
            return Err(EngineFault::new("scripted runtime failed to load"));
        }

        Ok(())
    }

    fn execute(
        &self,
        request: ExecutionRequest,
        emit: &mut dyn FnMut(OutputChunk),
    ) -> Result<Completion, EngineFault> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EngineFault::new("scripted runtime is unavailable"));
        }

        let delay = lock_unpoisoned(&self.run_delays)
            .get(&request.code)
            .copied();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let run = self.scripted_run(&request.code);
        for chunk in run.chunks {
            emit(chunk);
        }

        Ok(run.completion)
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
