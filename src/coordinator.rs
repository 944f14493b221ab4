//! Engine lifecycle and run mediation.
//!
//! The coordinator owns one engine instance. Engine calls block, so they run on
//! tokio's blocking pool. Concurrent `initialize` callers share a single load
//! attempt; a failed attempt leaves the engine in `Error` until the next call.

use std::sync::{Arc, Mutex, MutexGuard};

use execution_engine::{
    EngineFault, EngineProfile, EngineStatus, ExecutionEngine, ExecutionRequest, ExecutionResult,
    OutputChunk, RunId,
};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::error::CoordinatorError;

type LoadAttempt = Shared<BoxFuture<'static, Result<(), EngineFault>>>;

#[derive(Default)]
struct Lifecycle {
    status: EngineStatus,
    attempt: Option<LoadAttempt>,
}

pub struct ExecutionCoordinator {
    engine: Arc<dyn ExecutionEngine>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl ExecutionCoordinator {
    pub fn new(engine: Arc<dyn ExecutionEngine>) -> Self {
        Self {
            engine,
            lifecycle: Arc::new(Mutex::new(Lifecycle::default())),
        }
    }

    pub fn engine_profile(&self) -> EngineProfile {
        self.engine.profile()
    }

    pub fn status(&self) -> EngineStatus {
        lock_unpoisoned(&self.lifecycle).status.clone()
    }

    /// Loads the engine unless it is already ready.
    ///
    /// Callers arriving while a load is in flight await that same load.
    pub async fn initialize(&self) -> Result<(), CoordinatorError> {
        let attempt = {
            let mut lifecycle = lock_unpoisoned(&self.lifecycle);
            if lifecycle.status.is_ready() {
                return Ok(());
            }
            match lifecycle.attempt.clone() {
                Some(attempt) if lifecycle.status == EngineStatus::Loading => attempt,
                _ => self.start_load(&mut lifecycle),
            }
        };

        attempt.await.map_err(CoordinatorError::Engine)
    }

    fn start_load(&self, lifecycle: &mut Lifecycle) -> LoadAttempt {
        let profile = self.engine.profile();
        info!(engine = %profile.engine_id, "loading execution engine");
        lifecycle.status = EngineStatus::Loading;

        let engine = Arc::clone(&self.engine);
        let shared_lifecycle = Arc::clone(&self.lifecycle);
        let task = tokio::spawn(async move {
            let outcome = tokio::task::spawn_blocking(move || engine.load())
                .await
                .unwrap_or_else(|error| {
                    Err(EngineFault::new(format!("engine loader stopped: {error}")))
                });

            let mut lifecycle = lock_unpoisoned(&shared_lifecycle);
            lifecycle.attempt = None;
            lifecycle.status = match &outcome {
                Ok(()) => {
                    info!("execution engine ready");
                    EngineStatus::Ready
                }
                Err(fault) => {
                    warn!(error = %fault, "execution engine failed to load");
                    EngineStatus::Error(fault.message().to_string())
                }
            };
            outcome
        });

        let attempt = async move {
            task.await.unwrap_or_else(|error| {
                Err(EngineFault::new(format!("engine loader stopped: {error}")))
            })
        }
        .boxed()
        .shared();
        lifecycle.attempt = Some(attempt.clone());
        attempt
    }

    /// Runs `code` as run `run_id`, loading the engine first when needed.
    ///
    /// Output is buffered for this run only and returned as one result. A
    /// program that raises still yields `Ok` with the fault recorded.
    pub async fn run(
        &self,
        run_id: RunId,
        code: &str,
    ) -> Result<ExecutionResult, CoordinatorError> {
        self.initialize().await?;

        let engine = Arc::clone(&self.engine);
        let request = ExecutionRequest {
            run_id,
            code: code.to_string(),
        };
        debug!(run_id, "running code");

        let worker = tokio::task::spawn_blocking(move || capture_run(engine.as_ref(), request));
        let outcome = match worker.await {
            Ok(outcome) => outcome,
            Err(error) => {
                let fault = EngineFault::new(format!("run {run_id} worker stopped: {error}"));
                self.mark_failed(&fault);
                return Err(CoordinatorError::Worker(fault.message().to_string()));
            }
        };

        match outcome {
            Ok(result) => {
                debug!(run_id, faulted = result.is_fault(), "run finished");
                Ok(result)
            }
            Err(fault) => {
                self.mark_failed(&fault);
                Err(CoordinatorError::Engine(fault))
            }
        }
    }

    fn mark_failed(&self, fault: &EngineFault) {
        let mut lifecycle = lock_unpoisoned(&self.lifecycle);
        if lifecycle.status.is_ready() {
            warn!(error = %fault, "execution engine failed during run");
            lifecycle.status = EngineStatus::Error(fault.message().to_string());
        }
    }
}

fn capture_run(
    engine: &dyn ExecutionEngine,
    request: ExecutionRequest,
) -> Result<ExecutionResult, EngineFault> {
    let mut stdout = String::new();
    let mut stderr = String::new();
    let completion = engine.execute(request, &mut |chunk| match chunk {
        OutputChunk::Stdout(text) => stdout.push_str(&text),
        OutputChunk::Stderr(text) => stderr.push_str(&text),
    })?;

    Ok(ExecutionResult::from_completion(stdout, stderr, completion))
}

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
