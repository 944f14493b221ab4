#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use execution_engine::ExecutionEngine;
use execution_engine_mock::ScriptedEngine;
use reqwest::StatusCode;
use tutor_api::TutorApiError;
use tutor_sync::{
    ConversationMessage, ConversationState, ConversationTransport, MessageRole,
    OutgoingMessagePayload, SessionOptions, TransportError, TutorSession,
};

pub const TEST_SEND_TIMEOUT: Duration = Duration::from_millis(200);

/// What the transport does with the next send.
#[derive(Debug, Clone)]
pub enum SendBehavior {
    Reply,
    Unavailable(String),
    Status(u16),
    DelayThenReply(Duration),
    Hang,
}

#[derive(Default)]
pub struct TransportTrace {
    /// Every send attempt in call order, successful or not.
    pub attempts: Vec<(String, OutgoingMessagePayload)>,
    /// Payloads the backend accepted.
    pub delivered: Vec<OutgoingMessagePayload>,
    pub history: Vec<ConversationMessage>,
    pub fetch_calls: usize,
    pub fetch_failures: usize,
    /// Sleep applied after a fetch has read the history.
    pub fetch_delay: Duration,
    pub behaviors: VecDeque<SendBehavior>,
}

#[derive(Clone, Default)]
pub struct RecordingTransport {
    trace: Arc<Mutex<TransportTrace>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues behaviors for the next sends; once drained, sends reply.
    pub fn push_behavior(&self, behavior: SendBehavior) {
        lock_unpoisoned(&self.trace).behaviors.push_back(behavior);
    }

    pub fn fail_next_fetches(&self, count: usize) {
        lock_unpoisoned(&self.trace).fetch_failures = count;
    }

    pub fn delay_fetches(&self, delay: Duration) {
        lock_unpoisoned(&self.trace).fetch_delay = delay;
    }

    pub fn seed_history(&self, messages: Vec<ConversationMessage>) {
        lock_unpoisoned(&self.trace).history = messages;
    }

    pub fn attempts(&self) -> Vec<OutgoingMessagePayload> {
        lock_unpoisoned(&self.trace)
            .attempts
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn attempted_conversations(&self) -> Vec<String> {
        lock_unpoisoned(&self.trace)
            .attempts
            .iter()
            .map(|(conversation_id, _)| conversation_id.clone())
            .collect()
    }

    pub fn delivered(&self) -> Vec<OutgoingMessagePayload> {
        lock_unpoisoned(&self.trace).delivered.clone()
    }

    pub fn last_attempt(&self) -> OutgoingMessagePayload {
        self.attempts()
            .pop()
            .expect("at least one send attempt was recorded")
    }

    pub fn fetch_calls(&self) -> usize {
        lock_unpoisoned(&self.trace).fetch_calls
    }

    fn reply(&self, payload: &OutgoingMessagePayload) -> ConversationState {
        let mut trace = lock_unpoisoned(&self.trace);
        trace.delivered.push(payload.clone());
        let turn = trace.delivered.len();
        trace.history.push(ConversationMessage {
            role: MessageRole::User,
            text: payload.text.clone(),
            attached_code: payload.code.clone(),
        });
        trace.history.push(ConversationMessage {
            role: MessageRole::Assistant,
            text: format!("reply {turn}"),
            attached_code: None,
        });
        ConversationState {
            messages: trace.history.clone(),
        }
    }
}

#[async_trait]
impl ConversationTransport for RecordingTransport {
    async fn send_message(
        &self,
        conversation_id: &str,
        payload: &OutgoingMessagePayload,
    ) -> Result<ConversationState, TransportError> {
        let behavior = {
            let mut trace = lock_unpoisoned(&self.trace);
            trace
                .attempts
                .push((conversation_id.to_string(), payload.clone()));
            trace.behaviors.pop_front().unwrap_or(SendBehavior::Reply)
        };

        match behavior {
            SendBehavior::Reply => Ok(self.reply(payload)),
            SendBehavior::Unavailable(message) => Err(TransportError::Unavailable(message)),
            SendBehavior::Status(code) => {
                let status = StatusCode::from_u16(code).expect("valid status code");
                Err(TransportError::Api(TutorApiError::Status(
                    status,
                    "scripted failure".to_string(),
                )))
            }
            SendBehavior::DelayThenReply(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.reply(payload))
            }
            SendBehavior::Hang => std::future::pending().await,
        }
    }

    async fn fetch_conversation(
        &self,
        _conversation_id: &str,
    ) -> Result<ConversationState, TransportError> {
        let (messages, delay) = {
            let mut trace = lock_unpoisoned(&self.trace);
            trace.fetch_calls += 1;
            if trace.fetch_failures > 0 {
                trace.fetch_failures -= 1;
                return Err(TransportError::Unavailable("backend offline".to_string()));
            }
            (trace.history.clone(), trace.fetch_delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(ConversationState { messages })
    }
}

pub fn session_with(
    engine: &Arc<ScriptedEngine>,
    transport: &RecordingTransport,
    code: &str,
) -> TutorSession {
    let engine: Arc<dyn ExecutionEngine> = Arc::clone(engine) as Arc<dyn ExecutionEngine>;
    TutorSession::new("conversation-1", engine, Arc::new(transport.clone()))
        .with_options(SessionOptions {
            send_timeout: TEST_SEND_TIMEOUT,
        })
        .with_initial_code(code)
}

pub fn payload(
    text: &str,
    code: Option<&str>,
    stdout: Option<&str>,
    stderr: Option<&str>,
) -> OutgoingMessagePayload {
    OutgoingMessagePayload {
        text: text.to_string(),
        code: code.map(str::to_string),
        stdout: stdout.map(str::to_string),
        stderr: stderr.map(str::to_string),
    }
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Polls `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
