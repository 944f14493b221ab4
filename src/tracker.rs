//! Decides which parts of the code context travel with each chat message.
//!
//! Invariants:
//! - code is attached iff it differs (exactly) from the last code confirmed sent;
//! - stdout/stderr are attached iff code is attached and the held output is fresh;
//! - the baseline only advances after the transport confirms a send.

use execution_engine::ExecutionResult;

use crate::workspace::ContextSnapshot;

/// Fields of one outgoing chat message.
///
/// `None` means "not attached" and is distinct from an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessagePayload {
    pub text: String,
    pub code: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl OutgoingMessagePayload {
    #[must_use]
    pub fn has_code(&self) -> bool {
        self.code.is_some()
    }

    #[must_use]
    pub fn has_output(&self) -> bool {
        self.stdout.is_some() || self.stderr.is_some()
    }
}

impl From<OutgoingMessagePayload> for tutor_api::SendMessageRequest {
    fn from(payload: OutgoingMessagePayload) -> Self {
        Self {
            text: payload.text,
            code: payload.code,
            stdout: payload.stdout,
            stderr: payload.stderr,
        }
    }
}

/// Computes the payload for one send attempt. Pure; never mutates anything.
#[must_use]
pub fn prepare_send(
    text: &str,
    current_code: &str,
    current_result: Option<&ExecutionResult>,
    stale: bool,
    last_sent_code: Option<&str>,
) -> OutgoingMessagePayload {
    let code_changed = last_sent_code != Some(current_code);
    if !code_changed {
        return OutgoingMessagePayload {
            text: text.to_string(),
            code: None,
            stdout: None,
            stderr: None,
        };
    }

    let (stdout, stderr) = if stale {
        (None, None)
    } else {
        (
            Some(current_result.map(|result| result.stdout().to_string()).unwrap_or_default()),
            Some(current_result.map(|result| result.stderr().to_string()).unwrap_or_default()),
        )
    };

    OutgoingMessagePayload {
        text: text.to_string(),
        code: Some(current_code.to_string()),
        stdout,
        stderr,
    }
}

/// Remembers the last code the tutor has confirmedly seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeContextTracker {
    last_sent_code: Option<String>,
}

impl CodeContextTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until a send carrying code has been confirmed.
    #[must_use]
    pub fn last_sent_code(&self) -> Option<&str> {
        self.last_sent_code.as_deref()
    }

    #[must_use]
    pub fn prepare(&self, text: &str, snapshot: &ContextSnapshot) -> OutgoingMessagePayload {
        prepare_send(
            text,
            &snapshot.code,
            snapshot.result.as_ref(),
            snapshot.stale,
            self.last_sent_code(),
        )
    }

    /// Records a confirmed send. Call only after the transport reported success.
    pub fn commit(&mut self, payload: &OutgoingMessagePayload, current_code: &str) {
        if payload.code.is_some() {
            self.last_sent_code = Some(current_code.to_string());
        }
    }

    /// Forgets the baseline so the next message carries the code again.
    pub fn reset(&mut self) {
        self.last_sent_code = None;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn payload(
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

    #[test]
    fn first_send_without_run_attaches_code_only() {
        let sent = prepare_send("hi", "x = 1", None, true, None);
        assert_eq!(sent, payload("hi", Some("x = 1"), None, None));
    }

    #[test]
    fn never_sent_baseline_differs_from_empty_code() {
        let sent = prepare_send("hi", "", None, true, None);
        assert_eq!(sent.code.as_deref(), Some(""));

        let again = prepare_send("hi", "", None, true, Some(""));
        assert_eq!(again.code, None);
    }

    #[test]
    fn fresh_output_travels_with_changed_code() {
        let result = ExecutionResult::completed("5", "", None);
        let sent = prepare_send("why", "print(5)", Some(&result), false, None);
        assert_eq!(sent, payload("why", Some("print(5)"), Some("5"), Some("")));
    }

    #[test]
    fn unchanged_code_attaches_nothing_even_with_fresh_output() {
        let result = ExecutionResult::completed("5", "warn", None);
        let sent = prepare_send("more", "print(5)", Some(&result), false, Some("print(5)"));
        assert_eq!(sent, payload("more", None, None, None));
    }

    #[test]
    fn stale_output_is_never_attached() {
        let result = ExecutionResult::completed("5", "", None);
        let sent = prepare_send("changed it", "print(6)", Some(&result), true, Some("print(5)"));
        assert_eq!(sent, payload("changed it", Some("print(6)"), None, None));
    }

    #[test]
    fn empty_output_is_attached_as_empty_strings() {
        let result = ExecutionResult::completed("", "", None);
        let sent = prepare_send("quiet", "pass", Some(&result), false, None);
        assert_eq!(sent.stdout.as_deref(), Some(""));
        assert_eq!(sent.stderr.as_deref(), Some(""));
    }

    #[test]
    fn fault_output_keeps_stderr() {
        let result =
            ExecutionResult::faulted("", "Traceback: ZeroDivisionError", "ZeroDivisionError");
        let sent = prepare_send("help", "1/0", Some(&result), false, None);
        assert_eq!(
            sent,
            payload("help", Some("1/0"), Some(""), Some("Traceback: ZeroDivisionError"))
        );
    }

    #[test]
    fn code_comparison_is_exact() {
        let sent = prepare_send("hi", "x = 1 ", None, true, Some("x = 1"));
        assert_eq!(sent.code.as_deref(), Some("x = 1 "));
    }

    #[test]
    fn prepare_does_not_touch_tracker_state() {
        let tracker = CodeContextTracker::new();
        let snapshot = ContextSnapshot {
            code: "a".to_string(),
            result: None,
            stale: true,
        };

        let first = tracker.prepare("x", &snapshot);
        let second = tracker.prepare("x", &snapshot);

        assert_eq!(first, second);
        assert_eq!(tracker.last_sent_code(), None);
    }

    #[test]
    fn commit_advances_baseline_only_when_code_was_attached() {
        let mut tracker = CodeContextTracker::new();

        tracker.commit(&payload("t", None, None, None), "ignored");
        assert_eq!(tracker.last_sent_code(), None);

        tracker.commit(&payload("t", Some("a"), None, None), "a");
        assert_eq!(tracker.last_sent_code(), Some("a"));

        tracker.commit(&payload("t", None, None, None), "b");
        assert_eq!(tracker.last_sent_code(), Some("a"));
    }

    #[test]
    fn reset_forgets_baseline() {
        let mut tracker = CodeContextTracker::new();
        tracker.commit(&payload("t", Some("a"), None, None), "a");
        tracker.reset();
        assert_eq!(tracker.last_sent_code(), None);
    }

    #[test]
    fn payload_converts_to_wire_request() {
        let request: tutor_api::SendMessageRequest =
            payload("t", Some("a"), Some(""), None).into();
        assert_eq!(request.code.as_deref(), Some("a"));
        assert_eq!(request.stdout.as_deref(), Some(""));
        assert_eq!(request.stderr, None);
    }
}
