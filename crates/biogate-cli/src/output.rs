//! Newline-delimited JSON status lines on stdout.
//!
//! Every line carries either an `event` or a `milestone` plus a human
//! `message`; `success`, `severity` and `data` appear only when they say
//! something. Logs never go to stdout.

use std::io::Write;

use biogate_auth::{AttemptReport, EnrollmentMilestone};
use biogate_core::{EnrollmentOutcome, Severity};
use serde::Serialize;
use serde_json::{Value, json};

use crate::errors::{CliError, CliResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<&'static str>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl StatusLine {
    pub fn event(event: &'static str, message: impl Into<String>) -> Self {
        Self {
            event: Some(event),
            milestone: None,
            message: message.into(),
            success: None,
            severity: None,
            data: None,
        }
    }

    pub fn milestone(milestone: EnrollmentMilestone) -> Self {
        Self {
            event: None,
            milestone: Some(milestone.as_str()),
            message: milestone.message().to_string(),
            success: None,
            severity: None,
            data: None,
        }
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn from_attempt(report: &AttemptReport) -> Self {
        match report {
            AttemptReport::Timeout => Self::event("timeout", "No finger presented"),
            AttemptReport::NoMatch => Self::event("no_match", "Fingerprint not recognised"),
            AttemptReport::Decided {
                outcome,
                confidence,
                delivered,
            } => {
                let (event, message) = if outcome.matched {
                    ("granted", format!("Access granted for slot {}", outcome.slot_id))
                } else {
                    ("denied", format!("Access denied for slot {}", outcome.slot_id))
                };
                Self::event(event, message)
                    .success(outcome.matched)
                    .data(json!({
                        "attempt_id": outcome.attempt_id,
                        "slot_id": outcome.slot_id,
                        "distance": outcome.distance,
                        "confidence": confidence,
                        "delivered": delivered,
                        "timestamp": outcome.timestamp,
                    }))
            }
            AttemptReport::Failed {
                attempt_id,
                kind,
                severity,
                message,
            } => Self::event("attempt_failed", message.clone())
                .success(false)
                .severity(*severity)
                .data(json!({ "attempt_id": attempt_id, "kind": kind })),
        }
    }

    /// Final enrollment line. Failures normally travel as
    /// [`CliError::Enrollment`] instead.
    pub fn from_enrollment(outcome: &EnrollmentOutcome, name: Option<&str>) -> Self {
        let message = match (outcome.success, name) {
            (true, Some(name)) => format!("Fingerprint enrolled for {name}"),
            (true, None) => "Fingerprint enrolled successfully".to_string(),
            (false, _) => match outcome.failure_stage {
                Some(stage) => format!("Enrollment failed at {stage}"),
                None => "Enrollment failed".to_string(),
            },
        };
        let mut data = json!({ "slot_id": outcome.slot_id });
        if let Some(stage) = outcome.failure_stage {
            data["failure_stage"] = json!(stage);
        }
        if let Some(status) = outcome.status {
            data["status"] = json!(status);
        }
        Self::event("enrollment", message)
            .success(outcome.success)
            .data(data)
    }

    pub fn from_error(error: &CliError) -> Self {
        let mut line = Self::event("error", error.to_string()).success(false);
        let mut data = json!({ "exit_code": error.code() });
        if let Some(kind) = error.kind() {
            line = line.severity(kind.severity());
            data["kind"] = json!(kind);
        }
        if let CliError::Enrollment { outcome } = error {
            data["slot_id"] = json!(outcome.slot_id);
            data["failure_stage"] = json!(outcome.failure_stage);
            data["status"] = json!(outcome.status);
        }
        line.data(data)
    }
}

/// Writes one JSON document per line and flushes after each.
#[derive(Debug)]
pub struct Reporter<W: Write> {
    out: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn emit(&mut self, line: &StatusLine) -> CliResult<()> {
        serde_json::to_writer(&mut self.out, line)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }

    /// Best effort; used on the way out when the original error matters more.
    pub fn emit_error(&mut self, error: &CliError) {
        if let Err(e) = self.emit(&StatusLine::from_error(error)) {
            tracing::warn!(error = %e, "Failed to write error status line");
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl Reporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}
