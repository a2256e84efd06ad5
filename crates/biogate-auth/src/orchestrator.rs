//! The authentication loop.
//!
//! One attempt: identify a finger, capture a face, fetch the reference,
//! embed, verify, then pulse the grant line (on a match) while the outcome is
//! journaled and submitted. Attempts never overlap. The attempt deadline
//! bounds the steps up to the decision; a decided outcome is always pulsed
//! and submitted in full.
//!
//! Only session-fatal errors leave the loop. Everything else becomes an
//! [`AttemptReport`] and the loop continues with the next attempt.

use crate::error::{AuthError, Result};
use crate::face::FaceMatcher;
use crate::matcher::{MatchConfig, MatchController};
use biogate_core::constants::{
    DEFAULT_ATTEMPT_DEADLINE_SECS, DEFAULT_GRANT_PULSE_SECS, DEFAULT_MATCH_TIMEOUT_SECS,
    DEFAULT_POLL_INTERVAL_MS,
};
use biogate_core::{AuthOutcome, ErrorKind, MatchResult, Severity, SlotId};
use biogate_hardware::{FaceEmbedder, FrameSource, SensorLink, SensorSession, SignalLine, pulse};
use biogate_network::BackendGateway;
use biogate_storage::{AuthJournalRepository, SqliteAuthJournal};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Journal rows re-submitted after a successful submission.
const DEFAULT_FLUSH_BATCH: i64 = 20;

/// Pause after an attempt that saw a finger, so a finger left on the sensor
/// is not identified in a tight loop.
const DEFAULT_REARM_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub match_timeout: Duration,
    pub poll_interval: Duration,
    pub attempt_deadline: Duration,
    pub grant_pulse: Duration,
    pub rearm_delay: Duration,
    pub flush_batch: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            match_timeout: Duration::from_secs(DEFAULT_MATCH_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            attempt_deadline: Duration::from_secs(DEFAULT_ATTEMPT_DEADLINE_SECS),
            grant_pulse: Duration::from_secs(DEFAULT_GRANT_PULSE_SECS),
            rearm_delay: Duration::from_millis(DEFAULT_REARM_DELAY_MS),
            flush_batch: DEFAULT_FLUSH_BATCH,
        }
    }
}

/// What one attempt amounted to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AttemptReport {
    /// No finger within the match timeout.
    Timeout,
    /// A finger was read but no template matched.
    NoMatch,
    /// A grant or deny was decided.
    Decided {
        outcome: AuthOutcome,
        confidence: u16,
        /// Whether the backend accepted the outcome.
        delivered: bool,
    },
    /// The attempt ended before a decision.
    Failed {
        attempt_id: Uuid,
        kind: ErrorKind,
        severity: Severity,
        message: String,
    },
}

/// Result of the deadline-bounded part of an attempt.
enum Decision {
    Settled(AttemptReport),
    Outcome { outcome: AuthOutcome, confidence: u16 },
}

impl AttemptReport {
    fn failed(attempt_id: Uuid, error: &AuthError) -> Self {
        Self::Failed {
            attempt_id,
            kind: error.kind(),
            severity: error.severity(),
            message: error.to_string(),
        }
    }

    pub fn outcome(&self) -> Option<&AuthOutcome> {
        match self {
            Self::Decided { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}

/// Fingerprint-then-face authentication loop over one sensor session.
pub struct AuthOrchestrator<S, F, E, G, L, J = SqliteAuthJournal>
where
    S: SensorLink,
    E: FaceEmbedder,
{
    sensor: SensorSession<S>,
    camera: F,
    face: FaceMatcher<E>,
    gateway: G,
    line: L,
    journal: Option<J>,
    matcher: MatchController,
    config: AuthConfig,
    reports: Option<mpsc::UnboundedSender<AttemptReport>>,
}

impl<S, F, E, G, L> AuthOrchestrator<S, F, E, G, L>
where
    S: SensorLink,
    F: FrameSource,
    E: FaceEmbedder,
    G: BackendGateway,
    L: SignalLine,
{
    pub fn new(
        sensor: SensorSession<S>,
        camera: F,
        face: FaceMatcher<E>,
        gateway: G,
        line: L,
        config: AuthConfig,
    ) -> Self {
        let matcher = MatchController::new(MatchConfig {
            poll_interval: config.poll_interval,
        });
        Self {
            sensor,
            camera,
            face,
            gateway,
            line,
            journal: None,
            matcher,
            config,
            reports: None,
        }
    }

    /// Journal every decided outcome locally before submitting it.
    pub fn with_journal<J>(self, journal: J) -> AuthOrchestrator<S, F, E, G, L, J>
    where
        J: AuthJournalRepository,
    {
        AuthOrchestrator {
            sensor: self.sensor,
            camera: self.camera,
            face: self.face,
            gateway: self.gateway,
            line: self.line,
            journal: Some(journal),
            matcher: self.matcher,
            config: self.config,
            reports: self.reports,
        }
    }
}

impl<S, F, E, G, L, J> AuthOrchestrator<S, F, E, G, L, J>
where
    S: SensorLink,
    F: FrameSource,
    E: FaceEmbedder,
    G: BackendGateway,
    L: SignalLine,
    J: AuthJournalRepository,
{
    /// Publish every attempt report on `tx`.
    pub fn with_reports(mut self, tx: mpsc::UnboundedSender<AttemptReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Release the sensor session.
    pub fn into_session(self) -> SensorSession<S> {
        self.sensor
    }

    /// Run attempts until `cancel` fires or a session-fatal error occurs.
    ///
    /// Cancellation drops the attempt in flight; the grant line is driven
    /// LOW by its guard.
    ///
    /// # Errors
    /// The session-fatal error that ended the loop.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        info!(transport = %self.sensor.transport(), "Authentication loop started");
        loop {
            let report = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                report = self.run_once() => report?,
            };

            if !matches!(report, AttemptReport::Timeout) && !self.config.rearm_delay.is_zero() {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(self.config.rearm_delay) => {}
                }
            }
        }
        info!("Authentication loop stopped");
        Ok(())
    }

    /// One attempt. The attempt deadline covers identification through
    /// verification; the grant pulse and the submission run after it.
    ///
    /// # Errors
    /// Only session-fatal errors; other failures come back as
    /// `AttemptReport::Failed`.
    pub async fn run_once(&mut self) -> Result<AttemptReport> {
        let attempt_id = Uuid::new_v4();
        let deadline = self.config.attempt_deadline;

        let decided = match tokio::time::timeout(deadline, self.decide(attempt_id)).await {
            Ok(decided) => decided,
            Err(_) => Err(AuthError::DeadlineExceeded {
                duration_ms: deadline.as_millis() as u64,
            }),
        };
        let result = match decided {
            Ok(Decision::Settled(report)) => Ok(report),
            Ok(Decision::Outcome {
                outcome,
                confidence,
            }) => self.act(outcome, confidence).await,
            Err(e) => Err(e),
        };

        let report = match result {
            Ok(report) => report,
            Err(e) if e.is_session_fatal() => {
                error!(%attempt_id, kind = %e.kind(), error = %e, "Session-fatal error");
                return Err(e);
            }
            Err(e) => {
                warn!(
                    %attempt_id,
                    kind = %e.kind(),
                    severity = ?e.severity(),
                    error = %e,
                    "Attempt failed"
                );
                AttemptReport::failed(attempt_id, &e)
            }
        };

        if let Some(tx) = &self.reports {
            let _ = tx.send(report.clone());
        }
        Ok(report)
    }

    async fn decide(&mut self, attempt_id: Uuid) -> Result<Decision> {
        let result = self
            .matcher
            .search(&mut *self.sensor, self.config.match_timeout)
            .await?;
        let (slot, confidence) = match result {
            MatchResult::Timeout => {
                debug!(%attempt_id, "No finger presented");
                return Ok(Decision::Settled(AttemptReport::Timeout));
            }
            MatchResult::NoMatch => {
                debug!(%attempt_id, "Fingerprint not recognised");
                return Ok(Decision::Settled(AttemptReport::NoMatch));
            }
            MatchResult::Matched {
                slot_id,
                confidence,
            } => (slot_id, confidence),
        };
        info!(%attempt_id, slot_id = %slot, confidence, "Fingerprint matched");

        let frame = self.camera.capture().await?;
        let reference = self.reference(slot).await?;
        let candidate = self.face.embed(&frame).await?;
        drop(frame);
        let verdict = self.face.verify(&candidate, &reference)?;

        let outcome = AuthOutcome::new(attempt_id, slot, verdict.matched, verdict.distance);
        info!(
            %attempt_id,
            slot_id = %slot,
            distance = verdict.distance,
            result = outcome.result_str(),
            "Access decided"
        );
        Ok(Decision::Outcome {
            outcome,
            confidence,
        })
    }

    /// Carry out a decided outcome.
    async fn act(&mut self, outcome: AuthOutcome, confidence: u16) -> Result<AttemptReport> {
        // The line is only touched on a match; submission runs alongside it.
        let line = &mut self.line;
        let pulse_for = self.config.grant_pulse;
        let matched = outcome.matched;
        let grant = async move {
            if matched {
                pulse(line, pulse_for).await
            } else {
                Ok(())
            }
        };
        let submit = deliver(
            &self.gateway,
            self.journal.as_ref(),
            &outcome,
            self.config.flush_batch,
        );
        let (granted, delivered) = tokio::join!(grant, submit);
        granted?;

        Ok(AttemptReport::Decided {
            outcome,
            confidence,
            delivered,
        })
    }

    async fn reference(&self, slot: SlotId) -> Result<biogate_core::FaceEmbedding> {
        self.gateway
            .fetch_embedding(slot)
            .await?
            .ok_or(AuthError::MissingReference { slot })
    }
}

/// Journal then submit `outcome`. Returns whether the backend accepted it.
/// Failures are logged, never propagated.
async fn deliver<G, J>(
    gateway: &G,
    journal: Option<&J>,
    outcome: &AuthOutcome,
    flush_batch: i64,
) -> bool
where
    G: BackendGateway,
    J: AuthJournalRepository,
{
    let attempt_id = outcome.attempt_id;
    if let Some(journal) = journal
        && let Err(e) = journal.record(outcome).await
    {
        warn!(%attempt_id, error = %e, "Failed to journal outcome");
    }

    if let Err(e) = gateway.submit_outcome(outcome).await {
        warn!(%attempt_id, kind = %e.kind(), error = %e, "Outcome not delivered");
        return false;
    }

    if let Some(journal) = journal {
        if let Err(e) = journal.mark_uploaded(attempt_id).await {
            warn!(%attempt_id, error = %e, "Failed to mark outcome uploaded");
        }
        flush_pending(gateway, journal, flush_batch).await;
    }
    true
}

/// Re-submit journaled outcomes, oldest first, until one fails.
async fn flush_pending<G, J>(gateway: &G, journal: &J, limit: i64)
where
    G: BackendGateway,
    J: AuthJournalRepository,
{
    let pending = match journal.pending(limit).await {
        Ok(pending) => pending,
        Err(e) => {
            warn!(error = %e, "Failed to read pending outcomes");
            return;
        }
    };

    let mut flushed = 0usize;
    for entry in pending {
        let outcome = match entry.to_outcome() {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable journal row");
                continue;
            }
        };
        if let Err(e) = gateway.submit_outcome(&outcome).await {
            debug!(error = %e, "Backend still unavailable, flush postponed");
            break;
        }
        if let Err(e) = journal.mark_uploaded(outcome.attempt_id).await {
            warn!(error = %e, "Failed to mark outcome uploaded");
            break;
        }
        flushed += 1;
    }
    if flushed > 0 {
        info!(flushed, "Journaled outcomes delivered");
    }
}
