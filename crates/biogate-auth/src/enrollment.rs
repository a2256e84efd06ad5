//! Fingerprint enrollment.
//!
//! One enrollment call drives the sensor through two scans of the same
//! finger, merges them into a model and stores it in the caller's slot:
//!
//! ```text
//! Idle → AwaitFirstScan → Template1Ready → AwaitSecondScan
//!      → Template2Ready → ModelCreated → Stored
//! ```
//!
//! Any non-Ok sensor answer moves the machine straight to `Failed` and the
//! call returns an [`EnrollmentOutcome`] naming the stage. There are no
//! backward transitions and no retries inside one call; a caller retries by
//! running a fresh enrollment, which overwrites the slot or leaves it
//! untouched.
//!
//! Only session-fatal link errors (transport loss, configuration) are
//! returned as `Err`.
//!
//! # Examples
//!
//! ```no_run
//! use biogate_auth::{EnrollmentConfig, EnrollmentController};
//! use biogate_core::SlotId;
//! use biogate_hardware::mock::MockSensor;
//!
//! # async fn example() -> biogate_auth::Result<()> {
//! let (mut sensor, handle) = MockSensor::new();
//! handle.place_finger(0xBEEF);
//!
//! let controller = EnrollmentController::new(EnrollmentConfig::default());
//! let report = controller.enroll(&mut sensor, SlotId::from_raw(7)).await?;
//! assert!(report.outcome.success);
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use biogate_core::constants::{
    DEFAULT_CAPTURE_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_MS, MIN_FINGER_LIFT_PAUSE_MS,
};
use biogate_core::{
    BufferId, EnrollmentOutcome, Error, FailureStage, FingerprintStatus, SlotId,
};
use biogate_hardware::{HardwareError, SensorLink};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Maximum number of transitions kept per machine. A complete enrollment
/// takes seven.
const MAX_HISTORY_SIZE: usize = 16;

/// Enrollment progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentState {
    Idle,
    /// Polling for the first impression.
    AwaitFirstScan,
    /// First impression converted into buffer 1.
    Template1Ready,
    /// Polling for the second impression.
    AwaitSecondScan,
    /// Second impression converted into buffer 2.
    Template2Ready,
    /// Both buffers merged into one model.
    ModelCreated,
    Stored,
    Failed,
}

impl EnrollmentState {
    /// Forward-only transition rules; `Failed` is reachable from every
    /// non-terminal state.
    pub fn can_transition_to(&self, target: &EnrollmentState) -> bool {
        use EnrollmentState::*;
        matches!(
            (self, target),
            (Idle, AwaitFirstScan)
                | (AwaitFirstScan, Template1Ready)
                | (Template1Ready, AwaitSecondScan)
                | (AwaitSecondScan, Template2Ready)
                | (Template2Ready, ModelCreated)
                | (ModelCreated, Stored)
        ) || (!self.is_terminal() && *target == Failed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EnrollmentState::Stored | EnrollmentState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentState::Idle => "idle",
            EnrollmentState::AwaitFirstScan => "await_first_scan",
            EnrollmentState::Template1Ready => "template1_ready",
            EnrollmentState::AwaitSecondScan => "await_second_scan",
            EnrollmentState::Template2Ready => "template2_ready",
            EnrollmentState::ModelCreated => "model_created",
            EnrollmentState::Stored => "stored",
            EnrollmentState::Failed => "failed",
        }
    }
}

impl fmt::Display for EnrollmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recorded transition.
///
/// `at` is process-local and not serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentTransition {
    pub from: EnrollmentState,
    pub to: EnrollmentState,
    #[serde(skip, default = "Instant::now")]
    pub at: Instant,
}

/// Validated enrollment state with bounded history.
#[derive(Debug)]
pub struct EnrollmentMachine {
    state: EnrollmentState,
    history: VecDeque<EnrollmentTransition>,
}

impl Default for EnrollmentMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl EnrollmentMachine {
    pub fn new() -> Self {
        Self {
            state: EnrollmentState::Idle,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn state(&self) -> EnrollmentState {
        self.state
    }

    /// Transitions so far, oldest first.
    pub fn history(&self) -> &VecDeque<EnrollmentTransition> {
        &self.history
    }

    /// Move to `next`.
    ///
    /// # Errors
    /// Returns `InvalidStateTransition` if the rules forbid the move; the
    /// state is left unchanged.
    pub fn transition_to(&mut self, next: EnrollmentState) -> biogate_core::Result<()> {
        if !self.state.can_transition_to(&next) {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        if self.history.len() == MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(EnrollmentTransition {
            from: self.state,
            to: next,
            at: Instant::now(),
        });
        debug!(from = %self.state, to = %next, "Enrollment transition");
        self.state = next;
        Ok(())
    }
}

/// User-facing enrollment milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentMilestone {
    AwaitFirstScan,
    Template1Ready,
    RemoveFinger,
    AwaitSecondScan,
    Template2Ready,
    ModelCreated,
    Stored,
}

impl EnrollmentMilestone {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentMilestone::AwaitFirstScan => "await_first_scan",
            EnrollmentMilestone::Template1Ready => "template1_ready",
            EnrollmentMilestone::RemoveFinger => "remove_finger",
            EnrollmentMilestone::AwaitSecondScan => "await_second_scan",
            EnrollmentMilestone::Template2Ready => "template2_ready",
            EnrollmentMilestone::ModelCreated => "model_created",
            EnrollmentMilestone::Stored => "stored",
        }
    }

    /// Prompt shown to the person enrolling.
    pub fn message(&self) -> &'static str {
        match self {
            EnrollmentMilestone::AwaitFirstScan => "Place finger on the sensor",
            EnrollmentMilestone::Template1Ready => "First scan captured",
            EnrollmentMilestone::RemoveFinger => "Remove finger",
            EnrollmentMilestone::AwaitSecondScan => "Place the same finger again",
            EnrollmentMilestone::Template2Ready => "Second scan captured",
            EnrollmentMilestone::ModelCreated => "Fingerprint model created",
            EnrollmentMilestone::Stored => "Fingerprint stored",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnrollmentConfig {
    /// Bound for each `capture_image` call.
    pub capture_timeout: Duration,
    pub poll_interval: Duration,
    /// Pause between the two scans. Clamped to at least one second.
    pub finger_lift_pause: Duration,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            capture_timeout: Duration::from_secs(DEFAULT_CAPTURE_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            finger_lift_pause: Duration::from_millis(MIN_FINGER_LIFT_PAUSE_MS),
        }
    }
}

/// Result of one enrollment call.
#[derive(Debug, Clone)]
pub struct EnrollmentReport {
    pub outcome: EnrollmentOutcome,
    pub history: Vec<EnrollmentTransition>,
}

impl EnrollmentReport {
    /// States visited, starting with `Idle`.
    pub fn states(&self) -> Vec<EnrollmentState> {
        std::iter::once(EnrollmentState::Idle)
            .chain(self.history.iter().map(|t| t.to))
            .collect()
    }
}

/// Drives [`EnrollmentMachine`] against a sensor.
#[derive(Debug)]
pub struct EnrollmentController {
    config: EnrollmentConfig,
    progress: Option<mpsc::UnboundedSender<EnrollmentMilestone>>,
}

/// How a single step ended.
enum Step {
    Ok,
    Failed(FingerprintStatus),
}

impl EnrollmentController {
    pub fn new(mut config: EnrollmentConfig) -> Self {
        let min_pause = Duration::from_millis(MIN_FINGER_LIFT_PAUSE_MS);
        if config.finger_lift_pause < min_pause {
            warn!(
                requested_ms = config.finger_lift_pause.as_millis() as u64,
                "Finger lift pause raised to the minimum"
            );
            config.finger_lift_pause = min_pause;
        }
        Self {
            config,
            progress: None,
        }
    }

    /// Publish milestones on `tx`. A closed receiver is ignored.
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<EnrollmentMilestone>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn config(&self) -> &EnrollmentConfig {
        &self.config
    }

    /// Enroll one finger into `slot`.
    ///
    /// # Errors
    /// Only session-fatal sensor errors. Every other failure is reported in
    /// the returned outcome.
    pub async fn enroll<S: SensorLink>(
        &self,
        sensor: &mut S,
        slot: SlotId,
    ) -> Result<EnrollmentReport> {
        let mut machine = EnrollmentMachine::new();
        info!(slot_id = %slot, "Enrollment started");

        if let Err(e) = slot.validate(sensor.capacity()) {
            warn!(slot_id = %slot, error = %e, "Slot rejected before scanning");
            return self.fail(machine, slot, FailureStage::Store, FingerprintStatus::StoreFail);
        }

        // First impression.
        self.advance(&mut machine, EnrollmentState::AwaitFirstScan)?;
        self.notify(EnrollmentMilestone::AwaitFirstScan);
        if let Step::Failed(status) = self.capture(sensor).await? {
            return self.fail(machine, slot, FailureStage::Capture1, status);
        }
        if let Step::Failed(status) =
            check(sensor.convert_to_template(BufferId::One).await)?
        {
            return self.fail(machine, slot, FailureStage::Convert1, status);
        }
        self.advance(&mut machine, EnrollmentState::Template1Ready)?;
        self.notify(EnrollmentMilestone::Template1Ready);

        self.notify(EnrollmentMilestone::RemoveFinger);
        tokio::time::sleep(self.config.finger_lift_pause).await;

        // Second impression.
        self.advance(&mut machine, EnrollmentState::AwaitSecondScan)?;
        self.notify(EnrollmentMilestone::AwaitSecondScan);
        if let Step::Failed(status) = self.capture(sensor).await? {
            return self.fail(machine, slot, FailureStage::Capture2, status);
        }
        if let Step::Failed(status) =
            check(sensor.convert_to_template(BufferId::Two).await)?
        {
            return self.fail(machine, slot, FailureStage::Convert2, status);
        }
        self.advance(&mut machine, EnrollmentState::Template2Ready)?;
        self.notify(EnrollmentMilestone::Template2Ready);

        if let Step::Failed(status) = check(sensor.create_model().await)? {
            return self.fail(machine, slot, FailureStage::Model, status);
        }
        self.advance(&mut machine, EnrollmentState::ModelCreated)?;
        self.notify(EnrollmentMilestone::ModelCreated);

        if let Step::Failed(status) = check(sensor.store_model(slot).await)? {
            return self.fail(machine, slot, FailureStage::Store, status);
        }
        self.advance(&mut machine, EnrollmentState::Stored)?;
        self.notify(EnrollmentMilestone::Stored);

        info!(slot_id = %slot, "Enrollment stored");
        Ok(EnrollmentReport {
            outcome: EnrollmentOutcome::stored(slot),
            history: machine.history.into(),
        })
    }

    async fn capture<S: SensorLink>(&self, sensor: &mut S) -> Result<Step> {
        check(
            sensor
                .capture_image(self.config.capture_timeout, self.config.poll_interval)
                .await,
        )
    }

    fn advance(&self, machine: &mut EnrollmentMachine, next: EnrollmentState) -> Result<()> {
        machine.transition_to(next)?;
        Ok(())
    }

    fn fail(
        &self,
        mut machine: EnrollmentMachine,
        slot: SlotId,
        stage: FailureStage,
        status: FingerprintStatus,
    ) -> Result<EnrollmentReport> {
        machine.transition_to(EnrollmentState::Failed)?;
        warn!(slot_id = %slot, stage = stage.as_str(), %status, "Enrollment failed");
        Ok(EnrollmentReport {
            outcome: EnrollmentOutcome::failed(slot, stage, status),
            history: machine.history.into(),
        })
    }

    fn notify(&self, milestone: EnrollmentMilestone) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(milestone);
        }
    }
}

/// Split a sensor answer into continue / stop-with-status / fatal error.
fn check(result: biogate_hardware::Result<FingerprintStatus>) -> Result<Step> {
    match result {
        Ok(status) if status.is_ok() => Ok(Step::Ok),
        Ok(status) => Ok(Step::Failed(status)),
        Err(e) if e.kind().severity().is_session_fatal() => Err(e.into()),
        Err(e) => Ok(Step::Failed(status_of(&e))),
    }
}

fn status_of(error: &HardwareError) -> FingerprintStatus {
    match error {
        HardwareError::Timeout { .. } => FingerprintStatus::Timeout,
        HardwareError::SensorProtocol { status, .. } => *status,
        _ => FingerprintStatus::CommError,
    }
}
