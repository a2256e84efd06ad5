//! Biometric authentication core.
//!
//! - [`EnrollmentController`]: two-scan enrollment state machine.
//! - [`MatchController`]: one bounded fingerprint identification.
//! - [`FaceMatcher`]: embedding extraction and distance decision.
//! - [`AuthOrchestrator`]: the fingerprint → face → grant/deny loop.
//!
//! # Attempt flow
//!
//! ```text
//! search (≤ match timeout)
//!   ├─ Timeout / NoMatch ──────────────> debug log, next attempt
//!   └─ Matched(slot)
//!        capture → fetch reference → embed → verify
//!          ├─ failure ─────────────────> classified log, line stays LOW
//!          └─ AuthOutcome
//!               ├─ matched: grant pulse ┐
//!               └─ journal + submit ────┴─ joined, next attempt
//! ```
//!
//! Enrollment and authentication share no state; they are kept apart by
//! [`biogate_hardware::SensorSession`].

pub mod enrollment;
pub mod error;
pub mod face;
pub mod matcher;
pub mod orchestrator;

pub use enrollment::{
    EnrollmentConfig, EnrollmentController, EnrollmentMachine, EnrollmentMilestone,
    EnrollmentReport, EnrollmentState, EnrollmentTransition,
};
pub use error::{AuthError, Result};
pub use face::{FaceMatcher, FaceVerdict, euclidean_distance};
pub use matcher::{MatchConfig, MatchController};
pub use orchestrator::{AttemptReport, AuthConfig, AuthOrchestrator};
