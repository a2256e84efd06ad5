use crate::{
    Result,
    constants::{DEFAULT_MATCH_THRESHOLD, EMBEDDING_DIMENSION, RESULT_DENIED, RESULT_GRANTED},
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Template slot in the sensor library (`0..capacity`).
///
/// Slots are always assigned by the caller; the system never picks one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(u16);

impl SlotId {
    /// Create a slot id validated against the sensor capacity.
    ///
    /// # Errors
    /// Returns `Error::InvalidSlot` if `id >= capacity`.
    pub fn new(id: u16, capacity: u16) -> Result<Self> {
        if id >= capacity {
            return Err(Error::InvalidSlot { slot: id, capacity });
        }
        Ok(SlotId(id))
    }

    /// Wrap a slot index reported by the sensor itself.
    ///
    /// Callers holding user input must go through [`SlotId::new`] or
    /// [`SlotId::validate`].
    #[must_use]
    pub const fn from_raw(id: u16) -> Self {
        SlotId(id)
    }

    /// Re-check this slot against a (possibly smaller) capacity.
    ///
    /// # Errors
    /// Returns `Error::InvalidSlot` if the slot does not fit.
    pub fn validate(self, capacity: u16) -> Result<Self> {
        SlotId::new(self.0, capacity)
    }

    #[must_use]
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SlotId {
    type Err = Error;

    /// Parses the numeric form. Capacity is checked later, once the sensor
    /// has reported it.
    fn from_str(s: &str) -> Result<Self> {
        let id: u16 = s
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("Invalid slot id: {s}")))?;
        Ok(SlotId(id))
    }
}

/// One of the sensor's two character buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BufferId {
    One = 1,
    Two = 2,
}

impl BufferId {
    /// # Errors
    /// Returns `Error::InvalidBuffer` for anything but 1 or 2.
    #[inline]
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(BufferId::One),
            2 => Ok(BufferId::Two),
            other => Err(Error::InvalidBuffer(other)),
        }
    }

    #[inline]
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_u8())
    }
}

/// Status produced by every sensor operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintStatus {
    Ok,
    NoFinger,
    ImageFail,
    ConvertFail,
    NoMatch,
    CommError,
    StoreFail,
    /// A bounded wait expired. Counts as a communication error.
    Timeout,
}

impl FingerprintStatus {
    #[inline]
    #[must_use]
    pub fn is_ok(self) -> bool {
        matches!(self, FingerprintStatus::Ok)
    }

    /// Returns `true` for `CommError` and its timeout flavour.
    #[inline]
    #[must_use]
    pub fn is_comm_error(self) -> bool {
        matches!(self, FingerprintStatus::CommError | FingerprintStatus::Timeout)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FingerprintStatus::Ok => "ok",
            FingerprintStatus::NoFinger => "no_finger",
            FingerprintStatus::ImageFail => "image_fail",
            FingerprintStatus::ConvertFail => "convert_fail",
            FingerprintStatus::NoMatch => "no_match",
            FingerprintStatus::CommError => "comm_error",
            FingerprintStatus::StoreFail => "store_fail",
            FingerprintStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FingerprintStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one fingerprint search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MatchResult {
    Matched { slot_id: SlotId, confidence: u16 },
    NoMatch,
    Timeout,
}

impl MatchResult {
    #[must_use]
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }

    #[must_use]
    pub fn slot_id(&self) -> Option<SlotId> {
        match self {
            MatchResult::Matched { slot_id, .. } => Some(*slot_id),
            _ => None,
        }
    }
}

/// Fixed-length face embedding.
///
/// Always exactly [`EMBEDDING_DIMENSION`] finite elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct FaceEmbedding(Vec<f32>);

impl FaceEmbedding {
    /// # Errors
    /// Returns `Error::InvalidEmbedding` for any length other than 512 and
    /// `Error::NonFiniteEmbedding` if an element is NaN or infinite.
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.len() != EMBEDDING_DIMENSION {
            return Err(Error::InvalidEmbedding {
                expected: EMBEDDING_DIMENSION,
                actual: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::NonFiniteEmbedding);
        }
        Ok(FaceEmbedding(values))
    }

    /// Narrow a double-precision vector (legacy payloads).
    ///
    /// # Errors
    /// Same as [`FaceEmbedding::new`].
    pub fn from_f64(values: &[f64]) -> Result<Self> {
        FaceEmbedding::new(values.iter().map(|&v| v as f32).collect())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl TryFrom<Vec<f32>> for FaceEmbedding {
    type Error = Error;

    fn try_from(values: Vec<f32>) -> Result<Self> {
        FaceEmbedding::new(values)
    }
}

impl From<FaceEmbedding> for Vec<f32> {
    fn from(embedding: FaceEmbedding) -> Self {
        embedding.0
    }
}

/// Euclidean distance threshold. Lower distances are better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct MatchThreshold(f64);

impl MatchThreshold {
    /// # Errors
    /// Returns `Error::InvalidThreshold` unless the value is finite and positive.
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || value <= 0.0 {
            return Err(Error::InvalidThreshold(value));
        }
        Ok(MatchThreshold(value))
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Strict comparison: a distance equal to the threshold does not match.
    #[inline]
    #[must_use]
    pub fn is_match(&self, distance: f64) -> bool {
        distance < self.0
    }
}

impl Default for MatchThreshold {
    fn default() -> Self {
        MatchThreshold(DEFAULT_MATCH_THRESHOLD)
    }
}

impl TryFrom<f64> for MatchThreshold {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        MatchThreshold::new(value)
    }
}

impl From<MatchThreshold> for f64 {
    fn from(threshold: MatchThreshold) -> Self {
        threshold.0
    }
}

impl fmt::Display for MatchThreshold {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decision of one authentication attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthOutcome {
    pub attempt_id: Uuid,
    pub slot_id: SlotId,
    pub matched: bool,
    pub distance: f64,
    pub timestamp: DateTime<Utc>,
}

impl AuthOutcome {
    /// Compose an outcome stamped with the current time.
    #[must_use]
    pub fn new(attempt_id: Uuid, slot_id: SlotId, matched: bool, distance: f64) -> Self {
        Self {
            attempt_id,
            slot_id,
            matched,
            distance,
            timestamp: Utc::now(),
        }
    }

    /// `"granted"` or `"denied"`.
    #[must_use]
    pub fn result_str(&self) -> &'static str {
        if self.matched {
            RESULT_GRANTED
        } else {
            RESULT_DENIED
        }
    }
}

/// Enrollment step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Capture1,
    Convert1,
    Capture2,
    Convert2,
    Model,
    Store,
}

impl FailureStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FailureStage::Capture1 => "capture1",
            FailureStage::Convert1 => "convert1",
            FailureStage::Capture2 => "capture2",
            FailureStage::Convert2 => "convert2",
            FailureStage::Model => "model",
            FailureStage::Store => "store",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of one enrollment call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentOutcome {
    pub slot_id: SlotId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_stage: Option<FailureStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FingerprintStatus>,
}

impl EnrollmentOutcome {
    #[must_use]
    pub fn stored(slot_id: SlotId) -> Self {
        Self {
            slot_id,
            success: true,
            failure_stage: None,
            status: None,
        }
    }

    #[must_use]
    pub fn failed(slot_id: SlotId, stage: FailureStage, status: FingerprintStatus) -> Self {
        Self {
            slot_id,
            success: false,
            failure_stage: Some(stage),
            status: Some(status),
        }
    }
}
