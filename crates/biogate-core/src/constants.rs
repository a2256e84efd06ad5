//! Core constants for the biometric access-control pipeline.
//!
//! This module centralizes the defaults shared by the sensor driver, the
//! enrollment and matching controllers, the face matcher and the CLI. Every
//! value here is a *default*: deployments override them through the
//! configuration file, and the core never hard-codes them at call sites.
//!
//! # Usage
//!
//! ```
//! use biogate_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(EMBEDDING_DIMENSION, 512);
//! let poll = Duration::from_millis(DEFAULT_POLL_INTERVAL_MS);
//! assert!(poll.as_millis() >= MIN_POLL_INTERVAL_MS as u128);
//! ```

// ============================================================================
// Fingerprint Sensor
// ============================================================================

/// Default template capacity of the sensor library (AS608/R307 class devices).
pub const DEFAULT_SENSOR_CAPACITY: u16 = 200;

/// Default serial device the sensor is wired to on a Raspberry Pi.
pub const DEFAULT_SERIAL_PORT: &str = "/dev/serial0";

/// Default UART baud rate of the sensor.
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Broadcast module address accepted by factory-configured sensors.
pub const DEFAULT_SENSOR_ADDRESS: u32 = 0xFFFF_FFFF;

/// Factory handshake password.
pub const DEFAULT_SENSOR_PASSWORD: u32 = 0x0000_0000;

/// Timeout for a single request/acknowledge exchange on the serial link.
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 1_000;

// ============================================================================
// Polling and Timeouts
// ============================================================================

/// Default interval between two image-capture polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Lower bound for the capture poll interval.
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Upper bound for the capture poll interval.
pub const MAX_POLL_INTERVAL_MS: u64 = 500;

/// Default bound for one `capture_image` call during enrollment.
pub const DEFAULT_CAPTURE_TIMEOUT_SECS: u64 = 30;

/// Default bound for one fingerprint search in the authentication loop.
pub const DEFAULT_MATCH_TIMEOUT_SECS: u64 = 30;

/// Pause between the two enrollment scans; never shorter than this.
pub const MIN_FINGER_LIFT_PAUSE_MS: u64 = 1_000;

/// Upper bound for a whole authentication attempt (search, capture, embed,
/// verify, signal and log).
pub const DEFAULT_ATTEMPT_DEADLINE_SECS: u64 = 90;

// ============================================================================
// Face Matching
// ============================================================================

/// Length of every face embedding produced by the recognition model.
pub const EMBEDDING_DIMENSION: usize = 512;

/// Default Euclidean distance threshold. A pair matches when
/// `distance < threshold`.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 1.1;

// ============================================================================
// Grant Signal
// ============================================================================

/// Default duration the grant line stays HIGH after a successful match.
pub const DEFAULT_GRANT_PULSE_SECS: u64 = 5;

// ============================================================================
// Backend
// ============================================================================

/// Default base URL of the backend service.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";

/// Default per-request timeout for backend calls.
pub const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 3_000;

/// Default number of attempts for one backend call (first try included).
pub const DEFAULT_BACKEND_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry; doubled after each failure.
pub const DEFAULT_BACKEND_BACKOFF_MS: u64 = 200;

/// Result string posted to the backend for a granted attempt.
pub const RESULT_GRANTED: &str = "granted";

/// Result string posted to the backend for a denied attempt.
pub const RESULT_DENIED: &str = "denied";
