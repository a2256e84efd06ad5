//! Common types shared across device implementations.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Generic device information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "R307", "MockSensor").
    pub name: String,

    /// Device model identifier.
    pub model: String,

    /// Transport the device is reached through.
    pub transport: Option<String>,

    /// Optional firmware or system identifier.
    pub firmware_version: Option<String>,

    /// Template library capacity, for fingerprint sensors.
    pub capacity: Option<u16>,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            transport: None,
            firmware_version: None,
            capacity: None,
        }
    }

    pub fn with_transport(mut self, transport: impl Into<String>) -> Self {
        self.transport = Some(transport.into());
        self
    }

    pub fn with_firmware_version(mut self, firmware_version: impl Into<String>) -> Self {
        self.firmware_version = Some(firmware_version.into());
        self
    }

    pub fn with_capacity(mut self, capacity: u16) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

/// Level of a digital output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalLevel {
    Low,
    High,
}

impl SignalLevel {
    #[must_use]
    pub fn is_high(self) -> bool {
        matches!(self, SignalLevel::High)
    }

    /// Value written to a sysfs `value` file.
    #[must_use]
    pub fn as_sysfs(self) -> &'static str {
        match self {
            SignalLevel::Low => "0",
            SignalLevel::High => "1",
        }
    }
}

impl fmt::Display for SignalLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SignalLevel::Low => write!(f, "LOW"),
            SignalLevel::High => write!(f, "HIGH"),
        }
    }
}

/// One encoded still image (JPEG/PNG bytes as produced by the camera).
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFrame {
    pub bytes: Bytes,
    pub captured_at: DateTime<Utc>,
}

impl ImageFrame {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            captured_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Image content stays out of logs.
impl fmt::Debug for ImageFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFrame")
            .field("len", &self.bytes.len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}
