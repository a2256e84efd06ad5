//! Fingerprint identification.

use crate::error::Result;
use biogate_core::constants::DEFAULT_POLL_INTERVAL_MS;
use biogate_core::{BufferId, FingerprintStatus, MatchResult};
use biogate_hardware::{HardwareError, SensorLink};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub poll_interval: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// Stateless: every call is one capture, one conversion into buffer 1 and
/// one library search.
#[derive(Debug, Clone, Default)]
pub struct MatchController {
    config: MatchConfig,
}

impl MatchController {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Wait up to `timeout` for a finger and identify it.
    ///
    /// Returns `MatchResult::Timeout` when no finger arrives; this is not an
    /// error.
    ///
    /// # Errors
    /// Link errors, and `SensorProtocol` when the image cannot be read or
    /// converted.
    pub async fn search<S: SensorLink>(&self, sensor: &mut S, timeout: Duration) -> Result<MatchResult> {
        let status = sensor.capture_image(timeout, self.config.poll_interval).await?;
        match status {
            FingerprintStatus::Ok => {}
            FingerprintStatus::Timeout => {
                debug!(timeout_ms = timeout.as_millis() as u64, "No finger presented");
                return Ok(MatchResult::Timeout);
            }
            other => return Err(HardwareError::sensor_protocol("read_image", other).into()),
        }

        let status = sensor.convert_to_template(BufferId::One).await?;
        if !status.is_ok() {
            return Err(HardwareError::sensor_protocol("convert_to_template", status).into());
        }

        let result = sensor.search().await?;
        debug!(?result, "Fingerprint search finished");
        Ok(result)
    }
}
