//! Exclusive ownership of a sensor transport.
//!
//! Enrollment and authentication must never interleave on the same sensor.
//! A [`SensorSession`] registers the sensor's transport id in a process-wide
//! set for as long as it lives; a second session on the same transport fails
//! with `SessionBusy`.

use crate::error::{HardwareError, Result};
use crate::traits::SensorLink;
use std::collections::HashSet;
use std::ops::{Deref, DerefMut};
use std::sync::{LazyLock, Mutex, PoisonError};
use tracing::{debug, warn};

static ACTIVE_TRANSPORTS: LazyLock<Mutex<HashSet<String>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

/// A sensor held exclusively for one workflow.
#[derive(Debug)]
pub struct SensorSession<S: SensorLink> {
    sensor: S,
    key: String,
}

impl<S: SensorLink> SensorSession<S> {
    /// Claim the sensor's transport.
    ///
    /// # Errors
    /// Returns `SessionBusy` if another session holds the same transport.
    pub fn acquire(sensor: S) -> Result<Self> {
        let key = sensor.transport_id().to_string();
        let mut active = ACTIVE_TRANSPORTS
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !active.insert(key.clone()) {
            warn!(transport = %key, "Sensor session already active");
            return Err(HardwareError::session_busy(key));
        }
        debug!(transport = %key, "Sensor session opened");
        Ok(Self { sensor, key })
    }

    /// Release the transport explicitly.
    pub fn close(self) {
        drop(self);
    }

    #[must_use]
    pub fn transport(&self) -> &str {
        &self.key
    }

    /// Returns `true` if some session currently holds `transport`.
    #[must_use]
    pub fn is_active(transport: &str) -> bool {
        ACTIVE_TRANSPORTS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(transport)
    }
}

impl<S: SensorLink> Deref for SensorSession<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.sensor
    }
}

impl<S: SensorLink> DerefMut for SensorSession<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.sensor
    }
}

impl<S: SensorLink> Drop for SensorSession<S> {
    fn drop(&mut self) {
        ACTIVE_TRANSPORTS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
        debug!(transport = %self.key, "Sensor session closed");
    }
}
