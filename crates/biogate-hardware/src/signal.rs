//! Grant output line.
//!
//! The line is HIGH only while a [`SignalGuard`] is alive. Dropping the guard
//! (normal return, error, panic unwind or a cancelled future) drives it LOW.

use crate::error::{HardwareError, Result};
use crate::traits::SignalLine;
use crate::types::SignalLevel;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default sysfs GPIO root.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Holds a line HIGH for its lifetime.
#[derive(Debug)]
pub struct SignalGuard<'a, L: SignalLine> {
    line: &'a mut L,
}

impl<'a, L: SignalLine> SignalGuard<'a, L> {
    /// Drive the line HIGH.
    ///
    /// # Errors
    /// Returns the line error; the line is forced LOW again before returning.
    pub fn assert(line: &'a mut L) -> Result<Self> {
        if let Err(e) = line.set_level(SignalLevel::High) {
            let _ = line.set_level(SignalLevel::Low);
            return Err(e);
        }
        Ok(Self { line })
    }

    /// Drive the line LOW now, reporting any failure.
    ///
    /// # Errors
    /// Returns the line error.
    pub fn release(self) -> Result<()> {
        let mut this = std::mem::ManuallyDrop::new(self);
        this.line.set_level(SignalLevel::Low)
    }
}

impl<L: SignalLine> Drop for SignalGuard<'_, L> {
    fn drop(&mut self) {
        if let Err(e) = self.line.set_level(SignalLevel::Low) {
            warn!(error = %e, "Failed to drive grant line LOW");
        }
    }
}

/// Hold the line HIGH for `duration`, then LOW.
///
/// # Errors
/// Returns an error if the line cannot be driven HIGH or back LOW.
pub async fn pulse<L: SignalLine>(line: &mut L, duration: Duration) -> Result<()> {
    let guard = SignalGuard::assert(line)?;
    debug!(duration_ms = duration.as_millis() as u64, "Grant line HIGH");
    tokio::time::sleep(duration).await;
    guard.release()?;
    debug!("Grant line LOW");
    Ok(())
}

/// GPIO output through the legacy sysfs interface.
#[derive(Debug)]
pub struct SysfsSignalLine {
    pin: u32,
    value_path: PathBuf,
    level: SignalLevel,
}

impl SysfsSignalLine {
    /// Export `pin` under `/sys/class/gpio` and configure it as an output
    /// starting LOW.
    ///
    /// # Errors
    /// Returns `InitializationFailed` if the pin cannot be exported or
    /// configured.
    pub fn open(pin: u32) -> Result<Self> {
        Self::open_at(SYSFS_GPIO_ROOT, pin)
    }

    /// Same as [`open`](Self::open) with a custom sysfs root.
    ///
    /// # Errors
    /// Returns `InitializationFailed` if the pin cannot be exported or
    /// configured.
    pub fn open_at(root: impl AsRef<Path>, pin: u32) -> Result<Self> {
        let root = root.as_ref();
        let pin_dir = root.join(format!("gpio{pin}"));

        if !pin_dir.exists() {
            fs::write(root.join("export"), pin.to_string()).map_err(|e| {
                HardwareError::initialization_failed(format!("export gpio{pin}: {e}"))
            })?;
        }
        if !pin_dir.is_dir() {
            return Err(HardwareError::initialization_failed(format!(
                "gpio{pin} did not appear under {}",
                root.display()
            )));
        }

        // "low" sets the direction to output with an initial LOW value.
        fs::write(pin_dir.join("direction"), "low").map_err(|e| {
            HardwareError::initialization_failed(format!("configure gpio{pin}: {e}"))
        })?;

        let mut line = Self {
            pin,
            value_path: pin_dir.join("value"),
            level: SignalLevel::Low,
        };
        line.set_level(SignalLevel::Low)?;
        info!(pin, "Grant line ready");
        Ok(line)
    }

    #[must_use]
    pub fn pin(&self) -> u32 {
        self.pin
    }
}

impl SignalLine for SysfsSignalLine {
    fn set_level(&mut self, level: SignalLevel) -> Result<()> {
        fs::write(&self.value_path, level.as_sysfs())?;
        self.level = level;
        Ok(())
    }

    fn level(&self) -> SignalLevel {
        self.level
    }
}

impl Drop for SysfsSignalLine {
    fn drop(&mut self) {
        if let Err(e) = fs::write(&self.value_path, SignalLevel::Low.as_sysfs()) {
            warn!(pin = self.pin, error = %e, "Failed to drive grant line LOW on close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSignalLine;
    use tempfile::TempDir;

    fn sysfs_root(pin: u32) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(format!("gpio{pin}"))).unwrap();
        dir
    }

    #[test]
    fn test_sysfs_open_starts_low() {
        let root = sysfs_root(17);
        let line = SysfsSignalLine::open_at(root.path(), 17).unwrap();
        assert_eq!(line.level(), SignalLevel::Low);
        let dir = root.path().join("gpio17");
        assert_eq!(fs::read_to_string(dir.join("direction")).unwrap(), "low");
        assert_eq!(fs::read_to_string(dir.join("value")).unwrap(), "0");
    }

    #[test]
    fn test_sysfs_drop_drives_low() {
        let root = sysfs_root(4);
        let value = root.path().join("gpio4/value");
        {
            let mut line = SysfsSignalLine::open_at(root.path(), 4).unwrap();
            line.set_level(SignalLevel::High).unwrap();
            assert_eq!(fs::read_to_string(&value).unwrap(), "1");
        }
        assert_eq!(fs::read_to_string(&value).unwrap(), "0");
    }

    #[test]
    fn test_sysfs_missing_pin_fails() {
        let root = tempfile::tempdir().unwrap();
        let err = SysfsSignalLine::open_at(root.path(), 22).unwrap_err();
        assert!(matches!(err, HardwareError::InitializationFailed { .. }));
    }

    #[test]
    fn test_guard_drop_drives_low() {
        let (mut line, handle) = MockSignalLine::new();
        {
            let _guard = SignalGuard::assert(&mut line).unwrap();
            assert_eq!(handle.level(), SignalLevel::High);
        }
        assert_eq!(handle.level(), SignalLevel::Low);
        assert_eq!(handle.history(), vec![SignalLevel::High, SignalLevel::Low]);
    }

    #[test]
    fn test_guard_low_on_panic() {
        let (mut line, handle) = MockSignalLine::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = SignalGuard::assert(&mut line).unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(handle.level(), SignalLevel::Low);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pulse_duration() {
        let (mut line, handle) = MockSignalLine::new();
        let start = tokio::time::Instant::now();
        pulse(&mut line, Duration::from_secs(5)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(handle.history(), vec![SignalLevel::High, SignalLevel::Low]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_pulse_drives_low() {
        let (mut line, handle) = MockSignalLine::new();
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            pulse(&mut line, Duration::from_secs(5)),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(handle.level(), SignalLevel::Low);
        assert_eq!(handle.high_count(), 1);
    }

    #[test]
    fn test_failed_assert_leaves_low() {
        let (mut line, handle) = MockSignalLine::new();
        handle.fail_high(true);
        assert!(SignalGuard::assert(&mut line).is_err());
        assert_eq!(handle.level(), SignalLevel::Low);
    }
}
