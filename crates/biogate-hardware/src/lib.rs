//! Device layer for the biometric gate.
//!
//! Every physical collaborator sits behind a narrow trait so the
//! authentication core can run against real hardware or the mocks in
//! [`mock`]:
//!
//! - [`SensorLink`]: fingerprint sensor operations (serial driver in [`serial`])
//! - [`SignalLine`]: the grant output line (sysfs GPIO in [`signal`])
//! - [`FrameSource`]: still-image capture (external command in [`camera`])
//! - [`FaceEmbedder`]: face detection and embedding model
//!
//! All async methods use native `async fn` in traits (Edition 2024). The
//! sensor is a strictly sequential resource: every operation takes
//! `&mut self`, and [`SensorSession`] keeps enrollment and authentication
//! from sharing one transport.
//!
//! ```no_run
//! use biogate_hardware::{SensorLink, Result};
//! use std::time::Duration;
//!
//! async fn wait_for_finger<S: SensorLink>(sensor: &mut S) -> Result<bool> {
//!     let status = sensor
//!         .capture_image(Duration::from_secs(30), Duration::from_millis(100))
//!         .await?;
//!     Ok(status.is_ok())
//! }
//! ```

pub mod camera;
pub mod error;
pub mod mock;
pub mod poll;
pub mod serial;
pub mod session;
pub mod signal;
pub mod traits;
pub mod types;

pub use camera::{CommandFrameSource, CommandFrameSourceConfig};
pub use error::{HardwareError, Result};
pub use poll::{Deadline, PollOutcome, poll_until};
pub use serial::{SerialSensor, SerialSensorConfig};
pub use session::SensorSession;
pub use signal::{SignalGuard, SysfsSignalLine, pulse};
pub use traits::{FaceEmbedder, FrameSource, SensorLink, SignalLine};
pub use types::{DeviceInfo, ImageFrame, SignalLevel};
