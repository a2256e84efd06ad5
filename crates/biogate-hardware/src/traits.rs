//! Device trait definitions.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT).
//! They are therefore not object-safe; callers are generic over the device
//! type.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::poll::{PollOutcome, poll_until};
use crate::types::{DeviceInfo, ImageFrame, SignalLevel};
use biogate_core::{BufferId, FingerprintStatus, MatchResult, SlotId};
use std::time::Duration;
use tracing::debug;

/// Fingerprint sensor operations.
///
/// Non-Ok sensor answers come back as `Ok(status)`; `Err` is reserved for
/// failures of the link itself or answers the operation cannot interpret.
///
/// # Examples
///
/// ```no_run
/// use biogate_core::{BufferId, FingerprintStatus, SlotId};
/// use biogate_hardware::{Result, SensorLink};
/// use std::time::Duration;
///
/// async fn store_once<S: SensorLink>(sensor: &mut S, slot: SlotId) -> Result<FingerprintStatus> {
///     let poll = Duration::from_millis(100);
///     let status = sensor.capture_image(Duration::from_secs(30), poll).await?;
///     if !status.is_ok() {
///         return Ok(status);
///     }
///     sensor.convert_to_template(BufferId::One).await
/// }
/// ```
pub trait SensorLink: Send {
    /// One image acquisition attempt. `NoFinger` if the window is empty.
    async fn read_image(&mut self) -> Result<FingerprintStatus>;

    /// Extract features of the pending image into `buffer`.
    async fn convert_to_template(&mut self, buffer: BufferId) -> Result<FingerprintStatus>;

    /// Merge both buffers into one model. `NoMatch` if they differ.
    async fn create_model(&mut self) -> Result<FingerprintStatus>;

    /// Persist the model into `slot`. `StoreFail` outside capacity.
    async fn store_model(&mut self, slot: SlotId) -> Result<FingerprintStatus>;

    /// Search the library with the features in buffer 1.
    async fn search(&mut self) -> Result<MatchResult>;

    /// Number of templates currently stored.
    async fn template_count(&mut self) -> Result<u16>;

    /// Library capacity reported by the device.
    fn capacity(&self) -> u16;

    /// Stable identifier of the underlying transport.
    fn transport_id(&self) -> &str;

    async fn get_device_info(&self) -> Result<DeviceInfo>;

    /// Poll [`read_image`](Self::read_image) every `poll_interval` until an
    /// image is taken or `timeout` elapses.
    ///
    /// `NoFinger` keeps polling, any other status is returned as is, and
    /// expiry yields `FingerprintStatus::Timeout`.
    async fn capture_image(
        &mut self,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<FingerprintStatus> {
        let outcome = poll_until(
            timeout,
            poll_interval,
            async || -> Result<Option<FingerprintStatus>> {
                let status = self.read_image().await?;
                Ok((status != FingerprintStatus::NoFinger).then_some(status))
            },
        )
        .await?;

        Ok(match outcome {
            PollOutcome::Ready(status) => status,
            PollOutcome::Expired => {
                debug!(timeout_ms = timeout.as_millis() as u64, "No finger before timeout");
                FingerprintStatus::Timeout
            }
        })
    }
}

/// Digital output line.
pub trait SignalLine: Send {
    /// # Errors
    /// Returns an error if the line cannot be driven.
    fn set_level(&mut self, level: SignalLevel) -> Result<()>;

    fn level(&self) -> SignalLevel;
}

/// Source of still images.
pub trait FrameSource: Send {
    async fn capture(&mut self) -> Result<ImageFrame>;
}

/// Face detection and embedding model.
///
/// Returns one vector per detected face, best face first. An empty list means
/// no face was found. Vector lengths are not checked here.
pub trait FaceEmbedder: Send {
    async fn embeddings(&mut self, frame: &ImageFrame) -> Result<Vec<Vec<f32>>>;
}
