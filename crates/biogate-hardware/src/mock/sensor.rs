//! Mock fingerprint sensor.
//!
//! Fingers are modelled as opaque `u32` patterns. The handle places or lifts a
//! finger, preloads the library and injects failures; the sensor behaves like
//! the real device's buffer model (image buffer, char buffers 1/2, library).

use crate::error::{HardwareError, Result};
use crate::traits::SensorLink;
use crate::types::DeviceInfo;
use biogate_core::{
    BufferId, FingerprintStatus, MatchResult, SlotId, constants::DEFAULT_SENSOR_CAPACITY,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default confidence reported for a library hit.
pub const DEFAULT_MOCK_CONFIDENCE: u16 = 80;

/// Sensor operation targeted by failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    ReadImage,
    Convert,
    CreateModel,
    Store,
    Search,
}

#[derive(Debug)]
struct State {
    finger: Option<u32>,
    image: Option<u32>,
    buffers: [Option<u32>; 2],
    library: HashMap<u16, u32>,
    capacity: u16,
    confidence: u16,
    injected: HashMap<MockOp, VecDeque<FingerprintStatus>>,
    connected: bool,
    stalled: bool,
    image_reads: usize,
    calls: Vec<MockOp>,
}

impl State {
    fn new(capacity: u16) -> Self {
        Self {
            finger: None,
            image: None,
            buffers: [None, None],
            library: HashMap::new(),
            capacity,
            confidence: DEFAULT_MOCK_CONFIDENCE,
            injected: HashMap::new(),
            connected: true,
            stalled: false,
            image_reads: 0,
            calls: Vec::new(),
        }
    }

    fn injected(&mut self, op: MockOp) -> Option<FingerprintStatus> {
        self.injected.get_mut(&op).and_then(VecDeque::pop_front)
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock fingerprint sensor for testing and development.
///
/// # Examples
///
/// ```
/// use biogate_core::{BufferId, FingerprintStatus, MatchResult, SlotId};
/// use biogate_hardware::SensorLink;
/// use biogate_hardware::mock::MockSensor;
///
/// #[tokio::main]
/// async fn main() -> biogate_hardware::Result<()> {
///     let (mut sensor, handle) = MockSensor::new();
///     handle.enroll(SlotId::from_raw(7), 42);
///     handle.place_finger(42);
///
///     assert_eq!(sensor.read_image().await?, FingerprintStatus::Ok);
///     sensor.convert_to_template(BufferId::One).await?;
///     assert!(matches!(sensor.search().await?, MatchResult::Matched { confidence: 80, .. }));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockSensor {
    state: Arc<Mutex<State>>,
    transport: String,
}

impl MockSensor {
    pub fn new() -> (Self, MockSensorHandle) {
        Self::with_config("mock://sensor", DEFAULT_SENSOR_CAPACITY)
    }

    pub fn with_transport(transport: impl Into<String>) -> (Self, MockSensorHandle) {
        Self::with_config(transport, DEFAULT_SENSOR_CAPACITY)
    }

    pub fn with_config(transport: impl Into<String>, capacity: u16) -> (Self, MockSensorHandle) {
        let state = Arc::new(Mutex::new(State::new(capacity)));
        let sensor = Self {
            state: Arc::clone(&state),
            transport: transport.into(),
        };
        (sensor, MockSensorHandle { state })
    }

    fn check_connected(&self) -> Result<()> {
        if lock(&self.state).connected {
            Ok(())
        } else {
            Err(HardwareError::disconnected(&self.transport))
        }
    }
}

impl SensorLink for MockSensor {
    async fn read_image(&mut self) -> Result<FingerprintStatus> {
        self.check_connected()?;
        if lock(&self.state).stalled {
            std::future::pending::<()>().await;
        }

        let mut state = lock(&self.state);
        state.image_reads += 1;
        state.calls.push(MockOp::ReadImage);
        if let Some(status) = state.injected(MockOp::ReadImage) {
            return Ok(status);
        }
        let finger = state.finger;
        match finger {
            Some(finger) => {
                state.image = Some(finger);
                Ok(FingerprintStatus::Ok)
            }
            None => Ok(FingerprintStatus::NoFinger),
        }
    }

    async fn convert_to_template(&mut self, buffer: BufferId) -> Result<FingerprintStatus> {
        self.check_connected()?;
        let mut state = lock(&self.state);
        state.calls.push(MockOp::Convert);
        if let Some(status) = state.injected(MockOp::Convert) {
            return Ok(status);
        }
        let image = state.image;
        match image {
            Some(image) => {
                state.buffers[usize::from(buffer.to_u8() - 1)] = Some(image);
                Ok(FingerprintStatus::Ok)
            }
            None => Ok(FingerprintStatus::ConvertFail),
        }
    }

    async fn create_model(&mut self) -> Result<FingerprintStatus> {
        self.check_connected()?;
        let mut state = lock(&self.state);
        state.calls.push(MockOp::CreateModel);
        if let Some(status) = state.injected(MockOp::CreateModel) {
            return Ok(status);
        }
        let buffers = state.buffers;
        match buffers {
            [Some(a), Some(b)] if a == b => {
                // The merged model replaces buffer 1, as on the device.
                state.buffers = [Some(a), None];
                Ok(FingerprintStatus::Ok)
            }
            _ => Ok(FingerprintStatus::NoMatch),
        }
    }

    async fn store_model(&mut self, slot: SlotId) -> Result<FingerprintStatus> {
        self.check_connected()?;
        let mut state = lock(&self.state);
        state.calls.push(MockOp::Store);
        if let Some(status) = state.injected(MockOp::Store) {
            return Ok(status);
        }
        if slot.as_u16() >= state.capacity {
            return Ok(FingerprintStatus::StoreFail);
        }
        let model = state.buffers[0];
        match model {
            Some(model) => {
                state.library.insert(slot.as_u16(), model);
                Ok(FingerprintStatus::Ok)
            }
            None => Ok(FingerprintStatus::StoreFail),
        }
    }

    async fn search(&mut self) -> Result<MatchResult> {
        self.check_connected()?;
        let mut state = lock(&self.state);
        state.calls.push(MockOp::Search);
        if let Some(status) = state.injected(MockOp::Search) {
            return match status {
                FingerprintStatus::NoMatch => Ok(MatchResult::NoMatch),
                other => Err(HardwareError::sensor_protocol("search", other)),
            };
        }
        let Some(features) = state.buffers[0] else {
            return Ok(MatchResult::NoMatch);
        };
        let hit = state
            .library
            .iter()
            .filter(|(_, template)| **template == features)
            .map(|(slot, _)| *slot)
            .min();
        Ok(match hit {
            Some(slot) => MatchResult::Matched {
                slot_id: SlotId::from_raw(slot),
                confidence: state.confidence,
            },
            None => MatchResult::NoMatch,
        })
    }

    async fn template_count(&mut self) -> Result<u16> {
        self.check_connected()?;
        Ok(lock(&self.state).library.len() as u16)
    }

    fn capacity(&self) -> u16 {
        lock(&self.state).capacity
    }

    fn transport_id(&self) -> &str {
        &self.transport
    }

    async fn get_device_info(&self) -> Result<DeviceInfo> {
        self.check_connected()?;
        Ok(DeviceInfo::new("MockSensor", "Mock Fingerprint Sensor v1.0")
            .with_transport(&self.transport)
            .with_firmware_version("1.0.0")
            .with_capacity(self.capacity()))
    }
}

/// Handle for controlling a [`MockSensor`].
#[derive(Debug, Clone)]
pub struct MockSensorHandle {
    state: Arc<Mutex<State>>,
}

impl MockSensorHandle {
    /// Put a finger with the given pattern on the window.
    pub fn place_finger(&self, finger: u32) {
        lock(&self.state).finger = Some(finger);
    }

    pub fn lift_finger(&self) {
        lock(&self.state).finger = None;
    }

    /// Preload the library.
    pub fn enroll(&self, slot: SlotId, finger: u32) {
        lock(&self.state).library.insert(slot.as_u16(), finger);
    }

    /// Pattern stored in `slot`, if any.
    #[must_use]
    pub fn template(&self, slot: SlotId) -> Option<u32> {
        lock(&self.state).library.get(&slot.as_u16()).copied()
    }

    /// Make the next call of `op` answer `status`. Calls queue up.
    pub fn fail_next(&self, op: MockOp, status: FingerprintStatus) {
        lock(&self.state)
            .injected
            .entry(op)
            .or_default()
            .push_back(status);
    }

    pub fn set_confidence(&self, confidence: u16) {
        lock(&self.state).confidence = confidence;
    }

    /// Every subsequent call fails with `Disconnected`.
    pub fn disconnect(&self) {
        lock(&self.state).connected = false;
    }

    /// `read_image` never completes while stalled.
    pub fn stall(&self, stalled: bool) {
        lock(&self.state).stalled = stalled;
    }

    #[must_use]
    pub fn image_reads(&self) -> usize {
        lock(&self.state).image_reads
    }

    /// Operations performed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MockOp> {
        lock(&self.state).calls.clone()
    }
}
