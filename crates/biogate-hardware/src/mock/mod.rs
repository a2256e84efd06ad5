//! Mock devices driven through control handles.
//!
//! Each constructor returns `(device, handle)`; the handle shares state with
//! the device so tests can script input and observe side effects.

pub mod camera;
pub mod embedder;
pub mod sensor;
pub mod signal;

pub use camera::{MockCamera, MockCameraHandle};
pub use embedder::{MockEmbedder, MockEmbedderHandle};
pub use sensor::{DEFAULT_MOCK_CONFIDENCE, MockOp, MockSensor, MockSensorHandle};
pub use signal::{MockSignalLine, MockSignalLineHandle};
