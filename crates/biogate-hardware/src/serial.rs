//! Serial driver for ZFM/R30x/AS608-class fingerprint sensors.
//!
//! Each operation is one request/acknowledge transaction run on the blocking
//! pool. The port sits behind a mutex so that a transaction abandoned by a
//! timeout finishes (bounded by the I/O timeout) before the next one starts.

use crate::error::{HardwareError, Result};
use crate::traits::SensorLink;
use crate::types::DeviceInfo;
use biogate_core::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_IO_TIMEOUT_MS, DEFAULT_SENSOR_ADDRESS, DEFAULT_SENSOR_CAPACITY,
    DEFAULT_SENSOR_PASSWORD, DEFAULT_SERIAL_PORT,
};
use biogate_core::{BufferId, FingerprintStatus, MatchResult, SlotId};
use biogate_protocol::{Ack, Command, SensorCodec, SystemParameters};
use bytes::BytesMut;
use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, info, instrument, trace};

#[derive(Debug, Clone)]
pub struct SerialSensorConfig {
    pub port: String,
    pub baud_rate: u32,
    pub address: u32,
    pub password: u32,
    /// Bound for one request/acknowledge exchange.
    pub io_timeout: Duration,
}

impl Default for SerialSensorConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            address: DEFAULT_SENSOR_ADDRESS,
            password: DEFAULT_SENSOR_PASSWORD,
            io_timeout: Duration::from_millis(DEFAULT_IO_TIMEOUT_MS),
        }
    }
}

pub struct SerialSensor {
    port: Arc<Mutex<Box<dyn SerialPort>>>,
    config: SerialSensorConfig,
    params: Option<SystemParameters>,
    capacity: u16,
}

impl std::fmt::Debug for SerialSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialSensor")
            .field("port", &self.config.port)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl SerialSensor {
    /// Open the port, verify the handshake password and read the system
    /// parameters.
    ///
    /// # Errors
    /// - `InitializationFailed` if the port cannot be opened
    /// - `AuthenticationFailed` if the sensor rejects the password
    /// - any transport error raised during the handshake
    #[instrument(skip(config), fields(port = %config.port))]
    pub async fn open(config: SerialSensorConfig) -> Result<Self> {
        let path = config.port.clone();
        let baud = config.baud_rate;
        let io_timeout = config.io_timeout;
        let port = tokio::task::spawn_blocking(move || {
            serialport::new(&path, baud).timeout(io_timeout).open()
        })
        .await
        .map_err(|e| HardwareError::initialization_failed(format!("open task failed: {e}")))?
        .map_err(|e| {
            HardwareError::initialization_failed(format!("open {}: {e}", config.port))
        })?;

        let mut sensor = Self {
            port: Arc::new(Mutex::new(port)),
            config,
            params: None,
            capacity: DEFAULT_SENSOR_CAPACITY,
        };

        let ack = sensor
            .transact(Command::verify_password(sensor.config.password))
            .await?;
        if ack.code.is_wrong_password() {
            return Err(HardwareError::authentication_failed(&sensor.config.port));
        }
        if !ack.code.is_ok() {
            return Err(HardwareError::initialization_failed(format!(
                "handshake answered {}",
                ack.code
            )));
        }

        let ack = sensor.transact(Command::read_sys_para()).await?;
        if ack.code.is_ok() {
            let params = ack.system_parameters()?;
            if params.library_size > 0 {
                sensor.capacity = params.library_size;
            }
            sensor.params = Some(params);
        } else {
            debug!(code = %ack.code, "System parameters unavailable, using default capacity");
        }

        info!(capacity = sensor.capacity, "Fingerprint sensor ready");
        Ok(sensor)
    }

    async fn transact(&self, command: Command) -> Result<Ack> {
        let port = Arc::clone(&self.port);
        let address = self.config.address;
        let io_timeout = self.config.io_timeout;
        let instruction = command.instruction;
        trace!(%instruction, "Sensor request");

        let ack = tokio::task::spawn_blocking(move || {
            let mut port = port
                .lock()
                .map_err(|_| HardwareError::communication("serial port lock poisoned"))?;
            if let Err(e) = port.clear(ClearBuffer::Input) {
                trace!(error = %e, "Could not clear input buffer");
            }
            exchange(
                &mut **port,
                &mut SensorCodec::new(address),
                command,
                io_timeout,
            )
        })
        .await
        .map_err(|e| HardwareError::communication(format!("serial task failed: {e}")))??;

        trace!(%instruction, code = %ack.code, "Sensor answer");
        Ok(ack)
    }

    async fn status_of(&self, command: Command) -> Result<FingerprintStatus> {
        Ok(self.transact(command).await?.status())
    }

    #[must_use]
    pub fn system_parameters(&self) -> Option<&SystemParameters> {
        self.params.as_ref()
    }
}

/// Identity and link settings reported by the sensor itself.
fn describe_parameters(params: &SystemParameters) -> String {
    format!(
        "system id {:#06x}, {} byte packets, {} baud",
        params.system_id,
        params.packet_size(),
        params.baud_rate()
    )
}

/// Write one command and read until a complete acknowledge arrives.
fn exchange<P>(
    port: &mut P,
    codec: &mut SensorCodec,
    command: Command,
    io_timeout: Duration,
) -> Result<Ack>
where
    P: Read + Write + ?Sized,
{
    let address = codec.address();
    let mut out = BytesMut::new();
    codec.encode(command.into_packet(address), &mut out)?;
    port.write_all(&out)?;
    port.flush()?;

    let deadline = Instant::now() + io_timeout;
    let mut buf = BytesMut::with_capacity(64);
    let mut chunk = [0u8; 64];
    loop {
        if let Some(packet) = codec.decode(&mut buf)? {
            return Ok(Ack::from_packet(packet)?);
        }
        if Instant::now() >= deadline {
            return Err(HardwareError::communication(format!(
                "no acknowledge within {}ms",
                io_timeout.as_millis()
            )));
        }
        match port.read(&mut chunk) {
            Ok(0) => return Err(HardwareError::disconnected("serial port closed")),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if matches!(e.kind(), IoErrorKind::TimedOut | IoErrorKind::WouldBlock) => {}
            Err(e) if e.kind() == IoErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
}

impl SensorLink for SerialSensor {
    async fn read_image(&mut self) -> Result<FingerprintStatus> {
        self.status_of(Command::gen_image()).await
    }

    async fn convert_to_template(&mut self, buffer: BufferId) -> Result<FingerprintStatus> {
        self.status_of(Command::image_to_tz(buffer)).await
    }

    async fn create_model(&mut self) -> Result<FingerprintStatus> {
        self.status_of(Command::reg_model()).await
    }

    async fn store_model(&mut self, slot: SlotId) -> Result<FingerprintStatus> {
        if slot.as_u16() >= self.capacity {
            return Ok(FingerprintStatus::StoreFail);
        }
        self.status_of(Command::store(BufferId::One, slot)).await
    }

    async fn search(&mut self) -> Result<MatchResult> {
        let ack = self
            .transact(Command::search(BufferId::One, 0, self.capacity))
            .await?;
        match ack.status() {
            FingerprintStatus::Ok => {
                let hit = ack.search_hit()?;
                Ok(MatchResult::Matched {
                    slot_id: SlotId::from_raw(hit.page_id),
                    confidence: hit.score,
                })
            }
            FingerprintStatus::NoMatch => Ok(MatchResult::NoMatch),
            status => Err(HardwareError::sensor_protocol("search", status)),
        }
    }

    async fn template_count(&mut self) -> Result<u16> {
        let ack = self.transact(Command::template_num()).await?;
        if !ack.code.is_ok() {
            return Err(HardwareError::sensor_protocol("template_count", ack.status()));
        }
        Ok(ack.template_count()?)
    }

    fn capacity(&self) -> u16 {
        self.capacity
    }

    fn transport_id(&self) -> &str {
        &self.config.port
    }

    async fn get_device_info(&self) -> Result<DeviceInfo> {
        let mut info = DeviceInfo::new("Fingerprint sensor", "ZFM/R30x")
            .with_transport(&self.config.port)
            .with_capacity(self.capacity);
        if let Some(params) = &self.params {
            info = info.with_firmware_version(describe_parameters(params));
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biogate_protocol::{Packet, PacketKind};
    use std::io::Cursor;

    /// In-memory port: reads come from a canned buffer, writes are recorded.
    struct FakePort {
        input: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl FakePort {
        fn answering(packets: &[Packet]) -> Self {
            let mut input = Vec::new();
            for p in packets {
                input.extend_from_slice(&p.to_bytes());
            }
            Self {
                input: Cursor::new(input),
                written: Vec::new(),
            }
        }
    }

    impl Read for FakePort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            // Deliver at most 3 bytes per call to exercise reassembly.
            let n = buf.len().min(3);
            let read = self.input.read(&mut buf[..n])?;
            if read == 0 {
                return Err(std::io::Error::new(IoErrorKind::TimedOut, "no data"));
            }
            Ok(read)
        }
    }

    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    const ADDR: u32 = 0xFFFF_FFFF;

    fn ack(payload: &[u8]) -> Packet {
        Packet::new(ADDR, PacketKind::Ack, payload.to_vec())
    }

    #[test]
    fn test_exchange_writes_command_and_reads_ack() {
        let mut port = FakePort::answering(&[ack(&[0x00, 0x00, 0x07, 0x00, 0x50])]);
        let ack = exchange(
            &mut port,
            &mut SensorCodec::new(ADDR),
            Command::search(BufferId::One, 0, 200),
            Duration::from_millis(100),
        )
        .unwrap();

        assert_eq!(
            port.written,
            Command::search(BufferId::One, 0, 200)
                .into_packet(ADDR)
                .to_bytes()
                .to_vec()
        );
        assert_eq!(ack.search_hit().unwrap().page_id, 7);
    }

    #[test]
    fn test_exchange_times_out_without_answer() {
        let mut port = FakePort::answering(&[]);
        let err = exchange(
            &mut port,
            &mut SensorCodec::new(ADDR),
            Command::gen_image(),
            Duration::from_millis(20),
        )
        .unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_exchange_rejects_data_packet() {
        let mut port = FakePort::answering(&[Packet::new(ADDR, PacketKind::Data, vec![1, 2])]);
        let err = exchange(
            &mut port,
            &mut SensorCodec::new(ADDR),
            Command::gen_image(),
            Duration::from_millis(100),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            HardwareError::Protocol(biogate_core::Error::UnexpectedPacket { .. })
        ));
    }

    #[test]
    fn test_device_description_from_parameters() {
        let params = SystemParameters {
            status_register: 0,
            system_id: 0x0009,
            library_size: 200,
            security_level: 3,
            device_address: ADDR,
            packet_size_code: 2,
            baud_multiplier: 6,
        };
        assert_eq!(
            describe_parameters(&params),
            "system id 0x0009, 128 byte packets, 57600 baud"
        );
    }

    #[test]
    fn test_default_config() {
        let config = SerialSensorConfig::default();
        assert_eq!(config.port, "/dev/serial0");
        assert_eq!(config.baud_rate, 57_600);
        assert_eq!(config.address, 0xFFFF_FFFF);
    }

    #[tokio::test]
    async fn test_open_missing_port_fails() {
        let err = SerialSensor::open(SerialSensorConfig {
            port: "/dev/biogate-does-not-exist".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
        assert!(matches!(err, HardwareError::InitializationFailed { .. }));
        assert!(err.is_transport());
    }
}
