//! TOML configuration.
//!
//! The file is looked up at `--config`, then `$BIOGATE_CONFIG`, then
//! [`DEFAULT_CONFIG_PATH`]. Only the last one may be absent, in which case
//! every section takes its defaults. Values are checked once, in
//! [`ConfigFile::resolve`], and turned into the library configs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use biogate_auth::{AuthConfig, EnrollmentConfig};
use biogate_core::MatchThreshold;
use biogate_core::constants::{
    DEFAULT_ATTEMPT_DEADLINE_SECS, DEFAULT_BACKEND_BACKOFF_MS, DEFAULT_BACKEND_MAX_ATTEMPTS,
    DEFAULT_BACKEND_TIMEOUT_MS, DEFAULT_BACKEND_URL, DEFAULT_BAUD_RATE,
    DEFAULT_CAPTURE_TIMEOUT_SECS, DEFAULT_GRANT_PULSE_SECS, DEFAULT_IO_TIMEOUT_MS,
    DEFAULT_MATCH_THRESHOLD, DEFAULT_MATCH_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_SENSOR_ADDRESS, DEFAULT_SENSOR_PASSWORD, DEFAULT_SERIAL_PORT, MAX_POLL_INTERVAL_MS,
    MIN_FINGER_LIFT_PAUSE_MS, MIN_POLL_INTERVAL_MS,
};
use biogate_hardware::{CommandFrameSourceConfig, SerialSensorConfig};
use biogate_network::{DEFAULT_EMBEDDER_URL, HttpBackendConfig, RetryPolicy, ServiceEmbedderConfig};
use biogate_storage::DatabaseConfig;
use biogate_storage::connection::DEFAULT_JOURNAL_PATH;
use serde::Deserialize;

use crate::errors::{CliError, CliResult};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/biogate/config.toml";

/// BCM pin driving the door relay.
pub const DEFAULT_GPIO_PIN: u32 = 17;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub sensor: SensorSection,
    pub face: FaceSection,
    pub camera: CameraSection,
    pub signal: SignalSection,
    pub backend: BackendSection,
    pub auth: AuthSection,
    pub journal: JournalSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorSection {
    pub port: String,
    pub baud_rate: u32,
    pub address: u32,
    pub password: u32,
    pub poll_interval_ms: u64,
    pub capture_timeout_secs: u64,
    pub finger_lift_pause_ms: u64,
    pub io_timeout_ms: u64,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            address: DEFAULT_SENSOR_ADDRESS,
            password: DEFAULT_SENSOR_PASSWORD,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            capture_timeout_secs: DEFAULT_CAPTURE_TIMEOUT_SECS,
            finger_lift_pause_ms: MIN_FINGER_LIFT_PAUSE_MS,
            io_timeout_ms: DEFAULT_IO_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FaceSection {
    pub threshold: f64,
    pub embedder_url: String,
    pub embedder_timeout_secs: u64,
}

impl Default for FaceSection {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
            embedder_url: DEFAULT_EMBEDDER_URL.to_string(),
            embedder_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraSection {
    pub command: Vec<String>,
    pub output_path: PathBuf,
    pub timeout_secs: u64,
}

impl Default for CameraSection {
    fn default() -> Self {
        let defaults = CommandFrameSourceConfig::default();
        Self {
            command: defaults.command,
            output_path: defaults.output_path,
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignalSection {
    pub gpio_pin: u32,
    pub pulse_secs: u64,
}

impl Default for SignalSection {
    fn default() -> Self {
        Self {
            gpio_pin: DEFAULT_GPIO_PIN,
            pulse_secs: DEFAULT_GRANT_PULSE_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendSection {
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            timeout_ms: DEFAULT_BACKEND_TIMEOUT_MS,
            max_attempts: DEFAULT_BACKEND_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_BACKEND_BACKOFF_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthSection {
    pub match_timeout_secs: u64,
    pub attempt_deadline_secs: u64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            match_timeout_secs: DEFAULT_MATCH_TIMEOUT_SECS,
            attempt_deadline_secs: DEFAULT_ATTEMPT_DEADLINE_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JournalSection {
    pub path: PathBuf,
    pub enabled: bool,
}

impl Default for JournalSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_JOURNAL_PATH),
            enabled: true,
        }
    }
}

/// Validated settings ready to hand to the libraries.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub sensor: SerialSensorConfig,
    pub enrollment: EnrollmentConfig,
    pub camera: CommandFrameSourceConfig,
    pub threshold: MatchThreshold,
    pub embedder: ServiceEmbedderConfig,
    pub gpio_pin: u32,
    pub backend: HttpBackendConfig,
    pub auth: AuthConfig,
    pub journal: Option<DatabaseConfig>,
}

/// Where the configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named by the operator; must exist.
    Explicit(PathBuf),
    /// The built-in location; may be absent.
    Default(PathBuf),
}

impl ConfigSource {
    pub fn select(cli_value: Option<PathBuf>, env_value: Option<PathBuf>) -> Self {
        match cli_value.or(env_value) {
            Some(path) => ConfigSource::Explicit(path),
            None => ConfigSource::Default(PathBuf::from(DEFAULT_CONFIG_PATH)),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ConfigSource::Explicit(path) | ConfigSource::Default(path) => path,
        }
    }
}

/// Load and validate the configuration for this process.
pub fn load(cli_value: Option<PathBuf>) -> CliResult<ResolvedConfig> {
    let env_value = std::env::var_os(crate::cli::CONFIG_ENV).map(PathBuf::from);
    let source = ConfigSource::select(cli_value, env_value);
    read(&source)?.resolve()
}

/// Read and parse `source` without validating values.
pub fn read(source: &ConfigSource) -> CliResult<ConfigFile> {
    let path = source.path();
    match fs::read_to_string(path) {
        Ok(contents) => ConfigFile::parse(&contents, path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            if let ConfigSource::Explicit(_) = source {
                return Err(CliError::ConfigRead {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
            tracing::debug!(path = %path.display(), "No configuration file, using defaults");
            Ok(ConfigFile::default())
        }
        Err(err) => Err(CliError::ConfigRead {
            path: path.to_path_buf(),
            source: err,
        }),
    }
}

impl ConfigFile {
    pub fn parse(contents: &str, path: &Path) -> CliResult<Self> {
        toml::from_str(contents).map_err(|err| CliError::ConfigParse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn resolve(self) -> CliResult<ResolvedConfig> {
        let ConfigFile {
            sensor,
            face,
            camera,
            signal,
            backend,
            auth,
            journal,
        } = self;

        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&sensor.poll_interval_ms) {
            return Err(invalid(format!(
                "sensor.poll_interval_ms must be within {MIN_POLL_INTERVAL_MS}..={MAX_POLL_INTERVAL_MS}, got {}",
                sensor.poll_interval_ms
            )));
        }
        if sensor.capture_timeout_secs == 0 {
            return Err(invalid("sensor.capture_timeout_secs must be positive"));
        }
        if sensor.io_timeout_ms == 0 {
            return Err(invalid("sensor.io_timeout_ms must be positive"));
        }
        let threshold = MatchThreshold::new(face.threshold)
            .map_err(|_| invalid(format!("face.threshold must be positive, got {}", face.threshold)))?;
        if camera.command.is_empty() {
            return Err(invalid("camera.command must name a program"));
        }
        if signal.pulse_secs == 0 {
            return Err(invalid("signal.pulse_secs must be positive"));
        }
        if backend.max_attempts == 0 {
            return Err(invalid("backend.max_attempts must be at least 1"));
        }
        if auth.match_timeout_secs == 0 || auth.attempt_deadline_secs == 0 {
            return Err(invalid("auth timeouts must be positive"));
        }

        let poll_interval = Duration::from_millis(sensor.poll_interval_ms);
        let retry = RetryPolicy {
            max_attempts: backend.max_attempts,
            initial_backoff: Duration::from_millis(backend.initial_backoff_ms),
            ..RetryPolicy::default()
        };

        Ok(ResolvedConfig {
            sensor: SerialSensorConfig {
                port: sensor.port,
                baud_rate: sensor.baud_rate,
                address: sensor.address,
                password: sensor.password,
                io_timeout: Duration::from_millis(sensor.io_timeout_ms),
            },
            enrollment: EnrollmentConfig {
                capture_timeout: Duration::from_secs(sensor.capture_timeout_secs),
                poll_interval,
                finger_lift_pause: Duration::from_millis(sensor.finger_lift_pause_ms),
            },
            camera: CommandFrameSourceConfig {
                command: camera.command,
                output_path: camera.output_path,
                timeout: Duration::from_secs(camera.timeout_secs),
            },
            threshold,
            embedder: ServiceEmbedderConfig {
                url: face.embedder_url,
                timeout: Duration::from_secs(face.embedder_timeout_secs),
                retry,
                ..ServiceEmbedderConfig::default()
            },
            gpio_pin: signal.gpio_pin,
            backend: HttpBackendConfig {
                base_url: backend.base_url,
                timeout: Duration::from_millis(backend.timeout_ms),
                retry,
            },
            auth: AuthConfig {
                match_timeout: Duration::from_secs(auth.match_timeout_secs),
                poll_interval,
                attempt_deadline: Duration::from_secs(auth.attempt_deadline_secs),
                grant_pulse: Duration::from_secs(signal.pulse_secs),
                ..AuthConfig::default()
            },
            journal: journal
                .enabled
                .then(|| DatabaseConfig::new(journal.path)),
        })
    }
}

fn invalid(message: impl Into<String>) -> CliError {
    CliError::InvalidConfig(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;

    fn parse(contents: &str) -> CliResult<ConfigFile> {
        ConfigFile::parse(contents, Path::new("test.toml"))
    }

    #[test]
    fn empty_file_resolves_to_defaults() {
        let config = parse("").unwrap().resolve().unwrap();

        assert_eq!(config.sensor.port, DEFAULT_SERIAL_PORT);
        assert_eq!(config.sensor.baud_rate, 57_600);
        assert_eq!(config.threshold, MatchThreshold::default());
        assert_eq!(config.auth.grant_pulse, Duration::from_secs(5));
        assert_eq!(config.auth.match_timeout, Duration::from_secs(30));
        assert_eq!(config.auth.attempt_deadline, Duration::from_secs(90));
        assert_eq!(config.enrollment.finger_lift_pause, Duration::from_secs(1));
        assert_eq!(config.backend.base_url, DEFAULT_BACKEND_URL);
        assert_eq!(config.embedder.url, "http://localhost:5001/register-face");
        assert_eq!(config.gpio_pin, DEFAULT_GPIO_PIN);
        assert_eq!(
            config.journal.map(|j| j.path),
            Some(PathBuf::from(DEFAULT_JOURNAL_PATH))
        );
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse(
            r#"
            [sensor]
            port = "/dev/ttyS0"
            poll_interval_ms = 250

            [face]
            threshold = 0.6
            embedder_url = "http://10.0.0.5:5001/register-face"

            [camera]
            command = ["fswebcam", "--no-banner", "{output}"]

            [signal]
            gpio_pin = 26
            pulse_secs = 3

            [backend]
            base_url = "http://gate-server:3000"
            max_attempts = 5

            [auth]
            match_timeout_secs = 10

            [journal]
            enabled = false
            "#,
        )
        .unwrap()
        .resolve()
        .unwrap();

        assert_eq!(config.sensor.port, "/dev/ttyS0");
        assert_eq!(config.auth.poll_interval, Duration::from_millis(250));
        assert_eq!(config.enrollment.poll_interval, Duration::from_millis(250));
        assert_eq!(config.threshold.value(), 0.6);
        assert_eq!(config.embedder.url, "http://10.0.0.5:5001/register-face");
        assert_eq!(config.camera.command[0], "fswebcam");
        assert_eq!(config.gpio_pin, 26);
        assert_eq!(config.auth.grant_pulse, Duration::from_secs(3));
        assert_eq!(config.backend.retry.max_attempts, 5);
        assert_eq!(config.embedder.retry.max_attempts, 5);
        assert_eq!(config.auth.match_timeout, Duration::from_secs(10));
        assert!(config.journal.is_none());
    }

    #[rstest]
    #[case("[face]\nthreshold = 0.0")]
    #[case("[face]\nthreshold = -1.0")]
    #[case("[sensor]\npoll_interval_ms = 50")]
    #[case("[sensor]\npoll_interval_ms = 501")]
    #[case("[signal]\npulse_secs = 0")]
    #[case("[camera]\ncommand = []")]
    #[case("[backend]\nmax_attempts = 0")]
    #[case("[auth]\nattempt_deadline_secs = 0")]
    fn invalid_values_are_rejected(#[case] contents: &str) {
        let err = parse(contents).unwrap().resolve().unwrap_err();
        assert!(matches!(err, CliError::InvalidConfig(_)), "{err:?}");
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let err = parse("[sensor]\nbaudrate = 9600").unwrap_err();
        assert!(matches!(err, CliError::ConfigParse { .. }));
    }

    #[test]
    fn cli_path_wins_over_environment() {
        let source = ConfigSource::select(Some("/a.toml".into()), Some("/b.toml".into()));
        assert_eq!(source, ConfigSource::Explicit("/a.toml".into()));

        let source = ConfigSource::select(None, Some("/b.toml".into()));
        assert_eq!(source, ConfigSource::Explicit("/b.toml".into()));

        let source = ConfigSource::select(None, None);
        assert_eq!(source, ConfigSource::Default(DEFAULT_CONFIG_PATH.into()));
    }

    #[test]
    fn missing_default_file_means_defaults() {
        let dir = tempdir().unwrap();
        let source = ConfigSource::Default(dir.path().join("config.toml"));
        let config = read(&source).unwrap();
        assert_eq!(config.sensor.port, DEFAULT_SERIAL_PORT);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let err = read(&ConfigSource::Explicit(path.clone())).unwrap_err();
        match err {
            CliError::ConfigRead { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn file_on_disk_is_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[journal]\npath = \"/tmp/j.db\"\n").unwrap();

        let config = read(&ConfigSource::Explicit(path)).unwrap().resolve().unwrap();
        assert_eq!(config.journal.unwrap().path, PathBuf::from("/tmp/j.db"));
    }
}
