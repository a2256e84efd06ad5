//! Still capture through an external camera command.
//!
//! The command writes one image to a file; the adapter reads it back and
//! deletes it before returning, so no image outlives the capture call on disk.

use crate::error::{HardwareError, Result};
use crate::traits::FrameSource;
use crate::types::ImageFrame;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Placeholder replaced by the output path in command arguments.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

#[derive(Debug, Clone)]
pub struct CommandFrameSourceConfig {
    /// Program followed by its arguments.
    pub command: Vec<String>,
    pub output_path: PathBuf,
    pub timeout: Duration,
}

impl Default for CommandFrameSourceConfig {
    fn default() -> Self {
        Self {
            command: ["libcamera-still", "-n", "-o", OUTPUT_PLACEHOLDER]
                .into_iter()
                .map(String::from)
                .collect(),
            output_path: std::env::temp_dir().join("biogate-capture.jpg"),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
pub struct CommandFrameSource {
    config: CommandFrameSourceConfig,
}

impl CommandFrameSource {
    /// # Errors
    /// Returns `ConfigurationError` for an empty command line.
    pub fn new(config: CommandFrameSourceConfig) -> Result<Self> {
        if config.command.is_empty() {
            return Err(HardwareError::configuration("camera command is empty"));
        }
        Ok(Self { config })
    }

    fn args(&self) -> Vec<String> {
        let output = self.config.output_path.to_string_lossy();
        self.config.command[1..]
            .iter()
            .map(|arg| arg.replace(OUTPUT_PLACEHOLDER, &output))
            .collect()
    }

    async fn remove_output(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.config.output_path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %self.config.output_path.display(), error = %e, "Failed to delete capture file");
        }
    }
}

impl FrameSource for CommandFrameSource {
    async fn capture(&mut self) -> Result<ImageFrame> {
        let program = &self.config.command[0];
        let args = self.args();
        debug!(%program, ?args, "Capturing still image");

        // A stale file from an earlier crash must not pass as this capture.
        self.remove_output().await;

        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HardwareError::capture_failed(format!("spawn {program}: {e}")))?;

        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| HardwareError::timeout(self.config.timeout.as_millis() as u64))?
            .map_err(|e| wait_failed(program, &e))?;

        if !output.status.success() {
            self.remove_output().await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HardwareError::capture_failed(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let bytes = tokio::fs::read(&self.config.output_path).await;
        self.remove_output().await;
        let bytes = bytes.map_err(|e| {
            HardwareError::capture_failed(format!(
                "read {}: {e}",
                self.config.output_path.display()
            ))
        })?;

        if bytes.is_empty() {
            return Err(HardwareError::capture_failed("camera produced an empty image"));
        }
        debug!(len = bytes.len(), "Captured still image");
        Ok(ImageFrame::new(bytes))
    }
}

/// Losing track of the capture process fails this capture only; the camera
/// is not part of the sensor session.
fn wait_failed(program: &str, error: &std::io::Error) -> HardwareError {
    HardwareError::capture_failed(format!("wait for {program}: {error}"))
}
