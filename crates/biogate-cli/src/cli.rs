use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "BIOGATE_CONFIG";

#[derive(Debug, Parser)]
#[command(
    name = "biogate",
    about = "Fingerprint-then-face access control",
    version
)]
pub struct Cli {
    /// Configuration file (falls back to $BIOGATE_CONFIG, then /etc/biogate/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (may be used multiple times)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Enroll a fingerprint into a sensor slot
    Enroll(EnrollArgs),
    /// Run the authentication loop until interrupted
    Auth(AuthArgs),
    /// Report sensor and journal status
    Status,
    /// Compute the face encoding of an image for registration
    EncodeFace(EncodeFaceArgs),
}

#[derive(Debug, Args)]
pub struct EnrollArgs {
    /// Template slot on the sensor
    #[arg(long)]
    pub slot: u16,

    /// Name used in prompts
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Args)]
pub struct AuthArgs {
    /// Run a single attempt and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Debug, Args)]
pub struct EncodeFaceArgs {
    /// Image containing exactly the face to register
    #[arg(long)]
    pub image: PathBuf,

    /// Name sent along with the image
    #[arg(long, default_value = "registration")]
    pub name: String,
}
