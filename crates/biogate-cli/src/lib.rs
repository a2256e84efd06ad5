//! The `biogate` command line.
//!
//! ```text
//! biogate [-c CONFIG] [-v] enroll --slot N [--name NAME]
//! biogate [-c CONFIG] [-v] auth [--once]
//! biogate [-c CONFIG] [-v] status
//! biogate [-c CONFIG] [-v] encode-face --image PATH [--name NAME]
//! ```
//!
//! Status lines go to stdout as NDJSON ([`output`]), logs go to stderr and
//! the exit status follows [`errors::exit_code`].

pub mod cli;
pub mod commands;
pub mod config;
pub mod errors;
pub mod output;
pub mod shutdown;

pub use errors::{CliError, CliResult};
pub use output::{Reporter, StatusLine};
