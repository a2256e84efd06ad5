use std::io::Stdout;
use std::process::ExitCode;

use anyhow::Context;
use biogate_auth::{AuthOrchestrator, FaceMatcher};
use biogate_cli::cli::{Cli, Commands};
use biogate_cli::config::{self, ResolvedConfig};
use biogate_cli::errors::exit_code;
use biogate_cli::{CliError, Reporter, commands, shutdown};
use biogate_hardware::{CommandFrameSource, SensorSession, SerialSensor, SysfsSignalLine};
use biogate_network::{HttpBackend, ServiceEmbedder};
use biogate_storage::{Database, DatabaseConfig, SqliteAuthJournal};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version are not failures.
            let code = if err.use_stderr() {
                exit_code::USAGE
            } else {
                exit_code::OK
            };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };
    init_tracing(cli.verbose);

    let mut reporter = Reporter::stdout();
    match run(cli, &mut reporter) {
        Ok(()) => ExitCode::from(exit_code::OK),
        Err(err) => match err.downcast_ref::<CliError>() {
            Some(cli_err) => {
                error!(code = cli_err.code(), error = %cli_err, "Command failed");
                reporter.emit_error(cli_err);
                cli_err.exit_code()
            }
            None => {
                error!("Unexpected failure: {err:#}");
                ExitCode::from(exit_code::GENERIC)
            }
        },
    }
}

fn run(cli: Cli, reporter: &mut Reporter<Stdout>) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    runtime.block_on(dispatch(cli, reporter))
}

async fn dispatch(cli: Cli, reporter: &mut Reporter<Stdout>) -> anyhow::Result<()> {
    let config = config::load(cli.config)?;

    match cli.command {
        Commands::Enroll(args) => {
            let mut session = open_session(&config).await?;
            let result = commands::enroll(
                &mut *session,
                config.enrollment,
                args.slot,
                args.name.as_deref(),
                reporter,
            )
            .await;
            session.close();
            result?;
        }
        Commands::Auth(args) => {
            let cancel = CancellationToken::new();
            if let Err(e) = shutdown::spawn_watcher(cancel.clone()) {
                warn!(error = %e, "Cannot listen for stop signals");
            }

            let session = open_session(&config).await?;
            let camera = CommandFrameSource::new(config.camera).map_err(CliError::from)?;
            let embedder = ServiceEmbedder::new(config.embedder).map_err(CliError::from)?;
            let gateway = HttpBackend::new(config.backend).map_err(CliError::from)?;
            let line = SysfsSignalLine::open(config.gpio_pin).map_err(CliError::from)?;
            let face = FaceMatcher::new(embedder, config.threshold);

            let orchestrator = AuthOrchestrator::new(session, camera, face, gateway, line, config.auth);
            let orchestrator = match open_journal(config.journal).await {
                Some(journal) => orchestrator.with_journal(journal),
                None => orchestrator,
            };
            commands::authenticate(orchestrator, args.once, cancel, reporter).await?;
        }
        Commands::Status => {
            let mut session = open_session(&config).await?;
            let journal = open_journal(config.journal).await;
            let result = commands::status(&mut *session, journal.as_ref(), reporter).await;
            session.close();
            result?;
        }
        Commands::EncodeFace(args) => {
            let embedder = ServiceEmbedder::new(config.embedder).map_err(CliError::from)?;
            commands::encode_face(&embedder, &args.image, &args.name, reporter).await?;
        }
    }
    Ok(())
}

async fn open_session(config: &ResolvedConfig) -> Result<SensorSession<SerialSensor>, CliError> {
    let sensor = SerialSensor::open(config.sensor.clone()).await?;
    Ok(SensorSession::acquire(sensor)?)
}

/// A journal that cannot be opened is logged and skipped.
async fn open_journal(config: Option<DatabaseConfig>) -> Option<SqliteAuthJournal> {
    let config = config?;
    let path = config.path.clone();
    match Database::new(config).await {
        Ok(db) => Some(SqliteAuthJournal::new(db.pool().clone())),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Journal unavailable, continuing without it");
            None
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(fmt_layer);
    if tracing::subscriber::set_global_default(registry).is_err() {
        // Already initialised.
    }
}
