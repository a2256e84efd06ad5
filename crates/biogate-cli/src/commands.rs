//! Command handlers.
//!
//! Handlers take already-opened devices so they run unchanged against the
//! mocks; wiring real hardware from the configuration happens in `main`.

use std::io::Write;
use std::path::Path;

use biogate_auth::{AttemptReport, AuthOrchestrator, EnrollmentConfig, EnrollmentController};
use biogate_core::{EnrollmentOutcome, SlotId};
use biogate_hardware::{FaceEmbedder, FrameSource, SensorLink, SignalLine};
use biogate_network::encoding::{decode_embedding, encode_embedding};
use biogate_network::{BackendGateway, GatewayError, ServiceEmbedder};
use biogate_storage::AuthJournalRepository;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::{CliError, CliResult};
use crate::output::{Reporter, StatusLine};

/// Enroll one finger into `slot`, streaming milestones as they happen.
///
/// A slot outside the sensor capacity is rejected before the sensor is
/// touched. A failed enrollment comes back as [`CliError::Enrollment`].
pub async fn enroll<S, W>(
    sensor: &mut S,
    config: EnrollmentConfig,
    slot: u16,
    name: Option<&str>,
    reporter: &mut Reporter<W>,
) -> CliResult<EnrollmentOutcome>
where
    S: SensorLink,
    W: Write,
{
    let capacity = sensor.capacity();
    let slot_id = SlotId::new(slot, capacity).map_err(|_| CliError::InvalidSlot { slot, capacity })?;

    let message = match name {
        Some(name) => format!("Waiting for finger from {name}"),
        None => "Waiting for finger".to_string(),
    };
    reporter.emit(&StatusLine::event("enrollment_started", message).data(json!({ "slot_id": slot_id })))?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let controller = EnrollmentController::new(config).with_progress(tx);
    // The controller owns the sender; dropping it ends the drain below.
    let run = async move { controller.enroll(sensor, slot_id).await };
    let drain = async {
        while let Some(milestone) = rx.recv().await {
            if let Err(e) = reporter.emit(&StatusLine::milestone(milestone)) {
                warn!(error = %e, "Failed to report milestone");
            }
        }
    };
    let (report, ()) = tokio::join!(run, drain);
    let report = report?;

    let outcome = report.outcome;
    if !outcome.success {
        return Err(CliError::Enrollment { outcome });
    }
    reporter.emit(&StatusLine::from_enrollment(&outcome, name))?;
    Ok(outcome)
}

/// Run the authentication loop until `cancel` fires, or a single attempt
/// when `once` is set.
pub async fn authenticate<S, F, E, G, L, J, W>(
    orchestrator: AuthOrchestrator<S, F, E, G, L, J>,
    once: bool,
    cancel: CancellationToken,
    reporter: &mut Reporter<W>,
) -> CliResult<()>
where
    S: SensorLink,
    F: FrameSource,
    E: FaceEmbedder,
    G: BackendGateway,
    L: SignalLine,
    J: AuthJournalRepository,
    W: Write,
{
    reporter.emit(&StatusLine::event("auth_started", "Authentication loop started"))?;

    if once {
        let mut orchestrator = orchestrator;
        let report = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            report = orchestrator.run_once() => Some(report?),
        };
        if let Some(report) = report {
            reporter.emit(&StatusLine::from_attempt(&report))?;
        }
    } else {
        let (tx, mut rx) = mpsc::unbounded_channel::<AttemptReport>();
        let mut orchestrator = orchestrator.with_reports(tx);
        let run = async move { orchestrator.run(cancel).await };
        let drain = async {
            while let Some(report) = rx.recv().await {
                if let Err(e) = reporter.emit(&StatusLine::from_attempt(&report)) {
                    warn!(error = %e, "Failed to report attempt");
                }
            }
        };
        let (ran, ()) = tokio::join!(run, drain);
        ran?;
    }

    reporter.emit(&StatusLine::event("auth_stopped", "Authentication loop stopped"))?;
    Ok(())
}

/// Report device details, template usage and the journal backlog.
pub async fn status<S, J, W>(
    sensor: &mut S,
    journal: Option<&J>,
    reporter: &mut Reporter<W>,
) -> CliResult<()>
where
    S: SensorLink,
    J: AuthJournalRepository,
    W: Write,
{
    let device = sensor.get_device_info().await?;
    let templates = sensor.template_count().await?;
    let capacity = sensor.capacity();

    let pending = match journal {
        Some(journal) => match journal.count_pending().await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(error = %e, "Could not read journal backlog");
                None
            }
        },
        None => None,
    };

    info!(templates, capacity, "Sensor status read");
    reporter.emit(
        &StatusLine::event("status", format!("{templates} of {capacity} slots in use"))
            .success(true)
            .data(json!({
                "device": device,
                "template_count": templates,
                "capacity": capacity,
                "journal_pending": pending,
            })),
    )?;
    Ok(())
}

/// Encode the face in `image` for registration with the backend.
///
/// The service answer is validated and re-encoded in the canonical
/// self-describing format, so the backend never stores a vector that
/// authentication would later reject.
pub async fn encode_face<W: Write>(
    embedder: &ServiceEmbedder,
    image: &Path,
    name: &str,
    reporter: &mut Reporter<W>,
) -> CliResult<()> {
    let bytes = tokio::fs::read(image)
        .await
        .map_err(|source| CliError::ImageMissing {
            path: image.to_path_buf(),
            source,
        })?;
    if bytes.is_empty() {
        return Err(CliError::ImageMissing {
            path: image.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "image is empty"),
        });
    }

    let encoding = embedder.encode(name, &bytes).await?.ok_or(CliError::NoFace)?;
    let embedding = decode_embedding(&encoding.encoding).map_err(GatewayError::from)?;
    info!(name, length = embedding.len(), "Face encoded");

    reporter.emit(
        &StatusLine::event("face_encoded", "Face processed successfully")
            .success(true)
            .data(json!({
                "name": name,
                "face_encoding": encode_embedding(&embedding),
                "embedding_length": embedding.len(),
            })),
    )?;
    Ok(())
}
