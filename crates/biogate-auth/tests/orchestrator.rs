//! Authentication loop against mock devices.
//!
//! Every test uses its own transport id because sensor sessions are
//! process-wide.

use biogate_auth::{AttemptReport, AuthConfig, AuthOrchestrator, FaceMatcher};
use biogate_core::constants::EMBEDDING_DIMENSION;
use biogate_core::{ErrorKind, FaceEmbedding, MatchThreshold, SlotId};
use biogate_hardware::mock::{
    MockCamera, MockCameraHandle, MockEmbedder, MockEmbedderHandle, MockSensor, MockSensorHandle,
    MockSignalLine, MockSignalLineHandle,
};
use biogate_hardware::{SensorSession, SignalLevel};
use biogate_network::mock::{MockGateway, MockGatewayHandle};
use biogate_storage::{AuthJournalRepository, Database, SqliteAuthJournal};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const FINGER: u32 = 0x0A11_CE00;

type Orchestrator =
    AuthOrchestrator<MockSensor, MockCamera, MockEmbedder, MockGateway, MockSignalLine>;

struct Rig {
    orchestrator: Orchestrator,
    sensor: MockSensorHandle,
    camera: MockCameraHandle,
    embedder: MockEmbedderHandle,
    gateway: MockGatewayHandle,
    line: MockSignalLineHandle,
}

fn rig(transport: &str, config: AuthConfig) -> Rig {
    let (sensor, sensor_handle) = MockSensor::with_transport(format!("mock://{transport}"));
    let (camera, camera_handle) = MockCamera::new();
    let (embedder, embedder_handle) = MockEmbedder::new();
    let (gateway, gateway_handle) = MockGateway::new();
    let (line, line_handle) = MockSignalLine::new();

    let session = SensorSession::acquire(sensor).unwrap();
    let face = FaceMatcher::new(embedder, MatchThreshold::default());
    Rig {
        orchestrator: AuthOrchestrator::new(session, camera, face, gateway, line, config),
        sensor: sensor_handle,
        camera: camera_handle,
        embedder: embedder_handle,
        gateway: gateway_handle,
        line: line_handle,
    }
}

fn reference() -> FaceEmbedding {
    FaceEmbedding::new(vec![0.0; EMBEDDING_DIMENSION]).unwrap()
}

/// Candidate vector at `distance` from [`reference`].
fn candidate_at(distance: f32) -> Vec<f32> {
    let mut values = vec![0.0; EMBEDDING_DIMENSION];
    values[0] = distance;
    values
}

/// Slot 7 enrolled, finger on the sensor, reference stored.
fn enrolled_rig(transport: &str, config: AuthConfig) -> Rig {
    let rig = rig(transport, config);
    rig.sensor.enroll(SlotId::from_raw(7), FINGER);
    rig.sensor.place_finger(FINGER);
    rig.gateway.set_reference(SlotId::from_raw(7), reference());
    rig
}

fn assert_upstream_untouched(rig: &Rig) {
    assert_eq!(rig.camera.captures(), 0);
    assert_eq!(rig.embedder.calls(), 0);
    assert!(rig.gateway.fetches().is_empty());
    assert!(rig.gateway.submitted().is_empty());
    assert_eq!(rig.line.high_count(), 0);
}

fn failed_kind(report: &AttemptReport) -> ErrorKind {
    match report {
        AttemptReport::Failed { kind, .. } => *kind,
        other => panic!("expected a failed attempt, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_grant() {
    let mut rig = enrolled_rig("auth-grant", AuthConfig::default());
    rig.embedder.queue_face(candidate_at(0.6));
    let start = Instant::now();

    let report = rig.orchestrator.run_once().await.unwrap();

    let AttemptReport::Decided {
        outcome,
        confidence,
        delivered,
    } = report
    else {
        panic!("expected a decision, got {report:?}");
    };
    assert_eq!(outcome.slot_id, SlotId::from_raw(7));
    assert!(outcome.matched);
    assert!((outcome.distance - 0.6).abs() < 1e-6);
    assert_eq!(confidence, 80);
    assert!(delivered);

    assert_eq!(rig.line.history(), vec![SignalLevel::High, SignalLevel::Low]);
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert_eq!(rig.gateway.fetches(), vec![SlotId::from_raw(7)]);
    assert_eq!(rig.gateway.submitted(), vec![outcome]);
}

#[tokio::test(start_paused = true)]
async fn test_denied_face_leaves_line_low() {
    let mut rig = enrolled_rig("auth-deny", AuthConfig::default());
    rig.embedder.queue_face(candidate_at(1.5));

    let report = rig.orchestrator.run_once().await.unwrap();

    let outcome = report.outcome().unwrap();
    assert!(!outcome.matched);
    assert_eq!(outcome.result_str(), "denied");
    assert_eq!(rig.line.high_count(), 0);
    assert_eq!(rig.line.level(), SignalLevel::Low);
    assert_eq!(rig.gateway.submitted().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_thirty_seconds_without_finger() {
    let mut rig = rig("auth-idle", AuthConfig::default());
    rig.sensor.enroll(SlotId::from_raw(7), FINGER);
    let start = Instant::now();

    let report = rig.orchestrator.run_once().await.unwrap();

    assert_eq!(report, AttemptReport::Timeout);
    assert!(start.elapsed() >= Duration::from_secs(30));
    assert!(start.elapsed() <= Duration::from_secs(30) + Duration::from_millis(100));
    assert_upstream_untouched(&rig);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_finger_goes_nowhere() {
    let mut rig = rig("auth-unknown", AuthConfig::default());
    rig.sensor.enroll(SlotId::from_raw(7), FINGER);
    rig.sensor.place_finger(0xDEAD);

    let report = rig.orchestrator.run_once().await.unwrap();

    assert_eq!(report, AttemptReport::NoMatch);
    assert_upstream_untouched(&rig);
}

#[tokio::test(start_paused = true)]
async fn test_no_face_is_a_negative_attempt() {
    let mut rig = enrolled_rig("auth-no-face", AuthConfig::default());
    rig.embedder.queue_no_face();

    let report = rig.orchestrator.run_once().await.unwrap();

    assert_eq!(failed_kind(&report), ErrorKind::NoFaceDetected);
    assert!(rig.gateway.submitted().is_empty());
    assert_eq!(rig.line.high_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_embedding_never_verified() {
    let mut rig = enrolled_rig("auth-invalid", AuthConfig::default());
    rig.embedder.queue_face(vec![0.1; 300]);

    let report = rig.orchestrator.run_once().await.unwrap();

    assert_eq!(failed_kind(&report), ErrorKind::InvalidEmbedding);
    assert!(rig.gateway.submitted().is_empty());
    assert_eq!(rig.line.high_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_reference() {
    let mut rig = rig("auth-missing-ref", AuthConfig::default());
    rig.sensor.enroll(SlotId::from_raw(7), FINGER);
    rig.sensor.place_finger(FINGER);

    let report = rig.orchestrator.run_once().await.unwrap();

    assert_eq!(failed_kind(&report), ErrorKind::MissingReference);
    assert_eq!(rig.embedder.calls(), 0);
    assert!(rig.gateway.submitted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_backend_unavailable_before_decision() {
    let mut rig = enrolled_rig("auth-backend-down", AuthConfig::default());
    rig.gateway.fail_fetches(1);

    let report = rig.orchestrator.run_once().await.unwrap();

    assert_eq!(failed_kind(&report), ErrorKind::BackendUnavailable);
    assert_eq!(rig.line.high_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_camera_failure() {
    let mut rig = enrolled_rig("auth-camera", AuthConfig::default());
    rig.camera.queue_failure("camera not detected");

    let report = rig.orchestrator.run_once().await.unwrap();

    assert_eq!(failed_kind(&report), ErrorKind::SensorProtocol);
    assert!(rig.gateway.fetches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_submission_keeps_the_grant() {
    let mut rig = enrolled_rig("auth-submit-fail", AuthConfig::default());
    rig.embedder.set_default_face(candidate_at(0.2));
    rig.gateway.fail_submits(1);

    let report = rig.orchestrator.run_once().await.unwrap();

    assert!(matches!(report, AttemptReport::Decided { delivered: false, .. }));
    assert_eq!(rig.line.history(), vec![SignalLevel::High, SignalLevel::Low]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_backend_does_not_hold_the_line() {
    let mut rig = enrolled_rig("auth-slow-backend", AuthConfig::default());
    rig.embedder.set_default_face(candidate_at(0.2));
    rig.gateway.set_submit_delay(Duration::from_secs(10));
    let line = rig.line.clone();
    let gateway = rig.gateway.clone();
    let start = Instant::now();

    let observe = async {
        tokio::time::sleep(Duration::from_secs(6)).await;
        // The pulse is over while the submission is still in flight.
        assert_eq!(line.level(), SignalLevel::Low);
        assert_eq!(line.high_count(), 1);
        assert!(gateway.submitted().is_empty());
    };
    let (report, ()) = tokio::join!(rig.orchestrator.run_once(), observe);

    assert!(matches!(report.unwrap(), AttemptReport::Decided { delivered: true, .. }));
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_attempt_deadline() {
    let mut rig = enrolled_rig("auth-deadline", AuthConfig::default());
    rig.camera.set_delay(Duration::from_secs(600));
    let start = Instant::now();

    let report = rig.orchestrator.run_once().await.unwrap();

    assert_eq!(failed_kind(&report), ErrorKind::Timeout);
    assert_eq!(start.elapsed(), Duration::from_secs(90));
    assert_eq!(rig.line.high_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_late_decision_still_pulses_in_full() {
    let mut rig = enrolled_rig("auth-late-decision", AuthConfig::default());
    rig.embedder.set_default_face(candidate_at(0.2));
    rig.camera.set_delay(Duration::from_secs(87));
    let line = rig.line.clone();
    let start = Instant::now();

    let observe = async {
        // Past the attempt deadline, inside the pulse.
        tokio::time::sleep(Duration::from_secs(91)).await;
        assert_eq!(line.level(), SignalLevel::High);
    };
    let (report, ()) = tokio::join!(rig.orchestrator.run_once(), observe);

    let report = report.unwrap();
    assert!(matches!(report, AttemptReport::Decided { delivered: true, .. }));
    assert_eq!(start.elapsed(), Duration::from_secs(92));
    assert_eq!(rig.line.history(), vec![SignalLevel::High, SignalLevel::Low]);
    assert_eq!(rig.gateway.submitted().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_submission_outlives_the_attempt_deadline() {
    let mut rig = enrolled_rig("auth-long-submit", AuthConfig::default());
    rig.embedder.set_default_face(candidate_at(0.2));
    rig.gateway.set_submit_delay(Duration::from_secs(120));
    let start = Instant::now();

    let report = rig.orchestrator.run_once().await.unwrap();

    let AttemptReport::Decided { outcome, delivered, .. } = report else {
        panic!("expected a decision, got {report:?}");
    };
    assert!(outcome.matched);
    assert!(delivered);
    assert_eq!(rig.gateway.submitted(), vec![outcome]);
    assert_eq!(start.elapsed(), Duration::from_secs(120));
    assert_eq!(rig.line.history(), vec![SignalLevel::High, SignalLevel::Low]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_pulse_drives_line_low() {
    let mut rig = enrolled_rig("auth-cancel", AuthConfig::default());
    rig.embedder.set_default_face(candidate_at(0.2));
    let token = CancellationToken::new();

    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            token.cancel();
        })
    };

    rig.orchestrator.run(token).await.unwrap();
    canceller.await.unwrap();

    assert_eq!(rig.line.high_count(), 1);
    assert_eq!(rig.line.level(), SignalLevel::Low);
}

#[tokio::test(start_paused = true)]
async fn test_transport_loss_ends_the_loop() {
    let mut rig = enrolled_rig("auth-transport", AuthConfig::default());
    rig.sensor.disconnect();

    let err = rig
        .orchestrator
        .run(CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_session_fatal());
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test(start_paused = true)]
async fn test_loop_continues_after_failed_attempt() {
    let rig = enrolled_rig("auth-loop", AuthConfig::default());
    rig.embedder.queue_no_face();
    rig.embedder.set_default_face(candidate_at(0.3));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut orchestrator = rig.orchestrator.with_reports(tx);
    let token = CancellationToken::new();

    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(8)).await;
            token.cancel();
        })
    };
    orchestrator.run(token).await.unwrap();
    canceller.await.unwrap();
    drop(orchestrator);

    let mut reports = Vec::new();
    while let Some(report) = rx.recv().await {
        reports.push(report);
    }
    assert!(reports.len() >= 2);
    assert_eq!(failed_kind(&reports[0]), ErrorKind::NoFaceDetected);
    assert!(reports[1].outcome().is_some_and(|o| o.matched));
    assert_eq!(rig.line.level(), SignalLevel::Low);
}

#[tokio::test]
async fn test_journal_store_and_forward() {
    let config = AuthConfig {
        grant_pulse: Duration::from_millis(10),
        rearm_delay: Duration::ZERO,
        ..Default::default()
    };
    let rig = enrolled_rig("auth-journal", config);
    rig.embedder.set_default_face(candidate_at(0.4));
    rig.gateway.fail_submits(1);

    let db = Database::in_memory().await.unwrap();
    let journal = SqliteAuthJournal::new(db.pool().clone());
    let mut orchestrator = rig.orchestrator.with_journal(journal.clone());

    let first = orchestrator.run_once().await.unwrap();
    assert!(matches!(first, AttemptReport::Decided { delivered: false, .. }));
    assert_eq!(journal.count_pending().await.unwrap(), 1);

    let second = orchestrator.run_once().await.unwrap();
    assert!(matches!(second, AttemptReport::Decided { delivered: true, .. }));
    assert_eq!(journal.count_pending().await.unwrap(), 0);

    let submitted = rig.gateway.submitted();
    assert_eq!(submitted.len(), 2);
    assert_eq!(&submitted[0], second.outcome().unwrap());
    assert_eq!(submitted[1].attempt_id, first.outcome().unwrap().attempt_id);
}
