//! Enrollment against the mock sensor.

use biogate_auth::{
    EnrollmentConfig, EnrollmentController, EnrollmentMilestone, EnrollmentState,
};
use biogate_core::{FailureStage, FingerprintStatus, SlotId};
use biogate_hardware::mock::{MockOp, MockSensor, MockSensorHandle};
use biogate_hardware::{HardwareError, SensorSession};
use rstest::rstest;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const FINGER: u32 = 0xA1B2;

fn controller() -> EnrollmentController {
    EnrollmentController::new(EnrollmentConfig::default())
}

fn sensor_with_finger() -> (MockSensor, MockSensorHandle) {
    let (sensor, handle) = MockSensor::new();
    handle.place_finger(FINGER);
    (sensor, handle)
}

#[tokio::test(start_paused = true)]
async fn test_enroll_slot_7() {
    let (mut sensor, handle) = sensor_with_finger();

    let report = controller().enroll(&mut sensor, SlotId::from_raw(7)).await.unwrap();

    assert!(report.outcome.success);
    assert_eq!(report.outcome.slot_id, SlotId::from_raw(7));
    assert_eq!(report.outcome.failure_stage, None);
    assert_eq!(handle.template(SlotId::from_raw(7)), Some(FINGER));
    assert_eq!(
        report.states(),
        vec![
            EnrollmentState::Idle,
            EnrollmentState::AwaitFirstScan,
            EnrollmentState::Template1Ready,
            EnrollmentState::AwaitSecondScan,
            EnrollmentState::Template2Ready,
            EnrollmentState::ModelCreated,
            EnrollmentState::Stored,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_lift_pause_precedes_second_scan() {
    let (mut sensor, _handle) = sensor_with_finger();
    let start = Instant::now();

    controller().enroll(&mut sensor, SlotId::from_raw(1)).await.unwrap();

    // Both captures succeed on the first poll; the pause is the only wait.
    assert_eq!(start.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_first_scan_timeout() {
    let (mut sensor, handle) = MockSensor::new();
    let start = Instant::now();

    let report = controller().enroll(&mut sensor, SlotId::from_raw(3)).await.unwrap();

    assert!(!report.outcome.success);
    assert_eq!(report.outcome.failure_stage, Some(FailureStage::Capture1));
    assert_eq!(report.outcome.status, Some(FingerprintStatus::Timeout));
    assert!(start.elapsed() >= Duration::from_secs(30));
    assert!(start.elapsed() <= Duration::from_secs(30) + Duration::from_millis(100));
    assert_eq!(report.states().last(), Some(&EnrollmentState::Failed));
    assert_eq!(handle.template(SlotId::from_raw(3)), None);
}

#[rstest]
#[case(MockOp::ReadImage, FingerprintStatus::ImageFail, FailureStage::Capture1)]
#[case(MockOp::Convert, FingerprintStatus::ConvertFail, FailureStage::Convert1)]
#[case(MockOp::CreateModel, FingerprintStatus::NoMatch, FailureStage::Model)]
#[case(MockOp::Store, FingerprintStatus::StoreFail, FailureStage::Store)]
#[tokio::test(start_paused = true)]
async fn test_failure_stage(
    #[case] op: MockOp,
    #[case] status: FingerprintStatus,
    #[case] stage: FailureStage,
) {
    let (mut sensor, handle) = sensor_with_finger();
    handle.fail_next(op, status);

    let report = controller().enroll(&mut sensor, SlotId::from_raw(5)).await.unwrap();

    assert!(!report.outcome.success);
    assert_eq!(report.outcome.failure_stage, Some(stage));
    assert_eq!(report.outcome.status, Some(status));
    assert_eq!(handle.template(SlotId::from_raw(5)), None);
}

#[tokio::test(start_paused = true)]
async fn test_second_scan_failure() {
    let (mut sensor, handle) = sensor_with_finger();
    // The first read succeeds; the second read fails.
    let controller = controller();
    let slot = SlotId::from_raw(9);

    let enroll = controller.enroll(&mut sensor, slot);
    let inject = async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.fail_next(MockOp::ReadImage, FingerprintStatus::ImageFail);
    };
    let (report, ()) = tokio::join!(enroll, inject);
    let report = report.unwrap();

    assert_eq!(report.outcome.failure_stage, Some(FailureStage::Capture2));
    assert_eq!(report.outcome.status, Some(FingerprintStatus::ImageFail));
}

#[tokio::test(start_paused = true)]
async fn test_different_fingers_fail_at_model() {
    let (mut sensor, handle) = sensor_with_finger();
    let controller = controller();

    let enroll = controller.enroll(&mut sensor, SlotId::from_raw(2));
    let swap = async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.place_finger(0xFFFF);
    };
    let (report, ()) = tokio::join!(enroll, swap);
    let report = report.unwrap();

    assert_eq!(report.outcome.failure_stage, Some(FailureStage::Model));
    assert_eq!(handle.template(SlotId::from_raw(2)), None);
}

#[tokio::test(start_paused = true)]
async fn test_slot_outside_capacity_fails_without_scanning() {
    let (mut sensor, handle) = MockSensor::with_config("mock://enroll-capacity", 10);
    handle.place_finger(FINGER);

    let report = controller().enroll(&mut sensor, SlotId::from_raw(10)).await.unwrap();

    assert_eq!(report.outcome.failure_stage, Some(FailureStage::Store));
    assert_eq!(report.outcome.status, Some(FingerprintStatus::StoreFail));
    assert!(handle.calls().is_empty());
    assert_eq!(
        report.states(),
        vec![EnrollmentState::Idle, EnrollmentState::Failed]
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_failure_succeeds() {
    let (mut sensor, handle) = sensor_with_finger();
    handle.fail_next(MockOp::CreateModel, FingerprintStatus::NoMatch);
    let controller = controller();

    let first = controller.enroll(&mut sensor, SlotId::from_raw(4)).await.unwrap();
    assert!(!first.outcome.success);
    assert_eq!(handle.template(SlotId::from_raw(4)), None);

    let second = controller.enroll(&mut sensor, SlotId::from_raw(4)).await.unwrap();
    assert!(second.outcome.success);
    assert_eq!(handle.template(SlotId::from_raw(4)), Some(FINGER));
}

#[tokio::test(start_paused = true)]
async fn test_transport_loss_is_an_error() {
    let (mut sensor, handle) = sensor_with_finger();
    handle.disconnect();

    let err = controller()
        .enroll(&mut sensor, SlotId::from_raw(1))
        .await
        .unwrap_err();
    assert!(err.is_session_fatal());
}

#[tokio::test(start_paused = true)]
async fn test_progress_milestones() {
    let (mut sensor, _handle) = sensor_with_finger();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let controller = controller().with_progress(tx);

    controller.enroll(&mut sensor, SlotId::from_raw(6)).await.unwrap();
    drop(controller);

    let mut milestones = Vec::new();
    while let Some(milestone) = rx.recv().await {
        milestones.push(milestone);
    }
    assert_eq!(
        milestones,
        vec![
            EnrollmentMilestone::AwaitFirstScan,
            EnrollmentMilestone::Template1Ready,
            EnrollmentMilestone::RemoveFinger,
            EnrollmentMilestone::AwaitSecondScan,
            EnrollmentMilestone::Template2Ready,
            EnrollmentMilestone::ModelCreated,
            EnrollmentMilestone::Stored,
        ]
    );
}

#[tokio::test]
async fn test_enrollment_excluded_while_session_held() {
    let (first, _h1) = MockSensor::with_transport("mock://enroll-exclusive");
    let (second, _h2) = MockSensor::with_transport("mock://enroll-exclusive");

    let _auth_session = SensorSession::acquire(first).unwrap();
    let err = SensorSession::acquire(second).unwrap_err();
    assert!(matches!(err, HardwareError::SessionBusy { .. }));
}
