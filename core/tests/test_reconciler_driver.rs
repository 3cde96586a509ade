// The tracker loop driven by a fake radio, on paused tokio time.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rollcall_core::beacon::{encode, BeaconObservation, RadioAdapter, RadioError};
use rollcall_core::{
    memory_ledger, AttendanceTracker, BeaconReconciler, LocalBackend, ReconcilerConfig,
    ReconcilerEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

/// Radio whose scan sink is handed to the test.
#[derive(Default)]
struct FakeRadio {
    sink: Mutex<Option<mpsc::Sender<BeaconObservation>>>,
    scanning: Mutex<bool>,
}

impl FakeRadio {
    async fn emit(&self, payload: Vec<u8>) {
        let sink = self.sink.lock().clone().expect("scanning");
        sink.send(BeaconObservation::new(payload)).await.unwrap();
    }
}

#[async_trait]
impl RadioAdapter for FakeRadio {
    async fn start_advertising(&self, _payload: Vec<u8>) -> Result<(), RadioError> {
        Err(RadioError::Unavailable)
    }

    async fn stop_advertising(&self) -> Result<(), RadioError> {
        Ok(())
    }

    async fn start_scanning(
        &self,
        sink: mpsc::Sender<BeaconObservation>,
    ) -> Result<(), RadioError> {
        *self.sink.lock() = Some(sink);
        *self.scanning.lock() = true;
        Ok(())
    }

    async fn stop_scanning(&self) -> Result<(), RadioError> {
        *self.scanning.lock() = false;
        self.sink.lock().take();
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_tracker_goes_live_then_expires_after_ttl() {
    let ledger = Arc::new(memory_ledger());
    let course = ledger.add_course("Astronomy").unwrap();
    let student = ledger.add_student("Vera").unwrap();
    let session = ledger.create_session(course.id, "Galaxies", Utc::now()).unwrap();

    let reconciler = BeaconReconciler::new(
        Arc::new(LocalBackend::new(ledger)),
        student.id,
        ReconcilerConfig::default(),
    )
    .unwrap();
    let mut events = reconciler.subscribe();

    let radio = Arc::new(FakeRadio::default());
    let tracker = AttendanceTracker::start(reconciler, radio.clone()).await.unwrap();
    assert!(*radio.scanning.lock());

    radio.emit(vec![0xFF, 0x00]).await;
    radio.emit(encode(&session.id).unwrap()).await;

    match events.recv().await.unwrap() {
        ReconcilerEvent::SessionLive {
            course_id,
            session_id,
            topic,
        } => {
            assert_eq!(course_id, course.id);
            assert_eq!(session_id, session.id);
            assert_eq!(topic, "Galaxies");
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(tracker.reconciler().live_session(&course.id).is_some());
    assert_eq!(tracker.reconciler().stats().malformed, 1);

    // Silence: the sweep evicts after the 8s ttl
    sleep(Duration::from_secs(11)).await;
    match events.recv().await.unwrap() {
        ReconcilerEvent::SessionExpired { session_id, .. } => assert_eq!(session_id, session.id),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(tracker.reconciler().live_session(&course.id).is_none());
    assert!(tracker
        .reconciler()
        .is_blacklisted(&session.id, Instant::now()));

    tracker.stop().await.unwrap();
    assert!(!*radio.scanning.lock());
}

#[tokio::test(start_paused = true)]
async fn test_steady_beacon_stays_live() {
    let ledger = Arc::new(memory_ledger());
    let course = ledger.add_course("Botany").unwrap();
    let student = ledger.add_student("Barbara").unwrap();
    let session = ledger.create_session(course.id, "Maize", Utc::now()).unwrap();

    let reconciler = BeaconReconciler::new(
        Arc::new(LocalBackend::new(ledger)),
        student.id,
        ReconcilerConfig::default(),
    )
    .unwrap();
    let radio = Arc::new(FakeRadio::default());
    let tracker = AttendanceTracker::start(reconciler, radio.clone()).await.unwrap();

    let payload = encode(&session.id).unwrap();
    for _ in 0..10 {
        radio.emit(payload.clone()).await;
        sleep(Duration::from_secs(3)).await;
    }

    assert_eq!(
        tracker
            .reconciler()
            .live_session(&course.id)
            .map(|live| live.session_id),
        Some(session.id)
    );
    assert_eq!(tracker.reconciler().stats().evictions, 0);

    tracker.stop().await.unwrap();
}
