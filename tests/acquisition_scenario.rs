//! Full-session scenarios driving the engine the way the recorder binary does.

use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use eda_recording_toolbox::acquisition::{self, AcquisitionConfig};
use eda_recording_toolbox::clock::{
    synthetic_rows, DeviceRelayClock, FrameSlot, LoopingClock, SampleSource,
};
use eda_recording_toolbox::export::export_session;
use eda_recording_toolbox::frame::{self, DeviceFrame};
use eda_recording_toolbox::session::{
    BaselineDecomposer, EdaDecomposer, SessionConfig, SessionController, SessionState,
};

/// Fifteen seconds of history at the 20 Hz tick rate.
const CAPACITY: usize = 300;

#[test]
fn simulated_session_from_connect_to_fresh_restart() {
    let mut session = SessionController::new(SessionConfig::default()).unwrap();
    let mut clock = LoopingClock::new(synthetic_rows(1000.0, 30.0), 1000.0, 20.0).unwrap();
    let mut decomposer = BaselineDecomposer::default();

    session.connect("EDA_DEVICE_A1").unwrap();
    session.arm().unwrap();
    session.set_recording(true).unwrap();

    // one more sample than the buffer holds, so the oldest is evicted
    for _ in 0..=CAPACITY {
        let sample = clock.next_sample().unwrap();
        let decomposition = decomposer.decompose(sample.timestamp, sample.channels[0]);
        assert!(session.ingest(&sample, &decomposition).unwrap());
    }

    let window = session.primary_window();
    assert_eq!(window.len(), CAPACITY);
    // t = 0 was evicted; the window spans (capacity - 1) ticks of 50 ms
    assert!((window.timestamps[0] - 0.05).abs() < 1e-9);
    let span = window.latest_timestamp().unwrap() - window.timestamps[0];
    assert!((span - 14.95).abs() < 1e-9);

    // marker lands on the newest buffered timestamp
    let id = session.insert_marker("Stressor Start", "#FF0000").unwrap();
    let marker = session.markers().iter().find(|m| m.id == id).unwrap();
    assert!((marker.timestamp - 15.0).abs() < 1e-9);

    // pausing freezes the buffers; offered samples are skipped, not queued
    session.set_recording(false).unwrap();
    let frozen = session.primary_window();
    for _ in 0..10 {
        let sample = clock.next_sample().unwrap();
        let decomposition = decomposer.decompose(sample.timestamp, sample.channels[0]);
        assert!(!session.ingest(&sample, &decomposition).unwrap());
    }
    assert_eq!(session.primary_window(), frozen);

    session.stop().unwrap();
    assert_eq!(session.state(), SessionState::Stopped);

    // a new session on the same controller starts clean
    session.disconnect();
    session.connect("EDA_DEVICE_A1").unwrap();
    session.arm().unwrap();
    assert_eq!(session.samples_recorded(), 0);
    assert!(session.markers().is_empty());
    assert!(session.primary_window().latest_timestamp().unwrap() < 0.0);
}

#[test]
fn threaded_device_session_records_and_exports() {
    let mut controller = SessionController::new(SessionConfig {
        tick_rate_hz: 100.0,
        ..SessionConfig::default()
    })
    .unwrap();
    controller.connect("EDA_DEVICE_A1").unwrap();
    controller.arm().unwrap();
    controller.set_recording(true).unwrap();
    let session = Arc::new(Mutex::new(controller));

    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    let slot: FrameSlot = Arc::new(Mutex::new(None));
    let source = DeviceRelayClock::new(Arc::clone(&slot), 100.0).unwrap();

    let handle = acquisition::spawn(
        Arc::clone(&session),
        Box::new(source),
        Box::new(BaselineDecomposer::default()),
        Some((rx, slot)),
        AcquisitionConfig {
            tick_rate_hz: 100.0,
            device_poll: Duration::from_millis(10),
        },
    );

    for counter in 0..30u16 {
        let payload = frame::encode(&DeviceFrame {
            eda: 2048,
            heart_rate: 72,
            battery: 95,
            counter,
        });
        tx.send(payload.to_vec()).unwrap();
        thread::sleep(Duration::from_millis(10));
    }

    session.lock().unwrap().stop().unwrap();
    handle.join();
    assert_eq!(session.lock().unwrap().state(), SessionState::Stopped);

    let dir = tempfile::tempdir().unwrap();
    let recorded = {
        let session = session.lock().unwrap();
        export_session(dir.path(), &session, Some("P001"), None).unwrap();
        session.samples_recorded()
    };
    assert!(recorded > 0);

    let text = std::fs::read_to_string(dir.path().join("samples.csv")).unwrap();
    // header plus one row per recorded sample
    assert_eq!(text.lines().count() as u64, recorded + 1);

    let meta: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("session.json")).unwrap())
            .unwrap();
    assert_eq!(meta["device"], "EDA_DEVICE_A1");
    assert_eq!(meta["samples_recorded"], recorded);
}

#[test]
fn quit_flag_idempotence_across_threads() {
    let mut controller = SessionController::new(SessionConfig::default()).unwrap();
    controller.connect("EDA_DEVICE_A1").unwrap();
    controller.arm().unwrap();
    let session = Arc::new(Mutex::new(controller));

    let handle = acquisition::spawn(
        Arc::clone(&session),
        Box::new(LoopingClock::new(synthetic_rows(1000.0, 1.0), 1000.0, 20.0).unwrap()),
        Box::new(BaselineDecomposer::default()),
        None,
        AcquisitionConfig::default(),
    );

    // stop from several callers at once; exactly one shutdown happens
    let stoppers: Vec<_> = (0..4)
        .map(|_| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let _ = session.lock().unwrap().stop();
            })
        })
        .collect();
    for stopper in stoppers {
        stopper.join().unwrap();
    }

    handle.stop();
    handle.join();
    assert_eq!(session.lock().unwrap().state(), SessionState::Stopped);
}
