//! The concurrency driver: one thread per timing domain.
//!
//! - The device-notification thread drains raw frame payloads as they arrive
//!   (irregular, externally driven), decodes them and deposits the newest
//!   frame into the shared [`FrameSlot`]. It waits with a bounded
//!   `recv_timeout` and re-checks the quit flag around every suspension, so
//!   cancellation never leaves it blocked.
//! - The consumer-tick thread runs at a fixed period (nominal 20 Hz). Each
//!   tick it asks the active [`SampleSource`] for the next value, feeds the
//!   decomposer and offers the result to the session, which pushes it only
//!   while recording.
//!
//! The tick thread is the buffers' single writer and the only thread that
//! invokes session observers. When the session reaches `Stopped` or
//! `Disconnected`, the tick thread raises the quit flag and both threads wind
//! down.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::clock::{FrameSlot, SampleSource};
use crate::error::SessionError;
use crate::frame;
use crate::session::{EdaDecomposer, SessionController, SessionState};

/// Wait between polls when the frame feed is at end of file.
const FEED_RETRY: Duration = Duration::from_millis(100);

/// Timing configuration for the two domains.
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    /// Consumer tick rate, Hz.
    pub tick_rate_hz: f64,
    /// Bounded wait per iteration of the notification thread.
    pub device_poll: Duration,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20.0,
            device_poll: Duration::from_millis(100),
        }
    }
}

/// Handle over the running acquisition threads.
pub struct AcquisitionHandle {
    quit: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl AcquisitionHandle {
    /// Request shutdown of both timing domains. Idempotent.
    pub fn stop(&self) {
        self.quit.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    /// Stop and wait for both threads to finish.
    pub fn join(mut self) {
        self.stop();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                tracing::error!("acquisition thread panicked");
            }
        }
    }
}

/// Spawn the acquisition threads.
///
/// `device_frames` is the raw payload channel from the transport plus the
/// frame slot the relay clock reads; pass `None` for a purely simulated
/// source, which needs no notification domain.
pub fn spawn(
    session: Arc<Mutex<SessionController>>,
    source: Box<dyn SampleSource>,
    decomposer: Box<dyn EdaDecomposer>,
    device_frames: Option<(Receiver<Vec<u8>>, FrameSlot)>,
    config: AcquisitionConfig,
) -> AcquisitionHandle {
    let quit = Arc::new(AtomicBool::new(false));
    let mut threads = Vec::new();

    if let Some((frames, slot)) = device_frames {
        let quit = Arc::clone(&quit);
        let session = Arc::clone(&session);
        let poll = config.device_poll;
        threads.push(thread::spawn(move || {
            run_device_domain(&frames, &slot, &session, &quit, poll);
        }));
    }

    {
        let quit = Arc::clone(&quit);
        let tick = Duration::from_secs_f64(1.0 / config.tick_rate_hz);
        threads.push(thread::spawn(move || {
            run_tick_domain(session, source, decomposer, &quit, tick);
        }));
    }

    AcquisitionHandle { quit, threads }
}

/// Open the device frame feed and wait for it to produce its first frame.
///
/// The feed carries one hex-encoded frame per line and is tailed: at end of
/// file the reader waits for more data instead of closing the channel, so a
/// plain file still being appended to behaves the same as a FIFO. The reader
/// thread exits when the quit flag is raised or the receiver is dropped.
///
/// Connection-time failures surface to the caller before the session binds
/// the device, leaving it disconnected: an unopenable path is
/// [`SessionError::DeviceNotFound`], a feed that stays silent past
/// `connect_timeout` is [`SessionError::ConnectTimeout`].
pub fn open_frame_feed(
    path: &Path,
    device_id: &str,
    connect_timeout: Duration,
    quit: Arc<AtomicBool>,
) -> Result<Receiver<Vec<u8>>, SessionError> {
    let feed =
        File::open(path).map_err(|_| SessionError::DeviceNotFound(device_id.to_string()))?;
    let (tx, rx) = mpsc::channel();
    let (ready_tx, ready_rx) = mpsc::channel::<()>();

    thread::spawn(move || {
        let mut reader = BufReader::new(feed);
        let mut chunk = String::new();
        let mut pending = String::new();
        let mut announced = false;
        loop {
            chunk.clear();
            match reader.read_line(&mut chunk) {
                // end of file: the writer may still be appending
                Ok(0) => {
                    if quit.load(Ordering::SeqCst) {
                        break;
                    }
                    thread::sleep(FEED_RETRY);
                }
                Ok(_) => {
                    pending.push_str(&chunk);
                    if !pending.ends_with('\n') {
                        // caught the writer mid-line, wait for the rest
                        continue;
                    }
                    if let Some(payload) = frame::parse_hex_line(&pending) {
                        if tx.send(payload).is_err() {
                            break;
                        }
                        if !announced {
                            announced = true;
                            let _ = ready_tx.send(());
                        }
                    }
                    pending.clear();
                }
                Err(e) => {
                    tracing::warn!(error = %e, "frame feed read error");
                    break;
                }
            }
        }
    });

    match ready_rx.recv_timeout(connect_timeout) {
        Ok(()) => Ok(rx),
        Err(_) => Err(SessionError::ConnectTimeout {
            device: device_id.to_string(),
            waited_ms: connect_timeout.as_millis() as u64,
        }),
    }
}

fn run_device_domain(
    frames: &Receiver<Vec<u8>>,
    slot: &FrameSlot,
    session: &Arc<Mutex<SessionController>>,
    quit: &AtomicBool,
    poll: Duration,
) {
    loop {
        if quit.load(Ordering::SeqCst) {
            break;
        }
        match frames.recv_timeout(poll) {
            Ok(payload) => match frame::decode(&payload) {
                Ok(decoded) => {
                    if let Ok(mut latest) = slot.lock() {
                        *latest = Some(decoded);
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "dropping undecodable frame");
                    if let Ok(mut session) = session.lock() {
                        session.note_decode_failure();
                    }
                }
            },
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::info!("device frame channel closed");
                break;
            }
        }
    }
}

fn run_tick_domain(
    session: Arc<Mutex<SessionController>>,
    mut source: Box<dyn SampleSource>,
    mut decomposer: Box<dyn EdaDecomposer>,
    quit: &AtomicBool,
    tick: Duration,
) {
    loop {
        if quit.load(Ordering::SeqCst) {
            break;
        }
        let started = Instant::now();

        let Ok(mut session) = session.lock() else {
            break;
        };
        match session.state() {
            SessionState::Stopped | SessionState::Disconnected => {
                // Cancels the notification domain as well.
                quit.store(true, Ordering::SeqCst);
                break;
            }
            _ => {}
        }

        if let Some(sample) = source.next_sample() {
            let eda = sample.channels.first().copied().unwrap_or(0.0);
            let decomposition = decomposer.decompose(sample.timestamp, eda);
            if let Err(e) = session.ingest(&sample, &decomposition) {
                tracing::warn!(error = %e, "sample rejected by buffer");
            }
        }
        drop(session);

        if let Some(remaining) = tick.checked_sub(started.elapsed()) {
            thread::sleep(remaining);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{DeviceRelayClock, ManualSource, Sample};
    use crate::frame::DeviceFrame;
    use crate::session::{BaselineDecomposer, SessionConfig};
    use std::sync::mpsc;

    fn recording_session(tick_rate_hz: f64) -> Arc<Mutex<SessionController>> {
        let mut session = SessionController::new(SessionConfig {
            tick_rate_hz,
            ..SessionConfig::default()
        })
        .unwrap();
        session.connect("EDA_DEVICE_A1").unwrap();
        session.arm().unwrap();
        session.set_recording(true).unwrap();
        Arc::new(Mutex::new(session))
    }

    #[test]
    fn tick_domain_drains_a_manual_source() {
        let session = recording_session(200.0);
        let samples = (0..10).map(|i| Sample {
            timestamp: i as f64 * 0.005,
            channels: vec![5.0, 75.0],
        });

        let handle = spawn(
            Arc::clone(&session),
            Box::new(ManualSource::new(samples)),
            Box::new(BaselineDecomposer::default()),
            None,
            AcquisitionConfig {
                tick_rate_hz: 200.0,
                ..AcquisitionConfig::default()
            },
        );

        thread::sleep(Duration::from_millis(300));
        handle.join();

        assert_eq!(session.lock().unwrap().samples_recorded(), 10);
    }

    #[test]
    fn device_domain_relays_decoded_frames_to_the_buffers() {
        let session = recording_session(200.0);
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let slot: FrameSlot = Arc::new(Mutex::new(None));
        let source = DeviceRelayClock::new(Arc::clone(&slot), 200.0).unwrap();

        let handle = spawn(
            Arc::clone(&session),
            Box::new(source),
            Box::new(BaselineDecomposer::default()),
            Some((rx, slot)),
            AcquisitionConfig {
                tick_rate_hz: 200.0,
                device_poll: Duration::from_millis(10),
            },
        );

        for counter in 0..20u16 {
            let payload = frame::encode(&DeviceFrame {
                eda: 2048,
                heart_rate: 72,
                battery: 95,
                counter,
            });
            tx.send(payload.to_vec()).unwrap();
            thread::sleep(Duration::from_millis(10));
        }
        thread::sleep(Duration::from_millis(50));
        handle.join();

        let session = session.lock().unwrap();
        assert!(session.samples_recorded() > 0);
        let latest_hr = session.primary_window().latest_value(1).unwrap();
        assert!((latest_hr - 72.0).abs() < 1e-9);
    }

    #[test]
    fn bad_frames_are_dropped_and_counted() {
        let session = recording_session(200.0);
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let slot: FrameSlot = Arc::new(Mutex::new(None));
        let source = DeviceRelayClock::new(Arc::clone(&slot), 200.0).unwrap();

        let handle = spawn(
            Arc::clone(&session),
            Box::new(source),
            Box::new(BaselineDecomposer::default()),
            Some((rx, slot)),
            AcquisitionConfig {
                tick_rate_hz: 200.0,
                device_poll: Duration::from_millis(10),
            },
        );

        // 7-byte payloads never reach the buffers
        for _ in 0..5 {
            tx.send(vec![0u8; 7]).unwrap();
        }
        thread::sleep(Duration::from_millis(100));
        handle.join();

        let session = session.lock().unwrap();
        assert_eq!(session.samples_recorded(), 0);
    }

    #[test]
    fn missing_feed_is_device_not_found_and_session_stays_disconnected() {
        let session = SessionController::new(SessionConfig::default()).unwrap();
        let quit = Arc::new(AtomicBool::new(false));

        let err = open_frame_feed(
            Path::new("/nonexistent/frames.hex"),
            "EDA_DEVICE_A1",
            Duration::from_millis(10),
            quit,
        )
        .unwrap_err();

        assert_eq!(err, SessionError::DeviceNotFound("EDA_DEVICE_A1".into()));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn silent_feed_times_out_and_session_stays_disconnected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.hex");
        std::fs::write(&path, "").unwrap();
        let session = SessionController::new(SessionConfig::default()).unwrap();
        let quit = Arc::new(AtomicBool::new(false));

        let err = open_frame_feed(
            &path,
            "EDA_DEVICE_A1",
            Duration::from_millis(50),
            Arc::clone(&quit),
        )
        .unwrap_err();

        assert_eq!(
            err,
            SessionError::ConnectTimeout {
                device: "EDA_DEVICE_A1".into(),
                waited_ms: 50,
            }
        );
        assert_eq!(session.state(), SessionState::Disconnected);
        quit.store(true, Ordering::SeqCst);
    }

    #[test]
    fn feed_is_tailed_past_end_of_file() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.hex");
        let line = frame::to_hex_line(&frame::encode(&DeviceFrame {
            eda: 2048,
            heart_rate: 72,
            battery: 95,
            counter: 0,
        }));
        std::fs::write(&path, format!("{}\n", line)).unwrap();

        let quit = Arc::new(AtomicBool::new(false));
        let rx = open_frame_feed(
            &path,
            "EDA_DEVICE_A1",
            Duration::from_millis(500),
            Arc::clone(&quit),
        )
        .unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(500)).unwrap().len(),
            frame::FRAME_LEN
        );

        // give the reader time to hit end of file, then append
        thread::sleep(Duration::from_millis(250));
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        writeln!(file, "{}", line).unwrap();

        let appended = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(frame::decode(&appended).unwrap().heart_rate, 72);

        quit.store(true, Ordering::SeqCst);
    }

    #[test]
    fn stopping_the_session_cancels_the_loop() {
        let session = recording_session(200.0);
        let handle = spawn(
            Arc::clone(&session),
            Box::new(ManualSource::new(Vec::new())),
            Box::new(BaselineDecomposer::default()),
            None,
            AcquisitionConfig {
                tick_rate_hz: 200.0,
                ..AcquisitionConfig::default()
            },
        );

        session.lock().unwrap().stop().unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(handle.is_stopped());

        // stop() is idempotent on the handle too
        handle.stop();
        handle.stop();
        handle.join();
    }
}
