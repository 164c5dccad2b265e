//! EDA Recorder - wearable EDA/heart-rate session recorder
//!
//! Records a device frame feed (or a simulated signal) into rolling buffers,
//! with interactive control and marker annotation, and exports the finished
//! session as CSV plus JSON metadata.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode against a frame feed
//! eda-recorder --frames frames.hex --output session01 --subject P001 -i
//! # Then use commands: START, STOP, MARK <label>, UNMARK <id>, MARKERS,
//! # STATUS, STOP_AFTER <seconds>, QUIT
//!
//! # Direct mode with a simulated signal and auto-start
//! eda-recorder --simulate --duration 30 --output session01
//! ```
//!
//! # Interactive Commands
//!
//! - `START` - begin recording
//! - `STOP` - pause recording (buffers freeze, session stays live)
//! - `MARK <label>` - drop an event marker at the newest sample
//! - `UNMARK <id>` - delete a marker
//! - `MARKERS` - list markers
//! - `STATUS` - show session state and counters
//! - `STOP_AFTER <seconds>` - pause after the given duration
//! - `QUIT` - end the session and exit

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use eda_recording_toolbox::acquisition;
use eda_recording_toolbox::cli::Args;
use eda_recording_toolbox::clock::{
    synthetic_rows, DeviceRelayClock, FrameSlot, LoopingClock, SampleSource,
};
use eda_recording_toolbox::commands::handle_commands;
use eda_recording_toolbox::export::export_session;
use eda_recording_toolbox::session::{BaselineDecomposer, SessionController};
use eda_recording_toolbox::subjects::SubjectStore;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if !args.quiet {
        eda_recording_toolbox::display_banner("eda-recorder");
        tracing_subscriber::fmt::init();
    }

    // Determine auto-start behavior
    let auto_start = args.auto_start.unwrap_or(!args.interactive);
    let quit = Arc::new(AtomicBool::new(false));

    // Register the subject on first use
    if let Some(name) = &args.subject {
        let mut store = SubjectStore::load(&args.subjects_file)?;
        if store.find_by_name(name).is_none() {
            store.add(name, "unspecified", None, "");
            store.save()?;
            tracing::info!(subject = %name, file = %args.subjects_file.display(), "registered new subject");
        }
    }

    let mut controller = SessionController::new(args.session_config())?;

    // Open the transport before binding the device: a DeviceNotFound or
    // ConnectTimeout here leaves the session disconnected.
    let (source, device_frames): (
        Box<dyn SampleSource>,
        Option<(mpsc::Receiver<Vec<u8>>, FrameSlot)>,
    ) = match (&args.frames, args.simulate) {
        (Some(path), false) => {
            let slot: FrameSlot = Arc::new(Mutex::new(None));
            let source = DeviceRelayClock::new(Arc::clone(&slot), args.tick_rate)?;
            let rx = acquisition::open_frame_feed(
                path,
                &args.device,
                Duration::from_secs_f64(args.connect_timeout),
                Arc::clone(&quit),
            )?;
            (Box::new(source), Some((rx, slot)))
        }
        _ => {
            if !args.quiet && !args.simulate {
                println!("No frame feed given, falling back to simulated signal");
            }
            let rows = synthetic_rows(args.source_rate, 60.0);
            let source = LoopingClock::new(rows, args.source_rate, args.tick_rate)?;
            (Box::new(source), None)
        }
    };

    controller.connect(&args.device)?;
    controller.arm()?;
    if auto_start {
        controller.set_recording(true)?;
    }
    let session = Arc::new(Mutex::new(controller));

    let handle = acquisition::spawn(
        Arc::clone(&session),
        source,
        Box::new(BaselineDecomposer::default()),
        device_frames,
        args.acquisition_config(),
    );

    if args.interactive {
        // Command handling on the main thread until QUIT or EOF
        if let Err(e) = handle_commands(Arc::clone(&session), Arc::clone(&quit)) {
            eprintln!("Command handling error: {}", e);
        }
    } else {
        if !args.quiet {
            println!("Recording from device: {}", args.device);
        }
        if let Some(duration) = args.duration {
            if !args.quiet {
                println!("Recording will stop after {} seconds", duration);
            }
            thread::sleep(Duration::from_secs(duration));
        } else {
            // No duration: run until the session ends or Ctrl+C
            while !handle.is_stopped() {
                thread::sleep(Duration::from_millis(100));
            }
        }
        quit.store(true, Ordering::SeqCst);
    }

    {
        let mut session = session
            .lock()
            .map_err(|_| anyhow!("session mutex poisoned"))?;
        let _ = session.stop();
    }
    handle.join();

    let session = session
        .lock()
        .map_err(|_| anyhow!("session mutex poisoned"))?;
    export_session(
        &args.output,
        &session,
        args.subject.as_deref(),
        args.notes.as_deref(),
    )?;

    if !args.quiet {
        println!(
            "Exported {} samples and {} markers to {}",
            session.samples_recorded(),
            session.markers().len(),
            args.output.display()
        );
    }

    Ok(())
}
