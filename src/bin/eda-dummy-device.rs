//! EDA Dummy Device - synthetic frame feed generator for testing
//!
//! Emits hex-encoded 8-byte device frames (one per line) to a file or FIFO at
//! a fixed rate, simulating the wearable sensor: a slow skin-conductance
//! sinusoid with jitter, a heart-rate sinusoid, a draining battery and a
//! wrapping frame counter.
//!
//! ```bash
//! mkfifo frames.hex
//! eda-dummy-device --frames-out frames.hex &
//! eda-recorder --frames frames.hex -i
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use eda_recording_toolbox::frame::{self, DeviceFrame, EDA_COUNTS_PER_MICROSIEMENS};

#[derive(Parser)]
#[command(name = "eda-dummy-device")]
#[command(about = "Generate a synthetic EDA/heart-rate frame feed for testing")]
struct Args {
    #[arg(
        long = "frames-out",
        help = "Output file or FIFO for hex frame lines",
        default_value = "frames.hex"
    )]
    frames_out: PathBuf,

    #[arg(
        long = "sample-rate",
        help = "Notification rate in Hz",
        default_value = "20.0"
    )]
    sample_rate: f64,

    #[arg(long = "duration", help = "Stop after this many seconds")]
    duration: Option<f64>,

    #[arg(
        long = "battery-start",
        help = "Initial battery percentage",
        default_value = "100"
    )]
    battery_start: u16,

    #[arg(
        long = "corrupt-every",
        help = "Emit a truncated frame every N frames (exercises the recorder's decode-failure path)"
    )]
    corrupt_every: Option<u64>,

    #[arg(short = 'v', long = "verbose", help = "Verbose output")]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.sample_rate <= 0.0 {
        return Err(anyhow::anyhow!("sample rate must be positive"));
    }

    let file = File::create(&args.frames_out)
        .with_context(|| format!("creating frame feed {}", args.frames_out.display()))?;
    let mut writer = BufWriter::new(file);

    println!("EDA Dummy Device");
    println!("================");
    println!("Frame feed:\t{}", args.frames_out.display());
    println!("Sample rate:\t{} Hz", args.sample_rate);
    println!(
        "Duration:\t{}",
        args.duration
            .map(|d| format!("{} s", d))
            .unwrap_or_else(|| "until Ctrl+C".to_string())
    );
    println!();
    println!("Emitting frames...");
    println!();

    let interval = Duration::from_secs_f64(1.0 / args.sample_rate);
    let start = Instant::now();
    let mut emitted = 0u64;

    loop {
        let t = emitted as f64 / args.sample_rate;
        if let Some(duration) = args.duration {
            if t >= duration {
                break;
            }
        }

        let line = match args.corrupt_every {
            Some(n) if n > 0 && emitted % n == n - 1 => {
                // drop the last byte so the recorder sees a 7-byte payload
                frame::to_hex_line(&frame::encode(&synthetic_frame(t, &args))[..7])
            }
            _ => frame::to_hex_line(&frame::encode(&synthetic_frame(t, &args))),
        };
        writeln!(writer, "{}", line)?;
        writer.flush()?;

        emitted += 1;
        if args.verbose && emitted % 100 == 0 {
            let elapsed = start.elapsed().as_secs_f64();
            println!(
                "Status: {} frames sent in {:.1}s (avg rate: {:.1} Hz)",
                emitted,
                elapsed,
                emitted as f64 / elapsed
            );
        }

        thread::sleep(interval);
    }

    println!("Done: {} frames", emitted);
    Ok(())
}

fn synthetic_frame(t: f64, args: &Args) -> DeviceFrame {
    let eda_us = 5.0 + (t / 5.0).sin() + (fastrand::f64() - 0.5) * 0.1;
    let hr = 75.0 + (t / 2.0).sin() * 10.0 + (fastrand::f64() - 0.5) * 2.0;
    // ~1% battery per minute
    let drained = (t / 60.0) as u16;

    DeviceFrame {
        eda: (eda_us * EDA_COUNTS_PER_MICROSIEMENS).clamp(i16::MIN as f64, i16::MAX as f64) as i16,
        heart_rate: hr.max(0.0) as u16,
        battery: args.battery_start.saturating_sub(drained),
        counter: (t * args.sample_rate).round() as u64 as u16,
    }
}
