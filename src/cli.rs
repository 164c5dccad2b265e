use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::acquisition::AcquisitionConfig;
use crate::session::SessionConfig;

#[derive(Parser, Clone)]
#[command(name = "eda-recorder")]
#[command(about = "Record EDA and heart-rate frames from a wearable device with interactive control")]
pub struct Args {
    #[arg(long, help = "Device identifier to bind", default_value = "EDA_DEVICE_A1")]
    pub device: String,

    #[arg(
        long,
        short = 'o',
        help = "Output directory for samples.csv, markers.csv and session.json",
        default_value = "session"
    )]
    pub output: PathBuf,

    #[arg(
        long,
        help = "Path to a frame feed (file or FIFO with one hex-encoded 8-byte frame per line)"
    )]
    pub frames: Option<PathBuf>,

    #[arg(long, help = "Replay a synthetic signal instead of a live device")]
    pub simulate: bool,

    #[arg(
        long,
        default_value = "1000.0",
        help = "Source sample rate of the simulated signal in Hz"
    )]
    pub source_rate: f64,

    #[arg(long, default_value = "20.0", help = "Consumer tick rate in Hz")]
    pub tick_rate: f64,

    #[arg(
        long,
        default_value = "15.0",
        help = "Visible buffer history in seconds"
    )]
    pub buffer_seconds: f64,

    #[arg(
        long,
        short = 'i',
        help = "Interactive mode - accept commands via stdin"
    )]
    pub interactive: bool,

    #[arg(
        long,
        help = "Auto-start recording (default: true for non-interactive, false for interactive)"
    )]
    pub auto_start: Option<bool>,

    #[arg(long, short = 'd', help = "Maximum recording duration in seconds")]
    pub duration: Option<u64>,

    #[arg(long, short = 'q', help = "Minimal output mode")]
    pub quiet: bool,

    #[arg(long, help = "Subject identifier for metadata")]
    pub subject: Option<String>,

    #[arg(long, help = "Notes for metadata")]
    pub notes: Option<String>,

    #[arg(
        long,
        default_value = "subjects.json",
        help = "Subject registry file"
    )]
    pub subjects_file: PathBuf,

    #[arg(
        long,
        default_value = "100",
        help = "Bounded wait per device poll in milliseconds"
    )]
    pub device_poll_ms: u64,

    #[arg(
        long,
        default_value = "5.0",
        help = "Timeout in seconds for the frame feed to produce its first frame"
    )]
    pub connect_timeout: f64,
}

impl Args {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            buffer_seconds: self.buffer_seconds,
            tick_rate_hz: self.tick_rate,
            ..SessionConfig::default()
        }
    }

    pub fn acquisition_config(&self) -> AcquisitionConfig {
        AcquisitionConfig {
            tick_rate_hz: self.tick_rate,
            device_poll: Duration::from_millis(self.device_poll_ms),
        }
    }
}
