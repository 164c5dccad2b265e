//! EDA Recording Toolbox - acquisition engine for wearable electrodermal data
//!
//! This crate records electrodermal activity (EDA) and heart-rate frames from
//! a wearable sensor, keeps the most recent window of samples in fixed-size
//! rolling buffers for live display, lets the operator drop timestamped event
//! markers during a recording, and exports the finished session as CSV plus a
//! JSON metadata sidecar.
//!
//! # Overview
//!
//! The engine is organized as a pipeline:
//!
//! - [`frame`] decodes the device's fixed 8-byte little-endian frame layout
//!   into engineering units
//! - [`clock`] turns decoded frames (or a simulated signal) into a steady
//!   sample stream on a relative session time axis
//! - [`buffer`] holds the visible history in drop-oldest rolling buffers
//! - [`timeline`] keeps operator event markers independent of the buffers
//! - [`session`] is the state machine gating all of the above
//! - [`acquisition`] runs the device and consumer threads
//! - [`export`] writes samples, markers and metadata to disk
//! - [`subjects`] is the flat-file participant registry
//!
//! # Command-Line Tools
//!
//! - `eda-recorder` - records a device or a simulated signal with interactive
//!   START/STOP/MARK/QUIT control
//! - `eda-dummy-device` - generates a synthetic frame feed for testing
//!
//! # Quick Start
//!
//! ```bash
//! # Generate a test frame feed (in one terminal)
//! eda-dummy-device --frames-out frames.hex
//!
//! # Record it (in another terminal)
//! eda-recorder --frames frames.hex --output session01 --subject P001 -i
//! # Commands: START, STOP, MARK <label>, UNMARK <id>, MARKERS, STATUS, QUIT
//!
//! # Or skip the device entirely
//! eda-recorder --simulate --duration 30 --output session01
//! ```

pub mod acquisition;
pub mod buffer;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod error;
pub mod export;
pub mod frame;
pub mod session;
pub mod subjects;
pub mod timeline;

/// Print the program banner with name and version.
pub fn display_banner(program_name: &str) {
    println!("{} {}", program_name, env!("CARGO_PKG_VERSION"));
    println!();
}
