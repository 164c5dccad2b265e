//! Session export: CSV sample tables plus a JSON metadata sidecar.
//!
//! A finished session is written as three files in the output directory:
//!
//! ```text
//! <output>/
//! ├── samples.csv   timestamp, eda_us, heart_rate_bpm, phasic, tonic
//! ├── markers.csv   timestamp, label, color, id
//! └── session.json  device, timing, counts, recorder version
//! ```
//!
//! Only real samples are exported: rows still carrying the synthetic
//! back-dated pre-fill (negative timestamps) are skipped.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use crate::session::SessionController;

/// Write the full session (samples, markers, metadata) under `dir`.
/// Creates the directory if needed.
pub fn export_session(
    dir: &Path,
    session: &SessionController,
    subject: Option<&str>,
    notes: Option<&str>,
) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;

    write_samples_csv(&dir.join("samples.csv"), session)?;
    write_markers_csv(&dir.join("markers.csv"), session)?;

    let metadata = session_metadata_json(session, subject, notes)?;
    fs::write(dir.join("session.json"), metadata)
        .with_context(|| format!("writing session.json in {}", dir.display()))?;

    Ok(())
}

fn write_samples_csv(path: &Path, session: &SessionController) -> Result<()> {
    let primary = session.primary_window();
    let secondary = session.secondary_window();

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["timestamp", "eda_us", "heart_rate_bpm", "phasic", "tonic"])?;

    for i in 0..primary.len() {
        let timestamp = primary.timestamps[i];
        if timestamp < 0.0 {
            continue;
        }
        writer.write_record([
            timestamp.to_string(),
            primary.channels[0][i].to_string(),
            primary.channels[1][i].to_string(),
            secondary.channels[0][i].to_string(),
            secondary.channels[1][i].to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_markers_csv(path: &Path, session: &SessionController) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["timestamp", "label", "color", "id"])?;

    for marker in session.markers() {
        writer.write_record([
            marker.timestamp.to_string(),
            marker.label.clone(),
            marker.color.clone(),
            marker.id.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Serialize session metadata to a pretty JSON string.
pub fn session_metadata_json(
    session: &SessionController,
    subject: Option<&str>,
    notes: Option<&str>,
) -> Result<String> {
    let metadata = json!({
        "device": session.device_id(),
        "armed_at": session.armed_at().map(|t| t.to_rfc3339()),
        "samples_recorded": session.samples_recorded(),
        "buffer_capacity": session.buffer_capacity(),
        "markers": session.markers().len(),
        "link_degraded": session.link_degraded(),
        "subject": subject,
        "notes": notes,
        "recorder_version": env!("CARGO_PKG_VERSION"),
    });
    Ok(serde_json::to_string_pretty(&metadata)?)
}
