//! Error types for the acquisition engine.
//!
//! Each failure family gets its own enum so callers can match on exactly the
//! errors a given layer can produce: frame decoding, buffer writes, clock
//! construction, timeline edits and session transitions. None of these are
//! fatal to the process; every one is recoverable at session or per-sample
//! granularity. The binaries wrap them in `anyhow` at the outermost layer.

use thiserror::Error;

use crate::session::SessionState;
use crate::timeline::MarkerId;

/// Decode-time failures. The offending frame is dropped and never reaches a
/// buffer; repeated failures surface as a degraded-link warning on the session.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame length mismatch: expected {expected} bytes, got {actual}")]
    FrameLengthMismatch { expected: usize, actual: usize },

    #[error("field count mismatch: layout carries {expected} fields, caller expects {actual}")]
    FieldCountMismatch { expected: usize, actual: usize },
}

/// Rolling buffer write failures.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum BufferError {
    #[error("buffer capacity must be non-zero")]
    ZeroCapacity,

    #[error("sample rate must be positive, got {0}")]
    InvalidSampleRate(f64),

    #[error("channel count mismatch: buffer has {expected} channels, push carried {actual}")]
    ChannelCountMismatch { expected: usize, actual: usize },

    #[error("non-monotonic timestamp: last {last}, attempted {attempted}")]
    NonMonotonicTimestamp { last: f64, attempted: f64 },
}

/// Sample clock construction failures.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ClockError {
    #[error("looping clock needs a non-empty source array")]
    EmptySource,

    #[error("invalid clock rates: source {fs} Hz, output {output_rate} Hz")]
    InvalidRate { fs: f64, output_rate: f64 },

    #[error("output rate must be positive, got {0} Hz")]
    InvalidOutputRate(f64),
}

/// Event timeline failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineError {
    #[error("no marker with id {0}")]
    MarkerNotFound(MarkerId),
}

/// Session control failures. Illegal transitions are rejected synchronously
/// with the state unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("illegal transition: cannot enter {requested} from {from}")]
    IllegalTransition {
        from: SessionState,
        requested: SessionState,
    },

    #[error("no device named '{0}' found")]
    DeviceNotFound(String),

    #[error("timed out after {waited_ms} ms connecting to '{device}'")]
    ConnectTimeout { device: String, waited_ms: u64 },

    #[error("markers can only be inserted while recording (state is {state})")]
    NotRecording { state: SessionState },

    #[error("cannot insert a marker before the first recorded sample")]
    MarkerBeforeFirstSample,
}
