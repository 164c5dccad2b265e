//! Sample production for the consumer tick.
//!
//! Two realizations of the same [`SampleSource`] contract feed the session:
//!
//! - [`LoopingClock`] replays a fixed source array recorded at `fs`, stepping
//!   `max(1, round(fs / output_rate))` entries per call and wrapping to the
//!   start when the index reaches or exceeds the source length. This models a
//!   simulated or replayed signal and never runs dry.
//! - [`DeviceRelayClock`] relays the latest decoded device frame deposited by
//!   the notification thread, yielding `None` on ticks where no fresh frame
//!   arrived. A live device never loops.
//!
//! Both stamp samples on a relative session axis that advances by
//! `1 / output_rate` per yielded sample, so the first sample after a reset
//! lands at t = 0, right after the buffers' synthetic back-dated window.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::ClockError;
use crate::frame::DeviceFrame;

/// One typed sample on the session time axis. Immutable after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Seconds on the session axis.
    pub timestamp: f64,
    /// Engineering-unit channel values, layout order.
    pub channels: Vec<f64>,
}

/// Something the consumer tick can ask for the next value.
///
/// `None` means the bounded wait elapsed without data (live device between
/// notifications); it is not an error and not the end of the stream.
pub trait SampleSource: Send {
    fn next_sample(&mut self) -> Option<Sample>;

    /// Rewind to the start of the session axis without reallocating.
    fn reset(&mut self);
}

/// Infinite, restartable replay of a fixed source array.
#[derive(Debug)]
pub struct LoopingClock {
    rows: Vec<Vec<f64>>,
    step: usize,
    dt: f64,
    index: usize,
    t: f64,
}

impl LoopingClock {
    /// `rows` were recorded at `fs` Hz; `output_rate` is the consumer rate.
    pub fn new(rows: Vec<Vec<f64>>, fs: f64, output_rate: f64) -> Result<Self, ClockError> {
        if rows.is_empty() {
            return Err(ClockError::EmptySource);
        }
        if fs <= 0.0 || output_rate <= 0.0 {
            return Err(ClockError::InvalidRate { fs, output_rate });
        }

        Ok(Self {
            rows,
            step: ((fs / output_rate).round() as usize).max(1),
            dt: 1.0 / output_rate,
            index: 0,
            t: 0.0,
        })
    }

    /// Decimation step applied to the source index per call.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Current source index. Exposed for decimation tests.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl SampleSource for LoopingClock {
    fn next_sample(&mut self) -> Option<Sample> {
        let sample = Sample {
            timestamp: self.t,
            channels: self.rows[self.index].clone(),
        };
        self.t += self.dt;
        self.index += self.step;
        if self.index >= self.rows.len() {
            self.index = 0;
        }
        Some(sample)
    }

    fn reset(&mut self) {
        self.index = 0;
        self.t = 0.0;
    }
}

/// Shared slot the device-notification thread fills with the newest frame.
pub type FrameSlot = Arc<Mutex<Option<DeviceFrame>>>;

/// Relay from a live device: yields the latest decoded frame, if any.
#[derive(Debug)]
pub struct DeviceRelayClock {
    slot: FrameSlot,
    dt: f64,
    t: f64,
}

impl DeviceRelayClock {
    pub fn new(slot: FrameSlot, output_rate: f64) -> Result<Self, ClockError> {
        if output_rate <= 0.0 {
            return Err(ClockError::InvalidOutputRate(output_rate));
        }
        Ok(Self {
            slot,
            dt: 1.0 / output_rate,
            t: 0.0,
        })
    }
}

impl SampleSource for DeviceRelayClock {
    fn next_sample(&mut self) -> Option<Sample> {
        let frame = self.slot.lock().ok()?.take()?;
        let sample = Sample {
            timestamp: self.t,
            channels: frame.channels().to_vec(),
        };
        self.t += self.dt;
        Some(sample)
    }

    fn reset(&mut self) {
        self.t = 0.0;
        if let Ok(mut slot) = self.slot.lock() {
            slot.take();
        }
    }
}

/// In-memory source for deterministic playback in tests.
pub struct ManualSource {
    queue: VecDeque<Sample>,
}

impl ManualSource {
    pub fn new(samples: impl IntoIterator<Item = Sample>) -> Self {
        Self {
            queue: samples.into_iter().collect(),
        }
    }
}

impl SampleSource for ManualSource {
    fn next_sample(&mut self) -> Option<Sample> {
        self.queue.pop_front()
    }

    fn reset(&mut self) {}
}

/// Synthetic EDA + heart-rate source material: a slow conductance sinusoid
/// with light jitter and a faster, larger heart-rate sinusoid, recorded at
/// `fs` Hz for `seconds`.
pub fn synthetic_rows(fs: f64, seconds: f64) -> Vec<Vec<f64>> {
    let n = (fs * seconds).ceil() as usize;
    (0..n)
        .map(|i| {
            let t = i as f64 / fs;
            let eda = 5.0 + (t / 5.0).sin() + (fastrand::f64() - 0.5) * 0.1;
            let hr = 75.0 + (t / 2.0).sin() * 10.0 + (fastrand::f64() - 0.5) * 2.0;
            vec![eda, hr]
        })
        .collect()
}
