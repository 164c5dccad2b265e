//! Fixed-capacity rolling buffers for the live strip charts.
//!
//! A [`RollingBuffer`] holds the most recent `capacity` samples for one or
//! more value channels that share a single timestamp axis. The channels are
//! strictly index-aligned: a push appends one timestamp and exactly one value
//! per channel, evicting the oldest entry of each.
//!
//! The buffer never reports a partial fill. On creation and on `reset` it is
//! pre-filled with a synthetic back-dated window `[-capacity * interval, 0)`
//! of zeroed values, so `window()` always returns exactly `capacity` entries.
//!
//! Single-writer discipline: only the consumer-tick task writes. Readers take
//! copy-on-read snapshots via [`RollingBuffer::window`], never a reference
//! into storage, so a concurrent push cannot produce a torn read.

use std::collections::VecDeque;

use crate::error::BufferError;

/// Copy-on-read snapshot of a buffer, oldest to newest.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferWindow {
    /// Shared timestamp axis, strictly increasing.
    pub timestamps: Vec<f64>,
    /// One value lane per channel, index-aligned with `timestamps`.
    pub channels: Vec<Vec<f64>>,
}

impl BufferWindow {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Newest timestamp in the window.
    pub fn latest_timestamp(&self) -> Option<f64> {
        self.timestamps.last().copied()
    }

    /// Newest value of the given channel.
    pub fn latest_value(&self, channel: usize) -> Option<f64> {
        self.channels.get(channel).and_then(|c| c.last().copied())
    }
}

/// Time-ordered circular store with fixed capacity and drop-oldest eviction.
#[derive(Debug)]
pub struct RollingBuffer {
    capacity: usize,
    sample_interval: f64,
    channel_labels: Vec<String>,
    timestamps: VecDeque<f64>,
    channels: Vec<VecDeque<f64>>,
}

impl RollingBuffer {
    /// Create a buffer holding `capacity` samples per channel at the given
    /// consumer rate. The buffer starts pre-filled with the synthetic
    /// back-dated window.
    pub fn new(
        capacity: usize,
        sample_rate_hz: f64,
        channel_labels: Vec<String>,
    ) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        if sample_rate_hz <= 0.0 {
            return Err(BufferError::InvalidSampleRate(sample_rate_hz));
        }

        let mut buffer = Self {
            capacity,
            sample_interval: 1.0 / sample_rate_hz,
            channels: channel_labels
                .iter()
                .map(|_| VecDeque::with_capacity(capacity))
                .collect(),
            channel_labels,
            timestamps: VecDeque::with_capacity(capacity),
        };
        buffer.refill_synthetic_window();
        Ok(buffer)
    }

    /// Convenience constructor sized to hold `history_seconds` of data.
    pub fn with_history_seconds(
        history_seconds: f64,
        sample_rate_hz: f64,
        channel_labels: Vec<String>,
    ) -> Result<Self, BufferError> {
        if sample_rate_hz <= 0.0 {
            return Err(BufferError::InvalidSampleRate(sample_rate_hz));
        }
        let capacity = (sample_rate_hz * history_seconds).ceil() as usize;
        Self::new(capacity, sample_rate_hz, channel_labels)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sample_interval(&self) -> f64 {
        self.sample_interval
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel_labels(&self) -> &[String] {
        &self.channel_labels
    }

    /// Newest timestamp. The buffer is never empty, so this is total.
    pub fn latest_timestamp(&self) -> f64 {
        *self
            .timestamps
            .back()
            .unwrap_or(&(-self.sample_interval))
    }

    /// Append one sample, evicting the oldest. O(1); capacity never grows.
    pub fn push(&mut self, timestamp: f64, values: &[f64]) -> Result<(), BufferError> {
        if values.len() != self.channels.len() {
            return Err(BufferError::ChannelCountMismatch {
                expected: self.channels.len(),
                actual: values.len(),
            });
        }
        let last = self.latest_timestamp();
        if timestamp <= last {
            return Err(BufferError::NonMonotonicTimestamp {
                last,
                attempted: timestamp,
            });
        }

        self.timestamps.pop_front();
        self.timestamps.push_back(timestamp);
        for (lane, value) in self.channels.iter_mut().zip(values) {
            lane.pop_front();
            lane.push_back(*value);
        }
        Ok(())
    }

    /// Read-only snapshot, oldest to newest; length always equals capacity.
    pub fn window(&self) -> BufferWindow {
        BufferWindow {
            timestamps: self.timestamps.iter().copied().collect(),
            channels: self
                .channels
                .iter()
                .map(|lane| lane.iter().copied().collect())
                .collect(),
        }
    }

    /// Restore the synthetic back-dated window and zero all channels. Markers
    /// are not touched; those belong to the event timeline.
    pub fn reset(&mut self) {
        self.refill_synthetic_window();
    }

    fn refill_synthetic_window(&mut self) {
        self.timestamps.clear();
        for i in 0..self.capacity {
            // Back-dated axis [-capacity * interval, 0), newest just below 0,
            // so the first real push lands at t = 0.
            self.timestamps
                .push_back(-((self.capacity - i) as f64) * self.sample_interval);
        }
        for lane in &mut self.channels {
            lane.clear();
            lane.extend(std::iter::repeat_n(0.0, self.capacity));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dual_buffer(capacity: usize) -> RollingBuffer {
        RollingBuffer::new(
            capacity,
            20.0,
            vec!["eda_us".into(), "heart_rate_bpm".into()],
        )
        .unwrap()
    }

    #[test]
    fn window_length_equals_capacity_from_creation() {
        let buffer = dual_buffer(300);
        let window = buffer.window();
        assert_eq!(window.len(), 300);
        assert_eq!(window.channels.len(), 2);
        assert_eq!(window.channels[0].len(), 300);
    }

    #[test]
    fn synthetic_window_is_back_dated_and_increasing() {
        let buffer = dual_buffer(300);
        let window = buffer.window();
        assert!((window.timestamps[0] + 15.0).abs() < 1e-9);
        assert!(window.timestamps.last().unwrap() < &0.0);
        for pair in window.timestamps.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn capacity_invariant_holds_after_first_push_and_reset() {
        let mut buffer = dual_buffer(10);
        buffer.push(0.0, &[1.0, 70.0]).unwrap();
        assert_eq!(buffer.window().len(), 10);

        buffer.reset();
        assert_eq!(buffer.window().len(), 10);
        assert!(buffer.window().channels[0].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn eviction_keeps_most_recent_capacity_samples() {
        let mut buffer = dual_buffer(5);
        // capacity + 3 pushes; the first 3 must be evicted
        for i in 0..8 {
            buffer.push(i as f64 * 0.05, &[i as f64, 0.0]).unwrap();
        }
        let window = buffer.window();
        assert_eq!(window.len(), 5);
        assert_eq!(window.channels[0], vec![3.0, 4.0, 5.0, 6.0, 7.0]);
        assert!((window.timestamps[0] - 0.15).abs() < 1e-9);
    }

    #[test]
    fn channels_stay_index_aligned() {
        let mut buffer = dual_buffer(4);
        for i in 0..6 {
            buffer
                .push(i as f64 * 0.05, &[i as f64, 100.0 - i as f64])
                .unwrap();
        }
        let window = buffer.window();
        for (a, b) in window.channels[0].iter().zip(&window.channels[1]) {
            assert!((a + b - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn rejects_wrong_channel_count() {
        let mut buffer = dual_buffer(4);
        assert_eq!(
            buffer.push(0.0, &[1.0]).unwrap_err(),
            BufferError::ChannelCountMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn rejects_non_monotonic_timestamp() {
        let mut buffer = dual_buffer(4);
        buffer.push(0.0, &[1.0, 2.0]).unwrap();
        assert!(matches!(
            buffer.push(0.0, &[1.0, 2.0]),
            Err(BufferError::NonMonotonicTimestamp { .. })
        ));
        // state unchanged
        assert_eq!(buffer.latest_timestamp(), 0.0);
    }

    #[test]
    fn snapshot_is_isolated_from_later_pushes() {
        let mut buffer = dual_buffer(4);
        let before = buffer.window();
        buffer.push(0.0, &[9.0, 9.0]).unwrap();
        assert!(before.channels[0].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            RollingBuffer::new(0, 20.0, vec!["x".into()]).unwrap_err(),
            BufferError::ZeroCapacity
        );
    }
}
