//! Device frame decoding.
//!
//! The bio-sensor notifies one fixed-width binary payload per sample: 8 bytes,
//! little-endian, four 16-bit fields in order `eda: i16, heart_rate: u16,
//! battery: u16, counter: u16`. The firmware's serialization format declares
//! four fields, so the decoder names four destinations; `counter` is the
//! firmware frame counter and wraps at `u16::MAX`.
//!
//! Decoding is a pure function. A payload of the wrong length is rejected with
//! [`DecodeError::FrameLengthMismatch`] and dropped by the caller; it never
//! reaches a buffer.

use crate::error::DecodeError;

/// Declared frame width in bytes (four 16-bit fields).
pub const FRAME_LEN: usize = 8;

/// Number of numeric fields implied by the frame layout.
pub const CHANNEL_COUNT: usize = 4;

/// EDA raw counts per microsiemens. The sensor ADC spans 0..4095 counts over
/// the 0..10 µS measurement range.
pub const EDA_COUNTS_PER_MICROSIEMENS: f64 = 409.5;

/// One decoded device notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFrame {
    /// Raw skin-conductance ADC counts (signed: the analog front end can
    /// drift slightly below its zero reference).
    pub eda: i16,
    /// Heart rate in BPM, computed on-sensor.
    pub heart_rate: u16,
    /// Battery level in percent.
    pub battery: u16,
    /// Wrapping frame counter.
    pub counter: u16,
}

impl DeviceFrame {
    /// EDA in microsiemens.
    pub fn eda_microsiemens(&self) -> f64 {
        f64::from(self.eda) / EDA_COUNTS_PER_MICROSIEMENS
    }

    /// Heart rate in BPM.
    pub fn heart_rate_bpm(&self) -> f64 {
        f64::from(self.heart_rate)
    }

    /// All four fields as engineering-unit channels, in layout order.
    pub fn channels(&self) -> [f64; CHANNEL_COUNT] {
        [
            self.eda_microsiemens(),
            self.heart_rate_bpm(),
            f64::from(self.battery),
            f64::from(self.counter),
        ]
    }

    /// Copy the channels into a caller-provided slice.
    ///
    /// Fails with [`DecodeError::FieldCountMismatch`] when the destination
    /// length does not equal the field count implied by the frame layout.
    pub fn copy_channels_into(&self, dst: &mut [f64]) -> Result<(), DecodeError> {
        if dst.len() != CHANNEL_COUNT {
            return Err(DecodeError::FieldCountMismatch {
                expected: CHANNEL_COUNT,
                actual: dst.len(),
            });
        }
        dst.copy_from_slice(&self.channels());
        Ok(())
    }
}

/// Decode one notification payload.
pub fn decode(payload: &[u8]) -> Result<DeviceFrame, DecodeError> {
    if payload.len() != FRAME_LEN {
        return Err(DecodeError::FrameLengthMismatch {
            expected: FRAME_LEN,
            actual: payload.len(),
        });
    }

    Ok(DeviceFrame {
        eda: i16::from_le_bytes([payload[0], payload[1]]),
        heart_rate: u16::from_le_bytes([payload[2], payload[3]]),
        battery: u16::from_le_bytes([payload[4], payload[5]]),
        counter: u16::from_le_bytes([payload[6], payload[7]]),
    })
}

/// Encode a frame back to its wire form. Used by the dummy device and tests.
pub fn encode(frame: &DeviceFrame) -> [u8; FRAME_LEN] {
    let mut buf = [0u8; FRAME_LEN];
    buf[0..2].copy_from_slice(&frame.eda.to_le_bytes());
    buf[2..4].copy_from_slice(&frame.heart_rate.to_le_bytes());
    buf[4..6].copy_from_slice(&frame.battery.to_le_bytes());
    buf[6..8].copy_from_slice(&frame.counter.to_le_bytes());
    buf
}

/// Render a payload as one lowercase hex line for the file/FIFO frame feed.
pub fn to_hex_line(payload: &[u8]) -> String {
    payload.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Parse one hex line from the frame feed back into raw bytes. Returns `None`
/// for blank lines and anything that is not an even run of hex digits; length
/// checking is left to [`decode`].
pub fn parse_hex_line(line: &str) -> Option<Vec<u8>> {
    let line = line.trim();
    if line.is_empty() || line.len() % 2 != 0 {
        return None;
    }
    line.as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
        })
        .collect()
}
