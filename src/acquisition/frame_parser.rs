//! Accelerometer Frame Parser
//!
//! The device emits one ASCII line per sample with fixed labels:
//!
//! ```text
//! ACC_X: <f>, ACC_Y: <f>, ACC_Z: <f> | F_Z(filt): <f> | Freq: <f>[ Hz] | Ref: <f> | Motor: <f>
//! ```
//!
//! `<f>` is a signed decimal with a fractional part (`-0.123`). Matching is
//! anchored at the start of the line; anything after the `Motor` field is
//! ignored. Lines that do not match are dropped by the caller, never fatal.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use regex::Regex;

use super::LinkError;
use crate::types::Sample;

const FRAME_PATTERN: &str = concat!(
    r"^ACC_X:\s*(-?\d+\.\d+),\s*ACC_Y:\s*(-?\d+\.\d+),\s*ACC_Z:\s*(-?\d+\.\d+)",
    r"\s*\|\s*F_Z\(filt\):\s*(-?\d+\.\d+)",
    r"\s*\|\s*Freq:\s*(-?\d+\.\d+)(?:\s*Hz)?",
    r"\s*\|\s*Ref:\s*(-?\d+\.\d+)",
    r"\s*\|\s*Motor:\s*(-?\d+\.\d+)",
);

fn frame_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FRAME_PATTERN).unwrap_or_else(|e| unreachable!("frame pattern is a literal: {e}")))
}

/// All fields carried by one device frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub acc_x: f64,
    pub acc_y: f64,
    pub acc_z: f64,
    /// Device-side filtered Z acceleration
    pub filtered_z: f64,
    /// Device-side frequency estimate (Hz)
    pub frequency: f64,
    /// Reference frequency the firmware is tracking (Hz)
    pub reference: f64,
    /// Motor actuation level
    pub motor: f64,
}

impl Frame {
    /// Stamp the frame with its arrival time, keeping the fields the host analyses.
    pub const fn into_sample(self, timestamp: Instant) -> Sample {
        Sample {
            timestamp,
            acc_x: self.acc_x,
            acc_y: self.acc_y,
            acc_z: self.acc_z,
            estimated_frequency: self.frequency,
        }
    }
}

impl FromStr for Frame {
    type Err = LinkError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let caps = frame_regex()
            .captures(line)
            .ok_or_else(|| LinkError::MalformedFrame(line.to_string()))?;

        let mut fields = [0.0_f64; 7];
        for (slot, idx) in fields.iter_mut().zip(1..=7) {
            let text = caps.get(idx).map_or("", |m| m.as_str());
            *slot = text
                .parse()
                .map_err(|_| LinkError::MalformedFrame(line.to_string()))?;
        }
        let [acc_x, acc_y, acc_z, filtered_z, frequency, reference, motor] = fields;

        Ok(Self {
            acc_x,
            acc_y,
            acc_z,
            filtered_z,
            frequency,
            reference,
            motor,
        })
    }
}

/// Formats the frame exactly as the firmware prints it.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ACC_X: {:.3}, ACC_Y: {:.3}, ACC_Z: {:.3} | F_Z(filt): {:.3} | Freq: {:.2} Hz | Ref: {:.2} | Motor: {:.2}",
            self.acc_x, self.acc_y, self.acc_z, self.filtered_z, self.frequency, self.reference, self.motor
        )
    }
}

/// Decode one line into a [`Sample`], or `None` if it is not a frame.
pub fn parse_line(line: &str, timestamp: Instant) -> Option<Sample> {
    line.parse::<Frame>().ok().map(|frame| frame.into_sample(timestamp))
}
