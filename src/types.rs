//! Core data types shared across acquisition, processing and the session monitor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

// ============================================================================
// Sample
// ============================================================================

/// One accelerometer reading received from the device.
///
/// Accelerations are in g. `estimated_frequency` is the device's own
/// on-board frequency estimate (Hz) carried in the `Freq:` field of the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Host-side monotonic arrival time
    pub timestamp: Instant,
    pub acc_x: f64,
    pub acc_y: f64,
    pub acc_z: f64,
    pub estimated_frequency: f64,
}

impl Sample {
    pub fn new(timestamp: Instant, acc_x: f64, acc_y: f64, acc_z: f64, estimated_frequency: f64) -> Self {
        Self {
            timestamp,
            acc_x,
            acc_y,
            acc_z,
            estimated_frequency,
        }
    }

    /// Acceleration on the selected channel.
    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.acc_x,
            Axis::Y => self.acc_y,
            Axis::Z => self.acc_z,
        }
    }
}

// ============================================================================
// Axis
// ============================================================================

/// Accelerometer channel selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const fn label(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when an axis name is not X, Y or Z.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown axis '{0}' (expected X, Y or Z)")]
pub struct UnknownAxis(pub String);

impl FromStr for Axis {
    type Err = UnknownAxis;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "x" | "X" => Ok(Self::X),
            "y" | "Y" => Ok(Self::Y),
            "z" | "Z" => Ok(Self::Z),
            other => Err(UnknownAxis(other.to_string())),
        }
    }
}

// ============================================================================
// Therapy Profile
// ============================================================================

/// Patient severity level, selecting the drive-frequency band for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TherapyProfile {
    #[default]
    Mild,
    Moderate,
    Severe,
}

impl TherapyProfile {
    /// Frequency (Hz) sent to the device when the profile is selected.
    pub const fn default_frequency(self) -> f64 {
        match self {
            Self::Mild => 3.5,
            Self::Moderate => 5.0,
            Self::Severe => 6.5,
        }
    }

    /// Suggested (min, max) drive-frequency range in Hz.
    pub const fn frequency_range(self) -> (f64, f64) {
        match self {
            Self::Mild => (3.0, 4.0),
            Self::Moderate => (4.5, 5.5),
            Self::Severe => (6.0, 7.0),
        }
    }

    /// Clamp a requested frequency into this profile's range.
    pub fn clamp(self, hz: f64) -> f64 {
        let (min, max) = self.frequency_range();
        hz.clamp(min, max)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
        }
    }
}

impl fmt::Display for TherapyProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned for an unrecognised profile name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown therapy profile '{0}' (expected mild, moderate or severe)")]
pub struct UnknownProfile(pub String);

impl FromStr for TherapyProfile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mild" => Ok(Self::Mild),
            "moderate" => Ok(Self::Moderate),
            "severe" => Ok(Self::Severe),
            _ => Err(UnknownProfile(s.to_string())),
        }
    }
}
