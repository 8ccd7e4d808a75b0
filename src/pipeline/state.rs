//! Session readings and their bounded history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::acquisition::{AcquisitionState, AcquisitionStats};
use crate::types::TherapyProfile;

// ============================================================================
// Pipeline Status
// ============================================================================

/// Point-in-time view of the links and buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStatus {
    pub acquisition: AcquisitionState,
    pub ready: bool,
    pub buffered: usize,
    pub capacity: usize,
    pub stats: AcquisitionStats,
    /// Last drive frequency accepted by the command channel (Hz)
    pub last_command_hz: Option<f64>,
    pub command_port_open: bool,
}

// ============================================================================
// Session Reading
// ============================================================================

/// One poll of the session monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReading {
    pub timestamp: DateTime<Utc>,
    /// Seconds since the monitor started
    pub elapsed_secs: f64,
    pub profile: TherapyProfile,
    /// Drive frequency requested from the device (Hz)
    pub desired_hz: f64,
    /// Dominant frequency measured on the Z axis (Hz)
    pub detected_hz: f64,
    /// Peak bandpassed Z acceleration (g)
    pub peak_g: f64,
    pub displacement_cm: f64,
    /// Samples in the buffer when the reading was taken
    pub samples: usize,
}

impl SessionReading {
    /// Detected minus desired frequency (Hz).
    pub fn tracking_error_hz(&self) -> f64 {
        self.detected_hz - self.desired_hz
    }
}

// ============================================================================
// Reading History
// ============================================================================

/// Most recent readings, oldest first. The oldest is dropped when full.
#[derive(Debug, Clone)]
pub struct ReadingHistory {
    capacity: usize,
    readings: VecDeque<SessionReading>,
}

impl ReadingHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            readings: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, reading: SessionReading) {
        if self.capacity == 0 {
            return;
        }
        while self.readings.len() >= self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    pub fn latest(&self) -> Option<&SessionReading> {
        self.readings.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionReading> {
        self.readings.iter()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mean detected frequency over readings that measured something.
    pub fn mean_detected_hz(&self) -> Option<f64> {
        let measured: Vec<f64> = self
            .readings
            .iter()
            .map(|r| r.detected_hz)
            .filter(|&hz| hz > 0.0)
            .collect();
        if measured.is_empty() {
            None
        } else {
            Some(measured.iter().sum::<f64>() / measured.len() as f64)
        }
    }
}
