//! Signal processing module - bandpass filtering and FFT analysis of
//! accelerometer samples.

mod analyzer;
mod butterworth;
mod fft;

pub use analyzer::{estimate_displacement_cm, SpectralAnalyzer};
pub use butterworth::{butterworth_bandpass, Biquad, SosFilter};
pub use fft::{dominant_frequency, hann_window, magnitude_spectrum, normalize_peak};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors in signal processing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("Insufficient data: need {needed}, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Invalid sampling rate: {0}")]
    InvalidSamplingRate(f64),

    #[error("Invalid band {low}-{high} Hz (Nyquist {nyquist} Hz)")]
    InvalidBand { low: f64, high: f64, nyquist: f64 },

    #[error("Filter order must be at least 1")]
    InvalidOrder,
}

/// Bandpass-filtered time series of one axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilteredSeries {
    /// Seconds since the first sample in the buffer snapshot
    pub times: Vec<f64>,
    /// Filtered acceleration (g)
    pub values: Vec<f64>,
}

impl FilteredSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One-sided magnitude spectrum, normalized to a peak of 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    /// Bin frequencies (Hz), ascending from 0
    pub frequencies: Vec<f64>,
    /// Magnitude per bin in [0, 1]
    pub magnitudes: Vec<f64>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Frequency spacing between bins, or 0 for fewer than two bins.
    pub fn resolution(&self) -> f64 {
        match self.frequencies.as_slice() {
            [first, second, ..] => second - first,
            _ => 0.0,
        }
    }
}
