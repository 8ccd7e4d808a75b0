//! Snapshot analysis: filtered series, spectrum, dominant frequency and
//! peak amplitude for one accelerometer axis.
//!
//! Every method is a pure function of the sample slice it is given. Below
//! `min_samples` the outputs are empty or 0.0 rather than errors, so a
//! freshly started session simply reports nothing until the buffer fills.

use std::f64::consts::PI;

use tracing::trace;

use super::butterworth::{butterworth_bandpass, SosFilter};
use super::fft::{dominant_frequency, magnitude_spectrum};
use super::{FilteredSeries, ProcessingError, Spectrum};
use crate::config::defaults::STANDARD_GRAVITY;
use crate::config::AnalysisConfig;
use crate::types::{Axis, Sample};

/// Bandpass + FFT chain with its filter designed once up front.
#[derive(Debug, Clone)]
pub struct SpectralAnalyzer {
    config: AnalysisConfig,
    filter: SosFilter,
}

impl SpectralAnalyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self, ProcessingError> {
        let filter = butterworth_bandpass(
            config.filter_order,
            config.band_low_hz,
            config.band_high_hz,
            config.sample_rate_hz,
        )?;
        Ok(Self { config, filter })
    }

    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn warming_up(&self, samples: &[Sample]) -> bool {
        let short = samples.len() < self.config.min_samples;
        if short {
            trace!(
                available = samples.len(),
                needed = self.config.min_samples,
                "Not enough samples for analysis"
            );
        }
        short
    }

    /// Bandpass-filter every sample on `axis`. Samples are assumed uniformly
    /// spaced at the configured rate.
    fn filter_axis(&self, samples: &[Sample], axis: Axis) -> Vec<f64> {
        let raw: Vec<f64> = samples.iter().map(|s| s.axis(axis)).collect();
        self.filter.filtfilt(&raw)
    }

    /// Filtered samples from the last `window_secs` seconds.
    ///
    /// Times are seconds since the oldest sample in `samples`. Returns an
    /// empty series when either the whole slice or the windowed part holds
    /// fewer than `min_samples` entries.
    pub fn filtered_series(&self, samples: &[Sample], axis: Axis, window_secs: f64) -> FilteredSeries {
        if self.warming_up(samples) {
            return FilteredSeries::default();
        }
        let Some(origin) = samples.first().map(|s| s.timestamp) else {
            return FilteredSeries::default();
        };

        let times: Vec<f64> = samples
            .iter()
            .map(|s| s.timestamp.saturating_duration_since(origin).as_secs_f64())
            .collect();
        let latest = times.last().copied().unwrap_or(0.0);

        let (times, raw): (Vec<f64>, Vec<f64>) = times
            .iter()
            .zip(samples)
            .filter(|(&t, _)| latest - t <= window_secs)
            .map(|(&t, s)| (t, s.axis(axis)))
            .unzip();

        if raw.len() < self.config.min_samples {
            trace!(in_window = raw.len(), window_secs, "Window too short for filtering");
            return FilteredSeries::default();
        }

        FilteredSeries {
            times,
            values: self.filter.filtfilt(&raw),
        }
    }

    /// Normalized magnitude spectrum of the filtered, Hann-windowed axis.
    pub fn spectrum(&self, samples: &[Sample], axis: Axis) -> Spectrum {
        if self.warming_up(samples) {
            return Spectrum::default();
        }
        let filtered = self.filter_axis(samples, axis);
        // Rate already validated by the filter design; input is non-empty.
        magnitude_spectrum(&filtered, self.config.sample_rate_hz).unwrap_or_default()
    }

    /// Dominant frequency using the configured search bandwidth.
    pub fn dominant_frequency(&self, samples: &[Sample], axis: Axis, reference: Option<f64>) -> f64 {
        self.dominant_frequency_with_bandwidth(samples, axis, reference, self.config.search_bandwidth_hz)
    }

    /// Dominant frequency searching `±bandwidth/2` around `reference`.
    ///
    /// Returns 0.0 while warming up, even when a reference is given.
    pub fn dominant_frequency_with_bandwidth(
        &self,
        samples: &[Sample],
        axis: Axis,
        reference: Option<f64>,
        bandwidth: f64,
    ) -> f64 {
        if self.warming_up(samples) {
            return 0.0;
        }
        let spectrum = self.spectrum(samples, axis);
        dominant_frequency(&spectrum, reference, bandwidth)
    }

    /// Largest absolute filtered acceleration (g).
    pub fn peak_amplitude(&self, samples: &[Sample], axis: Axis) -> f64 {
        if self.warming_up(samples) {
            return 0.0;
        }
        self.filter_axis(samples, axis)
            .iter()
            .fold(0.0_f64, |peak, v| peak.max(v.abs()))
    }
}

/// Displacement (cm) of simple harmonic motion with peak acceleration
/// `amplitude_g` at `frequency_hz`: A = a / (2πf)².
///
/// Returns 0.0 unless the frequency is strictly positive.
pub fn estimate_displacement_cm(amplitude_g: f64, frequency_hz: f64) -> f64 {
    if frequency_hz.is_nan() || frequency_hz <= 0.0 {
        return 0.0;
    }
    let accel = amplitude_g * STANDARD_GRAVITY;
    let omega = 2.0 * PI * frequency_hz;
    accel / (omega * omega) * 100.0
}
