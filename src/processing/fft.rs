//! Windowed FFT and peak search using rustfft.
//!
//! The input is Hann-windowed and zero-padded to the next power of two
//! before the transform. Only the non-negative half of the spectrum is kept
//! and it is normalized so the largest bin equals 1.

use std::cmp::Ordering;
use std::f64::consts::PI;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::{ProcessingError, Spectrum};

/// Symmetric Hann window of length `n`.
pub fn hann_window(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (n - 1) as f64;
            (0..n)
                .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos())
                .collect()
        }
    }
}

/// Scale so the maximum is 1. All-zero (or empty) input is returned unchanged.
pub fn normalize_peak(values: &mut [f64]) {
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    let scale = if max > 0.0 { max } else { 1.0 };
    for v in values.iter_mut() {
        *v /= scale;
    }
}

/// Normalized one-sided magnitude spectrum of a Hann-windowed signal.
///
/// The FFT length is `signal.len().next_power_of_two()`; bins run from DC up
/// to, but not including, Nyquist.
pub fn magnitude_spectrum(signal: &[f64], sample_rate: f64) -> Result<Spectrum, ProcessingError> {
    if signal.is_empty() {
        return Err(ProcessingError::InsufficientData {
            needed: 1,
            available: 0,
        });
    }
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(ProcessingError::InvalidSamplingRate(sample_rate));
    }

    let fft_size = signal.len().next_power_of_two();
    let window = hann_window(signal.len());

    let mut buffer: Vec<Complex<f64>> = signal
        .iter()
        .zip(&window)
        .map(|(&x, &w)| Complex::new(x * w, 0.0))
        .collect();
    buffer.resize(fft_size, Complex::new(0.0, 0.0));

    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(fft_size).process(&mut buffer);

    // A length-1 transform still has its DC bin.
    let n_bins = (fft_size / 2).max(1);
    let resolution = sample_rate / fft_size as f64;
    let frequencies: Vec<f64> = (0..n_bins).map(|i| i as f64 * resolution).collect();
    let mut magnitudes: Vec<f64> = buffer.iter().take(n_bins).map(|c| c.norm()).collect();
    normalize_peak(&mut magnitudes);

    Ok(Spectrum {
        frequencies,
        magnitudes,
    })
}

/// Frequency of the strongest bin, optionally restricted to a window around
/// `reference`.
///
/// With a reference the search covers `[reference - bandwidth/2,
/// reference + bandwidth/2]` inclusive, and the reference itself is returned
/// when no bin lies inside. Without one the whole spectrum is searched and an
/// empty spectrum yields 0.0. Ties go to the lowest frequency.
pub fn dominant_frequency(spectrum: &Spectrum, reference: Option<f64>, bandwidth: f64) -> f64 {
    let bins = spectrum.frequencies.iter().zip(&spectrum.magnitudes);
    match reference {
        Some(reference) => {
            let half = bandwidth / 2.0;
            let (low, high) = (reference - half, reference + half);
            first_max(bins.filter(|(&f, _)| f >= low && f <= high)).unwrap_or(reference)
        }
        None => first_max(bins).unwrap_or(0.0),
    }
}

/// Frequency of the first strictly-greatest magnitude. NaN bins never win.
fn first_max<'a>(bins: impl Iterator<Item = (&'a f64, &'a f64)>) -> Option<f64> {
    let mut best: Option<(f64, f64)> = None;
    for (&freq, &mag) in bins.filter(|(_, m)| !m.is_nan()) {
        let better = best.map_or(true, |(_, best_mag)| {
            mag.partial_cmp(&best_mag) == Some(Ordering::Greater)
        });
        if better {
            best = Some((freq, mag));
        }
    }
    best.map(|(freq, _)| freq)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(frequencies: Vec<f64>, magnitudes: Vec<f64>) -> Spectrum {
        Spectrum {
            frequencies,
            magnitudes,
        }
    }

    #[test]
    fn hann_window_shape() {
        assert!(hann_window(0).is_empty());
        assert_eq!(hann_window(1), vec![1.0]);
        let w = hann_window(5);
        assert!(w[0].abs() < 1e-12);
        assert!(w[4].abs() < 1e-12);
        assert!((w[2] - 1.0).abs() < 1e-12);
        assert!((w[1] - w[3]).abs() < 1e-12);
    }

    #[test]
    fn normalize_scales_max_to_one() {
        let mut v = vec![0.5, 2.0, 1.0];
        normalize_peak(&mut v);
        assert_eq!(v, vec![0.25, 1.0, 0.5]);

        let mut zeros = vec![0.0; 4];
        normalize_peak(&mut zeros);
        assert_eq!(zeros, vec![0.0; 4]);
    }

    #[test]
    fn sine_peaks_at_its_frequency() {
        let fs = 40.0;
        let signal: Vec<f64> = (0..64).map(|i| (2.0 * PI * 5.0 * i as f64 / fs).sin()).collect();
        let spec = magnitude_spectrum(&signal, fs).unwrap();

        assert_eq!(spec.len(), 32);
        assert!((spec.resolution() - 0.625).abs() < 1e-12);
        assert_eq!(dominant_frequency(&spec, None, 1.0), 5.0);

        let max = spec.magnitudes.iter().copied().fold(f64::MIN, f64::max);
        assert!((max - 1.0).abs() < 1e-12);
        assert!(spec.magnitudes.iter().all(|m| (0.0..=1.0).contains(m)));
    }

    #[test]
    fn non_power_of_two_input_is_zero_padded() {
        let signal = vec![1.0; 60];
        let spec = magnitude_spectrum(&signal, 40.0).unwrap();
        assert_eq!(spec.len(), 32);
        assert_eq!(spec.frequencies[8], 5.0);
    }

    #[test]
    fn all_zero_signal_stays_zero() {
        let spec = magnitude_spectrum(&[0.0; 16], 40.0).unwrap();
        assert!(spec.magnitudes.iter().all(|&m| m == 0.0));
        assert_eq!(dominant_frequency(&spec, None, 1.0), 0.0);
    }

    #[test]
    fn rejects_empty_and_bad_rate() {
        assert!(matches!(magnitude_spectrum(&[], 40.0), Err(ProcessingError::InsufficientData { .. })));
        assert!(matches!(magnitude_spectrum(&[1.0], -1.0), Err(ProcessingError::InvalidSamplingRate(_))));
    }

    #[test]
    fn reference_restricts_search() {
        let spec = spectrum(vec![0.0, 1.0, 2.0, 3.0, 4.0], vec![0.1, 1.0, 0.2, 0.6, 0.3]);
        assert_eq!(dominant_frequency(&spec, None, 1.0), 1.0);
        assert_eq!(dominant_frequency(&spec, Some(3.2), 1.0), 3.0);
        // Window edges are inclusive.
        assert_eq!(dominant_frequency(&spec, Some(3.5), 1.0), 3.0);
    }

    #[test]
    fn empty_window_returns_reference() {
        let spec = spectrum(vec![0.0, 1.0, 2.0], vec![0.1, 1.0, 0.5]);
        for reference in [0.4, 1.6, 10.0, -3.0] {
            assert_eq!(dominant_frequency(&spec, Some(reference), 0.5), reference);
        }
        assert_eq!(dominant_frequency(&Spectrum::default(), Some(5.0), 1.0), 5.0);
    }

    #[test]
    fn ties_go_to_lowest_frequency() {
        let spec = spectrum(vec![1.0, 2.0, 3.0], vec![1.0, 1.0, 1.0]);
        assert_eq!(dominant_frequency(&spec, None, 1.0), 1.0);
        assert_eq!(dominant_frequency(&spec, Some(2.5), 1.0), 2.0);
    }

    #[test]
    fn nan_bins_are_ignored() {
        let spec = spectrum(vec![1.0, 2.0, 3.0], vec![0.5, f64::NAN, 1.0]);
        assert_eq!(dominant_frequency(&spec, None, 1.0), 3.0);
    }

    mod proptest_spectrum {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Magnitudes lie in [0, 1] and the largest is exactly 1.
            #[test]
            fn normalized_to_unit_peak(signal in proptest::collection::vec(-100.0f64..100.0, 1..200)) {
                let windowed_energy: f64 = signal
                    .iter()
                    .zip(hann_window(signal.len()))
                    .map(|(x, w)| (x * w).abs())
                    .sum();
                prop_assume!(windowed_energy > 1e-6);

                let spec = magnitude_spectrum(&signal, 40.0).unwrap();
                prop_assert!(spec.magnitudes.iter().all(|m| (0.0..=1.0).contains(m)));
                let max = spec.magnitudes.iter().copied().fold(0.0, f64::max);
                prop_assert_eq!(max, 1.0);
            }

            /// A reference whose window holds no bin comes back unchanged.
            #[test]
            fn empty_window_yields_reference(
                magnitudes in proptest::collection::vec(0.0f64..1.0, 1..64),
                reference in -100.0f64..100.0,
                bandwidth in 0.0f64..2.0,
            ) {
                let frequencies: Vec<f64> = (0..magnitudes.len()).map(|i| i as f64 * 0.625).collect();
                let (low, high) = (reference - bandwidth / 2.0, reference + bandwidth / 2.0);
                prop_assume!(!frequencies.iter().any(|&f| f >= low && f <= high));

                let spec = spectrum(frequencies, magnitudes);
                prop_assert_eq!(dominant_frequency(&spec, Some(reference), bandwidth), reference);
            }
        }
    }
}
