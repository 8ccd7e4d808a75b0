//! Butterworth bandpass design and zero-phase filtering.
//!
//! The filter is designed the classic way: analog Butterworth prototype,
//! lowpass-to-bandpass transform around prewarped band edges, then the
//! bilinear transform. The result is kept as cascaded second-order sections
//! (biquads), which stay numerically stable at order 8 where a single
//! transfer-function polynomial would not.
//!
//! [`SosFilter::filtfilt`] runs the cascade forward and backward so the
//! output has no phase delay. Edges are padded by odd reflection and each
//! section starts from its steady-state response to the first padded value,
//! which keeps start-up transients out of the returned window.

use std::f64::consts::PI;

use rustfft::num_complex::Complex64;

use super::ProcessingError;

/// One second-order section in direct form II transposed.
///
/// `a[0]` is always 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    /// Internal state after an infinitely long run of unit input.
    fn steady_state(&self) -> [f64; 2] {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let rhs0 = b1 - a1 * b0;
        let rhs1 = b2 - a2 * b0;
        let z0 = (rhs0 + rhs1) / (1.0 + a1 + a2);
        [z0, rhs1 - a2 * z0]
    }

    fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }

    fn response(&self, z_inv: Complex64) -> Complex64 {
        let z_inv2 = z_inv * z_inv;
        let num = self.b[0] + z_inv * self.b[1] + z_inv2 * self.b[2];
        let den = self.a[0] + z_inv * self.a[1] + z_inv2 * self.a[2];
        num / den
    }
}

/// Cascade of second-order sections.
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    sections: Vec<Biquad>,
}

impl SosFilter {
    pub fn new(sections: Vec<Biquad>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Edge padding used by [`filtfilt`](Self::filtfilt): three times the
    /// number of taps of the equivalent transfer function.
    pub fn pad_len(&self) -> usize {
        let taps = 2 * self.sections.len() + 1;
        let trailing_zero_b = self.sections.iter().filter(|s| s.b[2] == 0.0).count();
        let trailing_zero_a = self.sections.iter().filter(|s| s.a[2] == 0.0).count();
        3 * (taps - trailing_zero_b.min(trailing_zero_a))
    }

    /// Complex gain at `freq_hz` for a filter running at `sample_rate`.
    pub fn frequency_response(&self, freq_hz: f64, sample_rate: f64) -> Complex64 {
        let omega = 2.0 * PI * freq_hz / sample_rate;
        let z_inv = Complex64::from_polar(1.0, -omega);
        self.sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, s| acc * s.response(z_inv))
    }

    /// Per-section initial state for a step of height 1 at the input.
    fn initial_state(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|s| {
                let [z0, z1] = s.steady_state();
                let zi = [z0 * scale, z1 * scale];
                scale *= s.dc_gain();
                zi
            })
            .collect()
    }

    /// Causal filtering with the given per-section state, scaled by `x0`.
    fn run(&self, input: &[f64], zi: &[[f64; 2]], x0: f64) -> Vec<f64> {
        let mut state: Vec<[f64; 2]> = zi.iter().map(|z| [z[0] * x0, z[1] * x0]).collect();
        input
            .iter()
            .map(|&x| {
                self.sections.iter().zip(state.iter_mut()).fold(x, |x, (s, z)| {
                    let y = s.b[0] * x + z[0];
                    z[0] = s.b[1] * x - s.a[1] * y + z[1];
                    z[1] = s.b[2] * x - s.a[2] * y;
                    y
                })
            })
            .collect()
    }

    /// Zero-phase forward-backward filtering.
    pub fn filtfilt(&self, input: &[f64]) -> Vec<f64> {
        if input.is_empty() {
            return Vec::new();
        }
        let edge = self.pad_len().min(input.len() - 1);
        let extended = odd_extend(input, edge);
        let zi = self.initial_state();

        let mut forward = self.run(&extended, &zi, extended[0]);
        forward.reverse();
        let mut backward = self.run(&forward, &zi, forward[0]);
        backward.reverse();

        backward[edge..edge + input.len()].to_vec()
    }
}

/// Pad both ends with `n` samples reflected through the end points.
fn odd_extend(x: &[f64], n: usize) -> Vec<f64> {
    let first = x[0];
    let last = x[x.len() - 1];
    let mut out = Vec::with_capacity(x.len() + 2 * n);
    out.extend((1..=n).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=n).map(|i| 2.0 * last - x[x.len() - 1 - i]));
    out
}

/// Design a Butterworth bandpass of prototype order `order` (the resulting
/// digital filter has order `2 * order`) as `order` biquads.
pub fn butterworth_bandpass(
    order: usize,
    low_hz: f64,
    high_hz: f64,
    sample_rate: f64,
) -> Result<SosFilter, ProcessingError> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(ProcessingError::InvalidSamplingRate(sample_rate));
    }
    if order == 0 {
        return Err(ProcessingError::InvalidOrder);
    }
    let nyquist = sample_rate / 2.0;
    if !(low_hz > 0.0 && low_hz < high_hz && high_hz < nyquist) {
        return Err(ProcessingError::InvalidBand {
            low: low_hz,
            high: high_hz,
            nyquist,
        });
    }

    let fs2 = 2.0 * sample_rate;
    let warp = |f: f64| fs2 * (PI * f / sample_rate).tan();
    let w_low = warp(low_hz);
    let w_high = warp(high_hz);
    let bandwidth = w_high - w_low;
    let center_sq = Complex64::new(w_low * w_high, 0.0);

    // Analog prototype poles on the left half of the unit circle.
    let n = order as f64;
    let prototype = (0..order).map(|k| {
        let m = 2.0 * k as f64 - n + 1.0;
        -Complex64::from_polar(1.0, PI * m / (2.0 * n))
    });

    // Lowpass -> bandpass: each prototype pole splits into two.
    let analog: Vec<Complex64> = prototype
        .flat_map(|p| {
            let scaled = p * (bandwidth / 2.0);
            let offset = (scaled * scaled - center_sq).sqrt();
            [scaled + offset, scaled - offset]
        })
        .collect();

    // Bilinear transform. The analog zeros (`order` of them at s = 0) map to
    // z = 1; the excess poles add `order` zeros at z = -1.
    let digital: Vec<Complex64> = analog.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();
    let pole_product = analog
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, &p| acc * (fs2 - p));
    let gain = (Complex64::new((bandwidth * fs2).powi(order as i32), 0.0) / pole_product).re;

    let mut sections = pair_poles(&digital);
    if let Some(first) = sections.first_mut() {
        for b in &mut first.b {
            *b *= gain;
        }
    }
    Ok(SosFilter::new(sections))
}

/// Group digital poles into biquads, each with one zero at z = 1 and one at z = -1.
fn pair_poles(poles: &[Complex64]) -> Vec<Biquad> {
    let tolerance = 1e-10;
    let numerator = [1.0, 0.0, -1.0];

    let mut sections: Vec<Biquad> = poles
        .iter()
        .filter(|p| p.im > tolerance)
        .map(|p| Biquad {
            b: numerator,
            a: [1.0, -2.0 * p.re, p.norm_sqr()],
        })
        .collect();

    let mut real: Vec<f64> = poles
        .iter()
        .filter(|p| p.im.abs() <= tolerance)
        .map(|p| p.re)
        .collect();
    real.sort_by(f64::total_cmp);
    sections.extend(real.chunks(2).map(|pair| match *pair {
        [r1, r2] => Biquad {
            b: numerator,
            a: [1.0, -(r1 + r2), r1 * r2],
        },
        // Unpaired real pole: first-order section with a single zero at z = 1.
        [r] => Biquad {
            b: [1.0, -1.0, 0.0],
            a: [1.0, -r, 0.0],
        },
        _ => unreachable!("chunks(2) yields one or two elements"),
    }));
    sections
}
