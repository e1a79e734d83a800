//! FFT-based autocorrelation

use super::EPSILON;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Reusable autocorrelation plan for inputs up to `max_len` samples
///
/// Zero-pads to a power of two of at least `2 * max_len` so the circular
/// correlation equals the linear one for every lag.
pub struct Autocorrelator {
    size: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
}

impl Autocorrelator {
    pub fn new(max_len: usize) -> Self {
        let size = (2 * max_len.max(1)).next_power_of_two();
        let mut planner = FftPlanner::new();
        Self {
            size,
            forward: planner.plan_fft_forward(size),
            inverse: planner.plan_fft_inverse(size),
            buffer: vec![Complex::new(0.0, 0.0); size],
        }
    }

    /// Raw (unnormalized) autocorrelation for lags `0..values.len()`
    pub fn raw(&mut self, values: &[f64]) -> Vec<f64> {
        let n = values.len().min(self.size / 2);
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            *slot = Complex::new(if i < n { values[i] } else { 0.0 }, 0.0);
        }
        self.forward.process(&mut self.buffer);
        for c in self.buffer.iter_mut() {
            *c = Complex::new(c.norm_sqr(), 0.0);
        }
        self.inverse.process(&mut self.buffer);
        let scale = 1.0 / self.size as f64;
        self.buffer[..n].iter().map(|c| c.re * scale).collect()
    }
}

/// Autocorrelation normalized by the zero-lag value
pub fn autocorrelation(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let raw = Autocorrelator::new(values.len()).raw(values);
    let zero = raw[0];
    raw.iter().map(|&v| v / (zero + EPSILON)).collect()
}

/// Mean-removed, zero-lag-normalized autocorrelation
pub fn centered_autocorrelation(values: &[f64]) -> Vec<f64> {
    let m = super::stats::mean(values);
    let centered: Vec<f64> = values.iter().map(|&v| v - m).collect();
    autocorrelation(&centered)
}
