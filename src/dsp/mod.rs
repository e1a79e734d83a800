//! Spectral primitives
//!
//! Pure functions over a sample slice: short-time Fourier transform, RMS
//! envelopes, spectral shape descriptors, harmonic/percussive separation,
//! MFCCs, peak picking, resampling and the baseline pitch tracker. Nothing in
//! here keeps state between calls.
//!
//! # Frame Sizes
//!
//! ```text
//! Use                          | Frame | Hop
//! -----------------------------|-------|------
//! Energy / shape features      | 2048  | 512
//! Harmonic and THD work        | 4096  | 1024
//! Noise gate transitions       | 1024  | 256
//! Reverb fallback chunks       | 512   | 128
//! ```
//!
//! # Silence
//!
//! Every ratio adds [`EPSILON`] to its denominator and every dB conversion is
//! floored, so a buffer of digital silence produces finite (if meaningless)
//! numbers rather than NaN or a panic.

pub mod correlation;
pub mod envelope;
pub mod features;
pub mod hpss;
pub mod mfcc;
pub mod peaks;
pub mod pitch;
pub mod resample;
pub mod stats;
pub mod stft;

pub use envelope::{rms, rms_envelope, to_db_envelope};
pub use features::{compute_profile, SpectralProfile};
pub use resample::resample;
pub use stft::Stft;

/// Denominator guard used throughout the crate
pub const EPSILON: f64 = 1e-10;

/// Hanning window function
pub fn hanning_window(size: usize) -> Vec<f64> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (size - 1) as f64).cos())
        })
        .collect()
}

/// Hamming window function
pub fn hamming_window(size: usize) -> Vec<f64> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| 0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / (size - 1) as f64).cos())
        .collect()
}

/// Convert a linear amplitude ratio to dB, flooring at 1e-10 (-200 dB)
pub fn amplitude_to_db(value: f64) -> f64 {
    20.0 * value.max(EPSILON).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // WINDOW FUNCTION TESTS
    // ==========================================================================
    //
    // Hann: w(n) = 0.5 * (1 - cos(2πn/(N-1)))   - zero at both edges
    // Hamming: w(n) = 0.54 - 0.46 * cos(2πn/(N-1)) - 0.08 at both edges
    // ==========================================================================

    #[test]
    fn test_hanning_window_edges_and_center() {
        let window = hanning_window(101);
        assert!(window[0] < 1e-12);
        assert!(window[100] < 1e-12);
        assert!((window[50] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_hamming_window_edges() {
        let window = hamming_window(64);
        assert!((window[0] - 0.08).abs() < 1e-9);
        assert!((window[63] - 0.08).abs() < 1e-9);
    }

    #[test]
    fn test_single_point_windows() {
        assert_eq!(hanning_window(1), vec![1.0]);
        assert_eq!(hamming_window(1), vec![1.0]);
    }

    // ==========================================================================
    // DECIBEL CONVERSION TESTS
    // ==========================================================================

    #[test]
    fn test_amplitude_to_db() {
        assert!(amplitude_to_db(1.0).abs() < 1e-12);
        assert!((amplitude_to_db(0.1) + 20.0).abs() < 1e-9);
        assert_eq!(amplitude_to_db(0.0), -200.0);
        assert_eq!(amplitude_to_db(-3.0), -200.0);
    }
}
