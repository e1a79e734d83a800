//! Spectral shape descriptors
//!
//! Per-frame centroid, bandwidth, rolloff and flatness, plus the
//! [`SpectralProfile`] summary the orchestrator computes once per buffer.

use super::hpss;
use super::stats::mean;
use super::stft::Stft;
use super::EPSILON;
use serde::Serialize;

/// Fraction of spectral energy below the rolloff frequency
pub const ROLLOFF_PERCENT: f64 = 0.85;

/// Buffer-level spectral summary (means over 2048/512 STFT frames)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SpectralProfile {
    /// Mean spectral centroid (Hz)
    pub centroid_hz: f64,
    /// Mean spectral bandwidth around the centroid (Hz)
    pub bandwidth_hz: f64,
    /// Mean 85% rolloff frequency (Hz)
    pub rolloff_hz: f64,
    /// Mean spectral flatness (1.0 = white noise, 0.0 = pure tone)
    pub flatness: f64,
    /// Harmonic share of total energy from the HPSS split
    pub harmonic_ratio: f64,
}

/// Centroid of one magnitude frame
pub fn frame_centroid(frame: &[f64], freqs: &[f64]) -> f64 {
    let total: f64 = frame.iter().sum();
    let weighted: f64 = frame.iter().zip(freqs).map(|(&m, &f)| m * f).sum();
    weighted / (total + EPSILON)
}

/// Second-order spectral bandwidth of one magnitude frame
pub fn frame_bandwidth(frame: &[f64], freqs: &[f64]) -> f64 {
    let total: f64 = frame.iter().sum::<f64>() + EPSILON;
    let centroid = frame_centroid(frame, freqs);
    frame
        .iter()
        .zip(freqs)
        .map(|(&m, &f)| (m / total) * (f - centroid) * (f - centroid))
        .sum::<f64>()
        .sqrt()
}

/// Lowest frequency below which `ROLLOFF_PERCENT` of the frame's magnitude lies
pub fn frame_rolloff(frame: &[f64], freqs: &[f64]) -> f64 {
    let total: f64 = frame.iter().sum();
    if total <= EPSILON {
        return 0.0;
    }
    let target = ROLLOFF_PERCENT * total;
    let mut cumulative = 0.0;
    for (&m, &f) in frame.iter().zip(freqs) {
        cumulative += m;
        if cumulative >= target {
            return f;
        }
    }
    freqs.last().copied().unwrap_or(0.0)
}

/// Calculate spectral flatness (Wiener entropy) of one magnitude frame
///
/// Computed on the power spectrum; returns 1.0 for white noise and close to
/// 0.0 for a pure tone. Silence is flat by this definition (all bins hit the
/// floor), which is why callers never treat flatness alone as evidence.
pub fn frame_flatness(frame: &[f64]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let n = frame.len() as f64;
    let powers = frame.iter().map(|&m| (m * m).max(EPSILON));
    let log_sum: f64 = powers.clone().map(f64::ln).sum();
    let geo_mean = (log_sum / n).exp();
    let arith_mean: f64 = powers.sum::<f64>() / n;
    geo_mean / arith_mean
}

/// Bandwidth time series (one value per frame)
pub fn bandwidth_series(stft: &Stft) -> Vec<f64> {
    let freqs = stft.frequencies();
    stft.magnitudes
        .iter()
        .map(|frame| frame_bandwidth(frame, &freqs))
        .collect()
}

/// Mean rolloff over all frames
pub fn mean_rolloff(stft: &Stft) -> f64 {
    let freqs = stft.frequencies();
    let values: Vec<f64> = stft
        .magnitudes
        .iter()
        .map(|frame| frame_rolloff(frame, &freqs))
        .collect();
    mean(&values)
}

/// Mean flatness over all frames
pub fn mean_flatness(stft: &Stft) -> f64 {
    let values: Vec<f64> = stft.magnitudes.iter().map(|f| frame_flatness(f)).collect();
    mean(&values)
}

/// Summarize an STFT into a [`SpectralProfile`]
pub fn compute_profile(stft: &Stft) -> SpectralProfile {
    let freqs = stft.frequencies();
    let centroids: Vec<f64> = stft
        .magnitudes
        .iter()
        .map(|frame| frame_centroid(frame, &freqs))
        .collect();

    SpectralProfile {
        centroid_hz: mean(&centroids),
        bandwidth_hz: mean(&bandwidth_series(stft)),
        rolloff_hz: mean_rolloff(stft),
        flatness: mean_flatness(stft),
        harmonic_ratio: hpss::harmonic_ratio(&stft.magnitudes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // SPECTRAL FLATNESS TESTS
    // ==========================================================================
    //
    // Flatness = geometric_mean(power) / arithmetic_mean(power)
    //   1.0 = white noise (equal energy in every bin)
    //   ~0  = pure tone (energy in a single bin)
    // ==========================================================================

    #[test]
    fn test_flatness_uniform() {
        assert!((frame_flatness(&[1.0; 8]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_flatness_spike() {
        let mut frame = vec![0.001; 64];
        frame[10] = 10.0;
        assert!(frame_flatness(&frame) < 0.01);
    }

    #[test]
    fn test_flatness_empty() {
        assert_eq!(frame_flatness(&[]), 0.0);
    }

    // ==========================================================================
    // CENTROID / BANDWIDTH / ROLLOFF TESTS
    // ==========================================================================

    #[test]
    fn test_centroid_single_bin() {
        let freqs = [0.0, 100.0, 200.0, 300.0];
        let frame = [0.0, 0.0, 1.0, 0.0];
        assert!((frame_centroid(&frame, &freqs) - 200.0).abs() < 1e-6);
        assert!(frame_bandwidth(&frame, &freqs) < 1e-3);
    }

    #[test]
    fn test_centroid_symmetric_pair() {
        let freqs = [0.0, 100.0, 200.0, 300.0];
        let frame = [0.0, 1.0, 0.0, 1.0];
        assert!((frame_centroid(&frame, &freqs) - 200.0).abs() < 1e-6);
        assert!((frame_bandwidth(&frame, &freqs) - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_rolloff() {
        let freqs = [0.0, 100.0, 200.0, 300.0];
        let frame = [1.0, 1.0, 1.0, 1.0];
        // 85% of 4.0 = 3.4 is reached at the 4th bin
        assert_eq!(frame_rolloff(&frame, &freqs), 300.0);
        assert_eq!(frame_rolloff(&[0.0; 4], &freqs), 0.0);
    }

    #[test]
    fn test_profile_of_sine() {
        let samples: Vec<f64> = (0..22050)
            .map(|i| (2.0 * std::f64::consts::PI * 1000.0 * i as f64 / 22050.0).sin())
            .collect();
        let stft = Stft::compute(&samples, 22050, 2048, 512);
        let profile = compute_profile(&stft);
        assert!((profile.centroid_hz - 1000.0).abs() < 50.0, "{:?}", profile);
        assert!(profile.flatness < 0.1);
        assert!(profile.harmonic_ratio > 0.5);
    }
}
