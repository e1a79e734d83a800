//! Mel-frequency cepstral coefficients
//!
//! Mel filterbank over the power spectrum, log compression with an 80 dB
//! dynamic range, then an orthonormal DCT-II. Uses the HTK mel scale
//! `2595 * log10(1 + f / 700)`.

use super::stats::variance;
use super::stft::Stft;
use super::EPSILON;

pub const NUM_MEL_BANDS: usize = 128;
pub const NUM_COEFFICIENTS: usize = 20;
const TOP_DB: f64 = 80.0;

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular, area-normalized mel filters: `[band][bin]`
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, num_bands: usize) -> Vec<Vec<f64>> {
    let num_bins = n_fft / 2 + 1;
    let nyquist = sample_rate as f64 / 2.0;
    let mel_max = hz_to_mel(nyquist);
    let edges: Vec<f64> = (0..num_bands + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (num_bands + 1) as f64))
        .collect();
    let bin_hz = sample_rate as f64 / n_fft as f64;

    (0..num_bands)
        .map(|band| {
            let (lo, center, hi) = (edges[band], edges[band + 1], edges[band + 2]);
            let norm = 2.0 / (hi - lo).max(EPSILON);
            (0..num_bins)
                .map(|bin| {
                    let f = bin as f64 * bin_hz;
                    let rising = (f - lo) / (center - lo).max(EPSILON);
                    let falling = (hi - f) / (hi - center).max(EPSILON);
                    rising.min(falling).max(0.0) * norm
                })
                .collect()
        })
        .collect()
}

fn dct_ortho(input: &[f64], num_coefficients: usize) -> Vec<f64> {
    let n = input.len() as f64;
    (0..num_coefficients)
        .map(|k| {
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| {
                    x * (std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n))
                        .cos()
                })
                .sum();
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            sum * scale
        })
        .collect()
}

/// MFCC matrix `[coefficient][frame]`
pub fn mfcc(stft: &Stft, num_coefficients: usize) -> Vec<Vec<f64>> {
    let filters = mel_filterbank(stft.sample_rate, stft.n_fft, NUM_MEL_BANDS);

    let mel_db: Vec<Vec<f64>> = stft
        .magnitudes
        .iter()
        .map(|frame| {
            filters
                .iter()
                .map(|filter| {
                    let energy: f64 = filter
                        .iter()
                        .zip(frame.iter())
                        .map(|(&w, &m)| w * m * m)
                        .sum();
                    10.0 * energy.max(EPSILON).log10()
                })
                .collect()
        })
        .collect();

    let global_max = mel_db
        .iter()
        .flat_map(|f| f.iter())
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let floor = global_max - TOP_DB;

    let mut coefficients = vec![Vec::with_capacity(mel_db.len()); num_coefficients];
    for frame in &mel_db {
        let clamped: Vec<f64> = frame.iter().map(|&v| v.max(floor)).collect();
        for (k, c) in dct_ortho(&clamped, num_coefficients).into_iter().enumerate() {
            coefficients[k].push(c);
        }
    }
    coefficients
}

/// Variance of each coefficient across time
pub fn temporal_variance(coefficients: &[Vec<f64>]) -> Vec<f64> {
    coefficients.iter().map(|c| variance(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_roundtrip_points() {
        assert!((hz_to_mel(700.0) - 2595.0 * 2f64.log10()).abs() < 1e-9);
        assert!((mel_to_hz(hz_to_mel(1234.0)) - 1234.0).abs() < 1e-6);
    }

    #[test]
    fn test_filterbank_shape() {
        let filters = mel_filterbank(22050, 2048, NUM_MEL_BANDS);
        assert_eq!(filters.len(), NUM_MEL_BANDS);
        assert!(filters.iter().all(|f| f.len() == 1025));
        assert!(filters.iter().flat_map(|f| f.iter()).all(|&w| w >= 0.0));
    }

    #[test]
    fn test_dct_of_constant_has_only_dc() {
        let coeffs = dct_ortho(&[1.0; 16], 4);
        assert!((coeffs[0] - 4.0).abs() < 1e-9);
        assert!(coeffs[1..].iter().all(|c| c.abs() < 1e-9));
    }

    #[test]
    fn test_stationary_signal_has_low_variance() {
        let samples: Vec<f64> = (0..22050)
            .map(|i| 0.5 * (2.0 * std::f64::consts::PI * 300.0 * i as f64 / 22050.0).sin())
            .collect();
        let stft = Stft::compute(&samples, 22050, 2048, 512);
        let coeffs = mfcc(&stft, NUM_COEFFICIENTS);
        assert_eq!(coeffs.len(), NUM_COEFFICIENTS);
        assert_eq!(coeffs[0].len(), stft.num_frames());
        let var = temporal_variance(&coeffs);
        assert!(var[1..].iter().all(|&v| v < 5.0), "{:?}", var);
    }
}
