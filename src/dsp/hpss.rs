//! Harmonic/percussive separation by median filtering
//!
//! Harmonic content is smooth along time, percussive content is smooth along
//! frequency. Median-filtering the magnitude spectrogram in each direction
//! and turning the two estimates into Wiener-style soft masks splits the
//! energy between the two. Only the energy split is needed downstream.

use super::EPSILON;

/// Median filter length in frames / bins
pub const KERNEL_SIZE: usize = 17;

/// Harmonic and percussive magnitude spectrograms, `[frame][bin]`
pub struct Separation {
    pub harmonic: Vec<Vec<f64>>,
    pub percussive: Vec<Vec<f64>>,
}

fn median_of(window: &mut [f64]) -> f64 {
    let mid = window.len() / 2;
    let (_, median, _) = window.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *median
}

/// Split a magnitude spectrogram with soft masks (power 2)
pub fn separate(magnitudes: &[Vec<f64>], kernel: usize) -> Separation {
    let num_frames = magnitudes.len();
    let num_bins = magnitudes.first().map(|f| f.len()).unwrap_or(0);
    let half = kernel.max(1) / 2;
    let mut scratch = Vec::with_capacity(kernel.max(1));

    // Median across time for each bin
    let mut harmonic_med = vec![vec![0.0; num_bins]; num_frames];
    for bin in 0..num_bins {
        for t in 0..num_frames {
            let lo = t.saturating_sub(half);
            let hi = (t + half + 1).min(num_frames);
            scratch.clear();
            scratch.extend((lo..hi).map(|i| magnitudes[i][bin]));
            harmonic_med[t][bin] = median_of(&mut scratch);
        }
    }

    // Median across frequency for each frame
    let mut percussive_med = vec![vec![0.0; num_bins]; num_frames];
    for t in 0..num_frames {
        for bin in 0..num_bins {
            let lo = bin.saturating_sub(half);
            let hi = (bin + half + 1).min(num_bins);
            scratch.clear();
            scratch.extend_from_slice(&magnitudes[t][lo..hi]);
            percussive_med[t][bin] = median_of(&mut scratch);
        }
    }

    let mut harmonic = vec![vec![0.0; num_bins]; num_frames];
    let mut percussive = vec![vec![0.0; num_bins]; num_frames];
    for t in 0..num_frames {
        for bin in 0..num_bins {
            let h = harmonic_med[t][bin] * harmonic_med[t][bin];
            let p = percussive_med[t][bin] * percussive_med[t][bin];
            let total = h + p + EPSILON;
            let m = magnitudes[t][bin];
            harmonic[t][bin] = m * h / total;
            percussive[t][bin] = m * p / total;
        }
    }

    Separation {
        harmonic,
        percussive,
    }
}

fn energy(spec: &[Vec<f64>]) -> f64 {
    spec.iter().flat_map(|f| f.iter()).map(|&m| m * m).sum()
}

/// Harmonic energy / (harmonic + percussive energy)
pub fn harmonic_ratio(magnitudes: &[Vec<f64>]) -> f64 {
    if magnitudes.is_empty() {
        return 0.0;
    }
    let split = separate(magnitudes, KERNEL_SIZE);
    let h = energy(&split.harmonic);
    let p = energy(&split.percussive);
    h / (h + p + EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steady_tone_is_harmonic() {
        // One bin lit in every frame: a horizontal line
        let mut spec = vec![vec![0.0; 64]; 40];
        for frame in spec.iter_mut() {
            frame[20] = 1.0;
        }
        assert!(harmonic_ratio(&spec) > 0.99);
    }

    #[test]
    fn test_click_is_percussive() {
        // Every bin lit in a single frame: a vertical line
        let mut spec = vec![vec![0.0; 64]; 40];
        spec[20] = vec![1.0; 64];
        assert!(harmonic_ratio(&spec) < 0.01);
    }

    #[test]
    fn test_silence_is_zero() {
        let spec = vec![vec![0.0; 16]; 10];
        assert_eq!(harmonic_ratio(&spec), 0.0);
        assert_eq!(harmonic_ratio(&[]), 0.0);
    }

    #[test]
    fn test_masks_conserve_magnitude() {
        let spec = vec![vec![0.5, 1.0, 0.25]; 5];
        let split = separate(&spec, KERNEL_SIZE);
        for t in 0..5 {
            for b in 0..3 {
                let sum = split.harmonic[t][b] + split.percussive[t][b];
                assert!(sum <= spec[t][b] + 1e-12);
            }
        }
    }
}
