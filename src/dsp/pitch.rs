//! Baseline F0 tracker
//!
//! Framewise normalized autocorrelation. For each 2048-sample frame the
//! autocorrelation is computed with an FFT and normalized per lag by the
//! energy of the two overlapping segments, so a perfectly periodic frame
//! scores 1.0 at its period regardless of level:
//!
//! ```text
//! r(τ) = Σ x[i]·x[i+τ] / sqrt(Σ_{i<N-τ} x[i]² · Σ_{i≥τ} x[i]²)
//! ```
//!
//! The first local maximum reaching 90% of the best correlation in the
//! 50-600 Hz lag range is taken as the period, which avoids picking the
//! octave below. Parabolic interpolation refines it to a fractional lag.

use super::correlation::Autocorrelator;
use super::envelope::rms;
use super::stats::{mean, median};
use super::EPSILON;

pub const FRAME_SIZE: usize = 2048;
pub const HOP_SIZE: usize = 512;
pub const MIN_F0_HZ: f64 = 50.0;
pub const MAX_F0_HZ: f64 = 600.0;
/// Normalized correlation a frame needs to count as voiced
pub const VOICING_THRESHOLD: f64 = 0.5;
/// Frames quieter than this are unvoiced without looking at the correlation
pub const SILENCE_DB: f64 = -60.0;
/// Voiced frames needed before a median F0 is reported
pub const MIN_VOICED_FRAMES: usize = 5;
const PEAK_FRACTION: f64 = 0.9;

/// Per-frame F0 estimates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitchContour {
    /// Frame centre times in seconds
    pub times: Vec<f64>,
    /// F0 in Hz, `None` where the frame is unvoiced
    pub f0: Vec<Option<f64>>,
    /// Voicing confidence in [0, 1] per frame
    pub confidence: Vec<f64>,
}

impl PitchContour {
    pub fn len(&self) -> usize {
        self.f0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.f0.is_empty()
    }

    /// F0 values of the voiced frames, in time order
    pub fn voiced(&self) -> Vec<f64> {
        self.f0.iter().flatten().copied().collect()
    }

    /// Median F0 over voiced frames, if there are enough of them
    pub fn median_f0(&self) -> Option<f64> {
        let voiced = self.voiced();
        if voiced.len() < MIN_VOICED_FRAMES {
            return None;
        }
        median(&voiced)
    }
}

/// Track F0 over a mono signal
pub fn track(samples: &[f64], sample_rate: u32) -> PitchContour {
    let mut contour = PitchContour::default();
    if samples.is_empty() || sample_rate == 0 {
        return contour;
    }

    let sr = sample_rate as f64;
    let lag_min = ((sr / MAX_F0_HZ).floor() as usize).max(2);
    let lag_max = ((sr / MIN_F0_HZ).ceil() as usize).min(FRAME_SIZE - 2);
    if lag_min + 2 > lag_max {
        return contour;
    }

    let num_frames = if samples.len() <= FRAME_SIZE {
        1
    } else {
        (samples.len() - FRAME_SIZE) / HOP_SIZE + 1
    };

    let mut correlator = Autocorrelator::new(FRAME_SIZE);
    let mut frame = vec![0.0; FRAME_SIZE];
    let mut cumulative = vec![0.0; FRAME_SIZE + 1];

    for i in 0..num_frames {
        let start = i * HOP_SIZE;
        for (j, slot) in frame.iter_mut().enumerate() {
            *slot = samples.get(start + j).copied().unwrap_or(0.0);
        }
        contour
            .times
            .push((start + FRAME_SIZE / 2) as f64 / sr);

        let level_db = 20.0 * (rms(&frame) + EPSILON).log10();
        if level_db < SILENCE_DB {
            contour.f0.push(None);
            contour.confidence.push(0.0);
            continue;
        }

        let dc = mean(&frame);
        frame.iter_mut().for_each(|x| *x -= dc);

        for (j, &x) in frame.iter().enumerate() {
            cumulative[j + 1] = cumulative[j] + x * x;
        }
        let acf = correlator.raw(&frame);
        let total = cumulative[FRAME_SIZE];
        let normalized = |lag: usize| -> f64 {
            let head = cumulative[FRAME_SIZE - lag];
            let tail = total - cumulative[lag];
            acf[lag] / ((head * tail).max(0.0).sqrt() + EPSILON)
        };

        // Correlation for lag_min-1 ..= lag_max+1 so every lag in range has neighbours
        let r: Vec<f64> = (lag_min - 1..=lag_max + 1).map(normalized).collect();
        let offset = lag_min - 1;
        let in_range = &r[1..r.len() - 1];
        let best = in_range.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if best < VOICING_THRESHOLD {
            contour.f0.push(None);
            contour.confidence.push(best.clamp(0.0, 1.0));
            continue;
        }

        let target = PEAK_FRACTION * best;
        let peak = (1..r.len() - 1)
            .find(|&k| r[k] >= target && r[k] >= r[k - 1] && r[k] >= r[k + 1]);

        let Some(k) = peak else {
            contour.f0.push(None);
            contour.confidence.push(best.clamp(0.0, 1.0));
            continue;
        };

        let (a, b, c) = (r[k - 1], r[k], r[k + 1]);
        let denom = a - 2.0 * b + c;
        let shift = if denom.abs() > EPSILON {
            (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
        } else {
            0.0
        };
        let period = (k + offset) as f64 + shift;
        let f0 = sr / period;

        if (MIN_F0_HZ..=MAX_F0_HZ).contains(&f0) {
            contour.f0.push(Some(f0));
        } else {
            contour.f0.push(None);
        }
        contour.confidence.push(b.clamp(0.0, 1.0));
    }

    contour
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: u32, secs: f64, amp: f64) -> Vec<f64> {
        let n = (sample_rate as f64 * secs) as usize;
        (0..n)
            .map(|i| amp * (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    // ==========================================================================
    // PITCH ACCURACY TESTS
    // ==========================================================================
    //
    // A clean sine is the easiest case for autocorrelation: correlation at the
    // period is ~1.0 and the parabolic refinement should land within a
    // fraction of a Hz.
    // ==========================================================================

    #[test]
    fn test_sine_220() {
        let contour = track(&sine(220.0, 22050, 1.0, 0.5), 22050);
        let f0 = contour.median_f0().expect("sine should be voiced");
        assert!((f0 - 220.0).abs() < 2.0, "got {} Hz", f0);
        assert!(contour.confidence.iter().all(|&c| (0.0..=1.0).contains(&c)));
    }

    #[test]
    fn test_sine_at_native_rate() {
        let contour = track(&sine(150.0, 44100, 1.0, 0.3), 44100);
        let f0 = contour.median_f0().unwrap();
        assert!((f0 - 150.0).abs() < 2.0, "got {} Hz", f0);
    }

    #[test]
    fn test_harmonic_rich_tone_tracks_fundamental() {
        let sr = 22050;
        let samples: Vec<f64> = (0..sr)
            .map(|i| {
                let t = i as f64 / sr as f64;
                (1..=5)
                    .map(|h| {
                        0.2 / h as f64 * (2.0 * std::f64::consts::PI * 180.0 * h as f64 * t).sin()
                    })
                    .sum()
            })
            .collect();
        let f0 = track(&samples, sr as u32).median_f0().unwrap();
        assert!((f0 - 180.0).abs() < 3.0, "got {} Hz", f0);
    }

    // ==========================================================================
    // UNVOICED TESTS
    // ==========================================================================

    #[test]
    fn test_silence_is_unvoiced() {
        let contour = track(&vec![0.0; 22050], 22050);
        assert!(!contour.is_empty());
        assert!(contour.voiced().is_empty());
        assert_eq!(contour.median_f0(), None);
    }

    #[test]
    fn test_noise_is_unvoiced() {
        let mut state: u32 = 12345;
        let noise: Vec<f64> = (0..22050)
            .map(|_| {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                (state >> 8) as f64 / (1u32 << 24) as f64 * 2.0 - 1.0
            })
            .collect();
        let contour = track(&noise, 22050);
        assert_eq!(contour.median_f0(), None);
    }

    #[test]
    fn test_out_of_range_tone_is_unvoiced() {
        // 1500 Hz is above the search range
        let contour = track(&sine(1500.0, 22050, 1.0, 0.5), 22050);
        assert!(contour
            .voiced()
            .iter()
            .all(|&f| (MIN_F0_HZ..=MAX_F0_HZ).contains(&f)));
    }

    #[test]
    fn test_empty_input() {
        assert!(track(&[], 22050).is_empty());
        assert!(track(&[0.1; 100], 0).is_empty());
    }

    #[test]
    fn test_median_needs_enough_frames() {
        let contour = PitchContour {
            times: vec![0.0; 4],
            f0: vec![Some(200.0); 4],
            confidence: vec![1.0; 4],
        };
        assert_eq!(contour.median_f0(), None);
    }
}
