//! RMS energy envelopes

use super::EPSILON;

/// Calculate RMS of a slice
pub fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&x| x * x).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// Framed RMS envelope
///
/// Frames start at sample 0 and advance by `hop`; only full frames are used.
/// A signal shorter than one frame yields a single value over the whole
/// signal so short clips still have an envelope.
pub fn rms_envelope(samples: &[f64], frame: usize, hop: usize) -> Vec<f64> {
    if samples.is_empty() || frame == 0 || hop == 0 {
        return Vec::new();
    }
    if samples.len() <= frame {
        return vec![rms(samples)];
    }
    let num_frames = (samples.len() - frame) / hop + 1;
    (0..num_frames)
        .map(|i| {
            let start = i * hop;
            rms(&samples[start..start + frame])
        })
        .collect()
}

/// Envelope in dB using `20 * log10(x + 1e-10)`
pub fn to_db_envelope(envelope: &[f64]) -> Vec<f64> {
    envelope.iter().map(|&v| 20.0 * (v + EPSILON).log10()).collect()
}

/// Frames per second for a given hop
pub fn frames_per_second(sample_rate: u32, hop: usize) -> f64 {
    sample_rate as f64 / hop as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // RMS (Root Mean Square) TESTS
    // ==========================================================================
    //
    // RMS = sqrt(mean(samples²)). A sine wave has RMS = peak / √2.
    // ==========================================================================

    #[test]
    fn test_rms_constant() {
        assert!((rms(&[0.5, 0.5, 0.5, 0.5]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rms_symmetric() {
        assert!((rms(&[1.0, -1.0, 1.0, -1.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rms_empty() {
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_sine() {
        let sine: Vec<f64> = (0..22050)
            .map(|i| (2.0 * std::f64::consts::PI * 441.0 * i as f64 / 22050.0).sin())
            .collect();
        assert!((rms(&sine) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-3);
    }

    #[test]
    fn test_envelope_frame_count() {
        let samples = vec![0.1; 4096];
        let env = rms_envelope(&samples, 2048, 512);
        assert_eq!(env.len(), 5);
        assert!(env.iter().all(|&v| (v - 0.1).abs() < 1e-12));
    }

    #[test]
    fn test_envelope_short_signal() {
        let env = rms_envelope(&[0.3, -0.3], 2048, 512);
        assert_eq!(env.len(), 1);
        assert!((env[0] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_db_envelope_silence_is_finite() {
        let db = to_db_envelope(&[0.0, 1.0]);
        assert!((db[0] + 200.0).abs() < 1e-9);
        assert!(db[1].abs() < 1e-6);
    }
}
