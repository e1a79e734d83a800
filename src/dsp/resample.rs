//! Sample rate conversion
//!
//! Band-limited resampling through rubato's FFT resampler. Content above the
//! target Nyquist is filtered out instead of folding back into the bands the
//! detectors measure.

use crate::error::{AnalysisError, Result};
use rubato::{FftFixedInOut, Resampler};

/// Requested input chunk; rubato rounds it to a multiple of the rate ratio
const CHUNK_SIZE: usize = 1024;

/// Resample mono samples from `from_rate` to `to_rate`
///
/// The output is aligned with the input (the resampler delay is trimmed) and
/// holds `len * to_rate / from_rate` samples, rounded.
pub fn resample(samples: &[f64], from_rate: u32, to_rate: u32) -> Result<Vec<f64>> {
    if from_rate == 0 || to_rate == 0 {
        return Err(AnalysisError::invalid_input(format!(
            "cannot resample from {} Hz to {} Hz",
            from_rate, to_rate
        )));
    }
    if samples.is_empty() || from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedInOut::<f64>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, 1)
            .map_err(|e| AnalysisError::Resample(e.to_string()))?;

    let delay = resampler.output_delay();
    let expected =
        (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let mut output = Vec::with_capacity(delay + expected + resampler.output_frames_max());

    // Keep feeding (zero padding past the end) until the delayed tail is out
    let mut pos = 0;
    while output.len() < delay + expected {
        let needed = resampler.input_frames_next();
        let mut chunk = Vec::with_capacity(needed);
        if pos < samples.len() {
            chunk.extend_from_slice(&samples[pos..(pos + needed).min(samples.len())]);
        }
        chunk.resize(needed, 0.0);

        let input = vec![chunk];
        let resampled = resampler
            .process(&input, None)
            .map_err(|e| AnalysisError::Resample(e.to_string()))?;
        match resampled.into_iter().next() {
            Some(channel) if !channel.is_empty() => output.extend(channel),
            _ => return Err(AnalysisError::Resample("resampler produced no output".into())),
        }
        pos += needed;
    }

    output.drain(..delay);
    output.truncate(expected);
    log::trace!(
        "Resampled {} samples at {} Hz to {} at {} Hz",
        samples.len(),
        from_rate,
        output.len(),
        to_rate
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, sample_rate: u32, len: usize, amp: f64) -> Vec<f64> {
        (0..len)
            .map(|i| amp * (2.0 * PI * freq * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    /// Amplitude of `freq` in `samples` by projection onto a complex exponential
    fn amplitude_at(samples: &[f64], freq: f64, sample_rate: u32) -> f64 {
        let (mut re, mut im) = (0.0, 0.0);
        for (i, &s) in samples.iter().enumerate() {
            let phase = 2.0 * PI * freq * i as f64 / sample_rate as f64;
            re += s * phase.cos();
            im -= s * phase.sin();
        }
        2.0 * (re * re + im * im).sqrt() / samples.len() as f64
    }

    // ==========================================================================
    // ANTI-ALIASING TESTS
    // ==========================================================================
    //
    // 15 kHz at 44.1 kHz lies above the 11.025 kHz Nyquist of 22.05 kHz. A
    // naive resampler folds it to 22050 - 15000 = 7050 Hz at full amplitude.
    // The 13230-sample window holds whole periods of both 7050 Hz and 1 kHz.
    // ==========================================================================

    const WINDOW: std::ops::Range<usize> = 4000..17230;

    #[test]
    fn test_tone_above_nyquist_is_suppressed() {
        let input = sine(15000.0, 44100, 44100, 0.5);
        let out = resample(&input, 44100, 22050).unwrap();
        let alias = amplitude_at(&out[WINDOW], 7050.0, 22050);
        assert!(alias < 0.01, "aliased amplitude {}", alias);
    }

    #[test]
    fn test_passband_tone_survives() {
        let input = sine(1000.0, 44100, 44100, 0.5);
        let out = resample(&input, 44100, 22050).unwrap();
        let amp = amplitude_at(&out[WINDOW], 1000.0, 22050);
        assert!((amp - 0.5).abs() < 0.02, "1 kHz amplitude {}", amp);
    }

    // ==========================================================================
    // LENGTH AND EDGE CASES
    // ==========================================================================

    #[test]
    fn test_output_length() {
        assert_eq!(resample(&vec![0.0; 44100], 44100, 22050).unwrap().len(), 22050);
        assert_eq!(resample(&vec![0.0; 48000], 48000, 16000).unwrap().len(), 16000);
        assert_eq!(resample(&vec![0.0; 1000], 44100, 16000).unwrap().len(), 363);
    }

    #[test]
    fn test_constant_interior_preserved() {
        let out = resample(&vec![0.25; 44100], 44100, 16000).unwrap();
        for &v in &out[2000..14000] {
            assert!((v - 0.25).abs() < 0.01, "{}", v);
        }
    }

    #[test]
    fn test_same_rate_and_empty() {
        assert_eq!(resample(&[1.0, 2.0], 22050, 22050).unwrap(), vec![1.0, 2.0]);
        assert!(resample(&[], 44100, 22050).unwrap().is_empty());
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(matches!(
            resample(&[1.0, 2.0], 0, 22050),
            Err(AnalysisError::InvalidInput(_))
        ));
    }
}
