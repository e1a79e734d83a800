//! Auto-tune / pitch correction
//!
//! Works on the F0 contour in cents relative to the first voiced frame.
//! Corrected vocals show three things a natural voice rarely does:
//!
//! - notes sit within a few cents of the semitone grid
//! - note changes happen in a single frame with flat pitch either side
//! - the intra-semitone position piles up in one histogram bin
//!
//! The baseline tracker is used on purpose: it is deterministic and always
//! present, so the same file scores the same on every installation.

use super::{EffectKind, EffectResult, MAX_CONFIDENCE};
use crate::analyzer::AnalysisContext;
use crate::dsp::stats::{mean, round_to};
use crate::dsp::EPSILON;
use crate::error::DetectorFailure;

const MIN_VOICED_FRAMES: usize = 20;
const PRECISE_CENTS: f64 = 8.0;
const STABLE_CENTS: f64 = 15.0;
const JUMP_CENTS: f64 = 50.0;
/// Neighbouring steps below this make a jump "clean"
const FLAT_CENTS: f64 = 20.0;
const CLEAN_JUMP_RATIO: f64 = 0.6;
const HISTOGRAM_BINS: usize = 20;
const HISTOGRAM_PEAK: f64 = 0.3;

fn to_cents(voiced: &[f64]) -> Vec<f64> {
    let reference = voiced[0] + EPSILON;
    voiced
        .iter()
        .map(|&f| 1200.0 * (f / reference + EPSILON).log2())
        .collect()
}

/// Largest share of frames in one of 20 five-cent bins over [0, 100)
fn histogram_peak(cents: &[f64]) -> f64 {
    let mut hist = [0usize; HISTOGRAM_BINS];
    for &c in cents {
        let position = c.rem_euclid(100.0);
        let bin = ((position / 100.0 * HISTOGRAM_BINS as f64) as usize).min(HISTOGRAM_BINS - 1);
        hist[bin] += 1;
    }
    let total: usize = hist.iter().sum();
    let peak = hist.iter().copied().max().unwrap_or(0);
    peak as f64 / (total as f64 + EPSILON)
}

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<EffectResult, DetectorFailure> {
    let mut result = EffectResult::new(EffectKind::AutotunePitchCorrection);

    let voiced = ctx.baseline_pitch().voiced();
    if voiced.len() < MIN_VOICED_FRAMES {
        result.evidence("Insufficient voiced frames for analysis");
        return Ok(result.finish());
    }

    let cents = to_cents(&voiced);

    let deviations: Vec<f64> = cents
        .iter()
        .map(|&c| (c - (c / 100.0).round() * 100.0).abs())
        .collect();
    let mean_deviation = mean(&deviations);
    result.param("mean_pitch_deviation_cents", round_to(mean_deviation, 2));

    if mean_deviation < PRECISE_CENTS {
        result.add(0.5);
        result.evidence(format!(
            "Unnaturally precise pitch: {:.1} cents mean deviation",
            mean_deviation
        ));
    } else if mean_deviation < STABLE_CENTS {
        result.add(0.25);
        result.evidence(format!(
            "Very stable pitch: {:.1} cents mean deviation",
            mean_deviation
        ));
    }

    let steps: Vec<f64> = cents.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let jump_count = steps.iter().filter(|&&d| d > JUMP_CENTS).count();
    if jump_count > 0 {
        result.param(
            "pitch_jump_ratio",
            round_to(jump_count as f64 / steps.len() as f64, 4),
        );

        let clean_jumps = (1..steps.len().saturating_sub(1))
            .filter(|&i| {
                steps[i] > JUMP_CENTS && steps[i - 1] < FLAT_CENTS && steps[i + 1] < FLAT_CENTS
            })
            .count();
        let clean_ratio = clean_jumps as f64 / jump_count as f64;
        result.param("clean_jump_ratio", round_to(clean_ratio, 3));
        if clean_ratio > CLEAN_JUMP_RATIO {
            result.add(0.25);
            result.evidence(format!(
                "Sharp pitch transitions: {:.0}% of jumps are single-frame",
                clean_ratio * 100.0
            ));
        }
    }

    let peak = histogram_peak(&cents);
    result.param("pitch_histogram_peak", round_to(peak, 3));
    if peak > HISTOGRAM_PEAK {
        result.add(0.2);
        result.evidence(format!(
            "Pitch concentrated at semitone centers ({:.0}% peak)",
            peak * 100.0
        ));
    }

    result.confidence = result.confidence.min(MAX_CONFIDENCE);
    if result.evidence.is_empty() {
        result.evidence("Pitch contour appears natural");
    }
    Ok(result.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioBuffer;
    use crate::backends::Capabilities;
    use crate::detectors::test_signals::sine;
    use crate::detectors::ParamValue;
    use std::f64::consts::PI;

    fn run(samples: Vec<f64>) -> EffectResult {
        let buffer = AudioBuffer::new(samples, 22050);
        let caps = Capabilities::baseline_only();
        detect(&AnalysisContext::new(&buffer, &caps)).unwrap()
    }

    /// Phase-continuous tone with sinusoidal vibrato of `depth_cents`
    fn vibrato(base: f64, depth_cents: f64, rate_hz: f64, secs: f64) -> Vec<f64> {
        let sr = 22050.0;
        let n = (sr * secs) as usize;
        let mut phase = 0.0;
        (0..n)
            .map(|i| {
                let t = i as f64 / sr;
                let cents = depth_cents * (2.0 * PI * rate_hz * t).sin();
                let freq = base * 2f64.powf(cents / 1200.0);
                phase += 2.0 * PI * freq / sr;
                0.5 * phase.sin()
            })
            .collect()
    }

    // ==========================================================================
    // HELPER TESTS
    // ==========================================================================

    #[test]
    fn test_cents_relative_to_first_frame() {
        let cents = to_cents(&[220.0, 440.0, 110.0]);
        assert!(cents[0].abs() < 1e-6);
        assert!((cents[1] - 1200.0).abs() < 1e-6);
        assert!((cents[2] + 1200.0).abs() < 1e-6);
    }

    #[test]
    fn test_histogram_wraps_negative_cents() {
        // -3 cents sits at 97 within its semitone: bin 19
        let peak = histogram_peak(&[-3.0, -2.0, 97.5, 10.0]);
        assert!((peak - 0.75).abs() < 1e-6);
    }

    // ==========================================================================
    // DETECTION TESTS
    // ==========================================================================

    #[test]
    fn test_held_note_is_grid_locked() {
        let result = run(sine(220.0, 22050, 3.0, 0.5));
        match result.params.get("mean_pitch_deviation_cents") {
            Some(ParamValue::Number(d)) => assert!(*d < PRECISE_CENTS, "{}", d),
            other => panic!("unexpected {:?}", other),
        }
        assert!(result.confidence >= 0.5, "{}", result.confidence);
    }

    #[test]
    fn test_wide_vibrato_is_natural() {
        let result = run(vibrato(220.0, 60.0, 5.5, 3.0));
        assert!(result.confidence < 0.2, "{:?}", result.evidence);
    }

    #[test]
    fn test_short_clip() {
        let result = run(sine(220.0, 22050, 0.3, 0.5));
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.evidence, vec!["Insufficient voiced frames for analysis"]);
    }
}
