//! Noise gate
//!
//! Natural pauses fade in and out over several frames and keep a little
//! room noise. A gate snaps between sound and digital silence: the level
//! crosses the silence threshold with a jump of more than 15 dB in a single
//! frame, and the silent stretches sit at a flat, very deep floor.

use super::{EffectKind, EffectResult, MAX_CONFIDENCE};
use crate::analyzer::AnalysisContext;
use crate::dsp::envelope::{rms_envelope, to_db_envelope};
use crate::dsp::stats::{mean, round_to, variance};
use crate::error::DetectorFailure;

const FRAME: usize = 1024;
const HOP: usize = 256;
/// Frames more than this far below the loudest frame are silent
const SILENCE_WINDOW_DB: f64 = 40.0;
/// Level change across a boundary frame that counts as a sharp edge
const SHARP_JUMP_DB: f64 = 15.0;
const MIN_SHARP: usize = 3;
const MIN_SILENT_FRAMES: usize = 10;
const FLAT_FLOOR_VARIANCE: f64 = 1.0;
const DEEP_FLOOR_DB: f64 = -60.0;

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<EffectResult, DetectorFailure> {
    let mut result = EffectResult::new(EffectKind::NoiseGate);

    let rms_db = to_db_envelope(&rms_envelope(ctx.samples(), FRAME, HOP));
    let loudest = rms_db.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let threshold = loudest - SILENCE_WINDOW_DB;
    let silent: Vec<bool> = rms_db.iter().map(|&v| v < threshold).collect();

    let mut total = 0usize;
    let mut sharp = 0usize;
    for idx in 0..silent.len().saturating_sub(1) {
        if silent[idx] == silent[idx + 1] {
            continue;
        }
        total += 1;
        if idx == 0 {
            continue;
        }
        // Onsets rise, offsets fall
        let change = if silent[idx] {
            rms_db[idx + 1] - rms_db[idx]
        } else {
            rms_db[idx] - rms_db[idx + 1]
        };
        if change > SHARP_JUMP_DB {
            sharp += 1;
        }
    }

    result.param("total_transitions", total);
    result.param("sharp_transitions", sharp);

    if total > 0 {
        let ratio = sharp as f64 / total as f64;
        result.param("sharp_ratio", round_to(ratio, 3));
        if ratio > 0.5 && sharp > MIN_SHARP {
            result.confidence = (0.3 + ratio * 0.4).min(0.9);
            result.evidence(format!(
                "{}/{} transitions are unnaturally sharp (>15dB/frame)",
                sharp, total
            ));
        } else if ratio > 0.2 {
            result.confidence = 0.2;
            result.evidence(format!("Some sharp transitions: {:.0}%", ratio * 100.0));
        }
    }

    let floor: Vec<f64> = rms_db
        .iter()
        .zip(&silent)
        .filter(|(_, &s)| s)
        .map(|(&v, _)| v)
        .collect();
    if floor.len() > MIN_SILENT_FRAMES {
        let floor_variance = variance(&floor);
        result.param("noise_floor_variance_db2", round_to(floor_variance, 2));
        if floor_variance < FLAT_FLOOR_VARIANCE && mean(&floor) < DEEP_FLOOR_DB {
            result.add(0.2);
            result.evidence("Very uniform/deep silence floor (digital noise gate)");
        }
    }

    result.confidence = result.confidence.min(MAX_CONFIDENCE);
    if result.evidence.is_empty() {
        result.evidence("No noise gate indicators found");
    }
    Ok(result.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioBuffer;
    use crate::backends::Capabilities;
    use crate::detectors::test_signals::{noise, sine};
    use crate::detectors::ParamValue;

    fn run(samples: Vec<f64>) -> EffectResult {
        let buffer = AudioBuffer::new(samples, 22050);
        let caps = Capabilities::baseline_only();
        detect(&AnalysisContext::new(&buffer, &caps)).unwrap()
    }

    /// Tone bursts separated by digital silence, every edge on a hop boundary
    fn gated_tone(bursts: usize) -> Vec<f64> {
        let mut samples = Vec::new();
        for _ in 0..bursts {
            samples.extend(std::iter::repeat(0.0).take(4096));
            samples.extend(sine(220.0, 22050, 6656.0 / 22050.0, 0.5));
        }
        samples.extend(std::iter::repeat(0.0).take(4096));
        samples
    }

    #[test]
    fn test_gated_bursts() {
        let result = run(gated_tone(4));
        assert_eq!(result.params.get("total_transitions"), Some(&ParamValue::Integer(8)));
        assert_eq!(result.params.get("sharp_transitions"), Some(&ParamValue::Integer(8)));
        assert!((result.confidence - 0.9).abs() < 1e-9, "{}", result.confidence);
    }

    #[test]
    fn test_continuous_tone() {
        let result = run(sine(220.0, 22050, 2.0, 0.5));
        assert_eq!(result.params.get("total_transitions"), Some(&ParamValue::Integer(0)));
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.evidence, vec!["No noise gate indicators found"]);
    }

    #[test]
    fn test_fades_are_not_sharp() {
        // One-second linear fade in and out over a noise bed
        let bed = noise(66150, 0.001, 4);
        let tone = sine(220.0, 22050, 3.0, 0.5);
        let samples: Vec<f64> = tone
            .iter()
            .zip(&bed)
            .enumerate()
            .map(|(i, (t, n))| {
                let secs = i as f64 / 22050.0;
                let gain = secs.min(3.0 - secs).min(1.0);
                t * gain + n
            })
            .collect();
        let result = run(samples);
        assert_eq!(result.params.get("sharp_transitions"), Some(&ParamValue::Integer(0)));
        assert!(result.confidence < 0.2);
    }
}
