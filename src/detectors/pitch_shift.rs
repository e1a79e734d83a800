//! Pitch-shift detection from the F0 / formant relationship
//!
//! Formants follow vocal-tract length, not pitch. A quarter-wave tube model
//! estimates the tract length from F1, which implies a plausible F0 range:
//!
//! ```text
//! VTL = c / (4 · F1),  c = 34000 cm/s
//!
//! VTL      | Speaker | Expected F0
//! ---------|---------|------------
//! > 16 cm  | Adult M | 75 - 190 Hz
//! > 13 cm  | Adult F | 150 - 270 Hz
//! shorter  | Child   | 200 - 400 Hz
//! ```
//!
//! An F0 well outside that range means the pitch moved while the formants
//! stayed put, which is what PSOLA-style shifters do.

use super::{EffectKind, EffectResult, MAX_CONFIDENCE};
use crate::analyzer::AnalysisContext;
use crate::backends::BackendOutcome;
use crate::dsp::stats::round_to;
use crate::error::DetectorFailure;

const SPEED_OF_SOUND_CM: f64 = 34000.0;
const MIN_F0_HZ: f64 = 50.0;
/// F0 below `low * LOW_MARGIN` or above `high * HIGH_MARGIN` counts as shifted
const LOW_MARGIN: f64 = 0.75;
const HIGH_MARGIN: f64 = 1.25;
const BASE_CONFIDENCE: f64 = 0.5;
const PER_SEMITONE: f64 = 0.08;
const NATURAL_CONFIDENCE: f64 = 0.05;

/// Plausible F0 range (Hz) for a vocal tract with this F1
pub fn expected_f0_range(f1: f64) -> (f64, f64) {
    let vtl = SPEED_OF_SOUND_CM / (4.0 * f1);
    if vtl > 16.0 {
        (75.0, 190.0)
    } else if vtl > 13.0 {
        (150.0, 270.0)
    } else {
        (200.0, 400.0)
    }
}

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<EffectResult, DetectorFailure> {
    let mut result = EffectResult::new(EffectKind::PitchShift);

    let track = match ctx.formants() {
        BackendOutcome::Ready(track) => track,
        BackendOutcome::Unavailable(reason) => {
            result.evidence(format!(
                "formant comparison skipped: dependency unavailable ({})",
                reason
            ));
            return Ok(result.finish());
        }
        BackendOutcome::Failed(reason) => {
            result.evidence(format!("formant extraction failed: {}", reason));
            return Ok(result.finish());
        }
    };

    let f0 = match ctx.preferred_f0() {
        Some(f0) if f0 >= MIN_F0_HZ => f0,
        _ => return Ok(result.finish()),
    };
    result.param("detected_f0_hz", round_to(f0, 1));
    let tracker = match ctx.capabilities().advanced_pitch_tracker() {
        Some(t) if ctx.advanced_pitch().is_some() => t.name(),
        _ => "autocorrelation",
    };
    result.param("pitch_tracker", tracker);

    let (Some(f1), Some(f2)) = (track.median_f1(), track.median_f2()) else {
        result.evidence("Could not extract formants reliably");
        return Ok(result.finish());
    };
    result.param("F1_hz", round_to(f1, 1));
    result.param("F2_hz", round_to(f2, 1));
    if let Some(f3) = track.median_f3() {
        result.param("F3_hz", round_to(f3, 1));
    }

    let (low, high) = expected_f0_range(f1);
    result.param("expected_f0_range", vec![low, high]);

    if f0 < low * LOW_MARGIN {
        let semitones = 12.0 * (low / f0).log2();
        result.confidence = MAX_CONFIDENCE.min(BASE_CONFIDENCE + semitones * PER_SEMITONE);
        result.param("estimated_semitones", format!("-{}", round_to(semitones, 1)));
        result.evidence(format!(
            "F0 ({:.0}Hz) below expected range ({:.0}-{:.0}Hz) for detected formants",
            f0, low, high
        ));
    } else if f0 > high * HIGH_MARGIN {
        let semitones = 12.0 * (f0 / high).log2();
        result.confidence = MAX_CONFIDENCE.min(BASE_CONFIDENCE + semitones * PER_SEMITONE);
        result.param("estimated_semitones", format!("+{}", round_to(semitones, 1)));
        result.evidence(format!(
            "F0 ({:.0}Hz) above expected range ({:.0}-{:.0}Hz) for detected formants",
            f0, low, high
        ));
    } else {
        result.confidence = NATURAL_CONFIDENCE;
        result.evidence("F0-formant relationship appears natural");
    }

    Ok(result.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioBuffer;
    use crate::backends::{Capabilities, FormantExtractor, FormantTrack};
    use crate::detectors::test_signals::sine;
    use crate::detectors::ParamValue;
    use std::sync::Arc;

    /// Reports the same formants for every frame
    struct FixedFormants(f64, f64, f64);

    impl FormantExtractor for FixedFormants {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn try_extract(&self, _buffer: &AudioBuffer) -> BackendOutcome<FormantTrack> {
            BackendOutcome::Ready(FormantTrack {
                times: vec![0.0; 20],
                f1: vec![Some(self.0); 20],
                f2: vec![Some(self.1); 20],
                f3: vec![Some(self.2); 20],
            })
        }
    }

    fn run(samples: Vec<f64>, caps: Capabilities) -> EffectResult {
        let buffer = AudioBuffer::new(samples, 22050);
        detect(&AnalysisContext::new(&buffer, &caps)).unwrap()
    }

    #[test]
    fn test_expected_ranges() {
        // F1 = 500 Hz -> VTL 17 cm
        assert_eq!(expected_f0_range(500.0), (75.0, 190.0));
        // F1 = 600 Hz -> VTL 14.2 cm
        assert_eq!(expected_f0_range(600.0), (150.0, 270.0));
        // F1 = 900 Hz -> VTL 9.4 cm
        assert_eq!(expected_f0_range(900.0), (200.0, 400.0));
    }

    #[test]
    fn test_no_formant_backend() {
        let result = run(sine(220.0, 22050, 1.0, 0.5), Capabilities::baseline_only());
        assert_eq!(result.confidence, 0.0);
        assert!(result
            .evidence
            .iter()
            .any(|e| e.contains("dependency unavailable")));
    }

    #[test]
    fn test_natural_relationship() {
        // 120 Hz with a male-sized tract
        let caps = Capabilities::baseline_only()
            .with_formant_extractor(Arc::new(FixedFormants(500.0, 1500.0, 2500.0)));
        let result = run(sine(120.0, 22050, 1.0, 0.5), caps);
        assert!((result.confidence - NATURAL_CONFIDENCE).abs() < 1e-12);
        assert_eq!(
            result.params.get("expected_f0_range"),
            Some(&ParamValue::List(vec![75.0, 190.0]))
        );
    }

    #[test]
    fn test_shifted_up() {
        // 400 Hz with a male-sized tract: 12·log2(400/190) ≈ 12.9 semitones up
        let caps = Capabilities::baseline_only()
            .with_formant_extractor(Arc::new(FixedFormants(500.0, 1500.0, 2500.0)));
        let result = run(sine(400.0, 22050, 1.0, 0.5), caps);
        assert!(result.confidence >= 0.9, "confidence = {}", result.confidence);
        match result.params.get("estimated_semitones") {
            Some(ParamValue::Text(s)) => assert!(s.starts_with('+'), "{}", s),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unvoiced_input() {
        let caps = Capabilities::baseline_only()
            .with_formant_extractor(Arc::new(FixedFormants(500.0, 1500.0, 2500.0)));
        let result = run(vec![0.0; 22050], caps);
        assert_eq!(result.confidence, 0.0);
        assert!(!result.params.contains_key("detected_f0_hz"));
    }
}
