//! Formant-shift detection from formant spacing
//!
//! Natural vowels keep F2/F1 roughly in 1.5-2.5 and F3/F2 in 1.2-1.8.
//! Shifting formants independently of pitch pushes these ratios out of
//! range, and some processors also freeze F1 in place.

use super::{EffectKind, EffectResult, MAX_CONFIDENCE};
use crate::analyzer::AnalysisContext;
use crate::backends::BackendOutcome;
use crate::dsp::stats::{coefficient_of_variation, round_to};
use crate::error::DetectorFailure;

const F2_F1_RANGE: (f64, f64) = (1.2, 3.2);
const F2_F1_WEIGHT: f64 = 0.4;
const F3_F2_RANGE: (f64, f64) = (1.0, 2.2);
const F3_F2_WEIGHT: f64 = 0.3;

/// Frames of the F1 track inspected for stability
const STABILITY_FRAMES: usize = 200;
const STABILITY_MIN_VALUES: usize = 10;
const STABLE_F1_CV: f64 = 0.03;
const STABLE_F1_WEIGHT: f64 = 0.2;

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<EffectResult, DetectorFailure> {
    let mut result = EffectResult::new(EffectKind::FormantShift);

    let track = match ctx.formants() {
        BackendOutcome::Ready(track) => track,
        BackendOutcome::Unavailable(reason) => {
            result.evidence(format!(
                "cannot detect formant shift: dependency unavailable ({})",
                reason
            ));
            return Ok(result.finish());
        }
        BackendOutcome::Failed(reason) => {
            result.evidence(format!("formant extraction failed: {}", reason));
            return Ok(result.finish());
        }
    };

    let (Some(f1), Some(f2)) = (track.median_f1(), track.median_f2()) else {
        result.evidence("Could not extract formants reliably");
        return Ok(result.finish());
    };

    let ratio_f2_f1 = f2 / f1;
    result.param("F2_F1_ratio", round_to(ratio_f2_f1, 2));
    if ratio_f2_f1 < F2_F1_RANGE.0 || ratio_f2_f1 > F2_F1_RANGE.1 {
        result.add(F2_F1_WEIGHT);
        result.evidence(format!(
            "Unusual F2/F1 ratio: {:.2} (normal: 1.5-2.5)",
            ratio_f2_f1
        ));
    }

    if let Some(f3) = track.median_f3() {
        let ratio_f3_f2 = f3 / f2;
        result.param("F3_F2_ratio", round_to(ratio_f3_f2, 2));
        if ratio_f3_f2 < F3_F2_RANGE.0 || ratio_f3_f2 > F3_F2_RANGE.1 {
            result.add(F3_F2_WEIGHT);
            result.evidence(format!(
                "Unusual F3/F2 ratio: {:.2} (normal: 1.2-1.8)",
                ratio_f3_f2
            ));
        }
    }

    let f1_series = track.f1_series(STABILITY_FRAMES);
    if f1_series.len() > STABILITY_MIN_VALUES {
        let cv = coefficient_of_variation(&f1_series);
        result.param("F1_variability_cv", round_to(cv, 4));
        if cv < STABLE_F1_CV {
            result.add(STABLE_F1_WEIGHT);
            result.evidence(format!("Unusually stable F1 (CV={:.4})", cv));
        }
    }

    result.confidence = result.confidence.min(MAX_CONFIDENCE);
    if result.evidence.is_empty() {
        result.evidence("Formant ratios appear within normal range");
    }
    Ok(result.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioBuffer;
    use crate::backends::{Capabilities, FormantExtractor, FormantTrack};
    use std::sync::Arc;

    struct Scripted(FormantTrack);

    impl FormantExtractor for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn try_extract(&self, _buffer: &AudioBuffer) -> BackendOutcome<FormantTrack> {
            BackendOutcome::Ready(self.0.clone())
        }
    }

    fn track(f1: &[f64], f2: f64, f3: f64) -> FormantTrack {
        FormantTrack {
            times: vec![0.0; f1.len()],
            f1: f1.iter().map(|&v| Some(v)).collect(),
            f2: vec![Some(f2); f1.len()],
            f3: vec![Some(f3); f1.len()],
        }
    }

    fn run(track: FormantTrack) -> EffectResult {
        let buffer = AudioBuffer::new(vec![0.0; 4096], 22050);
        let caps = Capabilities::baseline_only().with_formant_extractor(Arc::new(Scripted(track)));
        detect(&AnalysisContext::new(&buffer, &caps)).unwrap()
    }

    fn varying_f1(center: f64) -> Vec<f64> {
        (0..30).map(|i| center + if i % 2 == 0 { 60.0 } else { -60.0 }).collect()
    }

    #[test]
    fn test_natural_ratios() {
        // F2/F1 = 2.0, F3/F2 = 1.5, F1 varies by ±10%
        let result = run(track(&varying_f1(600.0), 1200.0, 1800.0));
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.evidence, vec!["Formant ratios appear within normal range"]);
    }

    #[test]
    fn test_every_indicator_fires() {
        // F2/F1 = 1.1, F3/F2 = 2.5, F1 perfectly flat
        let result = run(track(&[1000.0; 30], 1100.0, 2750.0));
        assert!((result.confidence - 0.9).abs() < 1e-9, "{}", result.confidence);
        assert_eq!(result.evidence.len(), 3);
    }

    #[test]
    fn test_unavailable() {
        let buffer = AudioBuffer::new(vec![0.0; 4096], 22050);
        let caps = Capabilities::baseline_only();
        let result = detect(&AnalysisContext::new(&buffer, &caps)).unwrap();
        assert_eq!(result.confidence, 0.0);
        assert!(result.evidence[0].contains("dependency unavailable"));
    }

    #[test]
    fn test_missing_f2() {
        let mut t = track(&varying_f1(600.0), 1200.0, 1800.0);
        t.f2 = vec![None; t.f1.len()];
        let result = run(t);
        assert_eq!(result.evidence, vec!["Could not extract formants reliably"]);
    }
}
