//! De-essing
//!
//! Sibilants put most of their energy between 4 and 9 kHz. A static
//! de-esser leaves a dip there relative to the 2-4 kHz band below, and a
//! dynamic one flattens the sibilant envelope over time.

use super::{EffectKind, EffectResult, MAX_CONFIDENCE};
use crate::analyzer::AnalysisContext;
use crate::dsp::stats::{coefficient_of_variation, mean, round_to};
use crate::dsp::EPSILON;
use crate::error::DetectorFailure;

const SIBILANT_BAND: (f64, f64) = (4000.0, 9000.0);
const REFERENCE_BAND: (f64, f64) = (2000.0, 4000.0);

const STRONG_DIP_RATIO: f64 = 0.3;
const MODERATE_DIP_RATIO: f64 = 0.6;
const MIN_ENVELOPE_FRAMES: usize = 10;
const FLAT_ENVELOPE_CV: f64 = 0.3;

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<EffectResult, DetectorFailure> {
    let mut result = EffectResult::new(EffectKind::DeEssing);
    let stft = ctx.stft();

    let sibilant_bins = stft.bins_between(SIBILANT_BAND.0, SIBILANT_BAND.1);
    let reference_bins = stft.bins_between(REFERENCE_BAND.0, REFERENCE_BAND.1);
    if sibilant_bins.is_empty() || reference_bins.is_empty() {
        result.evidence(format!(
            "Sibilant band not covered at {} Hz sample rate",
            ctx.sample_rate()
        ));
        return Ok(result.finish());
    }

    let sibilant_env = stft.band_envelope(&sibilant_bins);
    let reference_energy = mean(&stft.band_envelope(&reference_bins));
    if reference_energy < EPSILON {
        return Ok(result.finish());
    }

    let ratio = mean(&sibilant_env) / reference_energy;
    result.param("sibilant_ratio", round_to(ratio, 3));

    if ratio < STRONG_DIP_RATIO {
        result.confidence = 0.5;
        result.evidence(format!("Strong dip in sibilant range: ratio {:.2}", ratio));
    } else if ratio < MODERATE_DIP_RATIO {
        result.confidence = 0.25;
        result.evidence(format!("Moderate sibilant reduction: ratio {:.2}", ratio));
    }

    if sibilant_env.len() > MIN_ENVELOPE_FRAMES {
        let cv = coefficient_of_variation(&sibilant_env);
        result.param("sibilant_variability_cv", round_to(cv, 4));
        if cv < FLAT_ENVELOPE_CV {
            result.add(0.15);
            result.evidence(format!(
                "Unnaturally consistent sibilant level (CV={:.3})",
                cv
            ));
        }
    }

    result.confidence = result.confidence.min(MAX_CONFIDENCE);
    Ok(result.finish())
}
