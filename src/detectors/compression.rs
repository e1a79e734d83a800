//! Dynamic range compression
//!
//! # Crest Factor
//!
//! Crest factor is peak / RMS in dB. Compression pulls peaks down toward the
//! average level, so heavily compressed vocals have a low crest factor:
//!
//! ```text
//! Crest factor | Reading              | Implied ratio
//! -------------|----------------------|--------------
//! 12 - 18 dB   | Natural speech       | -
//! < 14 dB      | Light compression    | 2:1
//! < 10 dB      | Moderate compression | 4:1
//! < 6 dB       | Heavy / limiting     | 8:1+
//! ```
//!
//! The spread between loud and quiet frames (P95 - P5 of the RMS envelope,
//! silence excluded) is a second, independent indicator.

use super::{EffectKind, EffectResult, MAX_CONFIDENCE};
use crate::analyzer::AnalysisContext;
use crate::dsp::envelope::{rms, to_db_envelope};
use crate::dsp::stats::{percentile, round_to, variance};
use crate::dsp::{amplitude_to_db, EPSILON};
use crate::error::DetectorFailure;

/// Frames more than this far below the loudest frame are silence
const SILENCE_WINDOW_DB: f64 = 60.0;
const MIN_ACTIVE_FRAMES: usize = 10;

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<EffectResult, DetectorFailure> {
    let mut result = EffectResult::new(EffectKind::Compression);
    let samples = ctx.samples();

    let peak = samples.iter().fold(0.0f64, |m, &x| m.max(x.abs()));
    let rms_global = rms(samples);
    if rms_global < EPSILON {
        return Ok(result.finish());
    }

    let crest_db = amplitude_to_db(peak / rms_global);
    result.param("crest_factor_db", round_to(crest_db, 2));
    result.param("peak_amplitude", round_to(peak, 4));
    result.param("rms_amplitude", round_to(rms_global, 4));

    let rms_db = to_db_envelope(ctx.rms());
    let loudest = rms_db.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let active: Vec<f64> = rms_db
        .iter()
        .copied()
        .filter(|&v| v > loudest - SILENCE_WINDOW_DB)
        .collect();

    let mut dynamic_range = None;
    if active.len() > MIN_ACTIVE_FRAMES {
        if let (Some(p95), Some(p5)) = (percentile(&active, 95.0), percentile(&active, 5.0)) {
            let dr = p95 - p5;
            result.param("dynamic_range_db", round_to(dr, 2));
            result.param("rms_variance_db2", round_to(variance(&active), 2));
            dynamic_range = Some(dr);
        }
    }

    if crest_db < 6.0 {
        result.add(0.5);
        result.param("estimated_ratio", "8:1+");
        result.evidence(format!(
            "Very low crest factor: {:.1}dB (heavy compression)",
            crest_db
        ));
    } else if crest_db < 10.0 {
        result.add(0.3);
        result.param("estimated_ratio", "4:1");
        result.evidence(format!(
            "Low crest factor: {:.1}dB (moderate compression)",
            crest_db
        ));
    } else if crest_db < 14.0 {
        result.add(0.1);
        result.param("estimated_ratio", "2:1");
        result.evidence(format!(
            "Mild crest factor: {:.1}dB (light compression)",
            crest_db
        ));
    }

    if let Some(dr) = dynamic_range {
        if dr < 6.0 {
            result.add(0.3);
            result.evidence(format!("Very narrow dynamic range: {:.1}dB", dr));
        } else if dr < 12.0 {
            result.add(0.15);
            result.evidence(format!("Reduced dynamic range: {:.1}dB", dr));
        }
    }

    result.confidence = result.confidence.min(MAX_CONFIDENCE);
    Ok(result.finish())
}
