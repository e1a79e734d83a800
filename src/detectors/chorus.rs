//! Chorus and doubling
//!
//! Layered, slightly detuned copies of a voice decorrelate the phase advance
//! between consecutive STFT frames, and the LFO sweeping the copies makes
//! the spectral bandwidth breathe periodically. For a single stationary
//! source every bin advances by the same phase per hop, so the mean
//! `|cos Δφ|` stays close to its natural value.

use super::{EffectKind, EffectResult, MAX_CONFIDENCE};
use crate::analyzer::AnalysisContext;
use crate::dsp::correlation::centered_autocorrelation;
use crate::dsp::features::bandwidth_series;
use crate::dsp::peaks::local_maxima_above;
use crate::dsp::stats::{coefficient_of_variation, round_to};
use crate::error::DetectorFailure;

const MIN_MODULATION_FRAMES: usize = 20;
/// Lag window (frames) searched for bandwidth modulation
const MODULATION_LAGS: (usize, usize) = (2, 100);
const MODULATION_PEAK: f64 = 0.3;

const LOW_COHERENCE: f64 = 0.7;
const REDUCED_COHERENCE: f64 = 0.85;

/// Mean `|cos Δφ|` between consecutive frames over every bin
fn phase_coherence(phases: &[Vec<f64>]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for pair in phases.windows(2) {
        for (a, b) in pair[0].iter().zip(pair[1].iter()) {
            sum += (b - a).cos().abs();
            count += 1;
        }
    }
    (count > 0).then(|| sum / count as f64)
}

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<EffectResult, DetectorFailure> {
    let mut result = EffectResult::new(EffectKind::ChorusDoubling);
    let stft = ctx.stft();
    let phases = stft
        .phases
        .as_ref()
        .ok_or_else(|| DetectorFailure::new("phase spectrum unavailable"))?;

    let coherence = phase_coherence(phases);
    if let Some(c) = coherence {
        result.param("phase_coherence", round_to(c, 4));
    }

    let bandwidth = bandwidth_series(stft);
    result.param(
        "bandwidth_cv",
        round_to(coefficient_of_variation(&bandwidth), 4),
    );

    if bandwidth.len() > MIN_MODULATION_FRAMES {
        let ac = centered_autocorrelation(&bandwidth);
        let end = (ac.len() - 1).min(MODULATION_LAGS.1);
        let peaks = local_maxima_above(&ac, MODULATION_LAGS.0, end, MODULATION_PEAK);
        if !peaks.is_empty() {
            result.add(0.3);
            result.evidence(format!(
                "Periodic bandwidth modulation detected ({} peaks)",
                peaks.len()
            ));
        }
    }

    match coherence {
        Some(c) if c < LOW_COHERENCE => {
            result.add(0.3);
            result.evidence(format!("Low phase coherence: {:.3} (typical of chorus)", c));
        }
        Some(c) if c < REDUCED_COHERENCE => {
            result.add(0.1);
            result.evidence(format!("Slightly reduced phase coherence: {:.3}", c));
        }
        _ => {}
    }

    result.confidence = result.confidence.min(MAX_CONFIDENCE);
    if result.evidence.is_empty() {
        result.evidence("No chorus/doubling indicators found");
    }
    Ok(result.finish())
}
