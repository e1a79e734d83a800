//! Delay and echo
//!
//! An echo repeats the energy envelope after a fixed lag, so the
//! autocorrelation of the mean-removed RMS envelope peaks at that lag.
//! Lags between 50 ms (below that it is doubling, not echo) and 1 s are
//! searched; several peaks point at a feedback delay.

use super::{EffectKind, EffectResult, MAX_CONFIDENCE};
use crate::analyzer::context::HOP;
use crate::analyzer::AnalysisContext;
use crate::dsp::correlation::centered_autocorrelation;
use crate::dsp::envelope::frames_per_second;
use crate::dsp::peaks::find_peaks;
use crate::dsp::stats::{round_to, std_dev};
use crate::dsp::EPSILON;
use crate::error::DetectorFailure;

const MIN_DELAY_SECS: f64 = 0.05;
const MAX_DELAY_SECS: f64 = 1.0;
const MIN_SEARCH_FRAMES: usize = 5;
const PEAK_HEIGHT: f64 = 0.15;
const PEAK_DISTANCE: usize = 5;
const STRONG_ECHO: f64 = 0.4;
const WEAK_ECHO: f64 = 0.2;

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<EffectResult, DetectorFailure> {
    let mut result = EffectResult::new(EffectKind::DelayEcho);

    let rms = ctx.rms();
    if std_dev(rms) < EPSILON {
        return Ok(result.finish());
    }
    let ac = centered_autocorrelation(rms);

    let fps = frames_per_second(ctx.sample_rate(), HOP);
    let min_lag = (MIN_DELAY_SECS * fps) as usize;
    let max_lag = ((MAX_DELAY_SECS * fps) as usize).min(ac.len());
    if max_lag <= min_lag || max_lag - min_lag < MIN_SEARCH_FRAMES {
        return Ok(result.finish());
    }
    let region = &ac[min_lag..max_lag];

    let peaks = find_peaks(region, PEAK_HEIGHT, PEAK_DISTANCE);
    let strongest = peaks
        .iter()
        .copied()
        .max_by(|&a, &b| region[a].total_cmp(&region[b]).then(b.cmp(&a)));

    if let Some(peak) = strongest {
        let lag = peak + min_lag;
        let delay_secs = lag as f64 / fps;
        let height = ac[lag];

        result.param("delay_time_seconds", round_to(delay_secs, 3));
        result.param("delay_time_ms", round_to(delay_secs * 1000.0, 1));
        result.param("correlation_strength", round_to(height, 3));

        if height > STRONG_ECHO {
            result.confidence = (0.4 + height * 0.5).min(0.9);
            result.evidence(format!(
                "Strong echo at {:.0}ms (correlation: {:.2})",
                delay_secs * 1000.0,
                height
            ));
        } else if height > WEAK_ECHO {
            result.confidence = 0.2 + height * 0.3;
            result.evidence(format!(
                "Possible echo at {:.0}ms (correlation: {:.2})",
                delay_secs * 1000.0,
                height
            ));
        }

        if peaks.len() > 1 {
            result.param("echo_count", peaks.len());
            result.evidence(format!("Multiple echo peaks detected ({})", peaks.len()));
            result.confidence = (result.confidence + 0.1).min(MAX_CONFIDENCE);
        }
    }

    if result.evidence.is_empty() {
        result.evidence("No delay/echo detected");
    }
    Ok(result.finish())
}
