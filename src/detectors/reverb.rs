//! Reverb detection from energy decay
//!
//! # RT60
//!
//! RT60 is the time a sound takes to decay by 60 dB after the source stops.
//! In dB the decay of a reverberant tail is close to linear, so a straight
//! line fitted to the tail of the RMS envelope gives the decay rate:
//!
//! ```text
//! RT60 = -60 / (slope_db_per_frame * frames_per_second)
//! ```
//!
//! ```text
//! RT60        | Space
//! ------------|-----------------------------
//! < 0.5 s     | Dry / vocal booth
//! 0.5 - 1.5 s | Room
//! 1.5 - 3 s   | Large room / plate
//! > 3 s       | Hall
//! ```
//!
//! When the recording ends loud there is no final tail to measure, so the
//! detector falls back to fitting the decay after the peak of each 1 s
//! chunk and taking the median.
//!
//! Reverb also smears the spectrum over time: high-band magnitudes change
//! very little from frame to frame.

use super::{EffectKind, EffectResult, MAX_CONFIDENCE};
use crate::analyzer::context::HOP;
use crate::analyzer::AnalysisContext;
use crate::dsp::envelope::{frames_per_second, rms_envelope, to_db_envelope};
use crate::dsp::stats::{argmax, linear_slope, median, round_to, std_dev};
use crate::error::DetectorFailure;

/// How far below the peak a frame still counts as loud
const LOUD_WINDOW_DB: f64 = 10.0;
/// Frames needed after the last loud frame to fit the tail directly
const MIN_TAIL_FRAMES: usize = 10;
/// Slope (dB/frame) a tail must fall faster than
const MIN_DECAY_SLOPE: f64 = -0.001;
const MAX_RT60: f64 = 15.0;

const CHUNK_FRAME: usize = 512;
const CHUNK_HOP: usize = 128;
const CHUNK_MIN_TAIL: usize = 5;
const CHUNK_MIN_SLOPE: f64 = -0.01;
const CHUNK_RT60_RANGE: (f64, f64) = (0.05, 10.0);

/// Spectral flux below this in the upper half of the spectrum means smearing
const SMEARING_FLUX: f64 = 0.001;
const SMEARING_WEIGHT: f64 = 0.15;

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<EffectResult, DetectorFailure> {
    let mut result = EffectResult::new(EffectKind::Reverb);

    let rms_db = to_db_envelope(ctx.rms());
    let Some(peak) = rms_db.iter().copied().reduce(f64::max) else {
        return Ok(result.finish());
    };
    let threshold = peak - LOUD_WINDOW_DB;
    let Some(last_loud) = rms_db.iter().rposition(|&v| v > threshold) else {
        return Ok(result.finish());
    };

    let decay_region = &rms_db[last_loud..];
    if decay_region.len() < MIN_TAIL_FRAMES {
        chunked_decay(ctx, &mut result);
        return Ok(result.finish());
    }

    let fps = frames_per_second(ctx.sample_rate(), HOP);
    if let Some(slope) = linear_slope(decay_region) {
        if slope < MIN_DECAY_SLOPE {
            let rt60 = (-60.0 / (slope * fps)).clamp(0.0, MAX_RT60);
            result.param("estimated_rt60_seconds", round_to(rt60, 3));

            if rt60 > 1.5 {
                result.confidence = MAX_CONFIDENCE.min(0.5 + (rt60 - 1.5) * 0.15);
                result.param("type", if rt60 > 3.0 { "hall" } else { "room" });
                result.evidence(format!("Energy decay RT60 ~ {:.2}s", rt60));
            } else if rt60 > 0.5 {
                result.confidence = 0.3 + (rt60 - 0.5) * 0.2;
                result.param("type", "room");
                result.evidence(format!("Moderate energy decay: RT60 ~ {:.2}s", rt60));
            } else {
                result.confidence = (rt60 * 0.4).max(0.1);
                result.evidence(format!("Minimal decay tail: RT60 ~ {:.2}s", rt60));
            }
        }
    }

    let flux = high_band_flux(ctx);
    result.param("high_band_flux", round_to(flux, 6));
    if flux < SMEARING_FLUX {
        result.confidence = (result.confidence + SMEARING_WEIGHT).min(1.0);
        result.evidence("Low spectral flux in high frequencies (smearing)");
    }

    Ok(result.finish())
}

/// Median RT60 over 1 s chunks, for recordings without a final tail
fn chunked_decay(ctx: &AnalysisContext<'_>, result: &mut EffectResult) {
    let samples = ctx.samples();
    let sr = ctx.sample_rate() as usize;
    let chunk_size = sr;
    let hop = (sr / 2).max(1);
    let fps = frames_per_second(ctx.sample_rate(), CHUNK_HOP);

    let mut decay_times = Vec::new();
    let mut start = 0;
    while start + chunk_size < samples.len() {
        let chunk = &samples[start..start + chunk_size];
        start += hop;

        let chunk_db = to_db_envelope(&rms_envelope(chunk, CHUNK_FRAME, CHUNK_HOP));
        let Some(peak_idx) = argmax(&chunk_db) else {
            continue;
        };
        let tail = &chunk_db[peak_idx..];
        if tail.len() <= CHUNK_MIN_TAIL || std_dev(tail) <= 0.0 {
            continue;
        }
        let Some(slope) = linear_slope(tail) else {
            continue;
        };
        if slope < CHUNK_MIN_SLOPE {
            let rt60 = -60.0 / (slope * fps);
            if rt60 > CHUNK_RT60_RANGE.0 && rt60 < CHUNK_RT60_RANGE.1 {
                decay_times.push(rt60);
            }
        }
    }

    let Some(median_rt60) = median(&decay_times) else {
        return;
    };
    result.param("estimated_rt60_seconds", round_to(median_rt60, 3));
    if median_rt60 > 0.5 {
        result.confidence = MAX_CONFIDENCE.min(0.4 + median_rt60 * 0.3);
        result.evidence(format!(
            "Median RT60 estimate: {:.2}s across {} segments",
            median_rt60,
            decay_times.len()
        ));
    } else if median_rt60 > 0.15 {
        result.confidence = 0.3;
        result.evidence(format!("Short reverb tail: {:.2}s", median_rt60));
    }
}

/// Mean squared frame-to-frame magnitude change over the upper half of the spectrum
fn high_band_flux(ctx: &AnalysisContext<'_>) -> f64 {
    let stft = ctx.stft();
    let start_bin = stft.num_bins() / 2;
    let mut sum = 0.0;
    let mut count = 0usize;
    for pair in stft.magnitudes.windows(2) {
        for (a, b) in pair[0][start_bin..].iter().zip(&pair[1][start_bin..]) {
            sum += (b - a) * (b - a);
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    sum / count as f64
}
