//! Distortion and saturation
//!
//! # Total Harmonic Distortion
//!
//! Saturation adds energy at integer multiples of the fundamental. THD is
//! the RMS of the harmonic amplitudes relative to the fundamental:
//!
//! ```text
//! THD% = 100 * sqrt(H2² + H3² + ... + H8²) / H1
//! ```
//!
//! Tube-style saturation favours even harmonics, hard clipping odd ones, so
//! the even/odd ratio is reported as a hint. Samples at full scale are
//! counted separately as digital clipping.

use super::{EffectKind, EffectResult, MAX_CONFIDENCE};
use crate::analyzer::AnalysisContext;
use crate::dsp::stats::{argmax, mean, round_to};
use crate::dsp::EPSILON;
use crate::error::DetectorFailure;

const FUNDAMENTAL_RANGE: (f64, f64) = (80.0, 400.0);
const HIGHEST_HARMONIC: usize = 8;
/// Bins either side of the expected harmonic position to search
const HARMONIC_SEARCH_BINS: usize = 3;
const CLIP_LEVEL: f64 = 0.99;
const CLIP_RATIO: f64 = 0.001;
const CLIP_WEIGHT: f64 = 0.3;

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<EffectResult, DetectorFailure> {
    let mut result = EffectResult::new(EffectKind::Distortion);
    let stft = ctx.harmonic_stft();
    let avg = stft.average_spectrum();
    let nyquist = ctx.sample_rate() as f64 / 2.0;

    let voice_bins = stft.bins_between(FUNDAMENTAL_RANGE.0, FUNDAMENTAL_RANGE.1);
    let voice_mags: Vec<f64> = voice_bins.iter().map(|&b| avg[b]).collect();
    if let Some(idx) = argmax(&voice_mags) {
        let fund_bin = voice_bins[idx];
        let fund_freq = stft.bin_frequency(fund_bin);
        let fund_amp = avg[fund_bin];

        if fund_amp >= EPSILON {
            result.param("fundamental_hz", round_to(fund_freq, 1));

            let harmonics: Vec<f64> = (2..=HIGHEST_HARMONIC)
                .map(|n| fund_freq * n as f64)
                .take_while(|&f| f <= nyquist)
                .map(|f| {
                    let center = stft.nearest_bin(f);
                    let lo = center.saturating_sub(HARMONIC_SEARCH_BINS);
                    let hi = (center + HARMONIC_SEARCH_BINS + 1).min(avg.len());
                    avg[lo..hi].iter().copied().fold(0.0, f64::max)
                })
                .collect();

            if !harmonics.is_empty() {
                score_harmonics(&mut result, &harmonics, fund_amp);
            }
        }
    }

    let samples = ctx.samples();
    let clipped = samples.iter().filter(|x| x.abs() > CLIP_LEVEL).count();
    let clip_ratio = clipped as f64 / samples.len().max(1) as f64;
    if clip_ratio > CLIP_RATIO {
        result.confidence = (result.confidence + CLIP_WEIGHT).min(MAX_CONFIDENCE);
        result.param("clipped_sample_ratio", round_to(clip_ratio, 6));
        result.evidence(format!(
            "Digital clipping detected: {:.3}% of samples",
            clip_ratio * 100.0
        ));
    }

    Ok(result.finish())
}

/// THD scoring; `harmonics[0]` is the 2nd harmonic
fn score_harmonics(result: &mut EffectResult, harmonics: &[f64], fund_amp: f64) {
    let thd_percent = harmonics.iter().map(|h| h * h).sum::<f64>().sqrt() / fund_amp * 100.0;
    result.param("thd_percent", round_to(thd_percent, 2));

    let even: Vec<f64> = harmonics.iter().step_by(2).copied().collect();
    let odd: Vec<f64> = harmonics.iter().skip(1).step_by(2).copied().collect();
    if !even.is_empty() && !odd.is_empty() {
        let ratio = mean(&even) / (mean(&odd) + EPSILON);
        result.param("even_odd_harmonic_ratio", round_to(ratio, 2));
    }

    if thd_percent > 15.0 {
        result.confidence = MAX_CONFIDENCE.min(0.5 + (thd_percent - 15.0) * 0.01);
        result.evidence(format!(
            "High THD: {:.1}% (heavy distortion/saturation)",
            thd_percent
        ));
    } else if thd_percent > 5.0 {
        result.confidence = 0.3 + (thd_percent - 5.0) * 0.02;
        result.evidence(format!("Moderate THD: {:.1}% (mild saturation)", thd_percent));
    } else if thd_percent > 2.0 {
        result.confidence = 0.1;
        result.evidence(format!("Low THD: {:.1}% (minimal distortion)", thd_percent));
    }
}
