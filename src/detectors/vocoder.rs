//! Vocoder
//!
//! A channel vocoder imposes the voice envelope on a synthetic carrier.
//! Two traces survive: harmonics spaced with machine regularity (sawtooth
//! or pulse carriers) and an MFCC texture that barely moves over time.

use super::{EffectKind, EffectResult, MAX_CONFIDENCE};
use crate::analyzer::AnalysisContext;
use crate::dsp::mfcc::{mfcc, temporal_variance, NUM_COEFFICIENTS};
use crate::dsp::peaks::find_peaks;
use crate::dsp::stats::{coefficient_of_variation, max, mean, round_to};
use crate::error::DetectorFailure;

/// Peak height relative to the tallest bin of the average spectrum
const PEAK_HEIGHT_FRACTION: f64 = 0.05;
const PEAK_DISTANCE_BINS: usize = 5;
const MIN_PEAKS: usize = 4;
const MIN_SPACINGS: usize = 3;
const REGULAR_SPACING_CV: f64 = 0.1;
const SEMI_REGULAR_SPACING_CV: f64 = 0.2;
const LOW_MFCC_VARIANCE: f64 = 5.0;

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<EffectResult, DetectorFailure> {
    let mut result = EffectResult::new(EffectKind::Vocoder);

    // Coefficient 0 tracks loudness, not texture
    let variances = temporal_variance(&mfcc(ctx.stft(), NUM_COEFFICIENTS));
    let mfcc_variance = mean(variances.get(1..).unwrap_or_default());
    result.param("mfcc_temporal_variance", round_to(mfcc_variance, 4));

    let stft = ctx.harmonic_stft();
    let avg = stft.average_spectrum();
    let tallest = max(&avg).unwrap_or(0.0);
    let peaks = find_peaks(&avg, tallest * PEAK_HEIGHT_FRACTION, PEAK_DISTANCE_BINS);
    if peaks.len() >= MIN_PEAKS {
        let spacings: Vec<f64> = peaks
            .windows(2)
            .map(|w| stft.bin_frequency(w[1]) - stft.bin_frequency(w[0]))
            .collect();
        if spacings.len() >= MIN_SPACINGS {
            let cv = coefficient_of_variation(&spacings);
            result.param("harmonic_spacing_cv", round_to(cv, 4));
            if cv < REGULAR_SPACING_CV {
                result.add(0.4);
                result.evidence(format!(
                    "Extremely regular harmonic spacing (CV={:.3}), synthetic carrier likely",
                    cv
                ));
            } else if cv < SEMI_REGULAR_SPACING_CV {
                result.add(0.15);
                result.evidence(format!("Regular harmonic spacing (CV={:.3})", cv));
            }
        }
    }

    if mfcc_variance < LOW_MFCC_VARIANCE {
        result.add(0.3);
        result.evidence(format!(
            "Low MFCC variance: {:.2} (artificial texture)",
            mfcc_variance
        ));
    }

    result.confidence = result.confidence.min(MAX_CONFIDENCE);
    if result.evidence.is_empty() {
        result.evidence("No vocoder indicators found");
    }
    Ok(result.finish())
}
