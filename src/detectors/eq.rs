//! EQ and filtering from the long-term spectrum
//!
//! Compares mean levels (dB) of the averaged magnitude spectrum across bands:
//!
//! ```text
//! Band       | Range         | Indicator
//! -----------|---------------|------------------------------------
//! Low        | < 150 Hz      | mid - low > 20 dB   -> high-pass
//! Mid        | 300 - 3000 Hz | reference
//! High       | > 8 kHz       | mid - high > 35 dB  -> low-pass
//! Presence   | 2 - 5 kHz     | > 5 dB above 1-2 kHz and 5-8 kHz
//! ```
//!
//! A band with no bins at this sample rate is skipped.

use super::{EffectKind, EffectResult, MAX_CONFIDENCE};
use crate::analyzer::AnalysisContext;
use crate::dsp::features::{frame_centroid, mean_flatness, mean_rolloff};
use crate::dsp::stats::{mean, round_to};
use crate::dsp::EPSILON;
use crate::error::DetectorFailure;

const LOW_BAND_MAX_HZ: f64 = 150.0;
const MID_BAND: (f64, f64) = (300.0, 3000.0);
const HIGH_BAND_MIN_HZ: f64 = 8000.0;
const PRESENCE_BAND: (f64, f64) = (2000.0, 5000.0);
const BELOW_PRESENCE: (f64, f64) = (1000.0, 2000.0);
const ABOVE_PRESENCE: (f64, f64) = (5000.0, 8000.0);

const HIGH_PASS_DB: f64 = 20.0;
const LOW_PASS_DB: f64 = 35.0;
const PRESENCE_BOOST_DB: f64 = 5.0;

fn band_mean(spectrum_db: &[f64], freqs: &[f64], keep: impl Fn(f64) -> bool) -> Option<f64> {
    let values: Vec<f64> = spectrum_db
        .iter()
        .zip(freqs)
        .filter(|(_, &f)| keep(f))
        .map(|(&v, _)| v)
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(mean(&values))
    }
}

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<EffectResult, DetectorFailure> {
    let mut result = EffectResult::new(EffectKind::EqFiltering);
    let stft = ctx.stft();
    let freqs = stft.frequencies();
    let avg = stft.average_spectrum();
    let avg_db: Vec<f64> = avg.iter().map(|&m| 20.0 * (m + EPSILON).log10()).collect();

    result.param("spectral_centroid_hz", round_to(frame_centroid(&avg, &freqs), 1));
    result.param("spectral_rolloff_hz", round_to(mean_rolloff(stft), 1));

    let low = band_mean(&avg_db, &freqs, |f| f < LOW_BAND_MAX_HZ);
    let mid = band_mean(&avg_db, &freqs, |f| f > MID_BAND.0 && f < MID_BAND.1);
    let high = band_mean(&avg_db, &freqs, |f| f > HIGH_BAND_MIN_HZ);

    if let (Some(low), Some(mid)) = (low, mid) {
        let hp_diff = mid - low;
        if hp_diff > HIGH_PASS_DB {
            result.add(0.3);
            result.param("high_pass_detected", true);
            result.param("hp_cutoff_estimate_hz", "~150Hz");
            result.evidence(format!(
                "Steep low-frequency rolloff: {:.1}dB below midrange",
                hp_diff
            ));
        }
    }

    if let (Some(high), Some(mid)) = (high, mid) {
        let lp_diff = mid - high;
        if lp_diff > LOW_PASS_DB {
            result.add(0.2);
            result.param("low_pass_detected", true);
            result.evidence(format!(
                "Steep high-frequency rolloff: {:.1}dB below midrange",
                lp_diff
            ));
        }
    }

    let presence = band_mean(&avg_db, &freqs, |f| {
        f > PRESENCE_BAND.0 && f < PRESENCE_BAND.1
    });
    let surrounding = band_mean(&avg_db, &freqs, |f| {
        (f > BELOW_PRESENCE.0 && f < BELOW_PRESENCE.1) || (f > ABOVE_PRESENCE.0 && f < ABOVE_PRESENCE.1)
    });
    if let (Some(presence), Some(surrounding)) = (presence, surrounding) {
        let boost = presence - surrounding;
        if boost > PRESENCE_BOOST_DB {
            result.add(0.2);
            result.param("presence_boost_db", round_to(boost, 1));
            result.evidence(format!("Presence boost: +{:.1}dB in 2-5kHz range", boost));
        }
    }

    result.param("spectral_flatness", round_to(mean_flatness(stft), 4));

    result.confidence = result.confidence.min(MAX_CONFIDENCE);
    if result.evidence.is_empty() {
        result.evidence("Spectral shape appears within normal range");
    }
    Ok(result.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioBuffer;
    use crate::backends::Capabilities;
    use crate::detectors::test_signals::{band_limited_noise, noise};
    use crate::detectors::ParamValue;

    fn run(samples: Vec<f64>, sample_rate: u32) -> EffectResult {
        let buffer = AudioBuffer::new(samples, sample_rate);
        let caps = Capabilities::baseline_only();
        detect(&AnalysisContext::new(&buffer, &caps)).unwrap()
    }

    #[test]
    fn test_white_noise_is_flat() {
        let result = run(noise(44100, 0.3, 7), 22050);
        assert_eq!(result.confidence, 0.0, "{:?}", result.evidence);
        assert_eq!(result.evidence, vec!["Spectral shape appears within normal range"]);
    }

    #[test]
    fn test_band_limited_voice_range() {
        let result = run(band_limited_noise(44100, 300.0, 3000.0, 22050), 22050);
        assert_eq!(result.params.get("high_pass_detected"), Some(&ParamValue::Flag(true)));
        assert_eq!(result.params.get("low_pass_detected"), Some(&ParamValue::Flag(true)));
        assert!(result.confidence >= 0.5 - 1e-9, "{}", result.confidence);
    }

    #[test]
    fn test_low_sample_rate_skips_high_band() {
        // Nyquist 4 kHz: no bins above 8 kHz, no 5-8 kHz band
        let result = run(noise(16000, 0.3, 3), 8000);
        assert!(!result.params.contains_key("low_pass_detected"));
        assert!(result.confidence <= MAX_CONFIDENCE);
    }
}
