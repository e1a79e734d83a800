//! JSON export

use crate::analyzer::AnalysisReport;
use std::io::{self, Write};

/// Write all reports as a pretty-printed JSON array
pub fn write<W: Write>(writer: &mut W, reports: &[AnalysisReport]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, reports)?;
    writeln!(writer)
}

/// One report as a pretty-printed JSON object
pub fn to_string(report: &AnalysisReport) -> io::Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::EffectKind;
    use crate::report::fixtures::{effect, report};

    #[test]
    fn test_field_names() {
        let r = report(true, vec![effect(EffectKind::EqFiltering, 0.4)]);
        let value: serde_json::Value = serde_json::from_str(&to_string(&r).unwrap()).unwrap();

        for key in [
            "file",
            "filename",
            "duration_seconds",
            "sample_rate",
            "voice_detected",
            "fundamental_frequency_hz",
            "dependencies_available",
            "spectral_profile",
            "effects_detected",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["spectral_profile"]["harmonic_ratio"], 0.8741);
        assert_eq!(value["dependencies_available"]["formant_extractor"], true);
        assert_eq!(value["effects_detected"][0]["effect"], "eq_filtering");
        assert_eq!(value["effects_detected"][0]["confidence"], 0.4);
    }

    #[test]
    fn test_missing_f0_is_null() {
        let r = report(false, vec![]);
        let value: serde_json::Value = serde_json::from_str(&to_string(&r).unwrap()).unwrap();
        assert!(value["fundamental_frequency_hz"].is_null());
    }

    #[test]
    fn test_write_array() {
        let reports = vec![report(true, vec![]), report(false, vec![])];
        let mut out = Vec::new();
        write(&mut out, &reports).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value.as_array().map(|a| a.len()), Some(2));
    }
}
