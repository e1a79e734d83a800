//! Report generation for analysis results
//!
//! Two output formats:
//!
//! - **JSON**: the full [`AnalysisReport`] list, machine-readable
//! - **Text**: the human-readable summary printed by the CLI
//!
//! # Usage
//!
//! ```ignore
//! use vocalscope::report;
//!
//! // Automatically picks format based on extension
//! report::generate("report.json", &reports)?;  // JSON
//! report::generate("report.txt", &reports)?;   // Text
//! ```

pub mod json;
pub mod text;

use crate::analyzer::AnalysisReport;
use crate::detectors::EffectKind;
use std::collections::BTreeMap;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Generate a report in the appropriate format based on file extension
pub fn generate<P: AsRef<Path>>(path: P, reports: &[AnalysisReport]) -> io::Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let mut file = BufWriter::new(std::fs::File::create(path)?);

    match ext.as_str() {
        "json" => json::write(&mut file, reports)?,
        _ => text::write(&mut file, reports, false)?,
    }
    file.flush()
}

/// Summary statistics for a batch of reports
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub total: usize,
    pub voice_detected: usize,
    /// Reports with at least one detected effect
    pub with_effects: usize,
    /// How many reports detected each effect
    pub effect_counts: BTreeMap<EffectKind, usize>,
}

impl Summary {
    pub fn from_reports(reports: &[AnalysisReport]) -> Self {
        let mut summary = Self {
            total: reports.len(),
            ..Self::default()
        };

        for r in reports {
            if r.voice_detected {
                summary.voice_detected += 1;
            }
            let mut any = false;
            for effect in r.detected() {
                any = true;
                *summary.effect_counts.entry(effect.effect).or_insert(0) += 1;
            }
            if any {
                summary.with_effects += 1;
            }
        }

        summary
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{effect, report};
    use super::*;

    // ==========================================================================
    // SUMMARY STATISTICS TESTS
    // ==========================================================================
    //
    // The Summary struct aggregates counts for a batch of reports. The CLI
    // prints it after the per-file summaries.
    // ==========================================================================

    #[test]
    fn test_summary_empty() {
        let summary = Summary::from_reports(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.voice_detected, 0);
        assert_eq!(summary.with_effects, 0);
        assert!(summary.effect_counts.is_empty());
    }

    #[test]
    fn test_summary_mixed() {
        let reports = vec![
            report(
                true,
                vec![
                    effect(EffectKind::Reverb, 0.8),
                    effect(EffectKind::Compression, 0.5),
                    effect(EffectKind::Vocoder, 0.1),
                ],
            ),
            report(true, vec![effect(EffectKind::Reverb, 0.3)]),
            report(false, vec![effect(EffectKind::DelayEcho, 0.05)]),
        ];
        let summary = Summary::from_reports(&reports);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.voice_detected, 2);
        assert_eq!(summary.with_effects, 2);
        assert_eq!(summary.effect_counts.get(&EffectKind::Reverb), Some(&2));
        assert_eq!(summary.effect_counts.get(&EffectKind::Compression), Some(&1));
        assert_eq!(summary.effect_counts.get(&EffectKind::Vocoder), None);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let reports = vec![report(true, vec![effect(EffectKind::NoiseGate, 0.2)])];
        assert_eq!(Summary::from_reports(&reports).with_effects, 1);
    }

    #[test]
    fn test_generate_picks_format_by_extension() {
        let dir = std::env::temp_dir().join(format!("vocalscope-report-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let reports = vec![report(true, vec![effect(EffectKind::Reverb, 0.8)])];

        let json_path = dir.join("out.json");
        generate(&json_path, &reports).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed[0]["filename"], "lead.wav");

        let text_path = dir.join("out.txt");
        generate(&text_path, &reports).unwrap();
        let text = std::fs::read_to_string(&text_path).unwrap();
        assert!(text.contains("VOICE EFFECTS ANALYSIS REPORT"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
