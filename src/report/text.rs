//! Human-readable summary
//!
//! ```text
//! ============================================================
//!   VOICE EFFECTS ANALYSIS REPORT
//! ============================================================
//!   File:       lead.wav
//!   ...
//!   DETECTED EFFECTS:
//!   --------------------------------------------------------
//!   [ 80%] ################     Reverb
//!         > RT60 ~2.10s (room reverb)
//!         Params: estimated_rt60_seconds=2.1, reverb_type=hall
//! ```

use crate::analyzer::AnalysisReport;
use crate::detectors::EffectResult;
use std::fmt::Write as _;
use std::io::{self, Write};

const RULE_WIDTH: usize = 60;
const BAR_WIDTH: usize = 20;
/// Longer one-line parameter lists are printed one per line
const MAX_PARAM_LINE: usize = 70;

/// Write the summary of every report
pub fn write<W: Write>(writer: &mut W, reports: &[AnalysisReport], verbose: bool) -> io::Result<()> {
    for report in reports {
        writer.write_all(format_summary(report, verbose).as_bytes())?;
    }
    Ok(())
}

fn confidence_bar(confidence: f64) -> String {
    let filled = ((confidence * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
    "#".repeat(filled)
}

fn percent(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}

fn push_params(out: &mut String, effect: &EffectResult) {
    if effect.params.is_empty() {
        return;
    }
    let line = effect
        .params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ");
    if line.len() > MAX_PARAM_LINE {
        out.push_str("        Params:\n");
        for (k, v) in &effect.params {
            let _ = writeln!(out, "          {}: {}", k, v);
        }
    } else {
        let _ = writeln!(out, "        Params: {}", line);
    }
}

/// Summary of one report
///
/// `verbose` also lists evidence and parameters for effects below the
/// detection threshold.
pub fn format_summary(report: &AnalysisReport, verbose: bool) -> String {
    let mut out = String::new();
    let rule = "=".repeat(RULE_WIDTH);
    let thin = format!("  {}", "-".repeat(RULE_WIDTH - 4));

    let _ = writeln!(out, "\n{}", rule);
    out.push_str("  VOICE EFFECTS ANALYSIS REPORT\n");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "  File:       {}",
        report.filename.as_deref().unwrap_or(&report.file)
    );
    let _ = writeln!(out, "  Duration:   {}s", report.duration_seconds);
    let _ = writeln!(
        out,
        "  Voice:      {}",
        if report.voice_detected {
            "Detected"
        } else {
            "Not detected"
        }
    );
    if let Some(f0) = report.fundamental_frequency_hz {
        let _ = writeln!(out, "  F0:         {}Hz", f0);
    }
    out.push('\n');

    let sp = &report.spectral_profile;
    out.push_str("  Spectral Profile:\n");
    let _ = writeln!(out, "    Centroid:   {}Hz", sp.centroid_hz);
    let _ = writeln!(out, "    Bandwidth:  {}Hz", sp.bandwidth_hz);
    let _ = writeln!(out, "    Rolloff:    {}Hz", sp.rolloff_hz);
    let _ = writeln!(out, "    Flatness:   {}", sp.flatness);
    let _ = writeln!(out, "    Harmonic:   {}", sp.harmonic_ratio);
    out.push('\n');

    if report.effects_detected.is_empty() {
        out.push_str("  No effects analysis available.\n");
        return out;
    }

    let detected: Vec<&EffectResult> = report.detected().collect();
    let low: Vec<&EffectResult> = report.not_detected().collect();

    if !detected.is_empty() {
        out.push_str("  DETECTED EFFECTS:\n");
        let _ = writeln!(out, "{}", thin);
        for e in detected {
            let _ = writeln!(
                out,
                "  [{:>4}] {:<20} {}",
                percent(e.confidence),
                confidence_bar(e.confidence),
                e.effect.label()
            );
            for ev in &e.evidence {
                let _ = writeln!(out, "        > {}", ev);
            }
            push_params(&mut out, e);
            out.push('\n');
        }
    }

    if !low.is_empty() {
        out.push_str("  NOT DETECTED / LOW CONFIDENCE:\n");
        let _ = writeln!(out, "{}", thin);
        for e in low {
            let _ = writeln!(out, "  [{:>4}] {}", percent(e.confidence), e.effect.label());
            if verbose {
                for ev in &e.evidence {
                    let _ = writeln!(out, "        > {}", ev);
                }
                push_params(&mut out, e);
            }
        }
        out.push('\n');
    }

    let missing = report.dependencies_available.missing();
    if !missing.is_empty() {
        let _ = writeln!(
            out,
            "  NOTE: Some detectors limited, unavailable backends: {}",
            missing.join(", ")
        );
        out.push('\n');
    }

    let _ = writeln!(out, "{}", rule);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::EffectKind;
    use crate::report::fixtures::{effect, report};

    #[test]
    fn test_bar_width() {
        assert_eq!(confidence_bar(0.0), "");
        assert_eq!(confidence_bar(0.5), "##########");
        assert_eq!(confidence_bar(1.0).len(), BAR_WIDTH);
    }

    #[test]
    fn test_summary_sections() {
        let mut reverb = effect(EffectKind::Reverb, 0.8);
        reverb.evidence = vec!["RT60 ~2.10s (hall reverb)".to_string()];
        reverb.param("reverb_type", "hall");
        let r = report(true, vec![reverb, effect(EffectKind::Vocoder, 0.05)]);

        let text = format_summary(&r, false);
        assert!(text.contains("  File:       lead.wav"));
        assert!(text.contains("  F0:         196.4Hz"));
        assert!(text.contains("  [ 80%] ################     Reverb"));
        assert!(text.contains("        > RT60 ~2.10s (hall reverb)"));
        assert!(text.contains("        Params: reverb_type=hall"));
        assert!(text.contains("NOT DETECTED / LOW CONFIDENCE:"));
        assert!(text.contains("  [  5%] Vocoder"));
        assert!(!text.contains("no significant vocoding detected"));
        assert!(text.contains("unavailable backends: pitch_tracker_advanced"));
    }

    #[test]
    fn test_verbose_lists_low_confidence_evidence() {
        let r = report(false, vec![effect(EffectKind::Vocoder, 0.05)]);
        let text = format_summary(&r, true);
        assert!(text.contains("        > no significant vocoding detected"));
        assert!(text.contains("  Voice:      Not detected"));
        assert!(!text.contains("F0:"));
    }

    #[test]
    fn test_long_params_wrap() {
        let mut e = effect(EffectKind::Distortion, 0.6);
        e.param("fundamental_hz", 220.2);
        e.param("thd_percent", 27.71);
        e.param("even_odd_harmonic_ratio", 0.02);
        e.param("clipped_sample_ratio", 0.005011);
        let text = format_summary(&report(true, vec![e]), false);
        assert!(text.contains("        Params:\n          clipped_sample_ratio: 0.005011"));
    }

    #[test]
    fn test_no_effects() {
        let text = format_summary(&report(true, vec![]), false);
        assert!(text.contains("No effects analysis available."));
    }
}
