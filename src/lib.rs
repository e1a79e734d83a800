//! Vocalscope - Detect studio effects applied to vocal recordings
//!
//! Vocalscope analyzes a mono voice recording and reports, for each of twelve
//! common studio effects, how confident it is that the effect was applied.
//!
//! # Overview
//!
//! Every effect leaves a fingerprint in the signal. Reverb stretches the
//! energy decay, compression flattens the crest factor, auto-tune snaps the
//! pitch contour to a semitone grid, a noise gate cuts to digital silence in
//! a single frame. Vocalscope measures these fingerprints with independent
//! heuristics and turns each into a confidence score with human-readable
//! evidence.
//!
//! # Detection Methods
//!
//! 1. **Spectral/temporal heuristics** (always available): STFT, RMS
//!    envelopes, autocorrelation, MFCCs and a baseline autocorrelation pitch
//!    tracker.
//!
//! 2. **Capability backends** (optional): an LPC formant extractor (cargo
//!    feature `formants`, on by default) and a CREPE neural pitch tracker
//!    (`neural-pitch`). Without formants, the pitch-shift and formant-shift
//!    detectors report zero confidence and say why.
//!
//! # Quick Start
//!
//! ```no_run
//! use vocalscope::{Analyzer, AudioBuffer};
//!
//! let buffer = AudioBuffer::new(vec![0.0; 22050], 22050);
//! let report = Analyzer::new().analyze(&buffer)?;
//!
//! for effect in report.detected() {
//!     println!("{:<16} {:.0}%", effect.effect.label(), effect.confidence * 100.0);
//!     for line in &effect.evidence {
//!         println!("    {}", line);
//!     }
//! }
//! # Ok::<(), vocalscope::AnalysisError>(())
//! ```
//!
//! # Scoring System
//!
//! | Confidence | Meaning |
//! |------------|---------|
//! | 0.00-0.19 | Not detected / low confidence |
//! | 0.20-0.49 | Possible, worth a listen |
//! | 0.50-1.00 | Likely applied |
//!
//! Results are sorted by confidence, highest first.
//!
//! # Modules
//!
//! - [`analyzer`]: Orchestration, isolation and the report type
//! - [`detectors`]: The twelve effect detectors
//! - [`dsp`]: Spectral primitives and the baseline pitch tracker
//! - [`backends`]: Optional formant and pitch backends
//! - [`audio`]: Audio buffers and the file loader
//! - [`report`]: Output formatters (JSON, text)

pub mod analyzer;
pub mod audio;
pub mod backends;
pub mod detectors;
pub mod dsp;
pub mod error;
pub mod report;

pub use analyzer::{AnalysisReport, Analyzer};
pub use audio::AudioBuffer;
pub use backends::{available_capabilities, AvailableCapabilities, Capabilities};
pub use detectors::{EffectKind, EffectResult, ParamValue};
pub use dsp::SpectralProfile;
pub use error::{AnalysisError, DetectorFailure};

/// Analyze mono samples with the capabilities detected for this process
pub fn analyze(samples: &[f64], sample_rate: u32) -> error::Result<AnalysisReport> {
    Analyzer::new().analyze(&AudioBuffer::new(samples.to_vec(), sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // PUBLIC API TESTS
    // ==========================================================================
    //
    // These tests verify the public API surface is correct and documented.
    // ==========================================================================

    #[test]
    fn test_public_exports() {
        // Verify core types are re-exported from crate root
        let _: EffectKind = EffectKind::Reverb;
        let _analyzer = Analyzer::new();
        let _ = available_capabilities();
    }

    #[test]
    fn test_analyzer_defaults() {
        let analyzer = Analyzer::new();
        assert!(analyzer.parallel);
        assert_eq!(analyzer.sample_rate, Some(audio::DEFAULT_ANALYSIS_RATE));
    }

    #[test]
    fn test_analyze_rejects_empty() {
        assert!(matches!(analyze(&[], 22050), Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn test_analyze_reports_capabilities() {
        let report = analyze(&vec![0.0; 8192], 22050).unwrap();
        assert_eq!(report.dependencies_available, available_capabilities());
        assert_eq!(report.effects_detected.len(), EffectKind::ALL.len());
    }
}
