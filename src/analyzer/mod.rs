//! Analysis orchestration
//!
//! [`Analyzer`] validates a buffer, measures the voice and spectral profile
//! once, then runs every detector against a shared [`AnalysisContext`].
//!
//! # Isolation
//!
//! Each detector goes through [`run_isolated`]. A detector that returns an
//! error or panics becomes a zero-confidence result with an
//! `error during analysis: ...` evidence line, so a report always carries
//! exactly one entry per detector.
//!
//! # Ordering
//!
//! Results are sorted by confidence, highest first. The sort is stable, so
//! ties keep the detector declaration order and the report is identical
//! whether the detectors ran in parallel or one after another.

pub mod context;

pub use context::AnalysisContext;

use crate::audio::{self, AudioBuffer, DEFAULT_ANALYSIS_RATE};
use crate::backends::{AvailableCapabilities, Capabilities};
use crate::detectors::{Detector, EffectKind, EffectResult, DETECTORS, DETECTION_THRESHOLD};
use crate::dsp::pitch::{MAX_F0_HZ, MIN_F0_HZ};
use crate::dsp::stats::round_to;
use crate::dsp::SpectralProfile;
use crate::error::{AnalysisError, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// `file` value for buffers that did not come from disk
pub const IN_MEMORY_SOURCE: &str = "<memory>";

/// Complete analysis result for one buffer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub file: String,
    pub filename: Option<String>,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub voice_detected: bool,
    pub fundamental_frequency_hz: Option<f64>,
    pub dependencies_available: AvailableCapabilities,
    pub spectral_profile: SpectralProfile,
    /// Sorted by confidence, highest first
    pub effects_detected: Vec<EffectResult>,
}

impl AnalysisReport {
    /// Effects at or above the detection threshold
    pub fn detected(&self) -> impl Iterator<Item = &EffectResult> {
        self.effects_detected
            .iter()
            .filter(|e| e.confidence >= DETECTION_THRESHOLD)
    }

    /// Effects below the detection threshold
    pub fn not_detected(&self) -> impl Iterator<Item = &EffectResult> {
        self.effects_detected
            .iter()
            .filter(|e| e.confidence < DETECTION_THRESHOLD)
    }

    pub fn effect(&self, kind: EffectKind) -> Option<&EffectResult> {
        self.effects_detected.iter().find(|e| e.effect == kind)
    }

    /// Attach the source path and display name
    pub fn with_file_identity(mut self, file: impl Into<String>, filename: Option<String>) -> Self {
        self.file = file.into();
        self.filename = filename;
        self
    }
}

/// Run one detector, converting errors and panics into a failed result
pub fn run_isolated(detector: &Detector, ctx: &AnalysisContext<'_>) -> EffectResult {
    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| (detector.run)(ctx)));
    let result = match outcome {
        Ok(Ok(result)) => result.finish(),
        Ok(Err(failure)) => {
            log::warn!("{} detector failed: {}", detector.kind, failure);
            EffectResult::failed(detector.kind, &failure.to_string())
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "detector panicked".to_string());
            log::warn!("{} detector panicked: {}", detector.kind, reason);
            EffectResult::failed(detector.kind, &reason)
        }
    };
    log::debug!(
        "{} detector: confidence {:.2} in {:.1?}",
        detector.kind,
        result.confidence,
        start.elapsed()
    );
    result
}

/// Voice-effect analyzer
///
/// ```no_run
/// use vocalscope::Analyzer;
///
/// let report = Analyzer::new().analyze_file("take3.wav")?;
/// for effect in report.detected() {
///     println!("{} {:.0}%", effect.effect, effect.confidence * 100.0);
/// }
/// # Ok::<(), vocalscope::AnalysisError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Analyzer {
    pub capabilities: Capabilities,
    /// Run detectors on the rayon pool
    pub parallel: bool,
    /// Loader resampling target for [`Analyzer::analyze_file`]; `None` keeps
    /// the native rate
    pub sample_rate: Option<u32>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    /// Analyzer with the capabilities detected for this process
    pub fn new() -> Self {
        Self {
            capabilities: Capabilities::detect(),
            parallel: true,
            sample_rate: Some(DEFAULT_ANALYSIS_RATE),
            cancel: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: Option<u32>) -> Self {
        self.sample_rate = sample_rate.filter(|&r| r > 0);
        self
    }

    /// Abort with [`AnalysisError::Cancelled`] once `flag` is set
    ///
    /// The flag is checked before each detector is dispatched; a detector
    /// that is already running finishes normally.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn check_cancelled(&self, kind: EffectKind) -> Result<()> {
        match self.cancel {
            Some(ref flag) if flag.load(Ordering::Relaxed) => {
                Err(AnalysisError::Cancelled(kind.tag()))
            }
            _ => Ok(()),
        }
    }

    /// Decode a file and analyze it
    pub fn analyze_file<P: AsRef<Path>>(&self, path: P) -> Result<AnalysisReport> {
        let path = path.as_ref();
        let buffer = audio::load_file(path, self.sample_rate)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string());
        Ok(self
            .analyze(&buffer)?
            .with_file_identity(path.display().to_string(), filename))
    }

    /// Analyze a decoded mono buffer
    pub fn analyze(&self, buffer: &AudioBuffer) -> Result<AnalysisReport> {
        validate(buffer)?;
        let ctx = AnalysisContext::new(buffer, &self.capabilities);

        let f0 = ctx
            .baseline_pitch()
            .median_f0()
            .filter(|&f| f > MIN_F0_HZ && f < MAX_F0_HZ);

        let profile = ctx.profile();
        let spectral_profile = SpectralProfile {
            centroid_hz: round_to(profile.centroid_hz, 1),
            bandwidth_hz: round_to(profile.bandwidth_hz, 1),
            rolloff_hz: round_to(profile.rolloff_hz, 1),
            flatness: round_to(profile.flatness, 4),
            harmonic_ratio: round_to(profile.harmonic_ratio, 4),
        };

        let mut effects: Vec<EffectResult> = if self.parallel {
            DETECTORS
                .par_iter()
                .map(|detector| {
                    self.check_cancelled(detector.kind)?;
                    Ok(run_isolated(detector, &ctx))
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            let mut effects = Vec::with_capacity(DETECTORS.len());
            for detector in &DETECTORS {
                self.check_cancelled(detector.kind)?;
                effects.push(run_isolated(detector, &ctx));
            }
            effects
        };
        effects.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        Ok(AnalysisReport {
            file: IN_MEMORY_SOURCE.to_string(),
            filename: None,
            duration_seconds: round_to(buffer.duration_secs(), 2),
            sample_rate: buffer.sample_rate,
            voice_detected: f0.is_some(),
            fundamental_frequency_hz: f0.map(|f| round_to(f, 1)),
            dependencies_available: self.capabilities.availability(),
            spectral_profile,
            effects_detected: effects,
        })
    }
}

fn validate(buffer: &AudioBuffer) -> Result<()> {
    if buffer.is_empty() {
        return Err(AnalysisError::invalid_input("empty sample buffer"));
    }
    if buffer.sample_rate == 0 {
        return Err(AnalysisError::invalid_input("sample rate must be positive"));
    }
    if let Some(idx) = buffer.samples.iter().position(|s| !s.is_finite()) {
        return Err(AnalysisError::invalid_input(format!(
            "non-finite sample at index {}",
            idx
        )));
    }
    Ok(())
}
