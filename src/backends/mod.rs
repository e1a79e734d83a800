//! Capability backends
//!
//! Two analyses depend on machinery that may not be present in every build:
//! formant extraction and high-precision pitch tracking. Each one sits behind
//! a trait so detectors only see the trait, and a missing backend is a
//! [`CapabilityState`], not an error.
//!
//! ```text
//! Backend                 | Feature        | Fallback
//! ------------------------|----------------|---------------------------
//! Baseline pitch tracker  | (always)       | -
//! LPC formant extractor   | formants       | formant detectors degrade
//! CREPE pitch tracker     | neural-pitch   | baseline pitch tracker
//! ```
//!
//! Availability is probed once per process by [`Capabilities::detect`].

pub mod formant;
#[cfg(feature = "neural-pitch")]
pub mod neural_pitch;

use crate::audio::AudioBuffer;
use crate::dsp::pitch::{self, PitchContour};
use serde::Serialize;
use std::sync::{Arc, OnceLock};

pub use formant::{FormantTrack, LpcFormantExtractor};

/// Whether a backend can be used in this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityState {
    Available,
    Unavailable,
}

impl CapabilityState {
    pub fn is_available(self) -> bool {
        matches!(self, CapabilityState::Available)
    }
}

/// Result of asking a backend for an estimate
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOutcome<T> {
    Ready(T),
    /// The backend is not present in this build or process
    Unavailable(String),
    /// The backend is present but failed on this input
    Failed(String),
}

impl<T> BackendOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            BackendOutcome::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, BackendOutcome::Ready(_))
    }
}

/// F0 tracking backend
pub trait PitchTracker: Send + Sync {
    /// Get the name of this tracker (for logging)
    fn name(&self) -> &'static str;

    fn state(&self) -> CapabilityState {
        CapabilityState::Available
    }

    /// Track F0 over the whole buffer
    fn try_track(&self, buffer: &AudioBuffer) -> BackendOutcome<PitchContour>;
}

/// Formant (F1-F3) extraction backend
pub trait FormantExtractor: Send + Sync {
    /// Get the name of this extractor (for logging)
    fn name(&self) -> &'static str;

    fn state(&self) -> CapabilityState {
        CapabilityState::Available
    }

    fn try_extract(&self, buffer: &AudioBuffer) -> BackendOutcome<FormantTrack>;
}

/// Autocorrelation pitch tracker, always available
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselinePitchTracker;

impl PitchTracker for BaselinePitchTracker {
    fn name(&self) -> &'static str {
        "autocorrelation"
    }

    fn try_track(&self, buffer: &AudioBuffer) -> BackendOutcome<PitchContour> {
        BackendOutcome::Ready(pitch::track(&buffer.samples, buffer.sample_rate))
    }
}

/// Availability summary, serialized into every report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AvailableCapabilities {
    pub pitch_tracker_advanced: bool,
    pub formant_extractor: bool,
}

impl AvailableCapabilities {
    /// Names of the backends that are not available
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.pitch_tracker_advanced {
            missing.push("pitch_tracker_advanced");
        }
        if !self.formant_extractor {
            missing.push("formant_extractor");
        }
        missing
    }
}

/// The set of optional backends an analysis may use
#[derive(Clone, Default)]
pub struct Capabilities {
    advanced_pitch: Option<Arc<dyn PitchTracker>>,
    formants: Option<Arc<dyn FormantExtractor>>,
}

static DETECTED: OnceLock<Capabilities> = OnceLock::new();

impl Capabilities {
    /// Every backend this build and process can provide (probed once)
    pub fn detect() -> Self {
        DETECTED.get_or_init(Self::probe).clone()
    }

    fn probe() -> Self {
        let mut caps = Self::baseline_only();

        if formant::is_compiled_in() {
            caps.formants = Some(Arc::new(LpcFormantExtractor::new()));
        }

        #[cfg(feature = "neural-pitch")]
        match neural_pitch::CrepePitchTracker::from_env() {
            Ok(tracker) => caps.advanced_pitch = Some(Arc::new(tracker)),
            Err(reason) => log::info!("CREPE pitch tracker unavailable: {}", reason),
        }

        let available = caps.availability();
        log::info!(
            "Backends: formant extractor = {}, advanced pitch tracker = {}",
            available.formant_extractor,
            available.pitch_tracker_advanced
        );
        caps
    }

    /// Baseline pitch tracking only; no optional backend
    pub fn baseline_only() -> Self {
        Self::default()
    }

    pub fn with_formant_extractor(mut self, extractor: Arc<dyn FormantExtractor>) -> Self {
        self.formants = Some(extractor);
        self
    }

    pub fn with_advanced_pitch_tracker(mut self, tracker: Arc<dyn PitchTracker>) -> Self {
        self.advanced_pitch = Some(tracker);
        self
    }

    pub fn without_formants(mut self) -> Self {
        self.formants = None;
        self
    }

    pub fn without_advanced_pitch(mut self) -> Self {
        self.advanced_pitch = None;
        self
    }

    pub fn formant_extractor(&self) -> Option<&dyn FormantExtractor> {
        self.formants
            .as_deref()
            .filter(|f| f.state().is_available())
    }

    pub fn advanced_pitch_tracker(&self) -> Option<&dyn PitchTracker> {
        self.advanced_pitch
            .as_deref()
            .filter(|p| p.state().is_available())
    }

    pub fn availability(&self) -> AvailableCapabilities {
        AvailableCapabilities {
            pitch_tracker_advanced: self.advanced_pitch_tracker().is_some(),
            formant_extractor: self.formant_extractor().is_some(),
        }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("advanced_pitch", &self.advanced_pitch.as_ref().map(|p| p.name()))
            .field("formants", &self.formants.as_ref().map(|e| e.name()))
            .finish()
    }
}

/// Availability of the optional backends in this process
pub fn available_capabilities() -> AvailableCapabilities {
    Capabilities::detect().availability()
}
