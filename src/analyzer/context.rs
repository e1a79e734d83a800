//! Per-buffer analysis context
//!
//! Several detectors need the same STFT, RMS envelope or pitch contour.
//! The context computes each primitive on first use and hands out shared
//! references afterwards. `OnceLock` makes the first access race-free when
//! detectors run on the rayon pool.

use crate::audio::AudioBuffer;
use crate::backends::{BackendOutcome, Capabilities, FormantTrack};
use crate::dsp::pitch::{self, PitchContour};
use crate::dsp::{compute_profile, rms_envelope, SpectralProfile, Stft};
use std::sync::OnceLock;

/// Frame/hop for energy and shape features
pub const FRAME: usize = 2048;
pub const HOP: usize = 512;
/// Frame/hop for harmonic analysis
pub const HARMONIC_FRAME: usize = 4096;
pub const HARMONIC_HOP: usize = 1024;

pub struct AnalysisContext<'a> {
    buffer: &'a AudioBuffer,
    capabilities: &'a Capabilities,
    stft: OnceLock<Stft>,
    harmonic_stft: OnceLock<Stft>,
    rms: OnceLock<Vec<f64>>,
    baseline_pitch: OnceLock<PitchContour>,
    advanced_pitch: OnceLock<Option<PitchContour>>,
    formants: OnceLock<BackendOutcome<FormantTrack>>,
    profile: OnceLock<SpectralProfile>,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(buffer: &'a AudioBuffer, capabilities: &'a Capabilities) -> Self {
        Self {
            buffer,
            capabilities,
            stft: OnceLock::new(),
            harmonic_stft: OnceLock::new(),
            rms: OnceLock::new(),
            baseline_pitch: OnceLock::new(),
            advanced_pitch: OnceLock::new(),
            formants: OnceLock::new(),
            profile: OnceLock::new(),
        }
    }

    pub fn buffer(&self) -> &AudioBuffer {
        self.buffer
    }

    pub fn samples(&self) -> &[f64] {
        &self.buffer.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.capabilities
    }

    /// 2048/512 STFT with phase
    pub fn stft(&self) -> &Stft {
        self.stft.get_or_init(|| {
            Stft::compute_with_phase(self.samples(), self.sample_rate(), FRAME, HOP)
        })
    }

    /// 4096/1024 STFT (magnitudes only)
    pub fn harmonic_stft(&self) -> &Stft {
        self.harmonic_stft.get_or_init(|| {
            Stft::compute(
                self.samples(),
                self.sample_rate(),
                HARMONIC_FRAME,
                HARMONIC_HOP,
            )
        })
    }

    /// 2048/512 RMS envelope (linear)
    pub fn rms(&self) -> &[f64] {
        self.rms
            .get_or_init(|| rms_envelope(self.samples(), FRAME, HOP))
    }

    pub fn baseline_pitch(&self) -> &PitchContour {
        self.baseline_pitch
            .get_or_init(|| pitch::track(self.samples(), self.sample_rate()))
    }

    /// Contour from the advanced tracker, if one is available and succeeded
    pub fn advanced_pitch(&self) -> Option<&PitchContour> {
        self.advanced_pitch
            .get_or_init(|| {
                let tracker = self.capabilities.advanced_pitch_tracker()?;
                match tracker.try_track(self.buffer) {
                    BackendOutcome::Ready(contour) => Some(contour),
                    BackendOutcome::Unavailable(reason) => {
                        log::debug!("{} pitch tracker unavailable: {}", tracker.name(), reason);
                        None
                    }
                    BackendOutcome::Failed(reason) => {
                        log::warn!(
                            "{} pitch tracker failed, using baseline: {}",
                            tracker.name(),
                            reason
                        );
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Median F0 from the best available tracker
    ///
    /// When the advanced tracker ran, its answer stands even if it has too
    /// few confident frames; the baseline is only used when it did not run.
    pub fn preferred_f0(&self) -> Option<f64> {
        match self.advanced_pitch() {
            Some(contour) => contour.median_f0(),
            None => self.baseline_pitch().median_f0(),
        }
    }

    pub fn formants(&self) -> &BackendOutcome<FormantTrack> {
        self.formants.get_or_init(|| match self.capabilities.formant_extractor() {
            Some(extractor) => {
                let outcome = extractor.try_extract(self.buffer);
                if let BackendOutcome::Failed(ref reason) = outcome {
                    log::warn!("{} formant extractor failed: {}", extractor.name(), reason);
                }
                outcome
            }
            None => BackendOutcome::Unavailable("no formant extractor".to_string()),
        })
    }

    pub fn profile(&self) -> &SpectralProfile {
        self.profile.get_or_init(|| compute_profile(self.stft()))
    }
}
