//! Effect detectors
//!
//! Twelve independent heuristics, each answering one question: "was this
//! effect applied to the recording, and how sure are we?". A detector reads
//! the shared [`AnalysisContext`] (buffer, capabilities and memoized
//! primitives) and returns one [`EffectResult`].
//!
//! # Scoring
//!
//! Most detectors are additive: each independent indicator that fires adds a
//! fixed weight, and the sum is capped at 0.95 so no heuristic ever claims
//! certainty. The weights are calibration defaults, not measured
//! probabilities.
//!
//! ```text
//! Confidence | Reading
//! -----------|-------------------------------
//! >= 0.5     | Likely applied
//! 0.2 - 0.5  | Possible, worth a listen
//! < 0.2      | Not detected / low confidence
//! ```
//!
//! Detectors never panic on silence or very short buffers: every ratio is
//! epsilon-guarded and thin data yields low confidence with explanatory
//! evidence. A detector that does fail is isolated by the orchestrator.

pub mod autotune;
pub mod chorus;
pub mod compression;
pub mod deessing;
pub mod delay;
pub mod distortion;
pub mod eq;
pub mod formant_shift;
pub mod noise_gate;
pub mod pitch_shift;
pub mod reverb;
pub mod vocoder;

use crate::analyzer::AnalysisContext;
use crate::error::DetectorFailure;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Confidence at which an effect is reported as detected
pub const DETECTION_THRESHOLD: f64 = 0.2;

/// Upper bound for additive detectors
pub const MAX_CONFIDENCE: f64 = 0.95;

/// The twelve effects, in declaration (and tie-break) order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Reverb,
    PitchShift,
    FormantShift,
    Compression,
    EqFiltering,
    Distortion,
    ChorusDoubling,
    AutotunePitchCorrection,
    DeEssing,
    Vocoder,
    NoiseGate,
    DelayEcho,
}

impl EffectKind {
    pub const ALL: [EffectKind; 12] = [
        EffectKind::Reverb,
        EffectKind::PitchShift,
        EffectKind::FormantShift,
        EffectKind::Compression,
        EffectKind::EqFiltering,
        EffectKind::Distortion,
        EffectKind::ChorusDoubling,
        EffectKind::AutotunePitchCorrection,
        EffectKind::DeEssing,
        EffectKind::Vocoder,
        EffectKind::NoiseGate,
        EffectKind::DelayEcho,
    ];

    /// Serialized tag, e.g. `eq_filtering`
    pub fn tag(self) -> &'static str {
        match self {
            EffectKind::Reverb => "reverb",
            EffectKind::PitchShift => "pitch_shift",
            EffectKind::FormantShift => "formant_shift",
            EffectKind::Compression => "compression",
            EffectKind::EqFiltering => "eq_filtering",
            EffectKind::Distortion => "distortion",
            EffectKind::ChorusDoubling => "chorus_doubling",
            EffectKind::AutotunePitchCorrection => "autotune_pitch_correction",
            EffectKind::DeEssing => "de_essing",
            EffectKind::Vocoder => "vocoder",
            EffectKind::NoiseGate => "noise_gate",
            EffectKind::DelayEcho => "delay_echo",
        }
    }

    /// Display name for summaries
    pub fn label(self) -> &'static str {
        match self {
            EffectKind::Reverb => "Reverb",
            EffectKind::PitchShift => "Pitch shift",
            EffectKind::FormantShift => "Formant shift",
            EffectKind::Compression => "Compression",
            EffectKind::EqFiltering => "EQ/Filtering",
            EffectKind::Distortion => "Distortion",
            EffectKind::ChorusDoubling => "Chorus/Doubling",
            EffectKind::AutotunePitchCorrection => "Auto-tune",
            EffectKind::DeEssing => "De-essing",
            EffectKind::Vocoder => "Vocoder",
            EffectKind::NoiseGate => "Noise gate",
            EffectKind::DelayEcho => "Delay/Echo",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            EffectKind::Reverb => "reverb",
            EffectKind::PitchShift => "pitch shift",
            EffectKind::FormantShift => "formant shift",
            EffectKind::Compression => "compression",
            EffectKind::EqFiltering => "EQ filtering",
            EffectKind::Distortion => "distortion",
            EffectKind::ChorusDoubling => "chorus or doubling",
            EffectKind::AutotunePitchCorrection => "pitch correction",
            EffectKind::DeEssing => "de-essing",
            EffectKind::Vocoder => "vocoding",
            EffectKind::NoiseGate => "noise gating",
            EffectKind::DelayEcho => "delay or echo",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A detector parameter value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Integer(i64),
    Text(String),
    Flag(bool),
    List(Vec<f64>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(v) => write!(f, "{}", v),
            ParamValue::Integer(v) => write!(f, "{}", v),
            ParamValue::Text(v) => f.write_str(v),
            ParamValue::Flag(v) => write!(f, "{}", v),
            ParamValue::List(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Integer(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Flag(v)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        ParamValue::List(v)
    }
}

/// One detector's hypothesis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectResult {
    pub effect: EffectKind,
    /// In [0, 1]
    pub confidence: f64,
    pub params: BTreeMap<String, ParamValue>,
    /// Human-readable reasons, never empty once finished
    pub evidence: Vec<String>,
}

impl EffectResult {
    pub fn new(effect: EffectKind) -> Self {
        Self {
            effect,
            confidence: 0.0,
            params: BTreeMap::new(),
            evidence: Vec::new(),
        }
    }

    /// Zero-confidence result for a detector that failed
    pub fn failed(effect: EffectKind, reason: &str) -> Self {
        let mut result = Self::new(effect);
        result.evidence.push(format!("error during analysis: {}", reason));
        result
    }

    pub fn param(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.params.insert(name.to_string(), value.into());
    }

    pub fn evidence(&mut self, line: impl Into<String>) {
        self.evidence.push(line.into());
    }

    /// Add a weight to an additive score
    pub fn add(&mut self, weight: f64) {
        self.confidence += weight;
    }

    /// Clamp the confidence and make sure there is at least one evidence line
    pub fn finish(mut self) -> Self {
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if self.evidence.is_empty() {
            self.evidence
                .push(format!("no significant {} detected", self.effect.noun()));
        }
        self
    }

    pub fn is_detected(&self) -> bool {
        self.confidence >= DETECTION_THRESHOLD
    }
}

pub type DetectorFn = fn(&AnalysisContext<'_>) -> Result<EffectResult, DetectorFailure>;

/// A named detector entry point
#[derive(Clone, Copy)]
pub struct Detector {
    pub kind: EffectKind,
    pub run: DetectorFn,
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector").field("kind", &self.kind).finish()
    }
}

/// Every detector, in declaration order
pub const DETECTORS: [Detector; 12] = [
    Detector {
        kind: EffectKind::Reverb,
        run: reverb::detect,
    },
    Detector {
        kind: EffectKind::PitchShift,
        run: pitch_shift::detect,
    },
    Detector {
        kind: EffectKind::FormantShift,
        run: formant_shift::detect,
    },
    Detector {
        kind: EffectKind::Compression,
        run: compression::detect,
    },
    Detector {
        kind: EffectKind::EqFiltering,
        run: eq::detect,
    },
    Detector {
        kind: EffectKind::Distortion,
        run: distortion::detect,
    },
    Detector {
        kind: EffectKind::ChorusDoubling,
        run: chorus::detect,
    },
    Detector {
        kind: EffectKind::AutotunePitchCorrection,
        run: autotune::detect,
    },
    Detector {
        kind: EffectKind::DeEssing,
        run: deessing::detect,
    },
    Detector {
        kind: EffectKind::Vocoder,
        run: vocoder::detect,
    },
    Detector {
        kind: EffectKind::NoiseGate,
        run: noise_gate::detect,
    },
    Detector {
        kind: EffectKind::DelayEcho,
        run: delay::detect,
    },
];
