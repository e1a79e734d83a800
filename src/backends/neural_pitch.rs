//! CREPE pitch tracker via ONNX Runtime
//!
//! CREPE classifies each 1024-sample frame at 16 kHz into 360 pitch bins
//! spaced 20 cents apart. A Viterbi pass over the whole activation matrix
//! picks one bin per frame, so single-frame octave errors do not break the
//! contour. The estimate is the activation-weighted mean of the bins around
//! that bin, and the peak activation doubles as the voicing confidence.
//!
//! The session is loaded from the path in `VOCALSCOPE_CREPE_MODEL`.
//! `Session::run` needs `&mut self`, so the session sits behind a `Mutex`
//! and concurrent detectors take turns.

use super::{BackendOutcome, PitchTracker};
use crate::audio::AudioBuffer;
use crate::dsp::pitch::PitchContour;
use crate::dsp::resample;
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;

/// Environment variable naming the CREPE `.onnx` file
pub const MODEL_ENV_VAR: &str = "VOCALSCOPE_CREPE_MODEL";

const MODEL_SAMPLE_RATE: u32 = 16000;
const FRAME_SIZE: usize = 1024;
/// 10 ms at 16 kHz
const HOP_SIZE: usize = 160;
const NUM_BINS: usize = 360;
const CENTS_OFFSET: f64 = 1997.379_408_437_619_1;
const CENTS_PER_BIN: f64 = 20.0;
/// Bins either side of the path bin used for the weighted mean
const LOCAL_WINDOW: usize = 4;
/// Transition weight is `TRANSITION_WIDTH - |step|`, zero beyond
const TRANSITION_WIDTH: usize = 12;
/// Probability mass on "the argmax bin is the true bin"
const SELF_EMISSION: f64 = 0.1;
const BATCH_SIZE: usize = 256;
const INPUT_NAME: &str = "frames";
/// Frames at or below this activation are treated as unvoiced
pub const CONFIDENCE_THRESHOLD: f64 = 0.5;

pub struct CrepePitchTracker {
    session: Mutex<Session>,
}

impl CrepePitchTracker {
    /// Load the model named by [`MODEL_ENV_VAR`]
    pub fn from_env() -> Result<Self, String> {
        let path = std::env::var(MODEL_ENV_VAR).map_err(|_| format!("{} not set", MODEL_ENV_VAR))?;
        Self::from_file(Path::new(&path))
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Err(format!("CREPE model not found: {:?}", path));
        }
        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| format!("Failed to load CREPE model: {}", e))?;
        log::info!("Loaded CREPE model from {:?}", path);
        Ok(Self {
            session: Mutex::new(session),
        })
    }

    fn run_batch(&self, frames: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, String> {
        let mut flat = Vec::with_capacity(frames.len() * FRAME_SIZE);
        for frame in frames {
            flat.extend_from_slice(frame);
        }
        let input = Array2::from_shape_vec((frames.len(), FRAME_SIZE), flat)
            .map_err(|e| format!("CREPE input shape error: {}", e))?;
        let input_tensor =
            Tensor::from_array(input).map_err(|e| format!("CREPE tensor creation error: {}", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| "CREPE session lock poisoned".to_string())?;
        let outputs = session
            .run(ort::inputs![INPUT_NAME => input_tensor])
            .map_err(|e| format!("CREPE inference error: {}", e))?;

        let (_, value) = outputs.iter().next().ok_or("CREPE produced no output")?;
        let (_shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| format!("CREPE output extraction error: {}", e))?;

        if data.len() != frames.len() * NUM_BINS {
            return Err(format!(
                "CREPE output has {} values, expected {}",
                data.len(),
                frames.len() * NUM_BINS
            ));
        }
        Ok(data.chunks(NUM_BINS).map(|c| c.to_vec()).collect())
    }
}

/// Centered frames at 10 ms hop, each normalized to zero mean and unit variance
fn frame_signal(samples: &[f64]) -> Vec<Vec<f32>> {
    let pad = FRAME_SIZE / 2;
    let num_frames = 1 + samples.len() / HOP_SIZE;
    (0..num_frames)
        .map(|i| {
            let center = i * HOP_SIZE;
            let frame: Vec<f64> = (0..FRAME_SIZE)
                .map(|j| {
                    (center + j)
                        .checked_sub(pad)
                        .and_then(|idx| samples.get(idx))
                        .copied()
                        .unwrap_or(0.0)
                })
                .collect();
            let mean = frame.iter().sum::<f64>() / FRAME_SIZE as f64;
            let std = (frame.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>()
                / FRAME_SIZE as f64)
                .sqrt()
                .max(1e-8);
            frame.iter().map(|x| ((x - mean) / std) as f32).collect()
        })
        .collect()
}

fn argmax_bin(activation: &[f32]) -> Option<(usize, f32)> {
    activation
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

/// Weighted-average pitch (Hz) over the bins around `center`
fn local_average_f0(activation: &[f32], center: usize) -> f64 {
    let lo = center.saturating_sub(LOCAL_WINDOW);
    let hi = (center + LOCAL_WINDOW + 1).min(activation.len());

    let mut weight_sum = 0.0;
    let mut cents_sum = 0.0;
    for (i, &a) in activation.iter().enumerate().take(hi).skip(lo) {
        let cents = CENTS_OFFSET + CENTS_PER_BIN * i as f64;
        weight_sum += a as f64;
        cents_sum += a as f64 * cents;
    }
    if weight_sum <= 0.0 {
        return 0.0;
    }
    10.0 * 2f64.powf(cents_sum / weight_sum / 1200.0)
}

/// Weighted-average pitch (Hz) and confidence from one activation vector
pub fn decode_activation(activation: &[f32]) -> (f64, f64) {
    match argmax_bin(activation) {
        Some((center, peak)) => (local_average_f0(activation, center), peak as f64),
        None => (0.0, 0.0),
    }
}

/// Most likely bin sequence through a run of activation frames
///
/// Hidden states are the 360 pitch bins. A step may move at most
/// `TRANSITION_WIDTH - 1` bins (triangular weights, rows normalized), and each
/// frame's argmax bin is observed with probability `SELF_EMISSION` of being
/// the true state. An isolated octave error costs two large jumps, so the
/// path stays on the surrounding contour.
pub fn viterbi_path(activations: &[Vec<f32>]) -> Vec<usize> {
    if activations.is_empty() {
        return Vec::new();
    }
    let observations: Vec<usize> = activations
        .iter()
        .map(|a| argmax_bin(a).map_or(0, |(bin, _)| bin))
        .collect();

    let uniform = (1.0 - SELF_EMISSION) / NUM_BINS as f64;
    let log_hit = (SELF_EMISSION + uniform).ln();
    let log_miss = uniform.ln();
    let emission = |state: usize, observed: usize| {
        if state == observed {
            log_hit
        } else {
            log_miss
        }
    };

    let max_step = TRANSITION_WIDTH - 1;
    let row_log_sum: Vec<f64> = (0..NUM_BINS)
        .map(|from| {
            let lo = from.saturating_sub(max_step);
            let hi = (from + max_step).min(NUM_BINS - 1);
            let sum: usize = (lo..=hi).map(|to| TRANSITION_WIDTH - from.abs_diff(to)).sum();
            (sum as f64).ln()
        })
        .collect();
    let step_log: Vec<f64> = (0..TRANSITION_WIDTH)
        .map(|d| ((TRANSITION_WIDTH - d) as f64).ln())
        .collect();

    let mut score: Vec<f64> = (0..NUM_BINS)
        .map(|s| -(NUM_BINS as f64).ln() + emission(s, observations[0]))
        .collect();
    let mut backpointers = vec![vec![0u16; NUM_BINS]; observations.len()];

    for (t, &observed) in observations.iter().enumerate().skip(1) {
        let mut next = vec![f64::NEG_INFINITY; NUM_BINS];
        for (to, slot) in next.iter_mut().enumerate() {
            let lo = to.saturating_sub(max_step);
            let hi = (to + max_step).min(NUM_BINS - 1);
            let mut best = f64::NEG_INFINITY;
            let mut best_from = to;
            for from in lo..=hi {
                let candidate = score[from] + step_log[from.abs_diff(to)] - row_log_sum[from];
                if candidate > best {
                    best = candidate;
                    best_from = from;
                }
            }
            *slot = best + emission(to, observed);
            backpointers[t][to] = best_from as u16;
        }
        score = next;
    }

    let mut state = score
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map_or(0, |(bin, _)| bin);
    let mut path = vec![0usize; observations.len()];
    for t in (0..observations.len()).rev() {
        path[t] = state;
        state = backpointers[t][state] as usize;
    }
    path
}

impl PitchTracker for CrepePitchTracker {
    fn name(&self) -> &'static str {
        "crepe"
    }

    fn try_track(&self, buffer: &AudioBuffer) -> BackendOutcome<PitchContour> {
        let resampled = match resample(&buffer.samples, buffer.sample_rate, MODEL_SAMPLE_RATE) {
            Ok(samples) => samples,
            Err(e) => return BackendOutcome::Failed(e.to_string()),
        };
        let frames = frame_signal(&resampled);

        let mut activations = Vec::with_capacity(frames.len());
        for batch in frames.chunks(BATCH_SIZE) {
            match self.run_batch(batch) {
                Ok(batch_activations) => activations.extend(batch_activations),
                Err(reason) => return BackendOutcome::Failed(reason),
            }
        }
        BackendOutcome::Ready(decode_contour(&activations))
    }
}

/// Viterbi-smoothed contour from per-frame activations
///
/// The path picks the bin, the local average refines it, and the raw peak
/// activation stays the voicing confidence.
pub fn decode_contour(activations: &[Vec<f32>]) -> PitchContour {
    let path = viterbi_path(activations);
    let mut contour = PitchContour::default();
    for (frame_idx, (activation, &bin)) in activations.iter().zip(&path).enumerate() {
        let f0 = local_average_f0(activation, bin);
        let confidence = argmax_bin(activation).map_or(0.0, |(_, peak)| peak as f64);
        contour
            .times
            .push((frame_idx * HOP_SIZE) as f64 / MODEL_SAMPLE_RATE as f64);
        contour
            .f0
            .push((confidence > CONFIDENCE_THRESHOLD).then_some(f0));
        contour.confidence.push(confidence.clamp(0.0, 1.0));
    }
    contour
}
