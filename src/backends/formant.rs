//! LPC formant extractor
//!
//! Linear prediction models each short frame as an all-pole filter; the
//! peaks of the filter's magnitude response are the vocal-tract resonances.
//!
//! Per 25 ms frame (10 ms hop):
//! 1. Pre-emphasis `y[n] = x[n] - a·x[n-1]` with `a = exp(-2π·50/sr)`
//! 2. Hamming window
//! 3. Autocorrelation up to the LPC order, Levinson-Durbin recursion
//! 4. Evaluate `1/|A(e^jω)|` on a 1024-point grid and pick its peaks
//!
//! The lowest three peaks become F1-F3, each kept only inside its plausible
//! range. Silent frames produce no formants.

use super::{BackendOutcome, CapabilityState, FormantExtractor};
use crate::audio::AudioBuffer;
use crate::dsp::stats::median;
use crate::dsp::{hamming_window, rms, EPSILON};
use rustfft::{num_complex::Complex, FftPlanner};

pub const FRAME_SECS: f64 = 0.025;
pub const HOP_SECS: f64 = 0.010;
const PRE_EMPHASIS_HZ: f64 = 50.0;
const ENVELOPE_POINTS: usize = 1024;
const MIN_ORDER: usize = 8;
const MAX_ORDER: usize = 24;
/// Peaks below this are DC / glottal tilt, not formants
const MIN_PEAK_HZ: f64 = 90.0;
const SILENCE_RMS: f64 = 1e-4;
/// Envelope ripple smaller than this is not a resonance
const MIN_PROMINENCE_DB: f64 = 1.0;

pub const F1_RANGE: (f64, f64) = (200.0, 1200.0);
pub const F2_RANGE: (f64, f64) = (600.0, 3500.0);
pub const F3_RANGE: (f64, f64) = (1500.0, 5000.0);

/// Whether the formant extractor is offered by [`super::Capabilities::detect`]
pub fn is_compiled_in() -> bool {
    cfg!(feature = "formants")
}

/// Per-frame formant estimates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormantTrack {
    pub times: Vec<f64>,
    pub f1: Vec<Option<f64>>,
    pub f2: Vec<Option<f64>>,
    pub f3: Vec<Option<f64>>,
}

fn median_of(series: &[Option<f64>]) -> Option<f64> {
    let values: Vec<f64> = series.iter().flatten().copied().collect();
    median(&values)
}

impl FormantTrack {
    pub fn num_frames(&self) -> usize {
        self.times.len()
    }

    pub fn median_f1(&self) -> Option<f64> {
        median_of(&self.f1)
    }

    pub fn median_f2(&self) -> Option<f64> {
        median_of(&self.f2)
    }

    pub fn median_f3(&self) -> Option<f64> {
        median_of(&self.f3)
    }

    /// Valid F1 values among the first `max_frames` frames
    pub fn f1_series(&self, max_frames: usize) -> Vec<f64> {
        self.f1.iter().take(max_frames).flatten().copied().collect()
    }
}

/// LPC order for a sample rate: two poles per kHz plus two, bounded
pub fn lpc_order(sample_rate: u32) -> usize {
    (2 + sample_rate as usize / 1000).clamp(MIN_ORDER, MAX_ORDER)
}

/// Levinson-Durbin recursion
///
/// Takes autocorrelation `r[0..=order]` and returns the prediction polynomial
/// `[1, a1, .., a_order]`, or `None` if the frame has no energy or the
/// recursion becomes unstable.
pub fn levinson_durbin(r: &[f64], order: usize) -> Option<Vec<f64>> {
    if r.len() <= order || r[0] <= EPSILON {
        return None;
    }
    let mut a = vec![0.0; order + 1];
    a[0] = 1.0;
    let mut error = r[0];

    for i in 1..=order {
        let acc: f64 = (1..i).map(|j| a[j] * r[i - j]).sum::<f64>() + r[i];
        let k = -acc / error;
        if !k.is_finite() || k.abs() >= 1.0 {
            return None;
        }
        let previous = a.clone();
        for j in 1..i {
            a[j] = previous[j] + k * previous[i - j];
        }
        a[i] = k;
        error *= 1.0 - k * k;
        if error <= EPSILON * r[0] {
            break;
        }
    }
    Some(a)
}

/// Height of a peak above the higher of the valleys on either side
fn prominence(envelope: &[f64], peak: usize) -> f64 {
    let height = envelope[peak];
    let mut left = height;
    for &v in envelope[..peak].iter().rev() {
        if v > height {
            break;
        }
        left = left.min(v);
    }
    let mut right = height;
    for &v in &envelope[peak + 1..] {
        if v > height {
            break;
        }
        right = right.min(v);
    }
    height - left.max(right)
}

fn autocorrelate(frame: &[f64], max_lag: usize) -> Vec<f64> {
    (0..=max_lag)
        .map(|lag| {
            frame
                .iter()
                .zip(frame.iter().skip(lag))
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect()
}

/// Formant extraction by linear prediction
pub struct LpcFormantExtractor {
    envelope_points: usize,
}

impl LpcFormantExtractor {
    pub fn new() -> Self {
        Self {
            envelope_points: ENVELOPE_POINTS,
        }
    }

    /// LPC envelope peaks of one frame, in Hz, ascending
    pub fn frame_resonances(&self, frame: &[f64], sample_rate: u32) -> Vec<f64> {
        let sr = sample_rate as f64;
        let order = lpc_order(sample_rate);
        if frame.len() <= order {
            return Vec::new();
        }

        let coeff = (-2.0 * std::f64::consts::PI * PRE_EMPHASIS_HZ / sr).exp();
        let window = hamming_window(frame.len());
        let emphasized: Vec<f64> = (0..frame.len())
            .map(|i| {
                let prev = if i > 0 { frame[i - 1] } else { 0.0 };
                (frame[i] - coeff * prev) * window[i]
            })
            .collect();

        let r = autocorrelate(&emphasized, order);
        let Some(a) = levinson_durbin(&r, order) else {
            return Vec::new();
        };

        let n = self.envelope_points;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);
        let mut buffer: Vec<Complex<f64>> = (0..n)
            .map(|i| Complex::new(a.get(i).copied().unwrap_or(0.0), 0.0))
            .collect();
        fft.process(&mut buffer);

        let envelope: Vec<f64> = buffer[..=n / 2]
            .iter()
            .map(|c| -20.0 * c.norm().max(EPSILON).log10())
            .collect();

        let hz_per_bin = sr / n as f64;
        (1..envelope.len() - 1)
            .filter(|&i| envelope[i] > envelope[i - 1] && envelope[i] >= envelope[i + 1])
            .filter(|&i| prominence(&envelope, i) >= MIN_PROMINENCE_DB)
            .map(|i| {
                let (l, c, r) = (envelope[i - 1], envelope[i], envelope[i + 1]);
                let denom = l - 2.0 * c + r;
                let shift = if denom.abs() > EPSILON {
                    (0.5 * (l - r) / denom).clamp(-0.5, 0.5)
                } else {
                    0.0
                };
                (i as f64 + shift) * hz_per_bin
            })
            .filter(|&f| f >= MIN_PEAK_HZ)
            .collect()
    }

    /// Run over a whole buffer
    pub fn extract(&self, samples: &[f64], sample_rate: u32) -> FormantTrack {
        let sr = sample_rate as f64;
        let frame_len = ((FRAME_SECS * sr).round() as usize).max(1);
        let hop = ((HOP_SECS * sr).round() as usize).max(1);
        let num_frames = if samples.len() <= frame_len {
            1
        } else {
            (samples.len() - frame_len) / hop + 1
        };

        let in_range = |value: Option<&f64>, (lo, hi): (f64, f64)| {
            value.copied().filter(|&f| f > lo && f < hi)
        };

        let mut track = FormantTrack::default();
        let mut frame = vec![0.0; frame_len];
        for i in 0..num_frames {
            let start = i * hop;
            for (j, slot) in frame.iter_mut().enumerate() {
                *slot = samples.get(start + j).copied().unwrap_or(0.0);
            }
            track.times.push((start + frame_len / 2) as f64 / sr);

            if rms(&frame) < SILENCE_RMS {
                track.f1.push(None);
                track.f2.push(None);
                track.f3.push(None);
                continue;
            }

            let peaks = self.frame_resonances(&frame, sample_rate);
            track.f1.push(in_range(peaks.first(), F1_RANGE));
            track.f2.push(in_range(peaks.get(1), F2_RANGE));
            track.f3.push(in_range(peaks.get(2), F3_RANGE));
        }
        track
    }
}

impl Default for LpcFormantExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormantExtractor for LpcFormantExtractor {
    fn name(&self) -> &'static str {
        "lpc"
    }

    fn state(&self) -> CapabilityState {
        CapabilityState::Available
    }

    fn try_extract(&self, buffer: &AudioBuffer) -> BackendOutcome<FormantTrack> {
        if buffer.is_empty() || buffer.sample_rate == 0 {
            return BackendOutcome::Failed("empty buffer".to_string());
        }
        BackendOutcome::Ready(self.extract(&buffer.samples, buffer.sample_rate))
    }
}
