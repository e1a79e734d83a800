//! Audio buffers and the file loader
//!
//! The pipeline itself only ever sees an [`AudioBuffer`]. [`load_file`] is the
//! thin loader used by the binary: it decodes anything symphonia can probe
//! (MP3, FLAC, WAV, OGG, AAC), downmixes to mono and optionally resamples to
//! the analysis rate.

use crate::dsp::resample;
use crate::error::{AnalysisError, Result};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Rate the detector heuristics were calibrated at
pub const DEFAULT_ANALYSIS_RATE: u32 = 22050;

/// Decoded mono audio, borrowed read-only by every stage of the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Mono samples, nominally in [-1.0, 1.0]
    pub samples: Vec<f64>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Build a buffer from `f32` samples (the usual decoder output)
    pub fn from_f32(samples: &[f32], sample_rate: u32) -> Self {
        Self::new(samples.iter().map(|&s| s as f64).collect(), sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds (0.0 for a zero sample rate)
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Band-limited resample to `target_rate`, returning a new buffer
    pub fn resampled(&self, target_rate: u32) -> Result<AudioBuffer> {
        if target_rate == 0 || target_rate == self.sample_rate || self.sample_rate == 0 {
            return Ok(self.clone());
        }
        Ok(AudioBuffer::new(
            resample(&self.samples, self.sample_rate, target_rate)?,
            target_rate,
        ))
    }
}

/// Decode an audio file into a mono buffer
///
/// `target_rate` of `None` keeps the file's native sample rate.
pub fn load_file<P: AsRef<Path>>(path: P, target_rate: Option<u32>) -> Result<AudioBuffer> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();
    let decoder_opts = DecoderOptions::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| AnalysisError::decode(path, e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| AnalysisError::decode(path, "no default audio track"))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AnalysisError::decode(path, "unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &decoder_opts)
        .map_err(|e| AnalysisError::decode(path, e.to_string()))?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(_) => break,
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(_) => {
                skipped_packets += 1;
                continue;
            }
        };

        let needs_buffer = sample_buf
            .as_ref()
            .map(|buf| buf.capacity() < decoded.capacity() * decoded.spec().channels.count())
            .unwrap_or(true);
        if needs_buffer {
            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;
            sample_buf = Some(SampleBuffer::new(duration, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            let channel_count = decoded.spec().channels.count().max(1);
            buf.copy_interleaved_ref(decoded);

            for chunk in buf.samples().chunks(channel_count) {
                let mono: f64 =
                    chunk.iter().map(|&s| s as f64).sum::<f64>() / channel_count as f64;
                samples.push(mono);
            }
        }
    }

    if skipped_packets > 0 {
        log::warn!(
            "{}: skipped {} undecodable packet(s)",
            path.display(),
            skipped_packets
        );
    }

    if samples.is_empty() {
        return Err(AnalysisError::decode(path, "no audio samples decoded"));
    }

    log::debug!(
        "Decoded {}: {} samples at {} Hz",
        path.display(),
        samples.len(),
        sample_rate
    );

    let buffer = AudioBuffer::new(samples, sample_rate);
    Ok(match target_rate {
        Some(rate) => buffer.resampled(rate)?,
        None => buffer,
    })
}
