//! Short-time Fourier transform
//!
//! Frames are Hann-windowed and not centered: frame `i` covers samples
//! `[i * hop, i * hop + n_fft)`. A signal shorter than `n_fft` is zero-padded
//! into a single frame. Magnitudes are raw (unnormalized) FFT magnitudes.

use super::hanning_window;
use rustfft::{num_complex::Complex, FftPlanner};

#[derive(Debug, Clone)]
pub struct Stft {
    pub n_fft: usize,
    pub hop: usize,
    pub sample_rate: u32,
    /// `[frame][bin]`, `n_fft / 2 + 1` bins per frame
    pub magnitudes: Vec<Vec<f64>>,
    /// `[frame][bin]` phase in radians, only kept when requested
    pub phases: Option<Vec<Vec<f64>>>,
}

impl Stft {
    /// Magnitude-only transform
    pub fn compute(samples: &[f64], sample_rate: u32, n_fft: usize, hop: usize) -> Self {
        Self::transform(samples, sample_rate, n_fft, hop, false)
    }

    /// Transform keeping per-bin phase as well
    pub fn compute_with_phase(samples: &[f64], sample_rate: u32, n_fft: usize, hop: usize) -> Self {
        Self::transform(samples, sample_rate, n_fft, hop, true)
    }

    fn transform(
        samples: &[f64],
        sample_rate: u32,
        n_fft: usize,
        hop: usize,
        keep_phase: bool,
    ) -> Self {
        let hop = hop.max(1);
        let num_bins = n_fft / 2 + 1;
        let num_frames = if samples.len() <= n_fft {
            1
        } else {
            (samples.len() - n_fft) / hop + 1
        };

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n_fft);
        let window = hanning_window(n_fft);

        let mut magnitudes = Vec::with_capacity(num_frames);
        let mut phases = if keep_phase {
            Some(Vec::with_capacity(num_frames))
        } else {
            None
        };
        let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];

        for i in 0..num_frames {
            let start = i * hop;
            for (j, slot) in buffer.iter_mut().enumerate() {
                let sample = samples.get(start + j).copied().unwrap_or(0.0);
                *slot = Complex::new(sample * window[j], 0.0);
            }

            fft.process(&mut buffer);

            magnitudes.push(buffer[..num_bins].iter().map(|c| c.norm()).collect());
            if let Some(ref mut phases) = phases {
                phases.push(buffer[..num_bins].iter().map(|c| c.arg()).collect());
            }
        }

        Self {
            n_fft,
            hop,
            sample_rate,
            magnitudes,
            phases,
        }
    }

    pub fn num_frames(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Frequency in Hz of a bin
    pub fn bin_frequency(&self, bin: usize) -> f64 {
        bin as f64 * self.sample_rate as f64 / self.n_fft as f64
    }

    pub fn frequencies(&self) -> Vec<f64> {
        (0..self.num_bins()).map(|b| self.bin_frequency(b)).collect()
    }

    /// Bins with frequency strictly inside `(low_hz, high_hz)`
    pub fn bins_between(&self, low_hz: f64, high_hz: f64) -> Vec<usize> {
        (0..self.num_bins())
            .filter(|&b| {
                let f = self.bin_frequency(b);
                f > low_hz && f < high_hz
            })
            .collect()
    }

    /// Bin closest to a frequency
    pub fn nearest_bin(&self, freq_hz: f64) -> usize {
        let bin = (freq_hz * self.n_fft as f64 / self.sample_rate as f64).round();
        (bin.max(0.0) as usize).min(self.num_bins() - 1)
    }

    /// Mean magnitude per bin across all frames
    pub fn average_spectrum(&self) -> Vec<f64> {
        let mut avg = vec![0.0; self.num_bins()];
        for frame in &self.magnitudes {
            for (a, &m) in avg.iter_mut().zip(frame.iter()) {
                *a += m;
            }
        }
        let n = self.num_frames().max(1) as f64;
        avg.iter_mut().for_each(|v| *v /= n);
        avg
    }

    /// Per-frame mean magnitude over a set of bins
    pub fn band_envelope(&self, bins: &[usize]) -> Vec<f64> {
        if bins.is_empty() {
            return vec![0.0; self.num_frames()];
        }
        self.magnitudes
            .iter()
            .map(|frame| bins.iter().map(|&b| frame[b]).sum::<f64>() / bins.len() as f64)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: u32, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    #[test]
    fn test_frame_count() {
        let stft = Stft::compute(&vec![0.0; 22050], 22050, 2048, 512);
        assert_eq!(stft.num_frames(), (22050 - 2048) / 512 + 1);
        assert_eq!(stft.num_bins(), 1025);
        assert!(stft.phases.is_none());
    }

    #[test]
    fn test_short_signal_single_frame() {
        let stft = Stft::compute(&[0.5; 100], 22050, 2048, 512);
        assert_eq!(stft.num_frames(), 1);
    }

    #[test]
    fn test_sine_peak_bin() {
        // 1000 Hz at 22050 Hz with 2048-point FFT: bin ≈ 92.9
        let stft = Stft::compute(&sine(1000.0, 22050, 22050), 22050, 2048, 512);
        let avg = stft.average_spectrum();
        let peak = avg
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert!(
            (stft.bin_frequency(peak) - 1000.0).abs() < 15.0,
            "peak at {} Hz",
            stft.bin_frequency(peak)
        );
    }

    #[test]
    fn test_phase_kept_when_requested() {
        let stft = Stft::compute_with_phase(&sine(440.0, 22050, 8192), 22050, 2048, 512);
        let phases = stft.phases.as_ref().unwrap();
        assert_eq!(phases.len(), stft.num_frames());
        assert!(phases[0]
            .iter()
            .all(|&p| p >= -std::f64::consts::PI && p <= std::f64::consts::PI));
    }

    #[test]
    fn test_bins_between_is_exclusive() {
        let stft = Stft::compute(&[0.0; 4096], 4096, 4096, 1024);
        // 1 Hz per bin
        let bins = stft.bins_between(10.0, 13.0);
        assert_eq!(bins, vec![11, 12]);
        assert_eq!(stft.nearest_bin(10.4), 10);
    }
}
