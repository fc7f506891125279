//! Spectral descriptors over an STFT magnitude spectrogram
//!
//! # STFT Parameter Choices
//!
//! - **NFFT = 2048**: ~46ms windows at 44.1kHz with 1025 frequency bins,
//!   enough frequency resolution for chroma folding down to ~27 Hz.
//! - **HOP_LENGTH = 512**: 75% overlap, the conventional analysis hop for
//!   frame-level descriptor means.
//! - **Hann window**: smooth tapering keeps spectral leakage from smearing
//!   the band statistics.

use rustfft::{num_complex::Complex, FftPlanner};

/// FFT window size
pub const NFFT: usize = 2048;

/// Hop length between frames
pub const HOP_LENGTH: usize = 512;

/// Number of frequency bins in the positive-frequency half of the spectrum
pub const NUM_FREQ_BINS: usize = NFFT / 2 + 1;

/// Floor to keep logarithms and ratios away from zero
const EPSILON: f64 = 1e-10;

/// Magnitude spectrogram: one row of `NUM_FREQ_BINS` magnitudes per frame
pub struct Spectrogram {
    frames: Vec<Vec<f64>>,
    sample_rate: u32,
}

/// Compute the magnitude spectrogram of a mono signal
pub fn magnitude_spectrogram(samples: &[f32], sample_rate: u32) -> Result<Spectrogram, String> {
    if sample_rate == 0 {
        return Err("invalid sample rate".to_string());
    }
    if samples.len() < NFFT {
        return Err(format!(
            "audio too short for spectral analysis ({} samples, need {})",
            samples.len(),
            NFFT
        ));
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(NFFT);
    let window = hann_window(NFFT);

    let num_frames = (samples.len() - NFFT) / HOP_LENGTH + 1;
    let mut frames = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let start = frame_idx * HOP_LENGTH;

        let mut buffer: Vec<Complex<f32>> = samples[start..start + NFFT]
            .iter()
            .zip(window.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();

        fft.process(&mut buffer);

        let magnitudes: Vec<f64> = buffer[..NUM_FREQ_BINS]
            .iter()
            .map(|c| c.norm() as f64)
            .collect();
        frames.push(magnitudes);
    }

    Ok(Spectrogram {
        frames,
        sample_rate,
    })
}

fn hann_window(size: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (size - 1) as f32).cos()))
        .collect()
}

impl Spectrogram {
    /// Center frequency of a bin in Hz
    fn bin_frequency(&self, bin: usize) -> f64 {
        bin as f64 * self.sample_rate as f64 / NFFT as f64
    }

    /// Mean chroma energy profile: 12 pitch classes, C first.
    ///
    /// Each frame's bin energies fold onto the pitch class of their center
    /// frequency, the frame is normalized by its peak, and frames average.
    pub fn chroma_mean(&self) -> Result<Vec<f64>, String> {
        let mut sums = [0.0f64; 12];
        let mut counted_frames = 0usize;

        for frame in &self.frames {
            let mut chroma = [0.0f64; 12];
            for (bin, magnitude) in frame.iter().enumerate().skip(1) {
                let freq = self.bin_frequency(bin);
                if freq < 27.5 {
                    continue;
                }
                // MIDI note number relative to A4 = 440 Hz (note 69, class 9)
                let midi = 69.0 + 12.0 * (freq / 440.0).log2();
                let class = (midi.round() as i64).rem_euclid(12) as usize;
                chroma[class] += magnitude * magnitude;
            }

            let peak = chroma.iter().cloned().fold(0.0f64, f64::max);
            if peak <= EPSILON {
                continue;
            }
            for (sum, energy) in sums.iter_mut().zip(chroma.iter()) {
                *sum += energy / peak;
            }
            counted_frames += 1;
        }

        if counted_frames == 0 {
            return Err("signal is silent".to_string());
        }
        Ok(sums.iter().map(|s| s / counted_frames as f64).collect())
    }

    /// Mean spectral centroid in Hz
    pub fn centroid_mean(&self) -> Result<f64, String> {
        let centroids = self.frame_centroids()?;
        Ok(mean(&centroids))
    }

    /// Mean spectral bandwidth in Hz (second moment around the centroid)
    pub fn bandwidth_mean(&self) -> Result<f64, String> {
        let mut bandwidths = Vec::new();

        for frame in &self.frames {
            let total: f64 = frame.iter().sum();
            if total <= EPSILON {
                continue;
            }
            let centroid = self.frame_centroid(frame, total);
            let spread: f64 = frame
                .iter()
                .enumerate()
                .map(|(bin, m)| {
                    let deviation = self.bin_frequency(bin) - centroid;
                    m * deviation * deviation
                })
                .sum();
            bandwidths.push((spread / total).sqrt());
        }

        if bandwidths.is_empty() {
            return Err("signal is silent".to_string());
        }
        Ok(mean(&bandwidths))
    }

    /// Mean spectral contrast per band, in dB, for seven octave-spaced bands
    pub fn contrast_mean(&self) -> Result<Vec<f64>, String> {
        // Sub-band below 200 Hz, then octaves up to the Nyquist frequency
        let nyquist = self.sample_rate as f64 / 2.0;
        let edges = [
            0.0,
            200.0,
            400.0,
            800.0,
            1600.0,
            3200.0,
            6400.0,
            nyquist.max(6400.0 + 1.0),
        ];

        let mut sums = vec![0.0f64; edges.len() - 1];
        let mut counts = vec![0usize; edges.len() - 1];

        for frame in &self.frames {
            for band in 0..edges.len() - 1 {
                let power: Vec<f64> = frame
                    .iter()
                    .enumerate()
                    .filter(|(bin, _)| {
                        let freq = self.bin_frequency(*bin);
                        freq >= edges[band] && freq < edges[band + 1]
                    })
                    .map(|(_, m)| m * m)
                    .collect();
                if power.is_empty() {
                    continue;
                }

                let mut sorted = power.clone();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

                // Top and bottom 2% of bins, at least one each
                let quantile = ((sorted.len() as f64 * 0.02).ceil() as usize).max(1);
                let valley: f64 = sorted[..quantile].iter().sum::<f64>() / quantile as f64;
                let peak: f64 =
                    sorted[sorted.len() - quantile..].iter().sum::<f64>() / quantile as f64;

                let contrast_db =
                    10.0 * ((peak + EPSILON).log10() - (valley + EPSILON).log10());
                sums[band] += contrast_db;
                counts[band] += 1;
            }
        }

        if counts.iter().all(|&c| c == 0) {
            return Err("signal is silent".to_string());
        }
        Ok(sums
            .iter()
            .zip(counts.iter())
            .map(|(sum, &count)| if count > 0 { sum / count as f64 } else { 0.0 })
            .collect())
    }

    /// Mean spectral flatness: geometric over arithmetic mean of the power
    /// spectrum, 1.0 for white noise, near 0 for a pure tone
    pub fn flatness_mean(&self) -> Result<f64, String> {
        let mut flatness = Vec::new();

        for frame in &self.frames {
            let power: Vec<f64> = frame.iter().map(|m| m * m).collect();
            let arithmetic = mean(&power);
            if arithmetic <= EPSILON {
                continue;
            }
            let log_mean = power.iter().map(|p| (p + EPSILON).ln()).sum::<f64>()
                / power.len() as f64;
            flatness.push(log_mean.exp() / arithmetic);
        }

        if flatness.is_empty() {
            return Err("signal is silent".to_string());
        }
        Ok(mean(&flatness))
    }

    fn frame_centroids(&self) -> Result<Vec<f64>, String> {
        let centroids: Vec<f64> = self
            .frames
            .iter()
            .filter_map(|frame| {
                let total: f64 = frame.iter().sum();
                if total <= EPSILON {
                    None
                } else {
                    Some(self.frame_centroid(frame, total))
                }
            })
            .collect();

        if centroids.is_empty() {
            return Err("signal is silent".to_string());
        }
        Ok(centroids)
    }

    fn frame_centroid(&self, frame: &[f64], total: f64) -> f64 {
        let weighted: f64 = frame
            .iter()
            .enumerate()
            .map(|(bin, m)| self.bin_frequency(bin) * m)
            .sum();
        weighted / total
    }
}

/// Mean zero-crossing rate over analysis frames
pub fn zero_crossing_rate_mean(samples: &[f32]) -> Result<f64, String> {
    if samples.len() < NFFT {
        return Err(format!(
            "audio too short for zero-crossing analysis ({} samples, need {})",
            samples.len(),
            NFFT
        ));
    }

    let num_frames = (samples.len() - NFFT) / HOP_LENGTH + 1;
    let mut rates = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let start = frame_idx * HOP_LENGTH;
        let frame = &samples[start..start + NFFT];
        let crossings = frame
            .windows(2)
            .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
            .count();
        rates.push(crossings as f64 / frame.len() as f64);
    }

    Ok(mean(&rates))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, secs: f32, rate: u32) -> Vec<f32> {
        let n = (secs * rate as f32) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    fn noise(secs: f32, rate: u32) -> Vec<f32> {
        // Deterministic pseudo-noise, no RNG needed
        let n = (secs * rate as f32) as usize;
        let mut state = 0x2545F491u32;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                (state as f32 / u32::MAX as f32) - 0.5
            })
            .collect()
    }

    #[test]
    fn test_too_short_input_errors() {
        assert!(magnitude_spectrogram(&[0.0; 100], 22050).is_err());
        assert!(zero_crossing_rate_mean(&[0.0; 100]).is_err());
    }

    #[test]
    fn test_centroid_tracks_frequency() {
        let low = magnitude_spectrogram(&sine(220.0, 1.0, 22050), 22050).unwrap();
        let high = magnitude_spectrogram(&sine(4000.0, 1.0, 22050), 22050).unwrap();

        let low_centroid = low.centroid_mean().unwrap();
        let high_centroid = high.centroid_mean().unwrap();

        assert!(high_centroid > low_centroid);
        // A pure tone's centroid sits near the tone frequency
        assert!((low_centroid - 220.0).abs() < 150.0, "got {low_centroid}");
    }

    #[test]
    fn test_flatness_separates_tone_from_noise() {
        let tone = magnitude_spectrogram(&sine(440.0, 1.0, 22050), 22050).unwrap();
        let white = magnitude_spectrogram(&noise(1.0, 22050), 22050).unwrap();

        let tone_flatness = tone.flatness_mean().unwrap();
        let noise_flatness = white.flatness_mean().unwrap();

        assert!(noise_flatness > tone_flatness * 10.0);
        assert!(noise_flatness <= 1.0 + 1e-6);
    }

    #[test]
    fn test_chroma_peaks_at_tone_pitch_class() {
        // A4 = 440 Hz is pitch class 9
        let spec = magnitude_spectrogram(&sine(440.0, 1.0, 22050), 22050).unwrap();
        let chroma = spec.chroma_mean().unwrap();

        assert_eq!(chroma.len(), 12);
        let peak_class = chroma
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(peak_class, 9);
    }

    #[test]
    fn test_contrast_has_seven_bands() {
        let spec = magnitude_spectrogram(&noise(1.0, 22050), 22050).unwrap();
        let contrast = spec.contrast_mean().unwrap();
        assert_eq!(contrast.len(), 7);
    }

    #[test]
    fn test_bandwidth_of_tone_is_narrow() {
        let tone = magnitude_spectrogram(&sine(1000.0, 1.0, 22050), 22050).unwrap();
        let white = magnitude_spectrogram(&noise(1.0, 22050), 22050).unwrap();

        assert!(tone.bandwidth_mean().unwrap() < white.bandwidth_mean().unwrap());
    }

    #[test]
    fn test_zero_crossing_rate_tracks_frequency() {
        let slow = zero_crossing_rate_mean(&sine(100.0, 1.0, 22050)).unwrap();
        let fast = zero_crossing_rate_mean(&sine(4000.0, 1.0, 22050)).unwrap();

        assert!(fast > slow);
        // A 100 Hz tone crosses zero ~200 times per second
        let expected = 200.0 / 22050.0;
        assert!((slow - expected).abs() < expected * 0.25, "got {slow}");
    }

    #[test]
    fn test_silent_signal_errors() {
        let spec = magnitude_spectrogram(&vec![0.0f32; 22050], 22050).unwrap();
        assert!(spec.centroid_mean().is_err());
        assert!(spec.chroma_mean().is_err());
        assert!(spec.flatness_mean().is_err());
    }
}
