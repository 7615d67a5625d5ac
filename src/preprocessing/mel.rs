use std::{f32::consts::PI, sync::Arc};

use ndarray::{Array1, Array2, ArrayView1};
use rustfft::{num_complex::Complex32, Fft, FftPlanner};

use crate::config::FeatureConfig;

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// Periodic Hann window of `win_length` samples, zero-padded to `n_fft` and
/// centered.
fn hann_window(win_length: usize, n_fft: usize) -> Vec<f32> {
    let offset = (n_fft - win_length) / 2;
    let mut window = vec![0.0; n_fft];
    for n in 0..win_length {
        window[offset + n] = 0.5 - 0.5 * (2.0 * PI * n as f32 / win_length as f32).cos();
    }
    window
}

/// Triangular HTK mel filterbank of shape (n_mels, n_fft / 2 + 1) spanning
/// 0 Hz to Nyquist.
fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Array2<f32> {
    let n_freqs = n_fft / 2 + 1;
    let nyquist = sample_rate as f32 / 2.0;
    let all_freqs: Vec<f32> = (0..n_freqs)
        .map(|i| i as f32 * nyquist / (n_freqs - 1).max(1) as f32)
        .collect();

    let mel_max = hz_to_mel(nyquist);
    let f_pts: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
        .collect();

    Array2::from_shape_fn((n_mels, n_freqs), |(m, k)| {
        let f = all_freqs[k];
        let down = (f - f_pts[m]) / (f_pts[m + 1] - f_pts[m]);
        let up = (f_pts[m + 2] - f) / (f_pts[m + 2] - f_pts[m + 1]);
        down.min(up).max(0.0)
    })
}

/// Log-mel spectrogram extractor.
pub struct MelSpectrogram {
    n_fft: usize,
    hop: usize,
    log_offset: f32,
    window: Vec<f32>,
    filterbank: Array2<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl MelSpectrogram {
    pub fn new(feature: &FeatureConfig) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            n_fft: feature.fft_bins,
            hop: feature.hop_sample,
            log_offset: feature.log_offset,
            window: hann_window(feature.window_length, feature.fft_bins),
            filterbank: mel_filterbank(feature.sr, feature.fft_bins, feature.n_bins),
            fft: planner.plan_fft_forward(feature.fft_bins),
        }
    }

    /// Compute `ln(mel + log_offset)` for every hop of `audio`. Frames are
    /// centered, so the output has `1 + len / hop` rows of `n_bins` values.
    pub fn compute(&self, audio: ArrayView1<f32>) -> Array2<f32> {
        let pad = self.n_fft / 2;
        let mut padded = vec![0.0; audio.len() + self.n_fft];
        for (dst, &src) in padded[pad..pad + audio.len()].iter_mut().zip(audio.iter()) {
            *dst = src;
        }

        let n_frames = 1 + audio.len() / self.hop;
        let n_mels = self.filterbank.nrows();
        let mut output = Array2::<f32>::zeros((n_frames, n_mels));
        let mut buffer = vec![Complex32::new(0.0, 0.0); self.n_fft];

        for frame_idx in 0..n_frames {
            let start = frame_idx * self.hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex32::new(padded[start + i] * self.window[i], 0.0);
            }

            self.fft.process(&mut buffer);

            let power: Array1<f32> = buffer[..self.n_fft / 2 + 1]
                .iter()
                .map(|c| c.norm_sqr())
                .collect();
            let mel = self.filterbank.dot(&power);
            output
                .row_mut(frame_idx)
                .assign(&mel.mapv(|v| (v + self.log_offset).ln()));
        }

        output
    }
}
