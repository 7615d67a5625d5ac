use std::path::Path;

use hound::{SampleFormat, WavReader};
use ndarray::Array1;
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use tracing::debug;

use crate::error::{Error, Result};

/// Read a WAV file as mono samples in [-1, 1], averaging all channels.
fn read_mono<P: AsRef<Path>>(path: P) -> Result<(Vec<f64>, u32)> {
    let path = path.as_ref();
    let reader = WavReader::open(path).map_err(|e| match e {
        hound::Error::IoError(io) => Error::from_io_at(io, path),
        other => Error::Wav(other),
    })?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f64> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let max_sample_value = 2.0_f64.powi(spec.bits_per_sample as i32 - 1);
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f64 / max_sample_value))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    // If it's not mono, average the channels of every frame
    let mono = interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f64>() / channels as f64)
        .collect();

    Ok((mono, spec.sample_rate))
}

/// Load a WAV file as mono audio resampled to `target_sample_rate`.
pub fn load_audio<P: AsRef<Path>>(path: P, target_sample_rate: u32) -> Result<Array1<f32>> {
    let (samples, sample_rate) = read_mono(&path)?;
    debug!(
        path = %path.as_ref().display(),
        sample_rate,
        samples = samples.len(),
        "decoded audio"
    );

    if sample_rate == target_sample_rate || samples.is_empty() {
        return Ok(samples.into_iter().map(|s| s as f32).collect());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let resample_ratio = target_sample_rate as f64 / sample_rate as f64;
    let mut resampler = SincFixedIn::<f64>::new(resample_ratio, 2.0, params, samples.len(), 1)?;
    let channel_resampled_data = resampler.process(&[samples], None)?;

    // Convert the channel data vector into a single Array1<f32> for further processing
    Ok(channel_resampled_data[0].iter().map(|&s| s as f32).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::TempDir;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, samples: &[i16]) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_stereo_is_averaged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, 16000, &[16384, 0, -16384, -16384]);

        let audio = load_audio(&path, 16000).unwrap();
        assert_eq!(audio.len(), 2);
        assert!((audio[0] - 0.25).abs() < 1e-6);
        assert!((audio[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_resampling_changes_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mono.wav");
        let samples: Vec<i16> = (0..8000).map(|i| ((i as f32 * 0.05).sin() * 8000.0) as i16).collect();
        write_wav(&path, 1, 8000, &samples);

        let audio = load_audio(&path, 16000).unwrap();
        assert!(audio.len() > 8000);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load_audio(dir.path().join("nope.wav"), 16000).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
