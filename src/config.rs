//! Typed configuration document.
//!
//! The document is JSON and is read exactly once per process. Every path in
//! the `path` section is relative to the directory holding the config file.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    DEFAULT_BPM, DEFAULT_MODEL_PATH, DEFAULT_STYLE_PATH, MIDI_OFFSET, N_PITCHES, N_VELOCITIES,
    TICKS_PER_BEAT,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub path: PathConfig,
    pub feature: FeatureConfig,
    pub input: InputConfig,
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub postprocess: PostprocessConfig,
}

/// Locations of the data managed by the crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Dataset root holding `raw/`, `synced/`, `array/` and `dataset/`.
    pub dataset: PathBuf,
    /// Metadata registry document.
    pub info: PathBuf,
    /// Exported movie listing.
    pub src: PathBuf,
    #[serde(default = "default_style_path")]
    pub style: PathBuf,
    #[serde(default = "default_model_path")]
    pub model: PathBuf,
}

fn default_style_path() -> PathBuf {
    PathBuf::from(DEFAULT_STYLE_PATH)
}

fn default_model_path() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_PATH)
}

/// Log-mel spectrogram parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub sr: u32,
    pub fft_bins: usize,
    pub window_length: usize,
    pub hop_sample: usize,
    /// Number of mel bands, i.e. the width of every feature frame.
    pub n_bins: usize,
    pub log_offset: f32,
}

/// Input geometry of the model: blocks of `num_frame` frames surrounded by
/// `margin_b` leading and `margin_f` trailing context frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub num_frame: usize,
    pub margin_b: usize,
    pub margin_f: usize,
    /// Fill value used for silence and padding.
    pub min_value: f32,
}

impl InputConfig {
    pub fn block_len(&self) -> usize {
        self.margin_b + self.num_frame + self.margin_f
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    pub note_min: usize,
    pub num_note: usize,
    pub num_velocity: usize,
    pub ticks_per_beat: u16,
    pub bpm: u32,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            note_min: MIDI_OFFSET,
            num_note: N_PITCHES,
            num_velocity: N_VELOCITIES,
            ticks_per_beat: TICKS_PER_BEAT,
            bpm: DEFAULT_BPM,
        }
    }
}

/// Thresholds used when decoding model output into notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostprocessConfig {
    pub onset_threshold: f32,
    pub offset_threshold: f32,
    pub frame_threshold: f32,
    pub min_note_frames: usize,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            onset_threshold: 0.5,
            offset_threshold: 0.5,
            frame_threshold: 0.5,
            min_note_frames: 1,
        }
    }
}

impl Config {
    /// Read and validate the configuration document at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::from_io_at(e, path))?;
        let config = Self::from_json(&text)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let feature = &self.feature;
        if feature.sr == 0 || feature.hop_sample == 0 || feature.fft_bins == 0 {
            return Err(Error::Config(
                "feature.sr, feature.hop_sample and feature.fft_bins must be positive".into(),
            ));
        }
        if feature.window_length == 0 || feature.window_length > feature.fft_bins {
            return Err(Error::Config(format!(
                "feature.window_length must be in 1..={}, got {}",
                feature.fft_bins, feature.window_length
            )));
        }
        if feature.n_bins == 0 {
            return Err(Error::Config("feature.n_bins must be positive".into()));
        }
        if self.input.num_frame == 0 {
            return Err(Error::Config("input.num_frame must be positive".into()));
        }
        if self.midi.num_note == 0 || self.midi.note_min + self.midi.num_note > 128 {
            return Err(Error::Config(format!(
                "midi note range {}..{} does not fit in 0..128",
                self.midi.note_min,
                self.midi.note_min + self.midi.num_note
            )));
        }
        if self.midi.num_velocity == 0 || self.midi.num_velocity > N_VELOCITIES {
            return Err(Error::Config(format!(
                "midi.num_velocity must be in 1..={}",
                N_VELOCITIES
            )));
        }
        if self.midi.bpm == 0 || self.midi.ticks_per_beat == 0 {
            return Err(Error::Config("midi.bpm and midi.ticks_per_beat must be positive".into()));
        }
        Ok(())
    }
}
