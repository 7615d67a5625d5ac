//! Audio in, piano-cover MIDI out.

use std::{fs, path::Path};

use ndarray::{Array2, ArrayView1, ArrayView2};
use tracing::info;

use crate::config::Config;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::inference::{run_blocks, FrameOutput, OnnxTranscriber, Transcriber};
use crate::postprocessing::{
    midi::generate_midi_file_data,
    note_event_frames::output_to_notes,
    note_event_times::{note_frames_to_time, NoteEventTime},
};
use crate::preprocessing::{feature::FeaturePreprocessor, load_audio::load_audio, mel::MelSpectrogram};

pub struct Pipeline<T: Transcriber> {
    config: Config,
    mel: MelSpectrogram,
    preprocessor: FeaturePreprocessor,
    transcriber: T,
}

impl Pipeline<OnnxTranscriber> {
    /// Pipeline backed by the ONNX model at `model_path`, or the configured
    /// model when `None`.
    pub fn from_context(ctx: &Context, model_path: Option<&Path>) -> Result<Self> {
        let transcriber = match model_path {
            Some(path) => OnnxTranscriber::load(path)?,
            None => OnnxTranscriber::load(ctx.model_path())?,
        };
        Self::new(ctx.config.clone(), transcriber)
    }
}

impl<T: Transcriber> Pipeline<T> {
    pub fn new(config: Config, transcriber: T) -> Result<Self> {
        Ok(Self {
            mel: MelSpectrogram::new(&config.feature),
            preprocessor: FeaturePreprocessor::from_config(&config)?,
            config,
            transcriber,
        })
    }

    /// Log-mel feature of a WAV file, (frames, n_bins).
    pub fn wav2feature<P: AsRef<Path>>(&self, path: P) -> Result<Array2<f32>> {
        let audio = load_audio(path, self.config.feature.sr)?;
        Ok(self.mel.compute(audio.view()))
    }

    /// Frame-level model output for `feature`, trimmed to its length.
    pub fn transcribe(&self, feature: ArrayView2<f32>, style: ArrayView1<f32>) -> Result<FrameOutput> {
        let len = feature.nrows();
        let padded = self.preprocessor.preprocess(feature)?;
        let blocks = run_blocks(
            &self.transcriber,
            self.preprocessor.blocks(&padded),
            style,
            self.preprocessor.num_frame(),
            self.config.midi.num_note,
        )?;
        FrameOutput::concat(&blocks, len, self.config.midi.num_note)
    }

    pub fn feature2notes(&self, feature: ArrayView2<f32>, style: ArrayView1<f32>) -> Result<Vec<NoteEventTime>> {
        let output = self.transcribe(feature, style)?;
        let notes = output_to_notes(&output, self.config.midi.note_min, &self.config.postprocess);
        Ok(note_frames_to_time(
            &notes,
            self.config.feature.hop_sample,
            self.config.feature.sr,
        ))
    }

    /// Standard MIDI file bytes for `feature`.
    pub fn feature2midi(&self, feature: ArrayView2<f32>, style: ArrayView1<f32>) -> Result<Vec<u8>> {
        let notes = self.feature2notes(feature, style)?;
        generate_midi_file_data(&notes, self.config.midi.ticks_per_beat, self.config.midi.bpm)
    }

    /// Transcribe the WAV file at `input` into a MIDI file at `output`.
    pub fn wav2midi<P: AsRef<Path>, Q: AsRef<Path>>(&self, input: P, output: Q, style: ArrayView1<f32>) -> Result<()> {
        let feature = self.wav2feature(&input)?;
        info!(
            input = %input.as_ref().display(),
            frames = feature.nrows(),
            "extracted features"
        );

        let midi = self.feature2midi(feature.view(), style)?;

        let output = output.as_ref();
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(output, midi).map_err(Error::Io)?;
        info!(output = %output.display(), "wrote midi");
        Ok(())
    }
}
