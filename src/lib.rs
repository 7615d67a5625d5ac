//! Data and feature pipeline for piano-cover transcription.
//!
//! Pairs original songs with their piano covers, resolves every file a
//! recording owns under the dataset root, serves aligned training segments
//! and turns audio into MIDI through an ONNX transcription model.

pub mod config;
pub mod constants;
pub mod context;
pub mod dataset;
pub mod error;
pub mod inference;
pub mod paths;
pub mod pipeline;
pub mod registry;
pub mod segment;
pub mod style;
pub mod preprocessing {
    pub mod feature;
    pub mod load_audio;
    pub mod mel;
    pub mod windowed_feature;
}
pub mod postprocessing {
    pub mod midi;
    pub mod note_event_frames;
    pub mod note_event_times;
}

pub use config::Config;
pub use context::Context;
pub use dataset::{DatasetDirs, SegmentDataset, SegmentItem, SplitFilter};
pub use error::{Error, Result};
pub use paths::{PathResolver, PathSet};
pub use pipeline::Pipeline;
pub use registry::{MetadataRegistry, RegistryEntry, Split};
pub use style::{StyleTable, StyleVectorSampler};
