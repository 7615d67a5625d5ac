// Files
pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_STYLE_PATH: &str = "style.json";
pub const DEFAULT_MODEL_PATH: &str = "model.onnx";
pub const DEFAULT_OUTPUT_PATH: &str = "output.mid";

// Dataset layout
pub const DATASET_SUBDIR: &str = "dataset";
pub const SPEC_SUBDIR: &str = "spec";
pub const LABEL_SUBDIR: &str = "label";
pub const PIANO_SUBDIR: &str = "piano";
pub const RAW_KIND: &str = "raw";
pub const SYNCED_KIND: &str = "synced";
pub const ARRAY_KIND: &str = "array";

// Extensions
pub const WAV_EXT: &str = "wav";
pub const MIDI_EXT: &str = "mid";
pub const ARRAY_EXT: &str = "npy";
pub const ARCHIVE_EXT: &str = "npz";

// Label streams stored in a piano-cover archive
pub const ONSET_KEY: &str = "onset";
pub const OFFSET_KEY: &str = "offset";
pub const FRAME_KEY: &str = "frame";
pub const VELOCITY_KEY: &str = "velocity";

// MIDI Conversion
pub const MIDI_OFFSET: usize = 21;
pub const N_PITCHES: usize = 88;
pub const N_VELOCITIES: usize = 128;
pub const TICKS_PER_BEAT: u16 = 480;
pub const DEFAULT_BPM: u32 = 120;
