use std::{fs, path::Path};

use hound::{SampleFormat, WavSpec, WavWriter};
use midly::{MidiMessage, Smf, TrackEventKind};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::{rngs::StdRng, SeedableRng};
use serde_json::{json, Value};
use tempfile::TempDir;

use piano_cover_rust::inference::{FrameOutput, Transcriber};
use piano_cover_rust::{Context, Error, Pipeline, Split, StyleTable, StyleVectorSampler};

const CONFIG: &str = r#"{
    "path": {"dataset": "data", "info": "data/info.json", "src": "data/movies.json"},
    "feature": {"sr": 16000, "fft_bins": 512, "window_length": 400, "hop_sample": 160, "n_bins": 16, "log_offset": 1e-8},
    "input": {"num_frame": 32, "margin_b": 4, "margin_f": 4, "min_value": -18.0},
    "midi": {"note_min": 21, "num_note": 88}
}"#;

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("data")).unwrap();
    fs::write(dir.path().join("config.json"), CONFIG).unwrap();
    fs::write(
        dir.path().join("data/info.json"),
        serde_json::to_string_pretty(&json!({
            "coverA_0": {"original": "trackX", "title": "T", "split": "train", "include_dataset": true},
            "coverB": {"original": "trackX", "title": "T", "split": "test", "include_dataset": true, "source": "upload"},
            "coverC": {"original": "trackY", "title": "U", "split": "train", "include_dataset": false}
        }))
        .unwrap(),
    )
    .unwrap();
    fs::write(
        dir.path().join("style.json"),
        serde_json::to_string(&json!({
            "ids": {"coverA_0": [0.1, 0.2], "coverB": [0.3, 0.4]},
            "profiles": {"level1": {"mean": [0.0, 0.0], "std": [0.0, 0.0]}, "level2": {"mean": [1.0, 1.0], "std": [0.2, 0.2]}}
        }))
        .unwrap(),
    )
    .unwrap();
    dir
}

#[test]
fn test_context_resolves_against_config_dir() {
    let dir = workspace();
    let ctx = Context::load(dir.path().join("config.json")).unwrap();

    assert_eq!(ctx.registry.len(), 3);
    assert_eq!(ctx.dataset_root(), dir.path().join("data"));
    assert_eq!(ctx.dataset_dirs().label, dir.path().join("data/dataset/label"));
    assert_eq!(ctx.style_path(), dir.path().join("style.json"));
    assert_eq!(ctx.preprocessor().unwrap().num_frame(), 32);
}

#[test]
fn test_registry_scenario() {
    let dir = workspace();
    let ctx = Context::load(dir.path().join("config.json")).unwrap();

    assert_eq!(ctx.registry.get_ids(Split::Train, false), vec!["coverA_0", "coverC"]);
    assert_eq!(ctx.registry.piano_to_original("coverA_0").unwrap(), "trackX");
    assert_eq!(
        ctx.registry.get("coverB").unwrap().extra.get("source"),
        Some(&json!("upload"))
    );

    let resolver = ctx.path_resolver();
    let paths = resolver.resolve("coverA_0", false).unwrap();
    assert!(paths.array.ends_with("T/piano/coverA_0.npz"));
    assert!(paths.array.starts_with(dir.path().join("data/array")));
    assert_eq!(
        resolver.resolve("coverA_0", true).unwrap().array,
        dir.path().join("data/array/T/trackX.npy")
    );
}

#[test]
fn test_export_writes_configured_listing() {
    let dir = workspace();
    let ctx = Context::load(dir.path().join("config.json")).unwrap();
    ctx.registry.export(ctx.export_path()).unwrap();

    let written: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("data/movies.json")).unwrap())
            .unwrap();
    assert_eq!(
        written,
        json!({"T": {"original": "trackX", "pianos": ["coverA_0", "coverB"]}})
    );
}

#[test]
fn test_missing_config() {
    let dir = TempDir::new().unwrap();
    let err = Context::load(dir.path().join("config.json")).err().unwrap();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[test]
fn test_malformed_registry() {
    let dir = workspace();
    fs::write(
        dir.path().join("data/info.json"),
        r#"{"coverA_0": {"original": "trackX", "title": "T", "split": "valid"}}"#,
    )
    .unwrap();
    let err = Context::load(dir.path().join("config.json")).err().unwrap();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn test_style_table_from_file() {
    let dir = workspace();
    let ctx = Context::load(dir.path().join("config.json")).unwrap();
    let styles = StyleTable::load(ctx.style_path()).unwrap();

    assert_eq!(styles.dim(), 2);
    assert_eq!(styles.sample_for_id("coverB").unwrap().to_vec(), vec![0.3, 0.4]);
    assert_eq!(styles.profiles().collect::<Vec<_>>(), vec!["level1", "level2"]);
    let v = styles.sample("level1", &mut StdRng::seed_from_u64(1)).unwrap();
    assert_eq!(v.to_vec(), vec![0.0, 0.0]);
}

/// Strikes middle C at the first frame of every block.
struct MiddleC;

impl Transcriber for MiddleC {
    fn transcribe_block(&self, block: ArrayView2<f32>, _style: ArrayView1<f32>) -> piano_cover_rust::Result<FrameOutput> {
        assert_eq!(block.dim(), (40, 16));
        let mut output = FrameOutput {
            onset: Array2::zeros((32, 88)),
            offset: Array2::zeros((32, 88)),
            frame: Array2::zeros((32, 88)),
            velocity: Array2::zeros((32, 88)),
        };
        let c4 = 60 - 21;
        output.onset[[0, c4]] = 0.9;
        for t in 1..8 {
            output.frame[[t, c4]] = 0.9;
        }
        output.velocity[[0, c4]] = 80;
        Ok(output)
    }
}

fn write_tone(path: &Path, seconds: f32) {
    let spec = WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    let n = (16000.0 * seconds) as usize;
    for i in 0..n {
        let t = i as f32 / 16000.0;
        writer
            .write_sample(((2.0 * std::f32::consts::PI * 261.63 * t).sin() * 8000.0) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn test_wav2midi_end_to_end() {
    let dir = workspace();
    let ctx = Context::load(dir.path().join("config.json")).unwrap();
    let input = dir.path().join("song.wav");
    write_tone(&input, 0.5);

    let pipeline = Pipeline::new(ctx.config.clone(), MiddleC).unwrap();
    let feature = pipeline.wav2feature(&input).unwrap();
    // 8000 samples at hop 160
    assert_eq!(feature.dim(), (51, 16));
    assert!(feature.iter().all(|v| v.is_finite()));

    let output = dir.path().join("out/song.mid");
    pipeline.wav2midi(&input, &output, Array1::zeros(2).view()).unwrap();

    let data = fs::read(&output).unwrap();
    let smf = Smf::parse(&data).unwrap();
    let note_ons: Vec<u8> = smf.tracks[0]
        .iter()
        .filter_map(|e| match e.kind {
            TrackEventKind::Midi { message: MidiMessage::NoteOn { key, .. }, .. } => Some(key.as_int()),
            _ => None,
        })
        .collect();
    // 51 frames span two 32-frame blocks
    assert_eq!(note_ons, vec![60, 60]);
}
