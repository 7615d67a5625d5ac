//! Training segments.
//!
//! Labels live in `<dataset>/dataset/label/<piano_id>_<n>.npz` and carry the
//! onset, offset, frame and velocity streams of one piano-cover segment.
//! The matching input is the *original* recording's spectrogram segment,
//! `<dataset>/dataset/spec/<original_id>_<n>.npy`. Every item joins the two
//! through the registry and adds the piano cover's style vector.

use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
    str::FromStr,
};

use ndarray::{Array1, Array2};
use ndarray_npy::{NpzReader, ReadNpyExt, ReadNpzError, ReadableElement};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::constants::{
    ARCHIVE_EXT, ARRAY_EXT, DATASET_SUBDIR, FRAME_KEY, LABEL_SUBDIR, OFFSET_KEY, ONSET_KEY,
    SPEC_SUBDIR, VELOCITY_KEY,
};
use crate::error::{Error, Result};
use crate::registry::{MetadataRegistry, Split};
use crate::segment::SegmentName;
use crate::style::StyleVectorSampler;

/// Which segments a dataset exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitFilter {
    Train,
    Test,
    All,
}

impl SplitFilter {
    fn split(&self) -> Option<Split> {
        match self {
            SplitFilter::Train => Some(Split::Train),
            SplitFilter::Test => Some(Split::Test),
            SplitFilter::All => None,
        }
    }
}

impl FromStr for SplitFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(SplitFilter::Train),
            "test" => Ok(SplitFilter::Test),
            "all" => Ok(SplitFilter::All),
            other => Err(Error::InvalidArgument(format!(
                "invalid value for split: '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatasetDirs {
    pub spec: PathBuf,
    pub label: PathBuf,
}

impl DatasetDirs {
    pub fn new(dataset_root: &Path) -> Self {
        let base = dataset_root.join(DATASET_SUBDIR);
        Self {
            spec: base.join(SPEC_SUBDIR),
            label: base.join(LABEL_SUBDIR),
        }
    }
}

/// One training example.
#[derive(Debug, Clone)]
pub struct SegmentItem {
    /// Spectrogram of the original recording, (frames, n_bins).
    pub spec: Array2<f32>,
    pub style: Array1<f32>,
    pub onset: Array2<f32>,
    pub offset: Array2<f32>,
    pub frame: Array2<f32>,
    /// Velocity class per frame and pitch.
    pub velocity: Array2<i64>,
}

#[derive(Debug)]
struct Segment {
    path: PathBuf,
    name: SegmentName,
}

/// Read-only view over the label segments of one split.
///
/// `get` touches only the two files of the requested segment, so distinct
/// indices may be loaded from several threads at once.
pub struct SegmentDataset<'a> {
    dirs: DatasetDirs,
    registry: &'a MetadataRegistry,
    sampler: &'a dyn StyleVectorSampler,
    segments: Vec<Segment>,
}

impl<'a> SegmentDataset<'a> {
    /// Enumerate the label segments and keep those in `split`.
    ///
    /// Cross-references to spectrogram files are not checked here; use
    /// [`SegmentDataset::open_validated`] to fail before training starts.
    pub fn open(
        dirs: DatasetDirs,
        registry: &'a MetadataRegistry,
        sampler: &'a dyn StyleVectorSampler,
        split: SplitFilter,
    ) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&dirs.label)
            .map_err(|e| Error::from_io_at(e, &dirs.label))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        paths.retain(|p| p.is_file() && p.extension().is_some_and(|ext| ext == ARCHIVE_EXT));
        paths.sort();

        let mut segments = Vec::with_capacity(paths.len());
        for path in paths {
            let name = SegmentName::from_path(&path)?;
            if let Some(split) = split.split() {
                if registry.get(&name.id)?.split != split {
                    continue;
                }
            }
            segments.push(Segment { path, name });
        }

        debug!(
            label_dir = %dirs.label.display(),
            ?split,
            segments = segments.len(),
            "opened segment dataset"
        );

        Ok(Self {
            dirs,
            registry,
            sampler,
            segments,
        })
    }

    /// [`SegmentDataset::open`] followed by [`SegmentDataset::validate`].
    pub fn open_validated(
        dirs: DatasetDirs,
        registry: &'a MetadataRegistry,
        sampler: &'a dyn StyleVectorSampler,
        split: SplitFilter,
    ) -> Result<Self> {
        let dataset = Self::open(dirs, registry, sampler, split)?;
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &SegmentName> {
        self.segments.iter().map(|s| &s.name)
    }

    /// Spectrogram file paired with the label segment `name`.
    pub fn spec_path(&self, name: &SegmentName) -> Result<PathBuf> {
        let id_orig = self.registry.piano_to_original(&name.id)?;
        Ok(self.dirs.spec.join(name.file_name_for(id_orig, ARRAY_EXT)))
    }

    /// Check every segment's registry entry, style vector and spectrogram
    /// file, reporting all dangling references at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems: Vec<String> = self
            .segments
            .par_iter()
            .filter_map(|segment| {
                let spec_path = match self.spec_path(&segment.name) {
                    Ok(path) => path,
                    Err(e) => return Some(format!("{}: {}", segment.name, e)),
                };
                if !spec_path.is_file() {
                    return Some(format!("{}: missing {}", segment.name, spec_path.display()));
                }
                if let Err(e) = self.sampler.sample_for_id(&segment.name.id) {
                    return Some(format!("{}: {}", segment.name, e));
                }
                None
            })
            .collect();

        if problems.is_empty() {
            info!(segments = self.segments.len(), "segment dataset validated");
            return Ok(());
        }

        problems.sort();
        warn!(dangling = problems.len(), "segment dataset has dangling references");
        Err(Error::not_found("segment cross-reference", problems.join("; ")))
    }

    /// Load segment `idx`: the original's spectrogram, the cover's style
    /// vector and the cover's label streams.
    pub fn get(&self, idx: usize) -> Result<SegmentItem> {
        let segment = self.segments.get(idx).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "segment index {} out of range for {} segments",
                idx,
                self.segments.len()
            ))
        })?;

        let spec = read_spec(&self.spec_path(&segment.name)?)?;
        let label = read_label(&segment.path)?;
        let style = self.sampler.sample_for_id(&segment.name.id)?;

        Ok(SegmentItem {
            spec,
            style,
            onset: label.onset,
            offset: label.offset,
            frame: label.frame,
            velocity: label.velocity,
        })
    }
}

struct Label {
    onset: Array2<f32>,
    offset: Array2<f32>,
    frame: Array2<f32>,
    velocity: Array2<i64>,
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::from_io_at(e, path))
}

fn read_spec(path: &Path) -> Result<Array2<f32>> {
    let bytes = read_bytes(path)?;
    if let Ok(spec) = Array2::<f32>::read_npy(bytes.as_slice()) {
        return Ok(spec);
    }
    Ok(Array2::<f64>::read_npy(bytes.as_slice())?.mapv(|v| v as f32))
}

type Npz = NpzReader<Cursor<Vec<u8>>>;

fn member<A: ReadableElement>(npz: &mut Npz, name: &str) -> std::result::Result<Array2<A>, ReadNpzError> {
    npz.by_name(name)
}

/// Archive member for `key`, stored either as `key` or `key.npy`.
fn member_name(names: &[String], key: &str) -> Option<String> {
    let suffixed = format!("{}.{}", key, ARRAY_EXT);
    names.iter().find(|n| **n == suffixed || *n == key).cloned()
}

/// Probability-like stream; float, integer and bool payloads are accepted.
fn read_stream(npz: &mut Npz, name: &str) -> Result<Array2<f32>> {
    if let Ok(a) = member::<f32>(npz, name) {
        return Ok(a);
    }
    if let Ok(a) = member::<f64>(npz, name) {
        return Ok(a.mapv(|v| v as f32));
    }
    if let Ok(a) = member::<bool>(npz, name) {
        return Ok(a.mapv(|v| if v { 1.0 } else { 0.0 }));
    }
    if let Ok(a) = member::<i8>(npz, name) {
        return Ok(a.mapv(f32::from));
    }
    Ok(member::<u8>(npz, name)?.mapv(f32::from))
}

fn read_classes(npz: &mut Npz, name: &str) -> Result<Array2<i64>> {
    if let Ok(a) = member::<i64>(npz, name) {
        return Ok(a);
    }
    if let Ok(a) = member::<i32>(npz, name) {
        return Ok(a.mapv(i64::from));
    }
    if let Ok(a) = member::<i16>(npz, name) {
        return Ok(a.mapv(i64::from));
    }
    if let Ok(a) = member::<i8>(npz, name) {
        return Ok(a.mapv(i64::from));
    }
    if let Ok(a) = member::<u8>(npz, name) {
        return Ok(a.mapv(i64::from));
    }
    Ok(member::<f32>(npz, name)?.mapv(|v| v.round() as i64))
}

fn read_label(path: &Path) -> Result<Label> {
    let mut npz = NpzReader::new(Cursor::new(read_bytes(path)?))?;
    let names = npz.names()?;
    let lookup = |key: &str| {
        member_name(&names, key)
            .ok_or_else(|| Error::not_found("label stream", format!("{}:{}", path.display(), key)))
    };

    Ok(Label {
        onset: read_stream(&mut npz, &lookup(ONSET_KEY)?)?,
        offset: read_stream(&mut npz, &lookup(OFFSET_KEY)?)?,
        frame: read_stream(&mut npz, &lookup(FRAME_KEY)?)?,
        velocity: read_classes(&mut npz, &lookup(VELOCITY_KEY)?)?,
    })
}
