//! Style vectors: the conditioning signal fed to the model next to the
//! spectrogram.
//!
//! Training asks for the vector of a known piano cover; inference asks for a
//! named profile (e.g. `level2`) and draws a vector from it.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use ndarray::Array1;
use rand::RngCore;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub trait StyleVectorSampler: Send + Sync {
    /// Length shared by every vector this sampler returns.
    fn dim(&self) -> usize;

    /// Deterministic style of a known piano-cover recording.
    fn sample_for_id(&self, piano_id: &str) -> Result<Array1<f32>>;

    /// Draw a vector from a named profile.
    fn sample(&self, profile: &str, rng: &mut dyn RngCore) -> Result<Array1<f32>>;
}

/// Per-dimension Gaussian describing a style category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleProfile {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StyleDocument {
    #[serde(default)]
    ids: HashMap<String, Vec<f32>>,
    #[serde(default)]
    profiles: BTreeMap<String, StyleProfile>,
}

/// Style vectors backed by a JSON table of per-id vectors and named profiles.
#[derive(Debug)]
pub struct StyleTable {
    dim: usize,
    ids: HashMap<String, Vec<f32>>,
    profiles: BTreeMap<String, StyleProfile>,
}

impl StyleTable {
    pub fn new(
        ids: HashMap<String, Vec<f32>>,
        profiles: BTreeMap<String, StyleProfile>,
    ) -> Result<Self> {
        let dim = ids
            .values()
            .map(Vec::len)
            .chain(profiles.values().map(|p| p.mean.len()))
            .next()
            .unwrap_or(0);

        for (id, vector) in &ids {
            if vector.len() != dim {
                return Err(Error::InvalidArgument(format!(
                    "style vector for '{}' has length {}, expected {}",
                    id,
                    vector.len(),
                    dim
                )));
            }
        }
        for (name, profile) in &profiles {
            if profile.mean.len() != dim || profile.std.len() != dim {
                return Err(Error::InvalidArgument(format!(
                    "style profile '{}' must have mean and std of length {}",
                    name, dim
                )));
            }
            if profile.std.iter().any(|s| !s.is_finite() || *s < 0.0) {
                return Err(Error::InvalidArgument(format!(
                    "style profile '{}' has a negative or non-finite std",
                    name
                )));
            }
        }

        Ok(Self { dim, ids, profiles })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::from_io_at(e, path))?;
        let doc: StyleDocument = serde_json::from_str(&text)?;
        let table = Self::new(doc.ids, doc.profiles)?;
        debug!(
            path = %path.display(),
            ids = table.ids.len(),
            profiles = table.profiles.len(),
            dim = table.dim,
            "loaded style table"
        );
        Ok(table)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

impl StyleVectorSampler for StyleTable {
    fn dim(&self) -> usize {
        self.dim
    }

    fn sample_for_id(&self, piano_id: &str) -> Result<Array1<f32>> {
        self.ids
            .get(piano_id)
            .map(|v| Array1::from(v.clone()))
            .ok_or_else(|| Error::not_found("style vector", piano_id))
    }

    fn sample(&self, profile: &str, rng: &mut dyn RngCore) -> Result<Array1<f32>> {
        let profile = self
            .profiles
            .get(profile)
            .ok_or_else(|| Error::not_found("style profile", profile))?;

        profile
            .mean
            .iter()
            .zip(profile.std.iter())
            .map(|(&mean, &std)| {
                let normal = Normal::new(mean, std)
                    .map_err(|e| Error::InvalidArgument(e.to_string()))?;
                Ok(normal.sample(&mut *rng))
            })
            .collect::<Result<Vec<f32>>>()
            .map(Array1::from)
    }
}
