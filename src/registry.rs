//! Metadata registry: maps every piano-cover recording to its original
//! recording, a shared title and a train/test split.
//!
//! The backing document is a JSON object keyed by piano-cover id. Every
//! persisting mutation rewrites the whole document through a temporary file
//! that is renamed over the target, so readers never see a torn write. The
//! registry is single-writer: two processes mutating the same document race
//! and the last rewrite wins.

use std::{
    collections::{BTreeMap, HashSet},
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Train/test partition label. An entry is always exactly one of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Split::Train),
            "test" => Ok(Split::Test),
            other => Err(Error::InvalidArgument(format!(
                "split must be 'train' or 'test', got '{}'",
                other
            ))),
        }
    }
}

/// One piano-cover recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Id of the original recording this piano cover is based on.
    pub original: String,
    /// Track title, shared with the original and all its covers. Used as a
    /// path segment on disk.
    pub title: String,
    pub split: Split,
    /// Whether the cover appears in the exported listing.
    #[serde(default)]
    pub include_dataset: bool,
    /// Free-form fields carried through load/save untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegistryEntry {
    pub fn new(original: impl Into<String>, title: impl Into<String>, split: Split) -> Self {
        Self {
            original: original.into(),
            title: title.into(),
            split,
            include_dataset: false,
            extra: Map::new(),
        }
    }

    pub fn with_include_dataset(mut self, include: bool) -> Self {
        self.include_dataset = include;
        self
    }
}

/// A track in the exported listing: its original id and every included
/// piano cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieListing {
    pub original: String,
    pub pianos: Vec<String>,
}

/// Fields every entry must carry.
const REQUIRED_FIELDS: [&str; 3] = ["original", "title", "split"];

#[derive(Debug)]
pub struct MetadataRegistry {
    path: PathBuf,
    entries: BTreeMap<String, RegistryEntry>,
    /// New ids set field by field that still lack a required field.
    drafts: BTreeMap<String, Map<String, Value>>,
}

impl MetadataRegistry {
    /// Load the registry document at `path`, creating an empty one if it does
    /// not exist yet. Every entry is validated here.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let text = fs::read_to_string(&path)?;
            let entries: BTreeMap<String, RegistryEntry> =
                serde_json::from_str(&text).map_err(|e| {
                    Error::InvalidArgument(format!(
                        "malformed registry {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            debug!(path = %path.display(), entries = entries.len(), "loaded registry");
            entries
        } else {
            let entries = BTreeMap::new();
            write_json_atomic(&path, &entries)?;
            info!(path = %path.display(), "created empty registry");
            entries
        };

        Ok(Self {
            path,
            entries,
            drafts: BTreeMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True for complete entries and for ids still being built.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id) || self.drafts.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    /// Complete entry for `id`. An id still missing required fields is
    /// `InvalidArgument`.
    pub fn get(&self, id: &str) -> Result<&RegistryEntry> {
        if let Some(entry) = self.entries.get(id) {
            return Ok(entry);
        }
        match self.drafts.get(id) {
            Some(draft) => Err(incomplete(id, draft)),
            None => Err(Error::not_found("registry entry", id)),
        }
    }

    /// Insert or replace a complete entry.
    ///
    /// If persisting fails the registry is restored to its previous state.
    pub fn insert(&mut self, id: &str, entry: RegistryEntry, persist: bool) -> Result<()> {
        let previous = self.entries.insert(id.to_string(), entry);
        let draft = self.drafts.remove(id);
        if persist {
            if let Err(e) = self.save() {
                match previous {
                    Some(previous) => self.entries.insert(id.to_string(), previous),
                    None => self.entries.remove(id),
                };
                if let Some(draft) = draft {
                    self.drafts.insert(id.to_string(), draft);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Set a single field of `id`, creating the id if it is missing.
    ///
    /// See [`MetadataRegistry::update`].
    pub fn set(&mut self, id: &str, key: &str, value: Value, persist: bool) -> Result<()> {
        let mut fields = Map::new();
        fields.insert(key.to_string(), value);
        self.update(id, fields, persist)
    }

    /// Merge `fields` into the entry for `id` and rewrite the document once.
    ///
    /// An existing entry is re-validated after the merge: an unknown split
    /// value is `InvalidArgument` and leaves the registry untouched. A new id
    /// is held as a draft until `original`, `title` and `split` are all set;
    /// drafts are invisible to lookups and cannot be persisted. A failed
    /// persist restores the previous state.
    pub fn update(&mut self, id: &str, fields: Map<String, Value>, persist: bool) -> Result<()> {
        let mut object = match self.entries.get(id) {
            Some(entry) => match serde_json::to_value(entry)? {
                Value::Object(map) => map,
                other => {
                    return Err(Error::InvalidArgument(format!(
                        "entry {} serialized to a non-object: {}",
                        id, other
                    )))
                }
            },
            None => self.drafts.get(id).cloned().unwrap_or_default(),
        };
        object.extend(fields);

        if !self.entries.contains_key(id) && !is_complete(&object) {
            let previous = self.drafts.insert(id.to_string(), object);
            if persist {
                if let Err(e) = self.save() {
                    match previous {
                        Some(previous) => self.drafts.insert(id.to_string(), previous),
                        None => self.drafts.remove(id),
                    };
                    return Err(e);
                }
            }
            return Ok(());
        }

        let entry: RegistryEntry = serde_json::from_value(Value::Object(object))
            .map_err(|e| Error::InvalidArgument(format!("entry {}: {}", id, e)))?;
        self.insert(id, entry, persist)
    }

    /// Rewrite the full backing document. Fails with `InvalidArgument` while
    /// any id is still incomplete.
    pub fn save(&self) -> Result<()> {
        if let Some((id, draft)) = self.drafts.iter().next() {
            return Err(incomplete(id, draft));
        }
        write_json_atomic(&self.path, &self.entries)?;
        debug!(path = %self.path.display(), entries = self.entries.len(), "persisted registry");
        Ok(())
    }

    /// Group every included piano cover under its track title.
    pub fn listing(&self) -> BTreeMap<String, MovieListing> {
        let mut movies: BTreeMap<String, MovieListing> = BTreeMap::new();
        for (id, entry) in self.entries.iter().filter(|(_, e)| e.include_dataset) {
            let movie = movies
                .entry(entry.title.clone())
                .or_insert_with(|| MovieListing {
                    original: entry.original.clone(),
                    pianos: Vec::new(),
                });
            if movie.original != entry.original {
                warn!(
                    title = %entry.title,
                    id = %id,
                    expected = %movie.original,
                    found = %entry.original,
                    "title shared by different originals, keeping the first"
                );
            }
            movie.pianos.push(id.clone());
        }
        movies
    }

    /// Write the listing of included covers to `path` and return it.
    pub fn export<P: AsRef<Path>>(&self, path: P) -> Result<BTreeMap<String, MovieListing>> {
        let path = path.as_ref();
        let movies = self.listing();
        write_json_atomic(path, &movies)?;
        info!(path = %path.display(), movies = movies.len(), "exported movie listing");
        Ok(movies)
    }

    pub fn piano_to_original(&self, id: &str) -> Result<&str> {
        Ok(self.get(id)?.original.as_str())
    }

    pub fn is_train(&self, id: &str) -> Result<bool> {
        Ok(self.get(id)?.split == Split::Train)
    }

    pub fn is_test(&self, id: &str) -> Result<bool> {
        Ok(self.get(id)?.split == Split::Test)
    }

    /// Piano-cover ids in `split`, or with `orig` the distinct original ids
    /// they map to, in first-seen order.
    pub fn get_ids(&self, split: Split, orig: bool) -> Vec<String> {
        let pianos = self.entries.iter().filter(|(_, e)| e.split == split);
        if orig {
            let mut seen = HashSet::new();
            pianos
                .filter(|(_, e)| seen.insert(e.original.as_str()))
                .map(|(_, e)| e.original.clone())
                .collect()
        } else {
            pianos.map(|(id, _)| id.clone()).collect()
        }
    }
}

fn is_complete(fields: &Map<String, Value>) -> bool {
    REQUIRED_FIELDS.iter().all(|key| fields.contains_key(*key))
}

fn incomplete(id: &str, draft: &Map<String, Value>) -> Error {
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|key| !draft.contains_key(*key))
        .collect();
    Error::InvalidArgument(format!("entry {} is incomplete, missing {}", id, missing.join(", ")))
}

/// Serialize `value` as pretty JSON into a temporary file beside `path`, then
/// rename it into place.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let persist_err = |source: std::io::Error| Error::Persistence {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(persist_err)?;

    let mut json = serde_json::to_vec_pretty(value)?;
    json.push(b'\n');

    let mut tmp = NamedTempFile::new_in(dir).map_err(persist_err)?;
    tmp.write_all(&json).map_err(persist_err)?;
    tmp.as_file().sync_all().map_err(persist_err)?;
    tmp.persist(path).map_err(|e| persist_err(e.error))?;
    Ok(())
}
