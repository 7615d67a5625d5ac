//! Canonical on-disk locations of every recording, derived from the registry.
//!
//! ```text
//! <dataset>/raw/<title>/<original>.wav
//! <dataset>/raw/<title>/piano/<piano>.wav
//! <dataset>/synced/<title>/[piano/]<id>.{wav,mid}
//! <dataset>/array/<title>/<original>.npy
//! <dataset>/array/<title>/piano/<piano>.npz
//! ```

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::constants::{
    ARCHIVE_EXT, ARRAY_EXT, ARRAY_KIND, MIDI_EXT, PIANO_SUBDIR, RAW_KIND, SYNCED_KIND, WAV_EXT,
};
use crate::error::{Error, Result};
use crate::registry::MetadataRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncedPaths {
    pub wav: PathBuf,
    pub midi: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathSet {
    pub raw: PathBuf,
    pub synced: SyncedPaths,
    pub array: PathBuf,
}

impl PathSet {
    fn build(dataset_root: &Path, title: &str, id: &str, piano: bool) -> Self {
        let dir = |kind: &str| {
            let dir = dataset_root.join(kind).join(title);
            if piano {
                dir.join(PIANO_SUBDIR)
            } else {
                dir
            }
        };
        let array_ext = if piano { ARCHIVE_EXT } else { ARRAY_EXT };

        PathSet {
            raw: dir(RAW_KIND).join(format!("{}.{}", id, WAV_EXT)),
            synced: SyncedPaths {
                wav: dir(SYNCED_KIND).join(format!("{}.{}", id, WAV_EXT)),
                midi: dir(SYNCED_KIND).join(format!("{}.{}", id, MIDI_EXT)),
            },
            array: dir(ARRAY_KIND).join(format!("{}.{}", id, array_ext)),
        }
    }
}

/// Path sets for every original and piano-cover id in a registry.
///
/// The resolver borrows the registry, so the registry cannot change while a
/// resolver derived from it is alive.
pub struct PathResolver<'a> {
    registry: &'a MetadataRegistry,
    paths: HashMap<String, PathSet>,
}

impl<'a> PathResolver<'a> {
    pub fn new(registry: &'a MetadataRegistry, dataset_root: &Path) -> Self {
        let mut paths = HashMap::with_capacity(registry.len() * 2);
        for (id_piano, entry) in registry.entries() {
            paths
                .entry(entry.original.clone())
                .or_insert_with(|| PathSet::build(dataset_root, &entry.title, &entry.original, false));
            paths.insert(
                id_piano.to_string(),
                PathSet::build(dataset_root, &entry.title, id_piano, true),
            );
        }
        Self { registry, paths }
    }

    /// Path set of `id`. With `as_original`, `id` is a piano-cover id and the
    /// path set of its original recording is returned.
    pub fn resolve(&self, id: &str, as_original: bool) -> Result<&PathSet> {
        let id = if as_original {
            self.registry.piano_to_original(id)?
        } else {
            id
        };
        self.paths
            .get(id)
            .ok_or_else(|| Error::not_found("recording", id))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{RegistryEntry, Split};
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> MetadataRegistry {
        let mut registry = MetadataRegistry::open(dir.path().join("info.json")).unwrap();
        registry
            .insert("coverA_0", RegistryEntry::new("trackX", "T", Split::Train), false)
            .unwrap();
        registry
            .insert("coverB", RegistryEntry::new("trackX", "T", Split::Test), false)
            .unwrap();
        registry
    }

    #[test]
    fn test_piano_paths_live_under_piano_subdir() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let root = Path::new("/data");
        let resolver = PathResolver::new(&registry, root);

        let paths = resolver.resolve("coverA_0", false).unwrap();
        assert!(paths.array.ends_with("T/piano/coverA_0.npz"));
        assert_eq!(paths.raw, root.join("raw/T/piano/coverA_0.wav"));
        assert_eq!(paths.synced.midi, root.join("synced/T/piano/coverA_0.mid"));
    }

    #[test]
    fn test_original_paths() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let root = Path::new("/data");
        let resolver = PathResolver::new(&registry, root);

        let paths = resolver.resolve("trackX", false).unwrap();
        assert_eq!(paths.array, root.join("array/T/trackX.npy"));
        assert_eq!(paths.synced.wav, root.join("synced/T/trackX.wav"));
        // two covers and one shared original
        assert_eq!(resolver.len(), 3);
    }

    #[test]
    fn test_as_original_matches_direct_original() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let resolver = PathResolver::new(&registry, Path::new("/data"));

        for id in registry.ids() {
            let original = registry.piano_to_original(id).unwrap();
            assert_eq!(
                resolver.resolve(id, true).unwrap(),
                resolver.resolve(original, false).unwrap()
            );
        }
    }

    #[test]
    fn test_unknown_id() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let resolver = PathResolver::new(&registry, Path::new("/data"));
        assert!(matches!(resolver.resolve("missing", false), Err(Error::NotFound { .. })));
        assert!(matches!(resolver.resolve("trackX", true), Err(Error::NotFound { .. })));
    }
}
