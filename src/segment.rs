//! Segment file names.
//!
//! Grammar of a segment stem: `<id> "_" <digits>`. The id may itself contain
//! underscores; only the last `_` separates the index. The index is kept as
//! the exact token from the file name and is never treated as arithmetic.

use std::{fmt, path::Path, str::FromStr};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentName {
    pub id: String,
    pub index: String,
}

impl SegmentName {
    pub fn new(id: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            index: index.into(),
        }
    }

    /// Parse the stem of `path`, ignoring directory and extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                Error::InvalidArgument(format!("segment path has no stem: {}", path.display()))
            })?;
        stem.parse()
    }

    /// File name of the same segment for another recording id, e.g. the
    /// original-side spectrogram paired with a piano-cover label.
    pub fn file_name_for(&self, id: &str, ext: &str) -> String {
        format!("{}_{}.{}", id, self.index, ext)
    }
}

impl FromStr for SegmentName {
    type Err = Error;

    fn from_str(stem: &str) -> Result<Self> {
        let malformed = || Error::InvalidArgument(format!("malformed segment name '{}'", stem));
        let (id, index) = stem.rsplit_once('_').ok_or_else(malformed)?;
        if id.is_empty() || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        Ok(SegmentName::new(id, index))
    }
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.id, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let name: SegmentName = "coverA_12".parse().unwrap();
        assert_eq!(name, SegmentName::new("coverA", "12"));
    }

    #[test]
    fn test_id_with_underscores_round_trips() {
        for stem in ["coverA_0_3", "a_b_c_007", "x_1"] {
            let name: SegmentName = stem.parse().unwrap();
            assert_eq!(name.to_string(), stem);
        }
        let name: SegmentName = "coverA_0_3".parse().unwrap();
        assert_eq!(name.id, "coverA_0");
        assert_eq!(name.index, "3");
    }

    #[test]
    fn test_index_token_is_preserved() {
        let name: SegmentName = "piano_007".parse().unwrap();
        assert_eq!(name.file_name_for("orig", "npy"), "orig_007.npy");
    }

    #[test]
    fn test_from_path_strips_extension() {
        let name = SegmentName::from_path(Path::new("/tmp/label/coverA_0_4.npz")).unwrap();
        assert_eq!(name, SegmentName::new("coverA_0", "4"));
    }

    #[test]
    fn test_malformed_names() {
        for stem in ["coverA", "_3", "coverA_", "coverA_x1", "coverA_-1"] {
            assert!(
                matches!(stem.parse::<SegmentName>(), Err(Error::InvalidArgument(_))),
                "{} should be rejected",
                stem
            );
        }
    }
}
