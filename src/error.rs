//! Error types shared by every component of the crate.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A registry entry, style entry or file that the operation needs is absent.
    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    /// Bad caller input: unknown split, malformed segment name, shape mismatch.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The configuration document is malformed or inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A whole-document rewrite could not be completed.
    #[error("failed to persist {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    #[error(transparent)]
    ReadNpz(#[from] ndarray_npy::ReadNpzError),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),

    #[error(transparent)]
    Resample(#[from] rubato::ResampleError),

    #[error(transparent)]
    Model(#[from] ort::Error),
}

impl Error {
    pub fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        Error::NotFound {
            what,
            key: key.into(),
        }
    }

    /// Missing files surface as `NotFound` rather than a bare I/O error.
    pub(crate) fn from_io_at(err: std::io::Error, path: &std::path::Path) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::not_found("file", path.display().to_string())
        } else {
            Error::Io(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
