//! Process-wide state built once at startup and passed to every component.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::Config;
use crate::dataset::DatasetDirs;
use crate::error::Result;
use crate::paths::PathResolver;
use crate::preprocessing::feature::FeaturePreprocessor;
use crate::registry::MetadataRegistry;

pub struct Context {
    pub config: Config,
    pub registry: MetadataRegistry,
    root: PathBuf,
}

impl Context {
    /// Load the configuration at `config_path` and the registry it points to.
    /// Relative paths in the configuration resolve against the directory
    /// holding the configuration file.
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();
        let config = Config::load(config_path)?;
        let root = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::new(config, root)
    }

    pub fn new(config: Config, root: PathBuf) -> Result<Self> {
        let registry = MetadataRegistry::open(root.join(&config.path.info))?;
        info!(
            root = %root.display(),
            entries = registry.len(),
            "context ready"
        );
        Ok(Self {
            config,
            registry,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset_root(&self) -> PathBuf {
        self.root.join(&self.config.path.dataset)
    }

    pub fn dataset_dirs(&self) -> DatasetDirs {
        DatasetDirs::new(&self.dataset_root())
    }

    pub fn export_path(&self) -> PathBuf {
        self.root.join(&self.config.path.src)
    }

    pub fn style_path(&self) -> PathBuf {
        self.root.join(&self.config.path.style)
    }

    pub fn model_path(&self) -> PathBuf {
        self.root.join(&self.config.path.model)
    }

    pub fn path_resolver(&self) -> PathResolver<'_> {
        PathResolver::new(&self.registry, &self.dataset_root())
    }

    pub fn preprocessor(&self) -> Result<FeaturePreprocessor> {
        FeaturePreprocessor::from_config(&self.config)
    }
}
