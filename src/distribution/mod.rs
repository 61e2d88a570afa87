//! Distribution-specific configuration documents
//!
//! The core only reads the cluster name (and, for Kind, the default-CNI
//! toggle) out of these documents; everything else is preserved verbatim and
//! handed to the backend untouched.

pub mod k3d;
pub mod kind;

pub use k3d::{K3dClusterConfig, K3dSimpleConfig};
pub use kind::KindConfig;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Load-once YAML document loader.
///
/// The first successful load is cached; later calls return the cached
/// document without re-reading disk, even if the file has changed or been
/// removed since.
pub struct DocumentLoader<T> {
    path: PathBuf,
    cache: OnceCell<T>,
}

impl<T: DeserializeOwned> DocumentLoader<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceCell::new(),
        }
    }

    /// Load the document, or return the cached copy from a prior call.
    pub fn load(&self) -> Result<&T> {
        self.cache.get_or_try_init(|| {
            let content = fs::read_to_string(&self.path).with_context(|| {
                format!("failed to read config file: {}", self.path.display())
            })?;
            serde_yaml::from_str(&content).with_context(|| {
                format!("failed to unmarshal config: {}", self.path.display())
            })
        })
    }

    /// Whether the document exists on disk (does not populate the cache).
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// Resolve a distribution config path relative to the cluster document.
/// Absolute paths are returned verbatim.
pub fn resolve_config_path(cluster_document: Option<&Path>, config_path: &str) -> PathBuf {
    let path = Path::new(config_path);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match cluster_document.and_then(|p| p.parent()) {
        Some(dir) => dir.join(path),
        None => path.to_path_buf(),
    }
}
