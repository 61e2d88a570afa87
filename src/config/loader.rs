//! Layered configuration loading
//!
//! Builds the resolved cluster document from, lowest to highest precedence:
//! structural defaults, field-selector defaults, the `ksail.yaml` file,
//! `KSAIL_*` environment variables, and explicitly set CLI flags. Higher
//! layers always win; selector defaults only fill fields that every higher
//! layer left empty.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::fields::selectors;
use super::types::{Cluster, Distribution};
use super::validator::ClusterValidator;
use crate::distribution::{resolve_config_path, DocumentLoader, K3dSimpleConfig, KindConfig};
use crate::notify::Notifier;

/// Name of the cluster document searched for on disk
pub const CONFIG_FILE: &str = "ksail.yaml";

/// Flag-layer overrides, keyed by selector path.
///
/// Only values the user explicitly set belong here; default-registered flag
/// values must not be inserted, or they would shadow file and environment
/// layers.
#[derive(Debug, Clone, Default)]
pub struct Overrides(BTreeMap<&'static str, String>);

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: &'static str, value: impl Into<String>) {
        self.0.insert(path, value.into());
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub cluster: Cluster,
    /// Path of the cluster document, when one was found on disk
    pub document_path: Option<PathBuf>,
    pub kind_config: Option<KindConfig>,
    pub k3d_config: Option<K3dSimpleConfig>,
}

impl LoadedConfig {
    /// Distribution after layering; defaults guarantee presence
    pub fn distribution(&self) -> Result<Distribution> {
        self.cluster
            .spec
            .distribution
            .ok_or_else(|| anyhow!("missing required field 'spec.distribution'"))
    }

    /// Cluster name resolution: distribution-config name, then the
    /// distribution's terminal default.
    pub fn cluster_name(&self) -> Result<String> {
        let distribution = self.distribution()?;
        let config_name = match distribution {
            Distribution::Kind | Distribution::Tind => {
                self.kind_config.as_ref().map(|c| c.name.clone())
            }
            Distribution::K3d => self.k3d_config.as_ref().map(|c| c.name().to_string()),
        };

        Ok(config_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| distribution.default_cluster_name().to_string()))
    }
}

/// Load-once cluster configuration loader.
///
/// The first successful load is cached for the lifetime of the loader;
/// subsequent calls return the cached document without re-reading disk.
pub struct ClusterConfigLoader {
    start_dir: PathBuf,
    overrides: Overrides,
    notifier: Notifier,
    env_lookup: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
    cache: OnceCell<LoadedConfig>,
}

impl ClusterConfigLoader {
    pub fn new(start_dir: impl Into<PathBuf>, overrides: Overrides, notifier: Notifier) -> Self {
        Self {
            start_dir: start_dir.into(),
            overrides,
            notifier,
            env_lookup: Box::new(|name| std::env::var(name).ok()),
            cache: OnceCell::new(),
        }
    }

    /// Replace the environment lookup, for tests that must not touch
    /// process-wide state.
    pub fn with_env_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.env_lookup = Box::new(lookup);
        self
    }

    /// Load, validate, and cache the cluster configuration.
    pub fn load(&self) -> Result<&LoadedConfig> {
        self.cache.get_or_try_init(|| self.load_uncached())
    }

    fn load_uncached(&self) -> Result<LoadedConfig> {
        let document_path = discover_config_file(&self.start_dir);

        let mut cluster = match &document_path {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file: {}", path.display()))?;
                serde_yaml::from_str::<Cluster>(&content)
                    .with_context(|| format!("failed to unmarshal config: {}", path.display()))?
            }
            None => {
                self.notifier.info("using default config");
                Cluster::empty()
            }
        };

        self.apply_env(&mut cluster)?;
        self.apply_overrides(&mut cluster)?;
        self.apply_defaults(&mut cluster)?;

        cluster.spec.connection.kubeconfig =
            expand_home(&cluster.spec.connection.kubeconfig)?;

        let (kind_config, k3d_config) =
            load_distribution_config(&cluster, document_path.as_deref())?;

        let validation = ClusterValidator::new(&cluster)
            .loaded_from_file(document_path.is_some())
            .with_kind_config_opt(kind_config.as_ref())
            .with_k3d_config_opt(k3d_config.as_ref())
            .validate();

        for error in &validation.errors {
            self.notifier.error(error.to_string());
        }
        for warning in &validation.warnings {
            self.notifier.warning(warning.to_string());
        }

        if !validation.is_valid() {
            return Err(validation.summary().into());
        }

        tracing::debug!(
            document = ?document_path,
            distribution = ?cluster.spec.distribution,
            "configuration resolved"
        );

        Ok(LoadedConfig {
            cluster,
            document_path,
            kind_config,
            k3d_config,
        })
    }

    fn apply_env(&self, cluster: &mut Cluster) -> Result<()> {
        for selector in selectors() {
            let var = selector.env_var();
            if let Some(value) = (self.env_lookup)(&var) {
                if value.is_empty() {
                    continue;
                }
                (selector.access)(cluster)
                    .set_text(&value)
                    .with_context(|| format!("invalid value in {var}"))?;
            }
        }
        Ok(())
    }

    fn apply_overrides(&self, cluster: &mut Cluster) -> Result<()> {
        for selector in selectors() {
            if let Some(value) = self.overrides.get(selector.path) {
                (selector.access)(cluster)
                    .set_text(value)
                    .with_context(|| format!("invalid value for --{}", selector.flag_name()))?;
            }
        }
        Ok(())
    }

    fn apply_defaults(&self, cluster: &mut Cluster) -> Result<()> {
        for selector in selectors() {
            selector.fill_default(cluster)?;
        }

        // The distribution-config default depends on the resolved distribution
        if cluster.spec.distribution_config.is_empty() {
            if let Some(distribution) = cluster.spec.distribution {
                cluster.spec.distribution_config =
                    distribution.default_config_file().to_string();
            }
        }

        Ok(())
    }
}

/// Resolve a cluster document from selector defaults and explicit overrides
/// only, bypassing disk and environment. Used by scaffolding to produce the
/// document a fresh project starts from.
pub fn build_default_cluster(overrides: &Overrides) -> Result<Cluster> {
    let mut cluster = Cluster::empty();

    for selector in selectors() {
        if let Some(value) = overrides.get(selector.path) {
            (selector.access)(&mut cluster)
                .set_text(value)
                .with_context(|| format!("invalid value for --{}", selector.flag_name()))?;
        }
    }
    for selector in selectors() {
        selector.fill_default(&mut cluster)?;
    }
    if cluster.spec.distribution_config.is_empty() {
        if let Some(distribution) = cluster.spec.distribution {
            cluster.spec.distribution_config = distribution.default_config_file().to_string();
        }
    }

    Ok(cluster)
}

/// Walk upward from `start_dir` looking for the cluster document, stopping
/// at the filesystem root.
fn discover_config_file(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
}

fn load_distribution_config(
    cluster: &Cluster,
    document_path: Option<&Path>,
) -> Result<(Option<KindConfig>, Option<K3dSimpleConfig>)> {
    let Some(distribution) = cluster.spec.distribution else {
        return Ok((None, None));
    };
    if cluster.spec.distribution_config.is_empty() {
        return Ok((None, None));
    }

    let path = resolve_config_path(document_path, &cluster.spec.distribution_config);

    match distribution {
        Distribution::Kind | Distribution::Tind => {
            let loader: DocumentLoader<KindConfig> = DocumentLoader::new(path);
            if !loader.exists() {
                return Ok((None, None));
            }
            Ok((Some(loader.load()?.clone()), None))
        }
        Distribution::K3d => {
            let loader: DocumentLoader<K3dSimpleConfig> = DocumentLoader::new(path);
            if !loader.exists() {
                return Ok((None, None));
            }
            Ok((None, Some(loader.load()?.clone())))
        }
    }
}

/// Expand a leading `~/` to the current user's home directory; other paths
/// are returned verbatim.
pub fn expand_home(path: &str) -> Result<String> {
    if path == "~" {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("failed to expand home path"))?;
        return Ok(home.to_string_lossy().into_owned());
    }
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("failed to expand home path"))?;
        return Ok(home.join(rest).to_string_lossy().into_owned());
    }
    Ok(path.to_string())
}

impl<'a> ClusterValidator<'a> {
    fn with_kind_config_opt(self, config: Option<&'a KindConfig>) -> Self {
        match config {
            Some(config) => self.with_kind_config(config),
            None => self,
        }
    }

    fn with_k3d_config_opt(self, config: Option<&'a K3dSimpleConfig>) -> Self {
        match config {
            Some(config) => self.with_k3d_config(config),
            None => self,
        }
    }
}
