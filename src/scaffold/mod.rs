//! Project scaffolding
//!
//! Writes the files a fresh project starts from: the cluster document, the
//! matching distribution config, and an empty kustomization in the source
//! directory. Existing files are never overwritten unless forced.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Cluster, Distribution, CONFIG_FILE};
use crate::distribution::{K3dSimpleConfig, KindConfig};

pub struct Scaffolder {
    output: PathBuf,
    force: bool,
}

impl Scaffolder {
    pub fn new(output: impl Into<PathBuf>, force: bool) -> Self {
        Self {
            output: output.into(),
            force,
        }
    }

    /// Write the project files for the given resolved cluster document.
    /// Returns the paths written, in write order.
    pub fn scaffold(&self, cluster: &Cluster) -> Result<Vec<PathBuf>> {
        let distribution = cluster
            .spec
            .distribution
            .context("missing required field 'spec.distribution'")?;

        let cluster_yaml =
            serde_yaml::to_string(cluster).context("failed to serialize cluster document")?;
        let distribution_yaml = match distribution {
            Distribution::Kind | Distribution::Tind => {
                serde_yaml::to_string(&KindConfig::named(&cluster.metadata.name))
                    .context("failed to serialize kind config")?
            }
            Distribution::K3d => {
                serde_yaml::to_string(&K3dSimpleConfig::named(&cluster.metadata.name))
                    .context("failed to serialize k3d config")?
            }
        };

        let kustomization = "resources: []\n";
        let source_dir = if cluster.spec.source_directory.is_empty() {
            "k8s"
        } else {
            cluster.spec.source_directory.as_str()
        };

        let files = [
            (PathBuf::from(CONFIG_FILE), cluster_yaml),
            (
                PathBuf::from(&cluster.spec.distribution_config),
                distribution_yaml,
            ),
            (
                Path::new(source_dir).join("kustomization.yaml"),
                kustomization.to_string(),
            ),
        ];

        // Refuse before writing anything, so a failed run leaves no
        // half-scaffolded project behind.
        if !self.force {
            for (relative, _) in &files {
                let target = self.output.join(relative);
                if target.exists() {
                    bail!(
                        "refusing to overwrite {}: pass --force to replace it",
                        target.display()
                    );
                }
            }
        }

        let mut written = Vec::with_capacity(files.len());
        for (relative, content) in files {
            let target = self.output.join(&relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(&target, content)
                .with_context(|| format!("failed to write {}", target.display()))?;
            tracing::debug!(file = %target.display(), "scaffolded");
            written.push(target);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{build_default_cluster, Overrides};

    fn default_cluster(distribution: &str) -> Cluster {
        let mut overrides = Overrides::new();
        overrides.set("spec.distribution", distribution);
        build_default_cluster(&overrides).unwrap()
    }

    #[test]
    fn test_scaffold_writes_project_files() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = default_cluster("Kind");

        let written = Scaffolder::new(dir.path(), false).scaffold(&cluster).unwrap();
        assert_eq!(written.len(), 3);
        assert!(dir.path().join("ksail.yaml").is_file());
        assert!(dir.path().join("kind.yaml").is_file());
        assert!(dir.path().join("k8s/kustomization.yaml").is_file());

        // The scaffolded cluster document parses back
        let content = fs::read_to_string(dir.path().join("ksail.yaml")).unwrap();
        let parsed: Cluster = serde_yaml::from_str(&content).unwrap();
        assert_eq!(parsed.spec.distribution, cluster.spec.distribution);

        // The distribution config carries the cluster name
        let kind: KindConfig =
            serde_yaml::from_str(&fs::read_to_string(dir.path().join("kind.yaml")).unwrap())
                .unwrap();
        assert_eq!(kind.name, cluster.metadata.name);
    }

    #[test]
    fn test_scaffold_k3d_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = default_cluster("K3d");

        Scaffolder::new(dir.path(), false).scaffold(&cluster).unwrap();
        assert!(dir.path().join("k3d.yaml").is_file());
        assert!(!dir.path().join("kind.yaml").exists());
    }

    #[test]
    fn test_scaffold_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = default_cluster("Kind");
        fs::write(dir.path().join("ksail.yaml"), "existing").unwrap();

        let err = Scaffolder::new(dir.path(), false)
            .scaffold(&cluster)
            .unwrap_err();
        assert!(err.to_string().contains("--force"));

        // Nothing else was written
        assert!(!dir.path().join("kind.yaml").exists());

        // Forced runs replace the file
        Scaffolder::new(dir.path(), true).scaffold(&cluster).unwrap();
        let content = fs::read_to_string(dir.path().join("ksail.yaml")).unwrap();
        assert_ne!(content, "existing");
    }
}
