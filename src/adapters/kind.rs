//! Kind backend adapter

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use super::run_tool;
use crate::distribution::KindConfig;

/// Capability surface over kind
#[async_trait]
pub trait KindBackend: Send + Sync {
    async fn create(&self, name: &str, config: &KindConfig) -> Result<()>;
    async fn delete(&self, name: &str) -> Result<()>;
    async fn list(&self) -> Result<Vec<String>>;
    async fn exists(&self, name: &str) -> Result<bool>;
}

/// Production backend driving the `kind` binary
pub struct KindCli {
    kubeconfig: PathBuf,
}

impl KindCli {
    pub fn new(kubeconfig: impl Into<PathBuf>) -> Self {
        Self {
            kubeconfig: kubeconfig.into(),
        }
    }
}

#[async_trait]
impl KindBackend for KindCli {
    async fn create(&self, name: &str, config: &KindConfig) -> Result<()> {
        let document =
            serde_yaml::to_string(config).context("failed to serialize kind config")?;
        let kubeconfig = self.kubeconfig.to_string_lossy();
        run_tool(
            "kind",
            &[
                "create",
                "cluster",
                "--name",
                name,
                "--config",
                "-",
                "--kubeconfig",
                &kubeconfig,
            ],
            Some(document.as_bytes()),
        )
        .await?;
        tracing::info!(cluster = %name, "kind cluster created");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let kubeconfig = self.kubeconfig.to_string_lossy();
        run_tool(
            "kind",
            &["delete", "cluster", "--name", name, "--kubeconfig", &kubeconfig],
            None,
        )
        .await?;
        tracing::info!(cluster = %name, "kind cluster deleted");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let output = run_tool("kind", &["get", "clusters"], None).await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && *line != "No kind clusters found.")
            .map(String::from)
            .collect())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let clusters = self.list().await?;
        Ok(clusters.iter().any(|cluster| cluster == name))
    }
}
