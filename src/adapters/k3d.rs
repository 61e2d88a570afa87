//! K3d backend and config-transform adapters

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::run_tool;
use crate::context::OpContext;
use crate::distribution::{K3dClusterConfig, K3dSimpleConfig};

/// A cluster as reported by the k3d backend
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct K3dCluster {
    #[serde(default)]
    pub name: String,

    #[serde(rename = "serversRunning", default)]
    pub servers_running: u32,

    #[serde(rename = "serversCount", default)]
    pub servers_count: u32,
}

impl K3dCluster {
    #[allow(dead_code)]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.servers_count > 0 && self.servers_running == self.servers_count
    }
}

/// Capability surface over the k3d cluster client
#[async_trait]
pub trait K3dBackend: Send + Sync {
    async fn cluster_run(&self, ctx: &OpContext, config: &K3dClusterConfig) -> Result<()>;
    async fn cluster_delete(&self, ctx: &OpContext, cluster: &K3dCluster) -> Result<()>;
    async fn cluster_get(&self, ctx: &OpContext, name: &str) -> Result<K3dCluster>;
    async fn cluster_start(&self, ctx: &OpContext, cluster: &K3dCluster) -> Result<()>;
    async fn cluster_stop(&self, ctx: &OpContext, cluster: &K3dCluster) -> Result<()>;
    async fn cluster_list(&self, ctx: &OpContext) -> Result<Vec<K3dCluster>>;
}

/// Capability surface over the k3d config machinery
#[async_trait]
pub trait K3dConfigTransformer: Send + Sync {
    async fn transform_simple_to_cluster_config(
        &self,
        ctx: &OpContext,
        simple: &K3dSimpleConfig,
        filename: &str,
    ) -> Result<K3dClusterConfig>;
}

/// Production adapter driving the `k3d` binary
#[derive(Default)]
pub struct K3dCli;

impl K3dCli {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl K3dBackend for K3dCli {
    async fn cluster_run(&self, ctx: &OpContext, config: &K3dClusterConfig) -> Result<()> {
        let document =
            serde_yaml::to_string(&config.config).context("failed to serialize k3d config")?;
        tracing::debug!(cluster = %config.name, source = %config.source_file, "creating cluster from config");
        ctx.run(async {
            run_tool(
                "k3d",
                &["cluster", "create", &config.name, "--config", "-"],
                Some(document.as_bytes()),
            )
            .await?;
            tracing::info!(cluster = %config.name, "k3d cluster created");
            Ok(())
        })
        .await
    }

    async fn cluster_delete(&self, ctx: &OpContext, cluster: &K3dCluster) -> Result<()> {
        ctx.run(async {
            run_tool("k3d", &["cluster", "delete", &cluster.name], None).await?;
            tracing::info!(cluster = %cluster.name, "k3d cluster deleted");
            Ok(())
        })
        .await
    }

    async fn cluster_get(&self, ctx: &OpContext, name: &str) -> Result<K3dCluster> {
        let clusters = self.cluster_list(ctx).await?;
        clusters
            .into_iter()
            .find(|cluster| cluster.name == name)
            .ok_or_else(|| anyhow::anyhow!("cluster '{name}' not found"))
    }

    async fn cluster_start(&self, ctx: &OpContext, cluster: &K3dCluster) -> Result<()> {
        ctx.run(async {
            run_tool("k3d", &["cluster", "start", &cluster.name], None).await?;
            Ok(())
        })
        .await
    }

    async fn cluster_stop(&self, ctx: &OpContext, cluster: &K3dCluster) -> Result<()> {
        ctx.run(async {
            run_tool("k3d", &["cluster", "stop", &cluster.name], None).await?;
            Ok(())
        })
        .await
    }

    async fn cluster_list(&self, ctx: &OpContext) -> Result<Vec<K3dCluster>> {
        ctx.run(async {
            let output = run_tool("k3d", &["cluster", "list", "-o", "json"], None).await?;
            serde_json::from_str(&output).context("failed to parse k3d cluster list")
        })
        .await
    }
}

#[async_trait]
impl K3dConfigTransformer for K3dCli {
    /// Normalize a simple config into the resolved cluster config the
    /// backend consumes. Identity fields are filled in when the source
    /// document omitted them.
    async fn transform_simple_to_cluster_config(
        &self,
        _ctx: &OpContext,
        simple: &K3dSimpleConfig,
        filename: &str,
    ) -> Result<K3dClusterConfig> {
        let mut config = simple.clone();
        if config.api_version.is_empty() {
            config.api_version = "k3d.io/v1alpha5".to_string();
        }
        if config.kind.is_empty() {
            config.kind = "Simple".to_string();
        }

        Ok(K3dClusterConfig {
            name: config.metadata.name.clone(),
            config,
            source_file: filename.to_string(),
        })
    }
}
