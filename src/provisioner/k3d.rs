//! K3d cluster provisioner

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use super::{ensure_engine_ready, validate_name, ClusterInfo, ClusterProvisioner};
use crate::adapters::k3d::{K3dBackend, K3dConfigTransformer};
use crate::config::ContainerEngine;
use crate::context::OpContext;
use crate::distribution::K3dSimpleConfig;
use crate::engine::EngineClient;

/// Filename handed to the config transformer for relative-path resolution
const CONFIG_FILENAME: &str = "k3d.yaml";

pub struct K3dProvisioner {
    config: K3dSimpleConfig,
    backend: Arc<dyn K3dBackend>,
    transformer: Arc<dyn K3dConfigTransformer>,
    engine: Arc<dyn EngineClient>,
    engine_kind: ContainerEngine,
}

impl K3dProvisioner {
    pub fn new(
        config: K3dSimpleConfig,
        backend: Arc<dyn K3dBackend>,
        transformer: Arc<dyn K3dConfigTransformer>,
        engine: Arc<dyn EngineClient>,
        engine_kind: ContainerEngine,
    ) -> Self {
        Self {
            config,
            backend,
            transformer,
            engine,
            engine_kind,
        }
    }

    fn resolve_name(&self, name: &str) -> String {
        if !name.is_empty() {
            return name.to_string();
        }
        if !self.config.name().is_empty() {
            return self.config.name().to_string();
        }
        "k3d".to_string()
    }
}

#[async_trait]
impl ClusterProvisioner for K3dProvisioner {
    async fn create(&self, ctx: &OpContext, name: &str) -> Result<()> {
        let name = self.resolve_name(name);
        validate_name(&name)?;
        ensure_engine_ready(ctx, &self.engine, self.engine_kind).await?;

        let clusters = self
            .backend
            .cluster_list(ctx)
            .await
            .context("cluster list")?;
        if clusters.iter().any(|cluster| cluster.name == name) {
            tracing::info!(cluster = %name, "cluster already exists, skipping create");
            return Ok(());
        }

        let mut simple = self.config.clone();
        simple.metadata.name = name.clone();

        let cluster_config = self
            .transformer
            .transform_simple_to_cluster_config(ctx, &simple, CONFIG_FILENAME)
            .await
            .context("transform simple to cluster config")?;

        self.backend
            .cluster_run(ctx, &cluster_config)
            .await
            .context("cluster run")
    }

    async fn start(&self, ctx: &OpContext, name: &str) -> Result<()> {
        let name = self.resolve_name(name);
        ensure_engine_ready(ctx, &self.engine, self.engine_kind).await?;

        let cluster = self
            .backend
            .cluster_get(ctx, &name)
            .await
            .context("cluster get")?;
        self.backend
            .cluster_start(ctx, &cluster)
            .await
            .context("cluster start")
    }

    async fn stop(&self, ctx: &OpContext, name: &str) -> Result<()> {
        let name = self.resolve_name(name);
        ensure_engine_ready(ctx, &self.engine, self.engine_kind).await?;

        let cluster = self
            .backend
            .cluster_get(ctx, &name)
            .await
            .context("cluster get")?;
        self.backend
            .cluster_stop(ctx, &cluster)
            .await
            .context("cluster stop")
    }

    async fn delete(&self, ctx: &OpContext, name: &str) -> Result<()> {
        let name = self.resolve_name(name);
        ensure_engine_ready(ctx, &self.engine, self.engine_kind).await?;

        let clusters = self
            .backend
            .cluster_list(ctx)
            .await
            .context("cluster list")?;
        let Some(cluster) = clusters.into_iter().find(|cluster| cluster.name == name) else {
            tracing::debug!(cluster = %name, "cluster already absent");
            return Ok(());
        };

        self.backend
            .cluster_delete(ctx, &cluster)
            .await
            .context("cluster delete")
    }

    async fn list(&self, ctx: &OpContext) -> Result<Vec<ClusterInfo>> {
        let clusters = self
            .backend
            .cluster_list(ctx)
            .await
            .context("cluster list")?;
        Ok(clusters
            .into_iter()
            .map(|cluster| ClusterInfo {
                running: cluster.is_running(),
                name: cluster.name,
            })
            .collect())
    }

    async fn exists(&self, ctx: &OpContext, name: &str) -> Result<bool> {
        let name = self.resolve_name(name);
        let clusters = self
            .backend
            .cluster_list(ctx)
            .await
            .context("cluster list")?;
        Ok(clusters.iter().any(|cluster| cluster.name == name))
    }
}
