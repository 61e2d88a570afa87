//! Kind cluster provisioner
//!
//! Create, delete, list, and exists go through the kind backend; start and
//! stop act on the cluster's node containers through the engine client,
//! which is also how kind itself models a stopped cluster.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use super::{ensure_engine_ready, validate_name, ClusterInfo, ClusterProvisioner};
use crate::adapters::kind::KindBackend;
use crate::config::ContainerEngine;
use crate::context::OpContext;
use crate::distribution::KindConfig;
use crate::engine::EngineClient;

/// Label kind stamps on every node container of a cluster
const CLUSTER_LABEL: &str = "io.x-k8s.kind.cluster";

pub struct KindProvisioner {
    config: KindConfig,
    #[allow(dead_code)]
    kubeconfig: PathBuf,
    backend: Arc<dyn KindBackend>,
    engine: Arc<dyn EngineClient>,
    engine_kind: ContainerEngine,
}

impl KindProvisioner {
    pub fn new(
        config: KindConfig,
        kubeconfig: impl Into<PathBuf>,
        backend: Arc<dyn KindBackend>,
        engine: Arc<dyn EngineClient>,
        engine_kind: ContainerEngine,
    ) -> Self {
        Self {
            config,
            kubeconfig: kubeconfig.into(),
            backend,
            engine,
            engine_kind,
        }
    }

    fn resolve_name(&self, name: &str) -> String {
        if !name.is_empty() {
            return name.to_string();
        }
        if !self.config.name.is_empty() {
            return self.config.name.clone();
        }
        "kind".to_string()
    }

    fn node_label(name: &str) -> String {
        format!("{CLUSTER_LABEL}={name}")
    }
}

#[async_trait]
impl ClusterProvisioner for KindProvisioner {
    async fn create(&self, ctx: &OpContext, name: &str) -> Result<()> {
        let name = self.resolve_name(name);
        validate_name(&name)?;
        ensure_engine_ready(ctx, &self.engine, self.engine_kind).await?;

        if self.backend.exists(&name).await.context("list clusters")? {
            tracing::info!(cluster = %name, "cluster already exists, skipping create");
            return Ok(());
        }

        let mut config = self.config.clone();
        config.name = name.clone();

        ctx.run(self.backend.create(&name, &config))
            .await
            .context("create cluster")
    }

    async fn start(&self, ctx: &OpContext, name: &str) -> Result<()> {
        let name = self.resolve_name(name);
        ensure_engine_ready(ctx, &self.engine, self.engine_kind).await?;

        let nodes = self
            .engine
            .list_containers(ctx, &Self::node_label(&name))
            .await
            .context("list cluster nodes")?;
        if nodes.is_empty() {
            bail!("cluster '{name}' not found");
        }

        for node in nodes.iter().filter(|n| !n.running) {
            self.engine
                .start_container(ctx, &node.name)
                .await
                .context("start cluster nodes")?;
        }
        tracing::info!(cluster = %name, nodes = nodes.len(), "cluster started");
        Ok(())
    }

    async fn stop(&self, ctx: &OpContext, name: &str) -> Result<()> {
        let name = self.resolve_name(name);
        ensure_engine_ready(ctx, &self.engine, self.engine_kind).await?;

        let nodes = self
            .engine
            .list_containers(ctx, &Self::node_label(&name))
            .await
            .context("list cluster nodes")?;
        if nodes.is_empty() {
            bail!("cluster '{name}' not found");
        }

        for node in nodes.iter().filter(|n| n.running) {
            self.engine
                .stop_container(ctx, &node.name)
                .await
                .context("stop cluster nodes")?;
        }
        tracing::info!(cluster = %name, "cluster stopped");
        Ok(())
    }

    async fn delete(&self, ctx: &OpContext, name: &str) -> Result<()> {
        let name = self.resolve_name(name);
        ensure_engine_ready(ctx, &self.engine, self.engine_kind).await?;

        if !self.backend.exists(&name).await.context("list clusters")? {
            tracing::debug!(cluster = %name, "cluster already absent");
            return Ok(());
        }

        ctx.run(self.backend.delete(&name))
            .await
            .context("delete cluster")
    }

    async fn list(&self, ctx: &OpContext) -> Result<Vec<ClusterInfo>> {
        let names = self.backend.list().await.context("list clusters")?;

        let mut clusters = Vec::with_capacity(names.len());
        for name in names {
            let nodes = self
                .engine
                .list_containers(ctx, &Self::node_label(&name))
                .await
                .unwrap_or_default();
            let running = !nodes.is_empty() && nodes.iter().all(|n| n.running);
            clusters.push(ClusterInfo { name, running });
        }
        Ok(clusters)
    }

    async fn exists(&self, _ctx: &OpContext, name: &str) -> Result<bool> {
        let name = self.resolve_name(name);
        self.backend.exists(&name).await.context("list clusters")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ContainerSummary;
    use anyhow::anyhow;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeKind {
        clusters: Mutex<Vec<String>>,
        created: Mutex<Vec<(String, KindConfig)>>,
    }

    #[async_trait]
    impl KindBackend for FakeKind {
        async fn create(&self, name: &str, config: &KindConfig) -> Result<()> {
            self.clusters.lock().unwrap().push(name.to_string());
            self.created
                .lock()
                .unwrap()
                .push((name.to_string(), config.clone()));
            Ok(())
        }

        async fn delete(&self, name: &str) -> Result<()> {
            self.clusters.lock().unwrap().retain(|c| c != name);
            Ok(())
        }

        async fn list(&self) -> Result<Vec<String>> {
            Ok(self.clusters.lock().unwrap().clone())
        }

        async fn exists(&self, name: &str) -> Result<bool> {
            Ok(self.clusters.lock().unwrap().iter().any(|c| c == name))
        }
    }

    struct FakeEngine {
        ready: bool,
        containers: Mutex<Vec<ContainerSummary>>,
        started: Mutex<Vec<String>>,
        stopped: Mutex<Vec<String>>,
    }

    impl FakeEngine {
        fn ready() -> Self {
            Self {
                ready: true,
                containers: Mutex::new(Vec::new()),
                started: Mutex::new(Vec::new()),
                stopped: Mutex::new(Vec::new()),
            }
        }

        fn not_ready() -> Self {
            Self {
                ready: false,
                ..Self::ready()
            }
        }

        fn with_containers(self, containers: Vec<ContainerSummary>) -> Self {
            *self.containers.lock().unwrap() = containers;
            self
        }
    }

    #[async_trait]
    impl EngineClient for FakeEngine {
        async fn ping(&self, _ctx: &OpContext) -> Result<bool> {
            if self.ready {
                Ok(true)
            } else {
                Err(anyhow!("daemon unreachable"))
            }
        }

        async fn list_containers(
            &self,
            _ctx: &OpContext,
            _label: &str,
        ) -> Result<Vec<ContainerSummary>> {
            Ok(self.containers.lock().unwrap().clone())
        }

        async fn start_container(&self, _ctx: &OpContext, name: &str) -> Result<()> {
            self.started.lock().unwrap().push(name.to_string());
            Ok(())
        }

        async fn stop_container(&self, _ctx: &OpContext, name: &str) -> Result<()> {
            self.stopped.lock().unwrap().push(name.to_string());
            Ok(())
        }

        fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn provisioner(
        config: KindConfig,
        backend: Arc<FakeKind>,
        engine: Arc<FakeEngine>,
    ) -> KindProvisioner {
        KindProvisioner::new(
            config,
            "/tmp/kubeconfig",
            backend,
            engine,
            ContainerEngine::Docker,
        )
    }

    #[tokio::test]
    async fn test_create_uses_config_name_fallback() {
        let backend = Arc::new(FakeKind::default());
        let engine = Arc::new(FakeEngine::ready());
        let p = provisioner(KindConfig::named("cfg-name"), backend.clone(), engine);

        p.create(&OpContext::default(), "").await.unwrap();
        let created = backend.created.lock().unwrap();
        assert_eq!(created[0].0, "cfg-name");
        assert_eq!(created[0].1.name, "cfg-name");
    }

    #[tokio::test]
    async fn test_create_terminal_default_name() {
        let backend = Arc::new(FakeKind::default());
        let engine = Arc::new(FakeEngine::ready());
        let p = provisioner(KindConfig::default(), backend.clone(), engine);

        p.create(&OpContext::default(), "").await.unwrap();
        assert_eq!(backend.created.lock().unwrap()[0].0, "kind");
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let backend = Arc::new(FakeKind::default());
        let engine = Arc::new(FakeEngine::ready());
        let p = provisioner(KindConfig::named("demo"), backend.clone(), engine);

        let ctx = OpContext::default();
        p.create(&ctx, "").await.unwrap();
        p.create(&ctx, "").await.unwrap();
        assert_eq!(backend.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_engine_gate_blocks_create() {
        let backend = Arc::new(FakeKind::default());
        let engine = Arc::new(FakeEngine::not_ready());
        let p = provisioner(KindConfig::named("demo"), backend.clone(), engine);

        let err = p.create(&OpContext::default(), "").await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("container engine 'Docker' is not ready"));
        assert!(message.contains("daemon unreachable"));
        assert!(backend.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_name_is_rejected_before_backend() {
        let backend = Arc::new(FakeKind::default());
        let engine = Arc::new(FakeEngine::ready());
        let p = provisioner(KindConfig::default(), backend.clone(), engine);

        assert!(p.create(&OpContext::default(), "Bad Name").await.is_err());
        assert!(backend.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_starts_stopped_nodes() {
        let backend = Arc::new(FakeKind::default());
        let engine = Arc::new(FakeEngine::ready().with_containers(vec![
            ContainerSummary {
                name: "demo-control-plane".to_string(),
                running: false,
            },
            ContainerSummary {
                name: "demo-worker".to_string(),
                running: true,
            },
        ]));
        let p = provisioner(KindConfig::named("demo"), backend, engine.clone());

        p.start(&OpContext::default(), "").await.unwrap();
        assert_eq!(
            *engine.started.lock().unwrap(),
            vec!["demo-control-plane".to_string()]
        );
    }

    #[tokio::test]
    async fn test_start_missing_cluster() {
        let backend = Arc::new(FakeKind::default());
        let engine = Arc::new(FakeEngine::ready());
        let p = provisioner(KindConfig::named("demo"), backend, engine);

        let err = p.start(&OpContext::default(), "").await.unwrap_err();
        assert!(err.to_string().contains("cluster 'demo' not found"));
    }

    #[tokio::test]
    async fn test_stop_stops_running_nodes() {
        let backend = Arc::new(FakeKind::default());
        let engine = Arc::new(FakeEngine::ready().with_containers(vec![ContainerSummary {
            name: "demo-control-plane".to_string(),
            running: true,
        }]));
        let p = provisioner(KindConfig::named("demo"), backend, engine.clone());

        p.stop(&OpContext::default(), "").await.unwrap();
        assert_eq!(
            *engine.stopped.lock().unwrap(),
            vec!["demo-control-plane".to_string()]
        );
    }

    #[tokio::test]
    async fn test_delete_absent_cluster_is_ok() {
        let backend = Arc::new(FakeKind::default());
        let engine = Arc::new(FakeEngine::ready());
        let p = provisioner(KindConfig::named("demo"), backend, engine);

        p.delete(&OpContext::default(), "").await.unwrap();
    }

    #[tokio::test]
    async fn test_exists() {
        let backend = Arc::new(FakeKind::default());
        backend.clusters.lock().unwrap().push("demo".to_string());
        let engine = Arc::new(FakeEngine::ready());
        let p = provisioner(KindConfig::named("demo"), backend, engine);

        let ctx = OpContext::default();
        assert!(p.exists(&ctx, "").await.unwrap());
        assert!(!p.exists(&ctx, "other").await.unwrap());
    }
}
