//! Container engine access
//!
//! Wraps the engine behind a narrow capability trait so provisioners can be
//! tested without a daemon. Docker and Podman share the same API surface;
//! Podman is reached through its Docker-compatible socket, selected by the
//! provisioner factory exporting `DOCKER_HOST`.

#![allow(deprecated)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use bollard::query_parameters::{
    InspectContainerOptions, ListContainersOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::Docker;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::config::ContainerEngine;
use crate::context::OpContext;
use crate::notify::Notifier;

/// A container as the engine reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub name: String,
    pub running: bool,
}

/// Narrow capability surface over the container engine
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Whether the engine daemon answers
    async fn ping(&self, ctx: &OpContext) -> Result<bool>;

    /// Containers carrying the given label, in any state
    async fn list_containers(&self, ctx: &OpContext, label: &str) -> Result<Vec<ContainerSummary>>;

    async fn start_container(&self, ctx: &OpContext, name: &str) -> Result<()>;

    async fn stop_container(&self, ctx: &OpContext, name: &str) -> Result<()>;

    /// Release the client. Errors are reported as cleanup warnings and never
    /// overwrite an operation result.
    fn close(&self) -> Result<()>;
}

/// Bollard-backed engine client
pub struct DockerEngine {
    client: Docker,
}

impl DockerEngine {
    pub fn connect(engine: ContainerEngine) -> Result<Self> {
        let socket = engine_socket_path(engine);
        let client = Docker::connect_with_unix(&socket, 120, bollard::API_DEFAULT_VERSION)
            .with_context(|| format!("failed to connect to {engine} at {socket}"))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl EngineClient for DockerEngine {
    async fn ping(&self, ctx: &OpContext) -> Result<bool> {
        ctx.run(async {
            self.client.ping().await.context("engine ping failed")?;
            Ok(true)
        })
        .await
    }

    async fn list_containers(
        &self,
        ctx: &OpContext,
        label: &str,
    ) -> Result<Vec<ContainerSummary>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![label.to_string()]);

        ctx.run(async {
            let containers = self
                .client
                .list_containers(Some(ListContainersOptions {
                    all: true,
                    filters: Some(filters),
                    ..Default::default()
                }))
                .await
                .context("failed to list containers")?;

            let names: Vec<String> = containers
                .into_iter()
                .filter_map(|container| container.names)
                .filter_map(|names| names.first().cloned())
                .map(|name| name.trim_start_matches('/').to_string())
                .collect();

            let mut summaries = Vec::with_capacity(names.len());
            for name in names {
                let running = self
                    .client
                    .inspect_container(&name, None::<InspectContainerOptions>)
                    .await
                    .ok()
                    .and_then(|info| info.state)
                    .and_then(|state| state.running)
                    .unwrap_or(false);
                summaries.push(ContainerSummary { name, running });
            }
            Ok(summaries)
        })
        .await
    }

    async fn start_container(&self, ctx: &OpContext, name: &str) -> Result<()> {
        ctx.run(async {
            self.client
                .start_container(name, None::<StartContainerOptions>)
                .await
                .with_context(|| format!("failed to start container {name}"))
        })
        .await
    }

    async fn stop_container(&self, ctx: &OpContext, name: &str) -> Result<()> {
        ctx.run(async {
            self.client
                .stop_container(
                    name,
                    Some(StopContainerOptions {
                        t: Some(10),
                        ..Default::default()
                    }),
                )
                .await
                .with_context(|| format!("failed to stop container {name}"))
        })
        .await
    }

    fn close(&self) -> Result<()> {
        // Bollard clients release their connections on drop
        Ok(())
    }
}

/// Unix socket the engine listens on. `DOCKER_HOST` wins when set, which is
/// how the factory routes Podman through its Docker-compatible socket.
pub fn engine_socket_path(engine: ContainerEngine) -> String {
    if let Ok(host) = std::env::var("DOCKER_HOST") {
        if let Some(path) = host.strip_prefix("unix://") {
            return path.to_string();
        }
    }

    match engine {
        ContainerEngine::Docker => "/var/run/docker.sock".to_string(),
        ContainerEngine::Podman => podman_socket_path(),
    }
}

/// Podman's rootless Docker-compatible socket for the effective user
pub fn podman_socket_path() -> String {
    let uid = nix::unistd::Uid::effective().as_raw();
    format!("/run/user/{uid}/podman/podman.sock")
}

/// `DOCKER_HOST` value for the Podman socket
pub fn podman_docker_host() -> String {
    format!("unix://{}", podman_socket_path())
}

/// Run `op` with an engine client scoped to this call. The client is always
/// released; a close failure surfaces as a cleanup warning and the
/// operation's own result is preserved.
pub async fn with_engine_client<T, F, Fut>(
    client: Arc<dyn EngineClient>,
    notifier: &Notifier,
    op: F,
) -> Result<T>
where
    F: FnOnce(Arc<dyn EngineClient>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let result = op(client.clone()).await;

    if let Err(close_err) = client.close() {
        notifier.warning(format!("cleanup warning: close failed: {close_err}"));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FakeEngine {
        close_error: bool,
    }

    #[async_trait]
    impl EngineClient for FakeEngine {
        async fn ping(&self, _ctx: &OpContext) -> Result<bool> {
            Ok(true)
        }

        async fn list_containers(
            &self,
            _ctx: &OpContext,
            _label: &str,
        ) -> Result<Vec<ContainerSummary>> {
            Ok(Vec::new())
        }

        async fn start_container(&self, _ctx: &OpContext, _name: &str) -> Result<()> {
            Ok(())
        }

        async fn stop_container(&self, _ctx: &OpContext, _name: &str) -> Result<()> {
            Ok(())
        }

        fn close(&self) -> Result<()> {
            if self.close_error {
                Err(anyhow!("socket already gone"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_scope_preserves_op_error_over_close_error() {
        let (notifier, buffer) = Notifier::buffered();
        let client = Arc::new(FakeEngine { close_error: true });

        let result: Result<()> = with_engine_client(client, &notifier, |_| async {
            Err(anyhow!("op failed"))
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "op failed");

        let output = buffer.contents();
        assert!(output.contains("cleanup warning"));
        assert!(output.contains("close failed"));
    }

    #[tokio::test]
    async fn test_scope_returns_op_value() {
        let (notifier, buffer) = Notifier::buffered();
        let client = Arc::new(FakeEngine { close_error: false });

        let value = with_engine_client(client, &notifier, |_| async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn test_podman_docker_host_shape() {
        let host = podman_docker_host();
        assert!(host.starts_with("unix:///run/user/"));
        assert!(host.ends_with("/podman/podman.sock"));
    }
}
