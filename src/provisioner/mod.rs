//! Cluster provisioners
//!
//! One provisioner per distribution, all implementing the same lifecycle
//! contract. Provisioners consume capability adapters and never touch disk;
//! the configuration they act on is handed over by the factory.

mod factory;
mod k3d;
mod kind;

pub use factory::build_provisioner;
pub use k3d::K3dProvisioner;
pub use kind::KindProvisioner;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ContainerEngine;
use crate::context::OpContext;
use crate::engine::EngineClient;

/// A cluster as reported by `list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    pub name: String,
    pub running: bool,
}

/// Lifecycle contract shared by every distribution.
///
/// An empty `name` falls back to the distribution-config name, then to the
/// distribution's terminal default. All operations are idempotent.
#[async_trait]
pub trait ClusterProvisioner: Send + Sync {
    async fn create(&self, ctx: &OpContext, name: &str) -> Result<()>;
    async fn start(&self, ctx: &OpContext, name: &str) -> Result<()>;
    async fn stop(&self, ctx: &OpContext, name: &str) -> Result<()>;
    async fn delete(&self, ctx: &OpContext, name: &str) -> Result<()>;
    async fn list(&self, ctx: &OpContext) -> Result<Vec<ClusterInfo>>;
    async fn exists(&self, ctx: &OpContext, name: &str) -> Result<bool>;
}

/// Gate guarding every state-changing operation: nothing reaches the
/// backend while the engine does not answer.
pub(crate) async fn ensure_engine_ready(
    ctx: &OpContext,
    engine: &Arc<dyn EngineClient>,
    engine_kind: ContainerEngine,
) -> Result<()> {
    match engine.ping(ctx).await {
        Ok(true) => Ok(()),
        Ok(false) => bail!("container engine '{engine_kind}' is not ready: ping returned false"),
        Err(err) => bail!("container engine '{engine_kind}' is not ready: {err}"),
    }
}

/// Cluster names end up as container and context names, so they are held to
/// DNS-label shape.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("cluster name must not be empty");
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-');
    if !valid {
        bail!("invalid cluster name '{name}': use lowercase letters, digits and dashes");
    }
    Ok(())
}
