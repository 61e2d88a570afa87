//! Provisioner construction
//!
//! Dispatches on the resolved distribution and wires up production
//! adapters. This is the single place `DOCKER_HOST` is touched: for Podman
//! the variable is exported before the engine client is built, routing the
//! Docker API over the user's Podman socket.

use anyhow::{bail, Result};
use std::sync::Arc;

use super::{ClusterProvisioner, K3dProvisioner, KindProvisioner};
use crate::adapters::k3d::K3dCli;
use crate::adapters::kind::KindCli;
use crate::config::{expand_home, ContainerEngine, Distribution, LoadedConfig};
use crate::engine::{podman_docker_host, DockerEngine};

pub fn build_provisioner(loaded: &LoadedConfig) -> Result<Box<dyn ClusterProvisioner>> {
    let distribution = loaded.distribution()?;
    let engine_kind = loaded
        .cluster
        .spec
        .container_engine
        .unwrap_or(ContainerEngine::Docker);

    if engine_kind == ContainerEngine::Podman {
        std::env::set_var("DOCKER_HOST", podman_docker_host());
        tracing::debug!(docker_host = %podman_docker_host(), "routing engine calls over the Podman socket");
    }

    let engine = Arc::new(DockerEngine::connect(engine_kind)?);

    match distribution {
        Distribution::Kind => {
            let kubeconfig = resolve_kubeconfig(&loaded.cluster.spec.connection.kubeconfig)?;
            let config = loaded.kind_config.clone().unwrap_or_default();
            Ok(Box::new(KindProvisioner::new(
                config,
                kubeconfig.clone(),
                Arc::new(KindCli::new(kubeconfig)),
                engine,
                engine_kind,
            )))
        }
        Distribution::K3d => {
            let config = loaded.k3d_config.clone().unwrap_or_default();
            let cli = Arc::new(K3dCli::new());
            Ok(Box::new(K3dProvisioner::new(
                config,
                cli.clone(),
                cli,
                engine,
                engine_kind,
            )))
        }
        Distribution::Tind => bail!("unsupported distribution 'Tind'"),
    }
}

fn resolve_kubeconfig(configured: &str) -> Result<String> {
    if configured.is_empty() {
        expand_home("~/.kube/config")
    } else {
        expand_home(configured)
    }
}
