//! Reconciliation-tool installers
//!
//! Installs the cluster-side agent the reconciliation tool needs: the
//! ApplySet parent objects for kubectl, or the Flux operator Helm release.
//! Installers hold no state between calls; the factory wires production
//! adapters built from the resolved connection settings.

mod applyset;
mod flux;

pub use applyset::{applyset_api_resource, KubectlInstaller, CRD_NAME, PARENT_NAME};
pub use flux::{FluxInstaller, CHART, NAMESPACE, RELEASE_NAME};

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::adapters::helm::HelmCli;
use crate::adapters::kube::{build_client, KubeCrdApi, KubeDynamicApi};
use crate::config::{expand_home, LoadedConfig, ReconciliationTool};
use crate::context::OpContext;

/// Contract shared by all reconciliation-tool installers
#[async_trait]
pub trait ReconciliationInstaller: Send + Sync {
    async fn install(&self, ctx: &OpContext) -> Result<()>;
    async fn uninstall(&self, ctx: &OpContext) -> Result<()>;
}

/// Build the installer for the configured reconciliation tool.
pub async fn build_installer(loaded: &LoadedConfig) -> Result<Box<dyn ReconciliationInstaller>> {
    let tool = loaded
        .cluster
        .spec
        .reconciliation_tool
        .unwrap_or(ReconciliationTool::Kubectl);

    let kubeconfig = expand_home(&loaded.cluster.spec.connection.kubeconfig)?;
    let context = &loaded.cluster.spec.connection.context;

    match tool {
        ReconciliationTool::Kubectl => {
            let client = build_client(Path::new(&kubeconfig), context).await?;
            let crds = Arc::new(KubeCrdApi::new(client.clone()));
            let parents = Arc::new(KubeDynamicApi::cluster_scoped(
                client,
                &applyset_api_resource(),
            ));
            Ok(Box::new(KubectlInstaller::new(crds, parents)))
        }
        ReconciliationTool::Flux => {
            let helm = Arc::new(HelmCli::new(&kubeconfig, context, NAMESPACE)?);
            Ok(Box::new(FluxInstaller::new(helm)))
        }
        ReconciliationTool::ArgoCD => bail!("unsupported reconciliation tool 'ArgoCD'"),
    }
}
