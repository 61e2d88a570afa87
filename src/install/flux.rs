//! Flux operator installer

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use super::ReconciliationInstaller;
use crate::adapters::helm::{ChartSpec, HelmClient};
use crate::context::OpContext;

/// Helm release name of the operator
pub const RELEASE_NAME: &str = "flux-operator";

/// OCI chart the operator ships as
pub const CHART: &str = "oci://ghcr.io/controlplaneio-fluxcd/charts/flux-operator";

/// Namespace the operator is installed into
pub const NAMESPACE: &str = "flux-system";

pub struct FluxInstaller {
    helm: Arc<dyn HelmClient>,
}

impl FluxInstaller {
    pub fn new(helm: Arc<dyn HelmClient>) -> Self {
        Self { helm }
    }
}

#[async_trait]
impl ReconciliationInstaller for FluxInstaller {
    async fn install(&self, ctx: &OpContext) -> Result<()> {
        let spec = ChartSpec {
            release_name: RELEASE_NAME.to_string(),
            chart: CHART.to_string(),
            namespace: NAMESPACE.to_string(),
            create_namespace: true,
            atomic: true,
            upgrade_crds: true,
            timeout: ctx.timeout(),
        };

        self.helm
            .install(ctx, &spec)
            .await
            .context("failed to install Flux operator")?;
        tracing::info!(release = RELEASE_NAME, namespace = NAMESPACE, "Flux operator installed");
        Ok(())
    }

    async fn uninstall(&self, ctx: &OpContext) -> Result<()> {
        match self.helm.uninstall(RELEASE_NAME).await {
            Ok(()) => Ok(()),
            Err(err) if ctx.is_cancelled() => {
                tracing::debug!(error = %err, "ignoring uninstall failure after cancellation");
                Ok(())
            }
            Err(err) if err.to_string().to_lowercase().contains("not found") => {
                tracing::debug!(error = %err, "release already absent");
                Ok(())
            }
            Err(err) => Err(err.context("failed to uninstall flux-operator release")),
        }
    }
}
