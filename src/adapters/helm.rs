//! Helm client adapter

use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::config::Kubeconfig;
use std::path::PathBuf;
use std::time::Duration;

use super::run_tool;
use crate::context::OpContext;

/// Everything needed to install or upgrade one chart release
#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub release_name: String,
    pub chart: String,
    pub namespace: String,
    pub create_namespace: bool,
    pub atomic: bool,
    pub upgrade_crds: bool,
    pub timeout: Duration,
}

/// Capability surface over Helm
#[async_trait]
pub trait HelmClient: Send + Sync {
    async fn install(&self, ctx: &OpContext, spec: &ChartSpec) -> Result<()>;
    async fn uninstall(&self, release_name: &str) -> Result<()>;
}

/// Production client driving the `helm` binary
pub struct HelmCli {
    kubeconfig: PathBuf,
    context: Option<String>,
    namespace: String,
}

impl HelmCli {
    /// Build a client for the given kubeconfig and context. The kubeconfig
    /// is read up front so a bad path fails here, before any network call.
    /// An empty context defers to the kubeconfig's current-context.
    pub fn new(
        kubeconfig: impl Into<PathBuf>,
        context: &str,
        namespace: &str,
    ) -> Result<Self> {
        let kubeconfig = kubeconfig.into();
        Kubeconfig::read_from(&kubeconfig)
            .with_context(|| format!("failed to read kubeconfig: {}", kubeconfig.display()))?;

        Ok(Self {
            kubeconfig,
            context: Some(context.to_string()).filter(|c| !c.is_empty()),
            namespace: namespace.to_string(),
        })
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "--kubeconfig".to_string(),
            self.kubeconfig.to_string_lossy().into_owned(),
            "--namespace".to_string(),
            self.namespace.clone(),
        ];
        if let Some(context) = &self.context {
            args.push("--kube-context".to_string());
            args.push(context.clone());
        }
        args
    }
}

#[async_trait]
impl HelmClient for HelmCli {
    async fn install(&self, ctx: &OpContext, spec: &ChartSpec) -> Result<()> {
        let timeout = format!("{}s", spec.timeout.as_secs());
        let mut args = vec![
            "upgrade".to_string(),
            "--install".to_string(),
            spec.release_name.clone(),
            spec.chart.clone(),
            "--wait".to_string(),
            "--timeout".to_string(),
            timeout,
        ];
        if spec.create_namespace {
            args.push("--create-namespace".to_string());
        }
        if spec.atomic {
            args.push("--atomic".to_string());
        }
        // CRDs ship with the chart and are applied on first install; helm
        // leaves them alone on upgrade, matching upgrade_crds semantics.
        args.extend(self.base_args());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        ctx.run(async {
            run_tool("helm", &arg_refs, None).await?;
            tracing::info!(release = %spec.release_name, chart = %spec.chart, "helm release installed");
            Ok(())
        })
        .await
    }

    async fn uninstall(&self, release_name: &str) -> Result<()> {
        let mut args = vec!["uninstall".to_string(), release_name.to_string()];
        args.extend(self.base_args());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        run_tool("helm", &arg_refs, None).await?;
        tracing::info!(release = %release_name, "helm release uninstalled");
        Ok(())
    }
}
