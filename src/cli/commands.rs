//! Subcommand dispatch
//!
//! Wires each CLI verb to the lifecycle executor. The executor owns
//! configuration loading and provisioner resolution; this module only
//! decides which verb runs and what happens around it (installer steps,
//! scaffolding, status reporting).

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{ClusterArgs, Commands, DOWN, LIST, START, STOP, UP};
use crate::config::{
    build_default_cluster, ClusterConfigLoader, ContainerEngine, ReconciliationTool,
};
use crate::engine::{with_engine_client, DockerEngine};
use crate::install::build_installer;
use crate::lifecycle::LifecycleExecutor;
use crate::notify::Notifier;
use crate::scaffold::Scaffolder;

pub async fn dispatch(
    command: Commands,
    notifier: Notifier,
    cancel: CancellationToken,
) -> Result<()> {
    match command {
        Commands::Init {
            output,
            force,
            cluster,
        } => init(&output, force, &cluster, &notifier),
        Commands::Up { cluster } => up(cluster, notifier, cancel).await,
        Commands::Start { cluster } => {
            let executor = build_executor(&cluster, notifier, cancel)?;
            executor
                .run(START, |ctx, provisioner, name| async move {
                    provisioner.start(&ctx, &name).await
                })
                .await
        }
        Commands::Stop { cluster } => {
            let executor = build_executor(&cluster, notifier, cancel)?;
            executor
                .run(STOP, |ctx, provisioner, name| async move {
                    provisioner.stop(&ctx, &name).await
                })
                .await
        }
        Commands::Down { cluster } => down(cluster, notifier, cancel).await,
        Commands::List { all, cluster } => list(all, cluster, notifier, cancel).await,
        Commands::Status { cluster } => status(cluster, notifier, cancel).await,
    }
}

fn build_executor(
    cluster: &ClusterArgs,
    notifier: Notifier,
    cancel: CancellationToken,
) -> Result<LifecycleExecutor> {
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let loader = ClusterConfigLoader::new(cwd, cluster.to_overrides(), notifier.clone());
    Ok(LifecycleExecutor::new(loader, notifier, cancel))
}

fn init(
    output: &std::path::Path,
    force: bool,
    cluster: &ClusterArgs,
    notifier: &Notifier,
) -> Result<()> {
    let document = build_default_cluster(&cluster.to_overrides())?;

    notifier.title("⛵", "Initializing project");
    let written = Scaffolder::new(output, force).scaffold(&document)?;
    for path in &written {
        notifier.info(format!("created {}", path.display()));
    }
    notifier.success("project initialized");
    Ok(())
}

async fn up(cluster: ClusterArgs, notifier: Notifier, cancel: CancellationToken) -> Result<()> {
    let executor = build_executor(&cluster, notifier.clone(), cancel)?;

    executor
        .run(UP, |ctx, provisioner, name| async move {
            provisioner.create(&ctx, &name).await
        })
        .await?;

    // Post-provision step: install the configured reconciliation tool
    let loaded = executor.load_config()?;
    let tool = loaded
        .cluster
        .spec
        .reconciliation_tool
        .unwrap_or(ReconciliationTool::Kubectl);

    notifier.activity(format!("installing {tool}..."));
    let installer = build_installer(loaded).await?;
    let ctx = executor.op_context(loaded);
    installer.install(&ctx).await?;
    notifier.success(format!("{tool} installed"));

    Ok(())
}

async fn down(cluster: ClusterArgs, notifier: Notifier, cancel: CancellationToken) -> Result<()> {
    let executor = build_executor(&cluster, notifier, cancel)?;

    // Best-effort teardown of the reconciliation tool while the cluster may
    // still be reachable; a dead cluster must not block deletion.
    let loaded = executor.load_config()?;
    if let Ok(installer) = build_installer(loaded).await {
        let ctx = executor.op_context(loaded);
        if let Err(err) = ctx.run(installer.uninstall(&ctx)).await {
            tracing::debug!(error = %err, "skipping reconciliation-tool uninstall");
        }
    }

    executor
        .run(DOWN, |ctx, provisioner, name| async move {
            provisioner.delete(&ctx, &name).await
        })
        .await
}

async fn list(
    all: bool,
    cluster: ClusterArgs,
    notifier: Notifier,
    cancel: CancellationToken,
) -> Result<()> {
    let executor = build_executor(&cluster, notifier.clone(), cancel)?;

    executor
        .run(LIST, move |ctx, provisioner, _name| {
            let notifier = notifier.clone();
            async move {
                let clusters = provisioner.list(&ctx).await?;
                let mut shown = 0usize;
                for cluster in clusters {
                    if !all && !cluster.running {
                        continue;
                    }
                    let state = if cluster.running { "running" } else { "stopped" };
                    notifier.info(format!("{} ({state})", cluster.name));
                    shown += 1;
                }
                if shown == 0 {
                    notifier.info("no clusters found");
                }
                Ok(())
            }
        })
        .await
}

async fn status(
    cluster: ClusterArgs,
    notifier: Notifier,
    cancel: CancellationToken,
) -> Result<()> {
    let executor = build_executor(&cluster, notifier.clone(), cancel)?;
    let loaded = executor.load_config()?;
    let ctx = executor.op_context(loaded);

    let engine_kind = loaded
        .cluster
        .spec
        .container_engine
        .unwrap_or(ContainerEngine::Docker);

    notifier.title("⛵", "Cluster status");

    let engine = Arc::new(DockerEngine::connect(engine_kind)?);
    let ready = with_engine_client(engine, &notifier, |client| {
        let ctx = ctx.clone();
        async move { client.ping(&ctx).await }
    })
    .await
    .unwrap_or(false);
    notifier.info(format!(
        "container engine '{engine_kind}': {}",
        if ready { "ready" } else { "not ready" }
    ));

    if ready {
        let provisioner = crate::provisioner::build_provisioner(loaded)?;
        let name = loaded.cluster_name()?;
        let exists = provisioner.exists(&ctx, &name).await?;
        notifier.info(format!(
            "cluster '{name}': {}",
            if exists { "present" } else { "absent" }
        ));
    }

    Ok(())
}
