//! Command-line surface
//!
//! Clap definitions for every subcommand, the flag-to-selector mapping, and
//! the outermost error normalization. Only flags the user actually set are
//! turned into overrides, so defaults registered here never shadow file or
//! environment values.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Overrides;
use crate::lifecycle::LifecycleConfig;

#[derive(Debug, Parser)]
#[command(name = "ksail", version)]
#[command(about = "Provision local Kubernetes clusters on Docker or Podman")]
pub struct Cli {
    /// Log verbosity: trace, debug, info, warn, error
    #[arg(long, global = true, default_value = "warn")]
    pub verbosity: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scaffold a new project in the output directory
    Init {
        /// Directory to place the scaffolded files in
        #[arg(short = 'o', long, default_value = "./")]
        output: PathBuf,

        /// Overwrite existing files
        #[arg(short = 'f', long)]
        force: bool,

        #[command(flatten)]
        cluster: ClusterArgs,
    },

    /// Create the cluster and install the reconciliation tool
    Up {
        #[command(flatten)]
        cluster: ClusterArgs,
    },

    /// Start a stopped cluster
    Start {
        #[command(flatten)]
        cluster: ClusterArgs,
    },

    /// Stop a running cluster
    Stop {
        #[command(flatten)]
        cluster: ClusterArgs,
    },

    /// Delete the cluster
    Down {
        #[command(flatten)]
        cluster: ClusterArgs,
    },

    /// List clusters of the configured distribution
    List {
        /// Include stopped clusters
        #[arg(short = 'a', long)]
        all: bool,

        #[command(flatten)]
        cluster: ClusterArgs,
    },

    /// Report engine and cluster status
    Status {
        #[command(flatten)]
        cluster: ClusterArgs,
    },
}

/// Cluster flags shared by every subcommand. Shorthands follow the field
/// selectors; the engine flag stays long-only because `-c` belongs to the
/// context selector.
#[derive(Debug, Args, Default, Clone)]
pub struct ClusterArgs {
    /// Name of the cluster
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Kubernetes distribution (Kind or K3d)
    #[arg(short = 'd', long)]
    pub distribution: Option<String>,

    /// Reconciliation tool (Kubectl or Flux)
    #[arg(short = 'r', long)]
    pub reconciliation_tool: Option<String>,

    /// Container engine (Docker or Podman)
    #[arg(long)]
    pub container_engine: Option<String>,

    /// Directory holding the workload manifests
    #[arg(short = 's', long)]
    pub source_directory: Option<String>,

    /// Kubeconfig context
    #[arg(short = 'c', long)]
    pub context: Option<String>,

    /// Path to the kubeconfig file
    #[arg(short = 'k', long)]
    pub kubeconfig: Option<String>,

    /// Timeout for cluster operations (e.g. 30s, 5m)
    #[arg(short = 't', long)]
    pub timeout: Option<String>,
}

impl ClusterArgs {
    /// Overrides for the loader's flag layer; unset flags contribute
    /// nothing.
    pub fn to_overrides(&self) -> Overrides {
        let mut overrides = Overrides::new();
        let mappings: [(&'static str, &Option<String>); 8] = [
            ("metadata.name", &self.name),
            ("spec.distribution", &self.distribution),
            ("spec.reconciliationTool", &self.reconciliation_tool),
            ("spec.containerEngine", &self.container_engine),
            ("spec.sourceDirectory", &self.source_directory),
            ("spec.connection.context", &self.context),
            ("spec.connection.kubeconfig", &self.kubeconfig),
            ("spec.connection.timeout", &self.timeout),
        ];
        for (path, value) in mappings {
            if let Some(value) = value {
                overrides.set(path, value.clone());
            }
        }
        overrides
    }
}

/// Lifecycle descriptors for the cluster verbs
pub const UP: LifecycleConfig = LifecycleConfig {
    title: "Creating cluster",
    emoji: "⛵",
    activity: "creating cluster",
    success: "cluster created",
    error_prefix: "failed to create cluster",
};

pub const START: LifecycleConfig = LifecycleConfig {
    title: "Starting cluster",
    emoji: "▶️",
    activity: "starting cluster",
    success: "cluster started",
    error_prefix: "failed to start cluster",
};

pub const STOP: LifecycleConfig = LifecycleConfig {
    title: "Stopping cluster",
    emoji: "⏸️",
    activity: "stopping cluster",
    success: "cluster stopped",
    error_prefix: "failed to stop cluster",
};

pub const DOWN: LifecycleConfig = LifecycleConfig {
    title: "Deleting cluster",
    emoji: "🔥",
    activity: "deleting cluster",
    success: "cluster deleted",
    error_prefix: "failed to delete cluster",
};

pub const LIST: LifecycleConfig = LifecycleConfig {
    title: "Listing clusters",
    emoji: "📋",
    activity: "listing clusters for",
    success: "clusters listed",
    error_prefix: "failed to list clusters",
};

/// Outermost error-surface normalization: strip a leading `error:` prefix,
/// trim surrounding whitespace, keep everything else (usage hints included).
pub fn normalize_error_message(message: &str) -> String {
    let trimmed = message.trim();
    let stripped = trimmed
        .strip_prefix("Error:")
        .or_else(|| trimmed.strip_prefix("error:"))
        .unwrap_or(trimmed);
    stripped.trim().to_string()
}
