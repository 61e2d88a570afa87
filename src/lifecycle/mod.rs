//! Lifecycle execution
//!
//! Uniform wrapper around every cluster verb: load configuration, resolve
//! the provisioner, emit progress notifications, run the action bounded by
//! the configured timeout, and normalize the error surface. Variants are
//! data (`LifecycleConfig`), not types.

use anyhow::Result;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::{ClusterConfigLoader, LoadedConfig};
use crate::context::OpContext;
use crate::notify::{Message, MessageType, Notifier};
use crate::provisioner::{build_provisioner, ClusterProvisioner};

/// Sentinel for a dependency-injection hole: the factory produced no
/// provisioner at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("missing cluster provisioner dependency")]
pub struct MissingProvisioner;

/// Descriptor of one lifecycle verb
#[derive(Debug, Clone, Copy)]
pub struct LifecycleConfig {
    pub title: &'static str,
    pub emoji: &'static str,
    /// Activity text, e.g. "creating cluster"
    pub activity: &'static str,
    /// Success text, e.g. "cluster created"
    pub success: &'static str,
    /// Prefix wrapped around action errors
    pub error_prefix: &'static str,
}

/// Staged wall-clock timer
pub struct Timer {
    started: Instant,
    stage_started: Instant,
}

impl Timer {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            stage_started: now,
        }
    }

    pub fn new_stage(&mut self) {
        self.stage_started = Instant::now();
    }

    pub fn stage_elapsed(&self) -> Duration {
        self.stage_started.elapsed()
    }

    pub fn total_elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

type ProvisionerFactory =
    Box<dyn Fn(&LoadedConfig) -> Result<Option<Box<dyn ClusterProvisioner>>> + Send + Sync>;

/// Executes lifecycle verbs with injected dependencies.
///
/// Owns the timer and the cancellation token; the loader's cache makes the
/// configuration a load-once read for every stage that follows.
pub struct LifecycleExecutor {
    loader: ClusterConfigLoader,
    notifier: Notifier,
    cancel: CancellationToken,
    factory: ProvisionerFactory,
}

impl LifecycleExecutor {
    pub fn new(loader: ClusterConfigLoader, notifier: Notifier, cancel: CancellationToken) -> Self {
        Self {
            loader,
            notifier,
            cancel,
            factory: Box::new(|loaded| build_provisioner(loaded).map(Some)),
        }
    }

    /// Replace the provisioner factory, for tests and alternative wiring.
    pub fn with_factory(
        mut self,
        factory: impl Fn(&LoadedConfig) -> Result<Option<Box<dyn ClusterProvisioner>>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.factory = Box::new(factory);
        self
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Load configuration without running a verb (status, installers).
    pub fn load_config(&self) -> Result<&LoadedConfig> {
        self.loader.load()
    }

    /// Operation context bound to the resolved timeout.
    pub fn op_context(&self, loaded: &LoadedConfig) -> OpContext {
        OpContext::new(
            self.cancel.child_token(),
            loaded.cluster.spec.connection.timeout.duration(),
        )
    }

    /// Run one lifecycle verb through all stages.
    pub async fn run<F, Fut>(&self, lifecycle: LifecycleConfig, action: F) -> Result<()>
    where
        F: FnOnce(OpContext, Box<dyn ClusterProvisioner>, String) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut timer = Timer::start();

        let loaded = self.loader.load()?;
        self.notifier.notify(
            Message::new(MessageType::Success, "config loaded")
                .with_timing(timer.stage_elapsed()),
        );
        timer.new_stage();

        let provisioner = (self.factory)(loaded)?.ok_or(MissingProvisioner)?;
        let cluster_name = loaded.cluster_name()?;

        self.notifier.title(lifecycle.emoji, lifecycle.title);
        self.notifier
            .activity(format!("{} '{}'...", lifecycle.activity, cluster_name));

        let ctx = self.op_context(loaded);
        action(ctx, provisioner, cluster_name)
            .await
            .map_err(|err| err.context(lifecycle.error_prefix))?;

        self.notifier.notify(
            Message::new(MessageType::Success, lifecycle.success)
                .with_timing(timer.total_elapsed()),
        );

        Ok(())
    }
}
