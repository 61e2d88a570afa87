//! Operation context
//!
//! Carries the cancellation token and timeout every long-running operation
//! binds to. Provisioners and installers thread it through to adapter calls
//! and polling loops.

use anyhow::{anyhow, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::Timeout;

#[derive(Debug, Clone)]
pub struct OpContext {
    cancel: CancellationToken,
    timeout: Duration,
}

impl OpContext {
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self { cancel, timeout }
    }

    /// Context with the given timeout and a fresh, never-cancelled token
    #[allow(dead_code)]
    pub fn with_timeout(timeout: Timeout) -> Self {
        Self::new(CancellationToken::new(), timeout.duration())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Run a fallible future bounded by this context's timeout and
    /// cancellation token.
    pub async fn run<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(anyhow!("operation cancelled")),
            result = tokio::time::timeout(self.timeout, fut) => match result {
                Ok(inner) => inner,
                Err(_) => Err(anyhow!("operation timed out after {:?}", self.timeout)),
            },
        }
    }
}

impl Default for OpContext {
    fn default() -> Self {
        Self::new(CancellationToken::new(), Duration::from_secs(300))
    }
}
