//! Fixed-interval readiness polling

use anyhow::{anyhow, Result};
use std::future::Future;
use std::time::Duration;

use crate::context::OpContext;

/// Standard polling interval for readiness checks
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Poll `check` at a fixed interval until it reports done, fails, the
/// context's deadline passes, or the context is cancelled. The first check
/// runs immediately.
pub async fn poll_until<F, Fut>(ctx: &OpContext, interval: Duration, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = tokio::time::Instant::now() + ctx.timeout();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ctx.cancelled() => return Err(anyhow!("operation cancelled")),
            _ = tokio::time::sleep_until(deadline) => {
                return Err(anyhow!("timed out after {:?}", ctx.timeout()));
            }
            _ = ticker.tick() => {
                if check().await? {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_poll_until_done() {
        let ctx = OpContext::new(CancellationToken::new(), Duration::from_secs(5));
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        poll_until(&ctx, Duration::from_millis(1), move || {
            let counter = counter.clone();
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst) >= 2) }
        })
        .await
        .unwrap();

        assert!(attempts.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_poll_until_error_is_terminal() {
        let ctx = OpContext::new(CancellationToken::new(), Duration::from_secs(5));
        let err = poll_until(&ctx, Duration::from_millis(1), || async {
            Err(anyhow!("backend broke"))
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("backend broke"));
    }

    #[tokio::test]
    async fn test_poll_until_deadline() {
        let ctx = OpContext::new(CancellationToken::new(), Duration::from_millis(20));
        let err = poll_until(&ctx, Duration::from_millis(1), || async { Ok(false) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
