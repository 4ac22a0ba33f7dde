//! Periodic eviction of expired rate-limit windows.
//!
//! Without it the limiter table grows by one entry per client key ever seen.

use std::sync::Weak;
use std::time::Duration;

use meterdeck_core::rate_limit::RateLimiter;
use tokio_util::sync::CancellationToken;

/// Run the sweep loop until `cancel` fires or the limiter is dropped.
pub async fn run(limiter: Weak<RateLimiter>, period: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = period.as_secs(), "Rate limit sweep started");

    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Rate limit sweep stopping");
                break;
            }
            _ = interval.tick() => {
                let Some(limiter) = limiter.upgrade() else {
                    tracing::debug!("Rate limiter dropped, sweep exiting");
                    break;
                };
                let removed = limiter.sweep();
                if removed > 0 {
                    tracing::debug!(removed, remaining = limiter.len(), "Swept rate limit entries");
                }
            }
        }
    }
}
