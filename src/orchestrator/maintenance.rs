//! Background maintenance: window re-evaluation and cache sweeps.
//!
//! Both tasks hold only a weak reference, so they end when the last
//! [`Orchestrator`](super::Orchestrator) clone is dropped or on `destroy()`.

use super::core::Inner;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

pub(crate) fn spawn(inner: &Arc<Inner>) {
    spawn_window_ticker(inner, inner.config.window_check_interval);
    if inner.cache.is_enabled() {
        spawn_cache_sweeper(inner, inner.config.cache_sweep_interval);
    }
}

fn spawn_window_ticker(inner: &Arc<Inner>, every: Duration) {
    let weak = Arc::downgrade(inner);
    let token = inner.shutdown.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(inner) = weak.upgrade() else { break };
                    if inner.limiter.refresh() {
                        debug!("rate limit window reset");
                    }
                }
            }
        }
    });
}

fn spawn_cache_sweeper(inner: &Arc<Inner>, every: Duration) {
    let weak = Arc::downgrade(inner);
    let token = inner.shutdown.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(inner) = weak.upgrade() else { break };
                    match inner.cache.sweep().await {
                        Ok(0) => {}
                        Ok(removed) => debug!(removed, "expired cache entries swept"),
                        Err(e) => warn!(error = %e, "cache sweep failed"),
                    }
                }
            }
        }
    });
}
