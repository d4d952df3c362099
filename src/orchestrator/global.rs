use super::core::Orchestrator;
use crate::config::OrchestratorConfig;
use crate::Result;
use once_cell::sync::OnceCell;
use tracing::warn;

static GLOBAL: OnceCell<Orchestrator> = OnceCell::new();

/// Build the process-wide orchestrator, or return the existing one.
///
/// A second call is a no-op: its configuration is ignored and a warning is
/// logged. The instance's background tasks live on the runtime it was built in.
pub fn init_global(config: OrchestratorConfig) -> Result<Orchestrator> {
    get_or_init(config).map(|(orchestrator, _)| orchestrator)
}

/// Like [`init_global`], also reporting whether this call built the instance.
///
/// Concurrent callers block on the one initializer; every caller that did not
/// run it logs the warning, including those that raced the first call.
pub(crate) fn get_or_init(config: OrchestratorConfig) -> Result<(Orchestrator, bool)> {
    let mut created = false;
    let orchestrator = GLOBAL.get_or_try_init(|| {
        created = true;
        Orchestrator::new(config)
    })?;
    if !created {
        warn!("global orchestrator already initialized; keeping existing instance");
    }
    Ok((orchestrator.clone(), created))
}

/// The process-wide orchestrator, if [`init_global`] has run.
pub fn global() -> Option<Orchestrator> {
    GLOBAL.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    // The only test touching the process-wide instance.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_racing_initializers_share_one_instance() {
        assert!(global().is_none());

        let handles: Vec<_> = [5u64, 7]
            .into_iter()
            .map(|rpw| {
                let config = OrchestratorConfig::new()
                    .with_requests_per_window(rpw)
                    .with_monitoring(false, "warn");
                tokio::task::spawn_blocking(move || get_or_init(config))
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }
        assert_eq!(results.iter().filter(|(_, created)| *created).count(), 1);

        let winner = results[0].0.config().requests_per_window;
        assert!(winner == 5 || winner == 7);
        assert_eq!(results[1].0.config().requests_per_window, winner);

        let later = init_global(OrchestratorConfig::new().with_requests_per_window(9)).unwrap();
        assert_eq!(later.config().requests_per_window, winner);
        assert_eq!(global().unwrap().config().requests_per_window, winner);
    }
}
