//! Service entry point that hides the wiring.

use std::sync::Arc;

use permgate_config::EngineConfig;
use permgate_network::{ConstraintService, FactProvider};
use tracing::{info, warn};

/// Configuration file read by [`start`] from the working directory.
pub const CONFIG_FILE: &str = "permgate.toml";

/// Builds a service from `permgate.toml` (or defaults) and starts its push
/// listener.
///
/// Outside a Tokio runtime the listener is not started and only pull
/// evaluation is available.
pub fn start(provider: Arc<dyn FactProvider>) -> Arc<ConstraintService> {
    let config = EngineConfig::load(CONFIG_FILE).unwrap_or_default();
    info!(
        event = "service_starting",
        duplicate_policy = ?config.registry.duplicate_policy,
        fetch_timeout_ms = config.provider.fetch_timeout_ms,
        max_depth = config.limits.max_depth as u64,
        max_nodes = config.limits.max_nodes as u64,
    );

    let service = Arc::new(ConstraintService::new(config, provider));
    if tokio::runtime::Handle::try_current().is_ok() {
        service.spawn_fact_listener();
    } else {
        warn!(event = "fact_listener_skipped", reason = "no tokio runtime");
    }
    service
}
