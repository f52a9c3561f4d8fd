use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::{Engine, EngineError};
use crate::observability;

pub const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Compact the WAL once more than `threshold` appends have accumulated.
/// Returns whether a compaction ran.
pub async fn compact_if_due(engine: &Engine, threshold: u64) -> Result<bool, EngineError> {
    let appends = engine.wal_appends_since_compact().await;
    if appends <= threshold {
        return Ok(false);
    }
    info!(appends, threshold, "compacting WAL");
    engine.compact_wal().await?;
    Ok(true)
}

/// Background task that keeps the WAL from growing without bound.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        match compact_if_due(&engine, threshold).await {
            Ok(true) => {
                metrics::counter!(observability::WAL_COMPACTIONS_TOTAL, "status" => "ok").increment(1);
            }
            Ok(false) => {}
            Err(e) => {
                metrics::counter!(observability::WAL_COMPACTIONS_TOTAL, "status" => "error").increment(1);
                tracing::error!("WAL compaction failed: {e}");
            }
        }
    }
}
