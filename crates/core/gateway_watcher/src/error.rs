use thiserror::Error;

/// Failures that abort a whole tick (§4.8). Every other per-step failure is
/// fail-soft: logged and skipped so the tick still completes (§7).
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("failed to snapshot local connection state: {0}")]
    Snapshot(#[from] gateway_master::MirrorError),
}
