use async_trait::async_trait;
use gateway_hub::LatencyStats;
use gateway_hub::NetworkStats;

/// Sampling this gateway's own network interface / ping latency is an
/// external collaborator (platform-specific, like the local master's wire
/// RPC in [`gateway_master::MasterApi`]); the watcher only consumes it
/// through this trait (§4.6, §4.8 step 6).
#[async_trait]
pub trait NetworkStatsSource: Send + Sync {
    async fn sample_network_stats(&self) -> NetworkStats;
    async fn sample_latency(&self) -> LatencyStats;
}

/// Reports nothing-yet-measured, for gateways with no platform-specific
/// network sampler wired in. Publishing the defaults still satisfies §4.8
/// step 6's "publish ... to each hub": it just reports `info_available = false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNetworkStats;

#[async_trait]
impl NetworkStatsSource for NoNetworkStats {
    async fn sample_network_stats(&self) -> NetworkStats {
        NetworkStats::default()
    }

    async fn sample_latency(&self) -> LatencyStats {
        LatencyStats::default()
    }
}
