use std::time::Duration;

/// Parameters for one [`crate::Watcher`] instance (§4.8, §6).
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub period: Duration,
    /// If true, inbound flips are acknowledged as BLOCKED rather than realized.
    pub firewall: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        WatcherConfig {
            period: Duration::from_secs(3),
            firewall: false,
        }
    }
}

impl WatcherConfig {
    pub fn new(period: Duration, firewall: bool) -> WatcherConfig {
        WatcherConfig { period, firewall }
    }
}
