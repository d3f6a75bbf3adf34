use std::time::Duration;

/// Builder for a single hub connection's parameters (§4.6, §5).
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub(crate) name: Option<String>,
    pub(crate) firewall: bool,
    pub(crate) ping_period: Duration,
    pub(crate) max_ttl: Duration,
    pub(crate) public_key_wait_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        HubConfig {
            name: None,
            firewall: false,
            ping_period: Duration::from_millis(200),
            max_ttl: Duration::from_secs(15),
            public_key_wait_timeout: Duration::from_secs(15),
        }
    }
}

impl HubConfig {
    pub fn new() -> HubConfig {
        HubConfig::default()
    }

    /// A descriptive hub name, used only for whitelist/blacklist matching
    /// and logging; not part of the keyspace identity.
    pub fn with_name(self, name: impl Into<String>) -> Self {
        HubConfig { name: Some(name.into()), ..self }
    }

    pub fn with_firewall(self, firewall: bool) -> Self {
        HubConfig { firewall, ..self }
    }

    /// Liveness ping frequency; default ≈ 5 Hz per §4.6.
    pub fn with_ping_period(self, ping_period: Duration) -> Self {
        HubConfig { ping_period, ..self }
    }

    pub fn with_max_ttl(self, max_ttl: Duration) -> Self {
        HubConfig { max_ttl, ..self }
    }

    pub fn with_public_key_wait_timeout(self, timeout: Duration) -> Self {
        HubConfig { public_key_wait_timeout: timeout, ..self }
    }
}
