use crate::rule_pattern::RulePatternConfig;
use crate::GatewayConfigError;
use figment::providers::Env;
use figment::providers::Format;
use figment::providers::Serialized;
use figment::providers::Toml;
use figment::Figment;
use gateway_model::RulePattern;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "ROCON_GATEWAY_";

/// The gateway process's operator surface (§6): everything read from the
/// environment, an optional TOML file, or (for the binary entry point) a
/// CLI flag locating that file.
#[derive(Debug, Clone, Serialize, Deserialize, doku::Document)]
pub struct GatewayConfig {
    /// Gateway base name; the process appends a random hash to form the
    /// unique name advertised on the hub.
    pub name: String,
    /// Hub to connect to at startup, if any.
    pub hub_uri: Option<String>,
    /// Hub connect policy: only connect to a hub whose name or ip matches
    /// one of these patterns. Empty means "allow all non-blacklisted".
    #[serde(default)]
    pub hub_whitelist: Vec<String>,
    /// Hub connect policy: never connect to a hub whose name or ip matches
    /// one of these patterns. Dominates the whitelist.
    #[serde(default)]
    pub hub_blacklist: Vec<String>,
    /// If true, inbound flips are acknowledged as BLOCKED rather than realized.
    #[serde(default)]
    pub firewall: bool,
    /// Initial advertise watchlist, installed before any `advertise` call.
    #[serde(default)]
    pub default_public_interface: Vec<RulePatternConfig>,
    /// Baseline blacklist, unioned with whatever the user adds at runtime.
    #[serde(default)]
    pub default_public_blacklist: Vec<RulePatternConfig>,
    /// Reconciliation tick length, in milliseconds.
    #[serde(default = "default_watcher_period_ms")]
    pub watcher_period_ms: u64,
    /// `MAX_TTL`: the hub ping key's time-to-live, in seconds.
    #[serde(default = "default_max_ttl_secs")]
    pub max_ttl_secs: u64,
}

fn default_watcher_period_ms() -> u64 {
    3_000
}

fn default_max_ttl_secs() -> u64 {
    15
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            name: "gateway".to_string(),
            hub_uri: None,
            hub_whitelist: Vec::new(),
            hub_blacklist: Vec::new(),
            firewall: false,
            default_public_interface: Vec::new(),
            default_public_blacklist: Vec::new(),
            watcher_period_ms: default_watcher_period_ms(),
            max_ttl_secs: default_max_ttl_secs(),
        }
    }
}

impl GatewayConfig {
    /// Load defaults, then an optional TOML file, then `ROCON_GATEWAY_*`
    /// environment overrides.
    pub fn load(toml_path: Option<&Path>) -> Result<GatewayConfig, GatewayConfigError> {
        let mut figment = Figment::from(Serialized::defaults(GatewayConfig::default()));
        if let Some(path) = toml_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));
        Ok(figment.extract()?)
    }

    pub fn watcher_period(&self) -> Duration {
        Duration::from_millis(self.watcher_period_ms)
    }

    pub fn max_ttl(&self) -> Duration {
        Duration::from_secs(self.max_ttl_secs)
    }

    pub fn default_public_interface(&self) -> Result<Vec<RulePattern>, GatewayConfigError> {
        self.default_public_interface.iter().map(RulePatternConfig::to_rule_pattern).collect()
    }

    pub fn default_public_blacklist(&self) -> Result<Vec<RulePattern>, GatewayConfigError> {
        self.default_public_blacklist.iter().map(RulePatternConfig::to_rule_pattern).collect()
    }

    /// `name` suffixed with a random hash, forming the unique identity this
    /// gateway process registers under for its lifetime.
    pub fn unique_name(&self) -> String {
        format!("{}_{:08x}", self.name, fastrand::u32(..))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_overridden() {
        figment::Jail::expect_with(|_jail| {
            let config = GatewayConfig::load(None).unwrap();
            assert_eq!(config.watcher_period_ms, 3_000);
            assert_eq!(config.max_ttl_secs, 15);
            assert!(!config.firewall);
            Ok(())
        });
    }

    #[test]
    fn toml_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "gateway.toml",
                r#"
                name = "left_arm"
                firewall = true
                watcher_period_ms = 500
                "#,
            )?;
            let config = GatewayConfig::load(Some(&jail.directory().join("gateway.toml"))).unwrap();
            assert_eq!(config.name, "left_arm");
            assert!(config.firewall);
            assert_eq!(config.watcher_period_ms, 500);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("gateway.toml", r#"name = "from_file""#)?;
            jail.set_env("ROCON_GATEWAY_NAME", "from_env");
            let config = GatewayConfig::load(Some(&jail.directory().join("gateway.toml"))).unwrap();
            assert_eq!(config.name, "from_env");
            Ok(())
        });
    }

    #[test]
    fn unique_name_is_suffixed_and_varies() {
        let config = GatewayConfig::default();
        let a = config.unique_name();
        let b = config.unique_name();
        assert!(a.starts_with("gateway_"));
        assert_ne!(a, b);
    }
}
