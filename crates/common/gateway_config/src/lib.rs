//! Layered operator configuration for the gateway process (§6): typed
//! defaults, an optional TOML file, and `ROCON_GATEWAY_*` environment
//! overrides, with a `doku`-derived schema for free `--help`/documentation
//! output at the binary entry point.

mod config;
mod error;
mod rule_pattern;

pub use config::GatewayConfig;
pub use error::GatewayConfigError;
pub use rule_pattern::RulePatternConfig;
