mod config;
mod error;
mod network;
mod watcher;

pub use config::WatcherConfig;
pub use error::WatcherError;
pub use network::NetworkStatsSource;
pub use network::NoNetworkStats;
pub use watcher::Watcher;
