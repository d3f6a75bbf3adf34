use thiserror::Error;

/// Fatal at startup: the operator surface of §6 could not be assembled.
#[derive(Debug, Error)]
pub enum GatewayConfigError {
    #[error(transparent)]
    Figment(#[from] figment::Error),

    #[error("invalid connection type {0:?} in a watchlist entry: expected one of publisher, subscriber, service, action_client, action_server")]
    UnknownConnectionType(String),
}
