use thiserror::Error;

/// Typed outcome of a hub connect attempt (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Success,
    /// The given hub address is blank and cannot be resolved to anything.
    HubConnectionUnresolvable,
    /// The given hub name is blank.
    HubNameNotFound,
    HubConnectionBlacklisted,
    HubConnectionNotInNonemptyWhitelist,
    HubUnknownError,
}

/// Failures raised while talking to a hub's key/value + pub/sub store.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("hub connection failed: {0}")]
    ConnectionFailed(String),

    #[error("hub connection lost")]
    ConnectionLost,

    #[error(transparent)]
    Codec(#[from] gateway_codec::CodecError),

    #[error("no hub connection")]
    NoHubConnection,

    #[error("refusing to flip a rule to self")]
    FlipToSelf,

    #[error("flip rule already exists")]
    FlipRuleAlreadyExists,

    #[error("timed out waiting for receiver {0}'s public key")]
    PublicKeyTimeout(String),
}
