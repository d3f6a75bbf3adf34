use thiserror::Error;

/// Failures talking to the local master, and the two preconditions the
/// mirror itself enforces before ever calling out ([`MirrorError::ServiceAlreadyProvided`]
/// and the validation failure below).
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("local master rpc failed: {0}")]
    MasterRpc(String),

    #[error("a node already provides service {service} locally")]
    ServiceAlreadyProvided { service: String },

    #[error("connection is missing required metadata (name, type_info or xmlrpc_uri)")]
    IncompleteConnection,

    /// The subscriber refused the notification (connection refused: the
    /// peer process is gone). Expected, not exceptional (§7) — always
    /// swallowed by the caller.
    #[error("subscriber {0} refused the publisher-list notification")]
    NotifyRefused(String),

    /// The notification failed for any other reason (malformed response,
    /// timeout, xmlrpc fault unrelated to the peer vanishing). Fatal when
    /// raised while registering a new connection (§7); still swallowed when
    /// raised while tearing one down.
    #[error("publisher-list notification to {0} failed: {1}")]
    NotifyFailed(String, String),
}
