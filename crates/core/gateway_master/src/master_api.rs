use crate::MirrorError;
use async_trait::async_trait;
use gateway_model::Rule;

/// Everything currently registered with the local master, grouped the way
/// the wire RPC reports it: one entry per topic/service name, each carrying
/// the names of every node that provides it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemState {
    pub publishers: Vec<(String, Vec<String>)>,
    pub subscribers: Vec<(String, Vec<String>)>,
    pub services: Vec<(String, Vec<String>)>,
}

/// Abstract operations the gateway needs from the local naming authority
/// (§4.2, §6). A real implementation talks XML-RPC to the master; that
/// collaborator is out of scope here and consumed only through this trait.
#[async_trait]
pub trait MasterApi: Send + Sync {
    async fn register_publisher(&self, node: &str, topic: &str, type_info: &str, xmlrpc_uri: &str) -> Result<(), MirrorError>;

    async fn unregister_publisher(&self, node: &str, topic: &str) -> Result<(), MirrorError>;

    /// Registers `node` as a subscriber and returns the xmlrpc uris of the
    /// topic's current publishers, so the caller can notify them.
    async fn register_subscriber(&self, node: &str, topic: &str, type_info: &str, xmlrpc_uri: &str) -> Result<Vec<String>, MirrorError>;

    async fn unregister_subscriber(&self, node: &str, topic: &str) -> Result<(), MirrorError>;

    /// `Err` only on a genuine rpc failure; a service already provided by a
    /// *local* node is reported back to the caller via `local_provider`, not
    /// as an error, since deciding what to do about it is the mirror's job.
    async fn local_service_provider(&self, service: &str) -> Result<Option<String>, MirrorError>;

    async fn register_service(&self, node: &str, service: &str, type_info: &str, xmlrpc_uri: &str) -> Result<(), MirrorError>;

    async fn unregister_service(&self, node: &str, service: &str, xmlrpc_uri: &str) -> Result<(), MirrorError>;

    async fn lookup_node(&self, node: &str) -> Result<Option<String>, MirrorError>;

    async fn system_state(&self) -> Result<SystemState, MirrorError>;

    /// Notify `subscriber_uri` that `topic`'s publisher list changed.
    ///
    /// Returns [`MirrorError::NotifyRefused`] when the peer refused the
    /// connection (it has gone away) and [`MirrorError::NotifyFailed`] for
    /// any other failure, so callers can tell an expected departure apart
    /// from a genuine rpc fault (§7).
    async fn notify_subscriber(&self, subscriber_uri: &str, topic: &str, publisher_uris: &[String]) -> Result<(), MirrorError>;

    /// Best-effort hostname/IP of the master itself, consulted by
    /// [`crate::Mirror::get_ros_ip`] as the last fallback.
    async fn master_host(&self) -> Result<String, MirrorError>;

    /// `(type_info, xmlrpc_uri)` for an already-registered endpoint, or
    /// `None` if the node has since disappeared (a transient race the
    /// caller must tolerate, not an error).
    async fn connection_metadata(&self, rule: &Rule) -> Result<Option<(String, String)>, MirrorError>;
}
