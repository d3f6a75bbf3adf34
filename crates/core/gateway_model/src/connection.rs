use crate::ConnectionType;
use crate::Rule;
use serde::Deserialize;
use serde::Serialize;

/// A concrete, locally (or remotely) discovered endpoint: a [`Rule`] plus the
/// metadata needed to actually wire it up, its message/service type and the
/// xmlrpc URI of the node that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub rule: Rule,
    pub type_info: String,
    pub xmlrpc_uri: String,
}

impl Connection {
    pub fn new(rule: Rule, type_info: impl Into<String>, xmlrpc_uri: impl Into<String>) -> Connection {
        Connection {
            rule,
            type_info: type_info.into(),
            xmlrpc_uri: xmlrpc_uri.into(),
        }
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.rule.connection_type
    }
}

/// A [`Connection`] injected into the local master on behalf of a remote
/// gateway. `local_node_name` is a synthetic, gateway-owned node identity
/// that is never reused across registrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub connection: Connection,
    pub remote_gateway: String,
    pub local_node_name: String,
}

impl Registration {
    pub fn new(connection: Connection, remote_gateway: impl Into<String>, local_node_name: impl Into<String>) -> Registration {
        Registration {
            connection,
            remote_gateway: remote_gateway.into(),
            local_node_name: local_node_name.into(),
        }
    }
}
