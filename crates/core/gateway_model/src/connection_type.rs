use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// The closed set of endpoint kinds a gateway can advertise, flip or pull.
///
/// Actions are never transported as a bare connection type: they are exploded
/// into five [`ConnectionType::Publisher`]/[`ConnectionType::Subscriber`] topics
/// at the hub and master boundary. See [`crate::action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionType {
    Publisher,
    Subscriber,
    Service,
    ActionClient,
    ActionServer,
}

impl ConnectionType {
    pub fn is_action(self) -> bool {
        matches!(self, ConnectionType::ActionClient | ConnectionType::ActionServer)
    }

    pub const ALL: [ConnectionType; 5] = [
        ConnectionType::Publisher,
        ConnectionType::Subscriber,
        ConnectionType::Service,
        ConnectionType::ActionClient,
        ConnectionType::ActionServer,
    ];
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionType::Publisher => "publisher",
            ConnectionType::Subscriber => "subscriber",
            ConnectionType::Service => "service",
            ConnectionType::ActionClient => "action_client",
            ConnectionType::ActionServer => "action_server",
        };
        f.write_str(s)
    }
}
