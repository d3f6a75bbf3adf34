use crate::fusion::fuse_actions;
use crate::MasterApi;
use crate::MirrorError;
use gateway_model::explode_rule;
use gateway_model::Connection;
use gateway_model::ConnectionType;
use gateway_model::Registration;
use gateway_model::Rule;
use uuid::Uuid;

/// Adapter over the local naming authority (§4.2). Owns no state of its own
/// beyond the `MasterApi` handle: every registration's identity lives in the
/// `Registration` the caller holds on to.
pub struct Mirror<M> {
    master: M,
}

impl<M: MasterApi> Mirror<M> {
    pub fn new(master: M) -> Mirror<M> {
        Mirror { master }
    }

    /// Enumerate the local master's publishers/subscribers/services and fuse
    /// action quintuplets, per §4.2's fusion rule.
    pub async fn get_connection_state(&self) -> Result<Vec<Connection>, MirrorError> {
        let state = self.master.system_state().await?;
        let mut connections = Vec::new();

        for (topic, nodes) in &state.publishers {
            for node in nodes {
                self.push_if_available(&mut connections, ConnectionType::Publisher, topic, node).await?;
            }
        }
        for (topic, nodes) in &state.subscribers {
            for node in nodes {
                self.push_if_available(&mut connections, ConnectionType::Subscriber, topic, node).await?;
            }
        }
        for (service, nodes) in &state.services {
            for node in nodes {
                self.push_if_available(&mut connections, ConnectionType::Service, service, node).await?;
            }
        }

        Ok(fuse_actions(connections))
    }

    async fn push_if_available(&self, out: &mut Vec<Connection>, connection_type: ConnectionType, name: &str, node: &str) -> Result<(), MirrorError> {
        let rule = Rule::new(connection_type, name, node);
        // A node that vanished between `system_state` and this lookup is a
        // transient race, not a failure: the connection is simply omitted
        // from this tick's snapshot (§7).
        if let Some((type_info, xmlrpc_uri)) = self.master.connection_metadata(&rule).await? {
            out.push(Connection::new(rule, type_info, xmlrpc_uri));
        }
        Ok(())
    }

    /// Derive `type_info`/`xmlrpc_uri` for `rule`, exploding action rules
    /// into their five constituent topics. Empty if any required metadata is
    /// unavailable.
    pub async fn generate_connection_details(&self, rule: &Rule) -> Result<Vec<Connection>, MirrorError> {
        if rule.connection_type.is_action() {
            let mut parts = Vec::with_capacity(5);
            for part in explode_rule(rule) {
                match self.master.connection_metadata(&part).await? {
                    Some((type_info, xmlrpc_uri)) => parts.push(Connection::new(part, type_info, xmlrpc_uri)),
                    None => return Ok(Vec::new()),
                }
            }
            Ok(parts)
        } else {
            match self.master.connection_metadata(rule).await? {
                Some((type_info, xmlrpc_uri)) => Ok(vec![Connection::new(rule.clone(), type_info, xmlrpc_uri)]),
                None => Ok(Vec::new()),
            }
        }
    }

    /// Register a remote endpoint with the local master under a freshly
    /// synthesized node name. `Ok(None)` signals the SERVICE-already-locally-provided
    /// case, which is refusal, not failure.
    pub async fn register(&self, connection: Connection, remote_gateway: &str) -> Result<Option<Registration>, MirrorError> {
        let node = synthetic_node_name(remote_gateway);

        match connection.connection_type() {
            ConnectionType::Publisher => {
                self.master.register_publisher(&node, &connection.rule.name, &connection.type_info, &connection.xmlrpc_uri).await?;
            }
            ConnectionType::Subscriber => {
                let publisher_uris = self.master.register_subscriber(&node, &connection.rule.name, &connection.type_info, &connection.xmlrpc_uri).await?;
                self.notify_or_fatal(&connection.xmlrpc_uri, &connection.rule.name, &publisher_uris).await?;
            }
            ConnectionType::Service => {
                if self.master.local_service_provider(&connection.rule.name).await?.is_some() {
                    return Ok(None);
                }
                if connection.rule.name.is_empty() || connection.type_info.is_empty() || connection.xmlrpc_uri.is_empty() {
                    return Err(MirrorError::IncompleteConnection);
                }
                self.master.register_service(&node, &connection.rule.name, &connection.type_info, &connection.xmlrpc_uri).await?;
            }
            ConnectionType::ActionServer | ConnectionType::ActionClient => {
                for part in explode_rule(&connection.rule) {
                    self.register_action_part(&node, &part, &connection).await?;
                }
            }
        }

        Ok(Some(Registration::new(connection, remote_gateway, node)))
    }

    async fn register_action_part(&self, node: &str, part: &Rule, connection: &Connection) -> Result<(), MirrorError> {
        match part.connection_type {
            ConnectionType::Publisher => self.master.register_publisher(node, &part.name, &connection.type_info, &connection.xmlrpc_uri).await,
            ConnectionType::Subscriber => {
                let publisher_uris = self.master.register_subscriber(node, &part.name, &connection.type_info, &connection.xmlrpc_uri).await?;
                self.notify_or_fatal(&connection.xmlrpc_uri, &part.name, &publisher_uris).await?;
                Ok(())
            }
            _ => unreachable!("action quintuplets only ever contain publisher/subscriber topics"),
        }
    }

    /// Symmetric to [`Mirror::register`]. For SUBSCRIBER, the subscriber is
    /// notified of an empty publisher list before being unregistered.
    pub async fn unregister(&self, registration: &Registration) -> Result<(), MirrorError> {
        let connection = &registration.connection;
        let node = &registration.local_node_name;

        match connection.connection_type() {
            ConnectionType::Publisher => self.master.unregister_publisher(node, &connection.rule.name).await,
            ConnectionType::Subscriber => {
                self.notify_best_effort(&connection.xmlrpc_uri, &connection.rule.name, &[]).await;
                self.master.unregister_subscriber(node, &connection.rule.name).await
            }
            ConnectionType::Service => self.master.unregister_service(node, &connection.rule.name, &connection.xmlrpc_uri).await,
            ConnectionType::ActionServer | ConnectionType::ActionClient => {
                for part in explode_rule(&connection.rule) {
                    match part.connection_type {
                        ConnectionType::Publisher => self.master.unregister_publisher(node, &part.name).await?,
                        ConnectionType::Subscriber => {
                            self.notify_best_effort(&connection.xmlrpc_uri, &part.name, &[]).await;
                            self.master.unregister_subscriber(node, &part.name).await?
                        }
                        _ => unreachable!("action quintuplets only ever contain publisher/subscriber topics"),
                    }
                }
                Ok(())
            }
        }
    }

    /// Publisher-list nudge issued while registering a new connection: a
    /// refused connection is swallowed (the peer is simply gone), but any
    /// other failure is propagated, since it signals a master that is
    /// misbehaving rather than a peer that has departed (§7).
    async fn notify_or_fatal(&self, subscriber_uri: &str, topic: &str, publisher_uris: &[String]) -> Result<(), MirrorError> {
        match self.master.notify_subscriber(subscriber_uri, topic, publisher_uris).await {
            Ok(()) => Ok(()),
            Err(error @ MirrorError::NotifyRefused(_)) => {
                tracing::debug!(%subscriber_uri, %topic, %error, "publisher-list notification refused, continuing");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Best-effort publisher-list nudge: every failure is swallowed and
    /// logged, since the peer going away (or the local master already
    /// shutting down) is expected, not exceptional (§7). Used while tearing
    /// a connection down, where there is no meaningful way to act on a
    /// notification failure anyway.
    async fn notify_best_effort(&self, subscriber_uri: &str, topic: &str, publisher_uris: &[String]) {
        if let Err(error) = self.master.notify_subscriber(subscriber_uri, topic, publisher_uris).await {
            tracing::debug!(%subscriber_uri, %topic, %error, "publisher-list notification failed, continuing");
        }
    }

    /// Deterministic host/IP for the local master: explicit override
    /// environment first, then the master's own reported host, then
    /// `"localhost"` as a last resort.
    pub async fn get_ros_ip(&self) -> Result<String, MirrorError> {
        for var in ["ROS_IP", "ROS_HOSTNAME"] {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    return Ok(value);
                }
            }
        }
        match self.master.master_host().await {
            Ok(host) if !host.is_empty() => Ok(host),
            _ => Ok("localhost".to_string()),
        }
    }
}

fn synthetic_node_name(remote_gateway: &str) -> String {
    format!("/rocon/{remote_gateway}/{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeMaster;
    use assert_matches::assert_matches;
    use gateway_model::Rule;

    #[tokio::test]
    async fn register_publisher_tags_registration_with_synthetic_node() {
        let master = FakeMaster::default();
        let mirror = Mirror::new(master);
        let connection = Connection::new(Rule::new(ConnectionType::Publisher, "/chatter", "/talker"), "std_msgs/String", "http://talker:11311/");

        let registration = mirror.register(connection, "gw_b").await.unwrap().unwrap();
        assert!(registration.local_node_name.starts_with("/rocon/gw_b/"));
        assert_ne!(registration.local_node_name, "/talker");
    }

    #[tokio::test]
    async fn register_service_already_provided_locally_is_refused() {
        let master = FakeMaster::default();
        master.add_local_service_provider("/add_two_ints", "/server").await;
        let mirror = Mirror::new(master);
        let connection = Connection::new(Rule::new(ConnectionType::Service, "/add_two_ints", "/remote_server"), "AddTwoInts", "http://remote:11311/");

        assert_eq!(mirror.register(connection, "gw_b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn register_then_unregister_action_server_round_trips() {
        let master = FakeMaster::default();
        let mirror = Mirror::new(master);
        let connection = Connection::new(
            Rule::new(ConnectionType::ActionServer, "/fibonacci", "/server"),
            "actionlib_msgs/Fibonacci",
            "http://server:11311/",
        );

        let registration = mirror.register(connection, "gw_b").await.unwrap().unwrap();
        mirror.unregister(&registration).await.unwrap();
    }

    #[tokio::test]
    async fn get_ros_ip_prefers_explicit_override() {
        std::env::set_var("ROS_IP", "10.0.0.5");
        let mirror = Mirror::new(FakeMaster::default());
        assert_eq!(mirror.get_ros_ip().await.unwrap(), "10.0.0.5");
        std::env::remove_var("ROS_IP");
    }

    #[tokio::test]
    async fn register_subscriber_swallows_a_refused_notification() {
        let master = FakeMaster::default();
        master.fail_notifications_with(crate::fake::NotifyFailureMode::Refused).await;
        let mirror = Mirror::new(master);
        let connection = Connection::new(Rule::new(ConnectionType::Subscriber, "/chatter", "/listener"), "std_msgs/String", "http://listener:11311/");

        let registration = mirror.register(connection, "gw_b").await.unwrap();
        assert_matches!(registration, Some(_));
    }

    #[tokio::test]
    async fn register_subscriber_propagates_a_non_refused_notify_failure() {
        let master = FakeMaster::default();
        master.fail_notifications_with(crate::fake::NotifyFailureMode::Other).await;
        let mirror = Mirror::new(master);
        let connection = Connection::new(Rule::new(ConnectionType::Subscriber, "/chatter", "/listener"), "std_msgs/String", "http://listener:11311/");

        let result = mirror.register(connection, "gw_b").await;
        assert_matches!(result, Err(MirrorError::NotifyFailed(_, _)));
    }

    #[tokio::test]
    async fn unregister_subscriber_swallows_any_notify_failure() {
        let master = FakeMaster::default();
        let mirror = Mirror::new(master);
        let connection = Connection::new(Rule::new(ConnectionType::Subscriber, "/chatter", "/listener"), "std_msgs/String", "http://listener:11311/");
        let registration = mirror.register(connection, "gw_b").await.unwrap().unwrap();

        mirror.master.fail_notifications_with(crate::fake::NotifyFailureMode::Other).await;
        assert_matches!(mirror.unregister(&registration).await, Ok(()));
    }
}
