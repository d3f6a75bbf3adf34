//! An in-memory [`MasterApi`] for tests, exercising the mirror against a
//! fake naming authority rather than a real network stack.

use crate::MasterApi;
use crate::MirrorError;
use async_trait::async_trait;
use gateway_model::Rule;
use std::collections::HashMap;
use std::collections::HashSet;
use tokio::sync::Mutex;

#[derive(Default)]
struct State {
    publishers: HashMap<(String, String), (String, String)>,
    subscribers: HashMap<(String, String), (String, String)>,
    services: HashMap<(String, String), (String, String)>,
    node_uris: HashMap<String, String>,
    notified: Vec<(String, String, Vec<String>)>,
    notify_failure: Option<NotifyFailureMode>,
}

/// The kind of failure [`FakeMaster::notify_subscriber`] should simulate,
/// set with [`FakeMaster::fail_notifications_with`].
#[derive(Debug, Clone, Copy)]
pub enum NotifyFailureMode {
    /// Simulates the peer being gone: connection refused.
    Refused,
    /// Simulates any other rpc failure.
    Other,
}

/// An in-memory stand-in for the local master's wire RPC.
#[derive(Default)]
pub struct FakeMaster {
    state: Mutex<State>,
}

impl FakeMaster {
    pub async fn add_local_service_provider(&self, service: &str, node: &str) {
        let mut state = self.state.lock().await;
        state.services.insert((service.to_string(), node.to_string()), ("local/Type".to_string(), "http://local:11311/".to_string()));
    }

    /// Pre-register metadata for `rule`, as if it had been registered by
    /// some local node before the gateway started looking.
    pub async fn seed(&self, rule: &Rule, type_info: &str, xmlrpc_uri: &str) {
        let mut state = self.state.lock().await;
        let key = (rule.name.clone(), rule.node.clone());
        let value = (type_info.to_string(), xmlrpc_uri.to_string());
        match rule.connection_type {
            gateway_model::ConnectionType::Publisher => state.publishers.insert(key, value),
            gateway_model::ConnectionType::Subscriber => state.subscribers.insert(key, value),
            gateway_model::ConnectionType::Service => state.services.insert(key, value),
            _ => panic!("fake master only seeds fundamental connection types"),
        };
        state.node_uris.insert(rule.node.clone(), xmlrpc_uri.to_string());
    }

    pub async fn notified_subscribers(&self) -> Vec<(String, String, Vec<String>)> {
        self.state.lock().await.notified.clone()
    }

    /// From the next call onward, [`MasterApi::notify_subscriber`] fails
    /// with `mode` instead of succeeding.
    pub async fn fail_notifications_with(&self, mode: NotifyFailureMode) {
        self.state.lock().await.notify_failure = Some(mode);
    }
}

#[async_trait]
impl MasterApi for FakeMaster {
    async fn register_publisher(&self, node: &str, topic: &str, type_info: &str, xmlrpc_uri: &str) -> Result<(), MirrorError> {
        let mut state = self.state.lock().await;
        state.publishers.insert((topic.to_string(), node.to_string()), (type_info.to_string(), xmlrpc_uri.to_string()));
        state.node_uris.insert(node.to_string(), xmlrpc_uri.to_string());
        Ok(())
    }

    async fn unregister_publisher(&self, node: &str, topic: &str) -> Result<(), MirrorError> {
        self.state.lock().await.publishers.remove(&(topic.to_string(), node.to_string()));
        Ok(())
    }

    async fn register_subscriber(&self, node: &str, topic: &str, type_info: &str, xmlrpc_uri: &str) -> Result<Vec<String>, MirrorError> {
        let mut state = self.state.lock().await;
        state.subscribers.insert((topic.to_string(), node.to_string()), (type_info.to_string(), xmlrpc_uri.to_string()));
        state.node_uris.insert(node.to_string(), xmlrpc_uri.to_string());
        let publisher_uris = state
            .publishers
            .iter()
            .filter(|((t, _), _)| t == topic)
            .map(|(_, (_, uri))| uri.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        Ok(publisher_uris)
    }

    async fn unregister_subscriber(&self, node: &str, topic: &str) -> Result<(), MirrorError> {
        self.state.lock().await.subscribers.remove(&(topic.to_string(), node.to_string()));
        Ok(())
    }

    async fn local_service_provider(&self, service: &str) -> Result<Option<String>, MirrorError> {
        let state = self.state.lock().await;
        Ok(state.services.keys().find(|(s, _)| s == service).map(|(_, node)| node.clone()))
    }

    async fn register_service(&self, node: &str, service: &str, type_info: &str, xmlrpc_uri: &str) -> Result<(), MirrorError> {
        let mut state = self.state.lock().await;
        state.services.insert((service.to_string(), node.to_string()), (type_info.to_string(), xmlrpc_uri.to_string()));
        Ok(())
    }

    async fn unregister_service(&self, node: &str, service: &str, _xmlrpc_uri: &str) -> Result<(), MirrorError> {
        self.state.lock().await.services.remove(&(service.to_string(), node.to_string()));
        Ok(())
    }

    async fn lookup_node(&self, node: &str) -> Result<Option<String>, MirrorError> {
        Ok(self.state.lock().await.node_uris.get(node).cloned())
    }

    async fn system_state(&self) -> Result<crate::SystemState, MirrorError> {
        let state = self.state.lock().await;
        let group = |map: &HashMap<(String, String), (String, String)>| {
            let mut by_name: HashMap<String, Vec<String>> = HashMap::new();
            for (name, node) in map.keys() {
                by_name.entry(name.clone()).or_default().push(node.clone());
            }
            by_name.into_iter().collect::<Vec<_>>()
        };
        Ok(crate::SystemState {
            publishers: group(&state.publishers),
            subscribers: group(&state.subscribers),
            services: group(&state.services),
        })
    }

    async fn notify_subscriber(&self, subscriber_uri: &str, topic: &str, publisher_uris: &[String]) -> Result<(), MirrorError> {
        let mut state = self.state.lock().await;
        match state.notify_failure {
            Some(NotifyFailureMode::Refused) => return Err(MirrorError::NotifyRefused(subscriber_uri.to_string())),
            Some(NotifyFailureMode::Other) => return Err(MirrorError::NotifyFailed(subscriber_uri.to_string(), "simulated rpc fault".to_string())),
            None => {}
        }
        state.notified.push((subscriber_uri.to_string(), topic.to_string(), publisher_uris.to_vec()));
        Ok(())
    }

    async fn master_host(&self) -> Result<String, MirrorError> {
        Ok("localhost".to_string())
    }

    async fn connection_metadata(&self, rule: &Rule) -> Result<Option<(String, String)>, MirrorError> {
        let state = self.state.lock().await;
        let key = (rule.name.clone(), rule.node.clone());
        let found = match rule.connection_type {
            gateway_model::ConnectionType::Publisher => state.publishers.get(&key),
            gateway_model::ConnectionType::Subscriber => state.subscribers.get(&key),
            gateway_model::ConnectionType::Service => state.services.get(&key),
            _ => None,
        };
        Ok(found.cloned())
    }
}
