use crate::InterfaceError;
use gateway_model::explode_connection;
use gateway_model::explode_rule;
use gateway_model::Connection;
use gateway_model::ConnectionType;
use gateway_model::RemoteRule;
use gateway_model::Rule;
use gateway_model::RulePattern;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Deltas produced by one [`FlippedInterface::reconcile`] call, already
/// exploded into per-topic entries for action rules (§4.5, §8): the caller
/// only ever has to call `hub.post_flip_request`/`hub.remove_flip_request`
/// with the pairs handed back here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlipDelta {
    pub to_post: Vec<(String, Connection)>,
    pub to_remove: Vec<(String, Rule)>,
}

/// Outgoing flip rules: push a local connection into a named (possibly
/// regex-matched) remote gateway's inbox (§4.5).
pub struct FlippedInterface {
    rules: Mutex<Vec<RemoteRule>>,
    /// What we believe is currently posted, keyed at the un-exploded rule
    /// granularity so diffing against `rules` stays action-type-agnostic.
    active: Mutex<HashMap<(String, Rule), Connection>>,
}

impl FlippedInterface {
    pub fn new() -> FlippedInterface {
        FlippedInterface {
            rules: Mutex::new(Vec::new()),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Refuses a rule whose gateway pattern resolves to `self_gateway`, and
    /// a rule already present (§3 invariant, §7).
    pub async fn add_rule(&self, self_gateway: &str, rule: RemoteRule) -> Result<(), InterfaceError> {
        if rule.gateway_matches(self_gateway) {
            return Err(InterfaceError::FlipToSelf);
        }
        let mut rules = self.rules.lock().await;
        if rules.contains(&rule) {
            return Err(InterfaceError::FlipRuleAlreadyExists);
        }
        rules.push(rule);
        Ok(())
    }

    /// Idempotent: returns whether a rule was actually removed.
    pub async fn remove_rule(&self, rule: &RemoteRule) -> bool {
        let mut rules = self.rules.lock().await;
        let before = rules.len();
        rules.retain(|existing| existing != rule);
        rules.len() != before
    }

    pub async fn rules(&self) -> Vec<RemoteRule> {
        self.rules.lock().await.clone()
    }

    /// Every `(receiver, rule)` key currently believed posted.
    pub async fn active_entries(&self) -> Vec<(String, Rule)> {
        self.active.lock().await.keys().cloned().collect()
    }

    /// Drop `(receiver, rule)` from the active set, so the next
    /// [`FlippedInterface::reconcile`] call believes it unposted and
    /// re-emits it in `to_post` if the connection is still desired. Used
    /// when a hub reports the entry RESEND after a key rotation (§8).
    pub async fn mark_stale(&self, receiver: &str, rule: &Rule) {
        self.active.lock().await.remove(&(receiver.to_string(), rule.clone()));
    }

    /// Reconcile outbound flip state: for each rule, for each local
    /// connection it matches (regex over name/node, exact over connection
    /// type), for each currently known gateway its pattern matches, ensure a
    /// posted entry exists. Action connections are exploded into their five
    /// topics only at emission time (§4.5).
    pub async fn reconcile(&self, local_connections: &[Connection], known_gateways: &[String]) -> FlipDelta {
        let rules = self.rules.lock().await.clone();
        let mut desired: HashMap<(String, Rule), Connection> = HashMap::new();

        for rule in &rules {
            let pattern = RulePattern::new(Some(rule.rule.connection_type), rule.rule.name.clone(), rule.rule.node.clone());
            let matching_connections = local_connections.iter().filter(|c| pattern.matches(&c.rule));
            let matching_gateways: Vec<&String> = known_gateways.iter().filter(|g| rule.gateway_matches(g)).collect();
            for connection in matching_connections {
                for gateway in &matching_gateways {
                    desired.insert(((*gateway).clone(), connection.rule.clone()), connection.clone());
                }
            }
        }

        let mut active = self.active.lock().await;
        let mut to_post = Vec::new();
        for (key, connection) in &desired {
            if !active.contains_key(key) {
                to_post.extend(emit(&key.0, connection));
            }
        }
        let mut to_remove = Vec::new();
        for (key, connection) in active.iter() {
            if !desired.contains_key(key) {
                to_remove.extend(emit_rules(&key.0, &connection.rule));
            }
        }

        *active = desired;
        FlipDelta { to_post, to_remove }
    }
}

impl Default for FlippedInterface {
    fn default() -> Self {
        FlippedInterface::new()
    }
}

fn emit(gateway: &str, connection: &Connection) -> Vec<(String, Connection)> {
    if connection.rule.connection_type.is_action() {
        explode_connection(connection).into_iter().map(|part| (gateway.to_string(), part)).collect()
    } else {
        vec![(gateway.to_string(), connection.clone())]
    }
}

fn emit_rules(gateway: &str, rule: &Rule) -> Vec<(String, Rule)> {
    if rule.connection_type.is_action() {
        explode_rule(rule).into_iter().map(|part| (gateway.to_string(), part)).collect()
    } else {
        vec![(gateway.to_string(), rule.clone())]
    }
}

/// Placeholder for a positional-channel-encoded flip API
/// (`[n, g1..gn, rule1..ruleN]`), which this crate does not implement: every
/// caller here uses the typed [`RemoteRule`] API. A thin adapter would
/// expand such a tuple into `n * rule1..ruleN` calls to
/// [`FlippedInterface::add_rule`], if compatibility with that shape were
/// ever needed.
pub mod legacy {}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn publisher(name: &str, node: &str) -> Connection {
        Connection::new(Rule::new(ConnectionType::Publisher, name, node), "std_msgs/String", "http://node:11311/")
    }

    #[tokio::test]
    async fn add_rule_to_self_is_refused() {
        let interface = FlippedInterface::new();
        let rule = RemoteRule::new("gw_a", Rule::new(ConnectionType::Publisher, "/chatter", "/talker"));
        assert_matches!(interface.add_rule("gw_a", rule).await, Err(InterfaceError::FlipToSelf));
    }

    #[tokio::test]
    async fn duplicate_rule_is_refused() {
        let interface = FlippedInterface::new();
        let rule = RemoteRule::new("gw_b", Rule::new(ConnectionType::Publisher, "/chatter", "/talker"));
        interface.add_rule("gw_a", rule.clone()).await.unwrap();
        assert_matches!(interface.add_rule("gw_a", rule).await, Err(InterfaceError::FlipRuleAlreadyExists));
    }

    #[tokio::test]
    async fn reconcile_posts_matching_connection_to_matching_gateway() {
        let interface = FlippedInterface::new();
        interface.add_rule("gw_a", RemoteRule::new("gw_b", Rule::new(ConnectionType::Publisher, "/chatter", "/talker"))).await.unwrap();

        let delta = interface.reconcile(&[publisher("/chatter", "/talker")], &["gw_b".to_string()]).await;
        assert_eq!(delta.to_post, vec![("gw_b".to_string(), publisher("/chatter", "/talker"))]);
        assert!(delta.to_remove.is_empty());
    }

    #[tokio::test]
    async fn reconcile_is_idempotent_once_posted() {
        let interface = FlippedInterface::new();
        interface.add_rule("gw_a", RemoteRule::new("gw_b", Rule::new(ConnectionType::Publisher, "/chatter", "/talker"))).await.unwrap();
        interface.reconcile(&[publisher("/chatter", "/talker")], &["gw_b".to_string()]).await;

        let delta = interface.reconcile(&[publisher("/chatter", "/talker")], &["gw_b".to_string()]).await;
        assert!(delta.to_post.is_empty());
        assert!(delta.to_remove.is_empty());
    }

    #[tokio::test]
    async fn reconcile_removes_when_local_connection_disappears() {
        let interface = FlippedInterface::new();
        interface.add_rule("gw_a", RemoteRule::new("gw_b", Rule::new(ConnectionType::Publisher, "/chatter", "/talker"))).await.unwrap();
        interface.reconcile(&[publisher("/chatter", "/talker")], &["gw_b".to_string()]).await;

        let delta = interface.reconcile(&[], &["gw_b".to_string()]).await;
        assert!(delta.to_post.is_empty());
        assert_eq!(delta.to_remove, vec![("gw_b".to_string(), Rule::new(ConnectionType::Publisher, "/chatter", "/talker"))]);
    }

    #[tokio::test]
    async fn reconcile_explodes_action_connections_into_five_posts() {
        let interface = FlippedInterface::new();
        interface.add_rule("gw_a", RemoteRule::new("gw_b", Rule::new(ConnectionType::ActionServer, "/fibonacci", "/server"))).await.unwrap();
        let action = Connection::new(Rule::new(ConnectionType::ActionServer, "/fibonacci", "/server"), "actionlib_msgs/Fibonacci", "http://server:11311/");

        let delta = interface.reconcile(&[action], &["gw_b".to_string()]).await;
        assert_eq!(delta.to_post.len(), 5);
        assert!(delta.to_post.iter().all(|(gw, _)| gw == "gw_b"));
    }

    #[tokio::test]
    async fn regex_gateway_matches_multiple_known_remotes() {
        let interface = FlippedInterface::new();
        interface.add_rule("gw_a", RemoteRule::new("gw_.*", Rule::new(ConnectionType::Publisher, "/chatter", "/talker"))).await.unwrap();

        let delta = interface.reconcile(&[publisher("/chatter", "/talker")], &["gw_b".to_string(), "gw_c".to_string()]).await;
        let mut gateways: Vec<String> = delta.to_post.iter().map(|(gw, _)| gw.clone()).collect();
        gateways.sort();
        assert_eq!(gateways, vec!["gw_b".to_string(), "gw_c".to_string()]);
    }
}
