use gateway_model::Connection;
use gateway_model::Registration;
use gateway_model::RemoteRule;
use gateway_model::Rule;
use gateway_model::RulePattern;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Deltas produced by one [`PulledInterface::reconcile`] call. `to_register`
/// pairs a source gateway with the [`Connection`] the mirror should realize;
/// `to_unregister` carries the already-tracked [`Registration`]s to tear down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullDelta {
    pub to_register: Vec<(String, Connection)>,
    pub to_unregister: Vec<Registration>,
}

/// Import rules: pull a chosen remote gateway's public connections into the
/// local master (§4.4). Symmetric to [`crate::PublicInterface`], but the
/// "local" state here is whatever this gateway has itself registered on the
/// remote's behalf via the mirror.
pub struct PulledInterface {
    rules: Mutex<Vec<RemoteRule>>,
    active: Mutex<HashMap<(String, Rule), Registration>>,
}

impl PulledInterface {
    pub fn new() -> PulledInterface {
        PulledInterface {
            rules: Mutex::new(Vec::new()),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Idempotent: returns whether the rule was newly added.
    pub async fn add_rule(&self, rule: RemoteRule) -> bool {
        let mut rules = self.rules.lock().await;
        if rules.contains(&rule) {
            false
        } else {
            rules.push(rule);
            true
        }
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

    /// Reconcile against the current advertisement set of every known remote
    /// gateway (fetched from the hub by the caller); `remote_advertisements`
    /// pairs a gateway name with its public connections. Regex `target_gateway`
    /// patterns are expanded against whatever gateway names actually appear.
    pub async fn reconcile(&self, remote_advertisements: &[(String, Vec<Connection>)]) -> PullDelta {
        let rules = self.rules.lock().await.clone();
        let mut desired: HashMap<(String, Rule), Connection> = HashMap::new();

        for (gateway, connections) in remote_advertisements {
            for rule in rules.iter().filter(|r| r.gateway_matches(gateway)) {
                let pattern = RulePattern::new(Some(rule.rule.connection_type), rule.rule.name.clone(), rule.rule.node.clone());
                for connection in connections.iter().filter(|c| pattern.matches(&c.rule)) {
                    desired.insert((gateway.clone(), connection.rule.clone()), connection.clone());
                }
            }
        }

        let mut active = self.active.lock().await;
        let to_register: Vec<(String, Connection)> = desired
            .iter()
            .filter(|(key, _)| !active.contains_key(*key))
            .map(|(key, connection)| (key.0.clone(), connection.clone()))
            .collect();
        let to_unregister: Vec<Registration> = active
            .iter()
            .filter(|(key, _)| !desired.contains_key(*key))
            .map(|(_, registration)| registration.clone())
            .collect();

        active.retain(|key, _| desired.contains_key(key));
        PullDelta { to_register, to_unregister }
    }

    /// Record that `registration` is now realized for `gateway`, so the next
    /// `reconcile` treats it as already-pulled. Called by the watcher after
    /// the mirror confirms the registration.
    pub async fn confirm_registered(&self, gateway: &str, registration: Registration) {
        self.active.lock().await.insert((gateway.to_string(), registration.connection.rule.clone()), registration);
    }

    pub async fn active_registrations(&self) -> Vec<Registration> {
        self.active.lock().await.values().cloned().collect()
    }
}

impl Default for PulledInterface {
    fn default() -> Self {
        PulledInterface::new()
    }
}
