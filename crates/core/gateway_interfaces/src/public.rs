use gateway_model::Connection;
use gateway_model::Rule;
use gateway_model::RulePattern;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Deltas produced by one [`PublicInterface::update`] call (§4.3, §8).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicDelta {
    pub to_advertise: Vec<Connection>,
    pub to_unadvertise: Vec<Connection>,
}

/// The set of locally-owned connections exposed on the hub, plus the rules
/// that decide which ones (§4.3). Blacklist always dominates whitelist.
pub struct PublicInterface {
    watchlist: Mutex<Vec<RulePattern>>,
    default_blacklist: Mutex<Vec<RulePattern>>,
    user_blacklist: Mutex<Vec<RulePattern>>,
    active: Mutex<HashMap<Rule, Connection>>,
}

impl PublicInterface {
    pub fn new(default_blacklist: Vec<RulePattern>) -> PublicInterface {
        PublicInterface {
            watchlist: Mutex::new(Vec::new()),
            default_blacklist: Mutex::new(default_blacklist),
            user_blacklist: Mutex::new(Vec::new()),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Add (or, if `cancel`, remove) entries to the advertise watchlist.
    pub async fn advertise(&self, rules: Vec<RulePattern>, cancel: bool) {
        let mut watchlist = self.watchlist.lock().await;
        if cancel {
            watchlist.retain(|existing| !rules.contains(existing));
        } else {
            for rule in rules {
                if !watchlist.contains(&rule) {
                    watchlist.push(rule);
                }
            }
        }
    }

    /// Match every local connection, installing `blacklist` on top of the
    /// default one; `cancel` reverts to an empty watchlist and user blacklist.
    pub async fn advertise_all(&self, blacklist: Vec<RulePattern>, cancel: bool) {
        let mut watchlist = self.watchlist.lock().await;
        let mut user_blacklist = self.user_blacklist.lock().await;
        if cancel {
            watchlist.clear();
            user_blacklist.clear();
        } else {
            *watchlist = vec![RulePattern::match_all()];
            *user_blacklist = blacklist;
        }
    }

    /// True iff `connection` matches at least one watchlist entry and no
    /// entry in the effective (default ∪ user) blacklist.
    pub async fn allowed(&self, connection: &Connection) -> bool {
        let watches = self.watchlist.lock().await;
        if !watches.iter().any(|pattern| pattern.matches(&connection.rule)) {
            return false;
        }
        drop(watches);
        let default_blacklist = self.default_blacklist.lock().await;
        if default_blacklist.iter().any(|pattern| pattern.matches(&connection.rule)) {
            return false;
        }
        let user_blacklist = self.user_blacklist.lock().await;
        !user_blacklist.iter().any(|pattern| pattern.matches(&connection.rule))
    }

    /// Reconcile against the current local connection snapshot (§4.3, §8):
    /// `to_advertise = allowed ∩ local − public`, `to_unadvertise = public − (allowed ∩ local)`.
    pub async fn update(&self, current_local: &[Connection]) -> PublicDelta {
        let mut allowed_now: HashMap<Rule, Connection> = HashMap::new();
        for connection in current_local {
            if self.allowed(connection).await {
                allowed_now.insert(connection.rule.clone(), connection.clone());
            }
        }

        let mut active = self.active.lock().await;
        let to_advertise: Vec<Connection> = allowed_now
            .iter()
            .filter(|(rule, _)| !active.contains_key(*rule))
            .map(|(_, connection)| connection.clone())
            .collect();
        let to_unadvertise: Vec<Connection> = active
            .iter()
            .filter(|(rule, _)| !allowed_now.contains_key(*rule))
            .map(|(_, connection)| connection.clone())
            .collect();

        *active = allowed_now;
        PublicDelta { to_advertise, to_unadvertise }
    }

    pub async fn public_connections(&self) -> Vec<Connection> {
        self.active.lock().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_model::ConnectionType;

    fn publisher(name: &str, node: &str) -> Connection {
        Connection::new(Rule::new(ConnectionType::Publisher, name, node), "std_msgs/String", "http://node:11311/")
    }

    #[tokio::test]
    async fn nothing_is_allowed_before_any_advertise_rule() {
        let interface = PublicInterface::new(Vec::new());
        assert!(!interface.allowed(&publisher("/chatter", "/talker")).await);
    }

    #[tokio::test]
    async fn advertise_exact_rule_matches_only_that_connection() {
        let interface = PublicInterface::new(Vec::new());
        interface.advertise(vec![RulePattern::new(Some(ConnectionType::Publisher), "/chatter", "/talker")], false).await;
        assert!(interface.allowed(&publisher("/chatter", "/talker")).await);
        assert!(!interface.allowed(&publisher("/other", "/talker")).await);
    }

    #[tokio::test]
    async fn blacklist_dominates_even_a_match_all_watchlist() {
        let interface = PublicInterface::new(vec![RulePattern::new(None, "/diagnostics", ".*")]);
        interface.advertise_all(Vec::new(), false).await;
        assert!(interface.allowed(&publisher("/chatter", "/talker")).await);
        assert!(!interface.allowed(&publisher("/diagnostics", "/talker")).await);
    }

    #[tokio::test]
    async fn user_blacklist_is_unioned_with_default() {
        let interface = PublicInterface::new(vec![RulePattern::new(None, "/diagnostics", ".*")]);
        interface.advertise_all(vec![RulePattern::new(None, "/rosout", ".*")], false).await;
        assert!(!interface.allowed(&publisher("/diagnostics", "/talker")).await);
        assert!(!interface.allowed(&publisher("/rosout", "/talker")).await);
        assert!(interface.allowed(&publisher("/chatter", "/talker")).await);
    }

    #[tokio::test]
    async fn update_advertises_newly_allowed_and_unadvertises_vanished() {
        let interface = PublicInterface::new(Vec::new());
        interface.advertise(vec![RulePattern::new(Some(ConnectionType::Publisher), "/chatter", ".*")], false).await;
        let chatter = publisher("/chatter", "/talker");

        let delta = interface.update(&[chatter.clone()]).await;
        assert_eq!(delta.to_advertise, vec![chatter.clone()]);
        assert!(delta.to_unadvertise.is_empty());

        let delta = interface.update(&[chatter.clone()]).await;
        assert!(delta.to_advertise.is_empty());
        assert!(delta.to_unadvertise.is_empty());

        let delta = interface.update(&[]).await;
        assert!(delta.to_advertise.is_empty());
        assert_eq!(delta.to_unadvertise, vec![chatter]);
    }

    #[tokio::test]
    async fn advertise_all_cancel_reverts_to_empty_watchlist() {
        let interface = PublicInterface::new(Vec::new());
        interface.advertise_all(Vec::new(), false).await;
        interface.advertise_all(Vec::new(), true).await;
        assert!(!interface.allowed(&publisher("/chatter", "/talker")).await);
    }
}
