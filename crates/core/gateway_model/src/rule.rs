use crate::ConnectionType;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

/// Identity of a local endpoint: what it is, its fully qualified name, and
/// the node that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub connection_type: ConnectionType,
    pub name: String,
    pub node: String,
}

impl Rule {
    pub fn new(connection_type: ConnectionType, name: impl Into<String>, node: impl Into<String>) -> Rule {
        Rule {
            connection_type,
            name: name.into(),
            node: node.into(),
        }
    }
}

/// A [`Rule`] qualified with the name of the gateway it targets (for flips)
/// or originates from (for pulls). `gateway` may be a regex when used as a
/// matcher, never when used as a concrete identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteRule {
    pub gateway: String,
    pub rule: Rule,
}

impl RemoteRule {
    pub fn new(gateway: impl Into<String>, rule: Rule) -> RemoteRule {
        RemoteRule {
            gateway: gateway.into(),
            rule,
        }
    }

    /// Compile `self.gateway` as a regex and test it against a concrete gateway name.
    ///
    /// Invalid patterns match nothing rather than panicking: a malformed rule
    /// should never take down the watcher loop.
    pub fn gateway_matches(&self, candidate: &str) -> bool {
        match Regex::new(&format!("^{}$", self.gateway)) {
            Ok(re) => re.is_match(candidate),
            Err(_) => self.gateway == candidate,
        }
    }
}

/// A single watchlist/blacklist entry: a (name, node) pattern pair matched by regex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePattern {
    pub connection_type: Option<ConnectionType>,
    pub name: String,
    pub node: String,
}

impl RulePattern {
    pub fn match_all() -> RulePattern {
        RulePattern {
            connection_type: None,
            name: ".*".to_string(),
            node: ".*".to_string(),
        }
    }

    pub fn new(connection_type: Option<ConnectionType>, name: impl Into<String>, node: impl Into<String>) -> RulePattern {
        RulePattern {
            connection_type,
            name: name.into(),
            node: node.into(),
        }
    }

    pub fn matches(&self, rule: &Rule) -> bool {
        if let Some(ct) = self.connection_type {
            if ct != rule.connection_type {
                return false;
            }
        }
        regex_match(&self.name, &rule.name) && regex_match(&self.node, &rule.node)
    }
}

fn regex_match(pattern: &str, candidate: &str) -> bool {
    match Regex::new(&format!("^{pattern}$")) {
        Ok(re) => re.is_match(candidate),
        Err(_) => pattern == candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_matches_exact_rule() {
        let pattern = RulePattern::new(Some(ConnectionType::Publisher), "/chatter", "/talker");
        let rule = Rule::new(ConnectionType::Publisher, "/chatter", "/talker");
        assert!(pattern.matches(&rule));
    }

    #[test]
    fn wrong_connection_type_never_matches() {
        let pattern = RulePattern::new(Some(ConnectionType::Subscriber), "/chatter", "/talker");
        let rule = Rule::new(ConnectionType::Publisher, "/chatter", "/talker");
        assert!(!pattern.matches(&rule));
    }

    #[test]
    fn regex_pattern_matches_family_of_names() {
        let pattern = RulePattern::new(None, "/cam/.*", ".*");
        assert!(pattern.matches(&Rule::new(ConnectionType::Publisher, "/cam/left", "/driver")));
        assert!(!pattern.matches(&Rule::new(ConnectionType::Publisher, "/other", "/driver")));
    }

    #[test]
    fn remote_rule_gateway_regex() {
        let rr = RemoteRule::new("gw_.*", Rule::new(ConnectionType::Publisher, "/chatter", "/talker"));
        assert!(rr.gateway_matches("gw_abcd1234"));
        assert!(!rr.gateway_matches("other"));
    }
}
