use crate::GatewayConfigError;
use gateway_model::ConnectionType;
use gateway_model::RulePattern;
use serde::Deserialize;
use serde::Serialize;

/// On-the-wire shape of a watchlist/blacklist entry: [`RulePattern`] minus the
/// parsed `ConnectionType`, since `doku`'s schema derive needs a type it can
/// introspect (a bare string, not the closed domain enum).
#[derive(Debug, Clone, Serialize, Deserialize, doku::Document)]
pub struct RulePatternConfig {
    /// One of `publisher`, `subscriber`, `service`, `action_client`,
    /// `action_server`, or omitted to match every connection type.
    #[serde(default)]
    pub connection_type: Option<String>,
    /// Regex matched against the fully qualified connection name.
    pub name: String,
    /// Regex matched against the owning node name.
    #[serde(default = "match_all")]
    pub node: String,
}

fn match_all() -> String {
    ".*".to_string()
}

impl RulePatternConfig {
    pub fn to_rule_pattern(&self) -> Result<RulePattern, GatewayConfigError> {
        let connection_type = self
            .connection_type
            .as_deref()
            .map(parse_connection_type)
            .transpose()?;
        Ok(RulePattern::new(connection_type, self.name.clone(), self.node.clone()))
    }
}

fn parse_connection_type(s: &str) -> Result<ConnectionType, GatewayConfigError> {
    match s {
        "publisher" => Ok(ConnectionType::Publisher),
        "subscriber" => Ok(ConnectionType::Subscriber),
        "service" => Ok(ConnectionType::Service),
        "action_client" => Ok(ConnectionType::ActionClient),
        "action_server" => Ok(ConnectionType::ActionServer),
        other => Err(GatewayConfigError::UnknownConnectionType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn match_all_pattern_has_no_connection_type_filter() {
        let config = RulePatternConfig {
            connection_type: None,
            name: "/chatter".to_string(),
            node: match_all(),
        };
        let pattern = config.to_rule_pattern().unwrap();
        assert_eq!(pattern.connection_type, None);
    }

    #[test]
    fn unknown_connection_type_is_rejected() {
        let config = RulePatternConfig {
            connection_type: Some("banana".to_string()),
            name: "/chatter".to_string(),
            node: match_all(),
        };
        assert_matches!(config.to_rule_pattern(), Err(GatewayConfigError::UnknownConnectionType(ref s)) if s == "banana");
    }
}
