use gateway_model::explode_rule;
use gateway_model::Connection;
use gateway_model::ConnectionType;
use gateway_model::Rule;
use std::collections::HashSet;

/// Fuse `ACTION_SERVER`/`ACTION_CLIENT` quintuplets out of a flat connection
/// set, per §4.2: first pass fuses servers, second pass fuses clients on
/// what's left, draining the five consumed pub/sub shells either way.
pub fn fuse_actions(connections: Vec<Connection>) -> Vec<Connection> {
    let fused_servers = fuse_one_side(connections, ConnectionType::ActionServer);
    fuse_one_side(fused_servers, ConnectionType::ActionClient)
}

fn fuse_one_side(connections: Vec<Connection>, action_type: ConnectionType) -> Vec<Connection> {
    let present: HashSet<(ConnectionType, &str, &str)> = connections
        .iter()
        .map(|c| (c.rule.connection_type, c.rule.name.as_str(), c.rule.node.as_str()))
        .collect();

    let mut candidates: Vec<(String, String)> = connections
        .iter()
        .filter_map(|c| base_name_for_action(&c.rule).map(|base| (base, c.rule.node.clone())))
        .collect();
    candidates.sort();
    candidates.dedup();

    let mut fused = Vec::new();
    let mut consumed: HashSet<(ConnectionType, String, String)> = HashSet::new();

    for (base, node) in candidates {
        let candidate_rule = Rule::new(action_type, base.clone(), node.clone());
        let expected = explode_rule(&candidate_rule);
        let all_present = expected
            .iter()
            .all(|r| present.contains(&(r.connection_type, r.name.as_str(), r.node.as_str())));
        if !all_present {
            continue;
        }
        let representative = connections
            .iter()
            .find(|c| expected.iter().any(|r| *r == c.rule))
            .expect("all five expected topics were confirmed present above");
        fused.push(Connection::new(candidate_rule, representative.type_info.clone(), representative.xmlrpc_uri.clone()));
        for r in &expected {
            consumed.insert((r.connection_type, r.name.clone(), r.node.clone()));
        }
    }

    connections
        .into_iter()
        .filter(|c| !consumed.contains(&(c.rule.connection_type, c.rule.name.clone(), c.rule.node.clone())))
        .chain(fused)
        .collect()
}

/// If `rule` names a topic ending in one of the five action suffixes,
/// return its base name; otherwise `None`.
fn base_name_for_action(rule: &Rule) -> Option<String> {
    if !matches!(rule.connection_type, ConnectionType::Publisher | ConnectionType::Subscriber) {
        return None;
    }
    gateway_model::ACTION_SUFFIXES
        .iter()
        .find_map(|suffix| rule.name.strip_suffix(suffix).map(|base| base.to_string()))
}
