use crate::Connection;
use crate::ConnectionType;
use crate::Rule;

/// The five topic suffixes every action endpoint fuses into a single `ACTION_*`
/// `Rule`, in explode order.
pub const ACTION_SUFFIXES: [&str; 5] = ["/goal", "/cancel", "/feedback", "/status", "/result"];

const GOAL: usize = 0;
const CANCEL: usize = 1;
const FEEDBACK: usize = 2;
const STATUS: usize = 3;
const RESULT: usize = 4;

/// Polarity of a sub-topic for a given action side: `true` = the node
/// publishes it, `false` = the node subscribes to it.
///
/// An ACTION_SERVER publishes status/feedback/result and subscribes to
/// goal/cancel; an ACTION_CLIENT is the mirror image.
fn is_publisher_side(action_type: ConnectionType, suffix_index: usize) -> bool {
    let server_publishes = matches!(suffix_index, FEEDBACK | STATUS | RESULT);
    match action_type {
        ConnectionType::ActionServer => server_publishes,
        ConnectionType::ActionClient => !server_publishes,
        _ => unreachable!("is_publisher_side is only defined for action connection types"),
    }
}

/// Explode a fused `ACTION_SERVER`/`ACTION_CLIENT` rule into its five
/// constituent pub/sub topics with the polarity fixed by §3's invariant.
///
/// Panics if `rule.connection_type` is not an action type: callers are
/// expected to have already branched on [`ConnectionType::is_action`].
pub fn explode_rule(rule: &Rule) -> Vec<Rule> {
    assert!(rule.connection_type.is_action(), "explode_rule requires an action rule");
    ACTION_SUFFIXES
        .iter()
        .enumerate()
        .map(|(i, suffix)| {
            let connection_type = if is_publisher_side(rule.connection_type, i) {
                ConnectionType::Publisher
            } else {
                ConnectionType::Subscriber
            };
            Rule::new(connection_type, format!("{}{suffix}", rule.name), rule.node.clone())
        })
        .collect()
}

/// Recover the fused action rule from its five exploded topics, if `topics`
/// is exactly the five siblings of one base name owned by one node with the
/// polarity of a single action side. Order of `topics` is irrelevant.
pub fn assemble_rule(topics: &[Rule]) -> Option<Rule> {
    if topics.len() != ACTION_SUFFIXES.len() {
        return None;
    }
    let base = base_name(&topics[0].name)?;
    let node = topics[0].node.clone();

    let mut by_suffix = vec![None; ACTION_SUFFIXES.len()];
    for topic in topics {
        if topic.node != node {
            return None;
        }
        let (topic_base, suffix_index) = split_suffix(&topic.name)?;
        if topic_base != base {
            return None;
        }
        if by_suffix[suffix_index].is_some() {
            return None;
        }
        by_suffix[suffix_index] = Some(topic.connection_type);
    }
    let polarity: Vec<ConnectionType> = by_suffix.into_iter().collect::<Option<Vec<_>>>()?;

    let as_server = (0..ACTION_SUFFIXES.len())
        .all(|i| polarity[i] == if is_publisher_side(ConnectionType::ActionServer, i) {
            ConnectionType::Publisher
        } else {
            ConnectionType::Subscriber
        });
    let as_client = (0..ACTION_SUFFIXES.len())
        .all(|i| polarity[i] == if is_publisher_side(ConnectionType::ActionClient, i) {
            ConnectionType::Publisher
        } else {
            ConnectionType::Subscriber
        });

    match (as_server, as_client) {
        (true, false) => Some(Rule::new(ConnectionType::ActionServer, base, node)),
        (false, true) => Some(Rule::new(ConnectionType::ActionClient, base, node)),
        _ => None,
    }
}

/// Explode a fused `ACTION_SERVER`/`ACTION_CLIENT` connection into its five
/// constituent pub/sub connections, reusing the shared `type_info`/`xmlrpc_uri`
/// across all five: the hub mailbox only understands fundamental connection
/// types, so flip protocol posts one entry per topic (§4.5).
pub fn explode_connection(connection: &Connection) -> Vec<Connection> {
    explode_rule(&connection.rule)
        .into_iter()
        .map(|rule| Connection::new(rule, connection.type_info.clone(), connection.xmlrpc_uri.clone()))
        .collect()
}

fn base_name(name: &str) -> Option<String> {
    split_suffix(name).map(|(base, _)| base)
}

fn split_suffix(name: &str) -> Option<(String, usize)> {
    ACTION_SUFFIXES
        .iter()
        .enumerate()
        .find_map(|(i, suffix)| name.strip_suffix(suffix).map(|base| (base.to_string(), i)))
}
