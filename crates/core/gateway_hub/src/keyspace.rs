//! Key builders for the `rocon:`-rooted hub keyspace (§4.6). Every key a
//! `GatewayHub` ever touches is built here, so the layout lives in one place.

pub fn hub_name_key() -> String {
    "rocon:hub:name".to_string()
}

pub fn gatewaylist_key() -> String {
    "rocon:hub:gatewaylist".to_string()
}

pub fn gateway_key(gateway: &str) -> String {
    format!("rocon:{gateway}")
}

pub fn ip_key(gateway: &str) -> String {
    format!("rocon:{gateway}:ip")
}

pub fn firewall_key(gateway: &str) -> String {
    format!("rocon:{gateway}:firewall")
}

pub fn public_key_key(gateway: &str) -> String {
    format!("rocon:{gateway}:public_key")
}

pub fn advertisements_key(gateway: &str) -> String {
    format!("rocon:{gateway}:advertisements")
}

pub fn flips_key(gateway: &str) -> String {
    format!("rocon:{gateway}:flips")
}

pub fn pulls_key(gateway: &str) -> String {
    format!("rocon:{gateway}:pulls")
}

pub fn flip_ins_key(gateway: &str) -> String {
    format!("rocon:{gateway}:flip_ins")
}

pub fn ping_key(gateway: &str) -> String {
    format!("rocon:{gateway}:ping")
}

pub fn available_key(gateway: &str) -> String {
    format!("rocon:{gateway}:available")
}

pub fn time_since_last_seen_key(gateway: &str) -> String {
    format!("rocon:{gateway}:time_since_last_seen")
}

pub fn latency_key(gateway: &str, stat: &str) -> String {
    format!("rocon:{gateway}:latency:{stat}")
}

pub fn network_info_available_key(gateway: &str) -> String {
    format!("rocon:{gateway}:network:info_available")
}

pub fn network_type_key(gateway: &str) -> String {
    format!("rocon:{gateway}:network:type")
}

pub fn wireless_key(gateway: &str, stat: &str) -> String {
    format!("rocon:{gateway}:network:wireless:{stat}")
}

/// Strip a gateway's random uuid suffix, recovering its configured base name.
pub fn base_name(gateway: &str) -> &str {
    gateway.rsplit_once('_').map(|(base, _suffix)| base).unwrap_or(gateway)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_rooted_under_rocon() {
        assert_eq!(gateway_key("gw_a"), "rocon:gw_a");
        assert_eq!(flip_ins_key("gw_a"), "rocon:gw_a:flip_ins");
        assert_eq!(ping_key("gw_a"), "rocon:gw_a:ping");
    }

    #[test]
    fn base_name_strips_trailing_hash_suffix() {
        assert_eq!(base_name("left_arm_deadbeef"), "left_arm");
        assert_eq!(base_name("no_suffix_here"), "no_suffix");
    }
}
