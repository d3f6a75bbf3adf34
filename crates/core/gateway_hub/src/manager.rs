use crate::ConnectOutcome;
use crate::GatewayHub;
use crate::HubConfig;
use crate::HubError;
use crate::HubStore;
use crate::LatencyStats;
use crate::NetworkStats;
use gateway_model::Connection;
use gateway_model::FlipStatus;
use gateway_model::Rule;
use regex::Regex;
use rsa::RsaPrivateKey;
use rsa::RsaPublicKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Connect policy plus the set of currently connected hubs (§4.7). Blacklist
/// dominates; an empty whitelist means "allow all non-blacklisted".
pub struct HubManager<S> {
    hubs: Mutex<Vec<Arc<GatewayHub<S>>>>,
    whitelist: Vec<String>,
    blacklist: Vec<String>,
}

impl<S: HubStore> HubManager<S> {
    pub fn new(whitelist: Vec<String>, blacklist: Vec<String>) -> HubManager<S> {
        HubManager { hubs: Mutex::new(Vec::new()), whitelist, blacklist }
    }

    /// Evaluate the connect policy for a hub identified by `ip` and/or
    /// `name`, without connecting. Blacklist match on either field refuses;
    /// otherwise an empty whitelist allows, else the whitelist must match
    /// one of the two fields.
    pub fn evaluate_connect_policy(&self, ip: &str, name: Option<&str>) -> ConnectOutcome {
        if matches_any(&self.blacklist, ip) || name.is_some_and(|n| matches_any(&self.blacklist, n)) {
            return ConnectOutcome::HubConnectionBlacklisted;
        }
        if self.whitelist.is_empty() {
            return ConnectOutcome::Success;
        }
        if matches_any(&self.whitelist, ip) || name.is_some_and(|n| matches_any(&self.whitelist, n)) {
            ConnectOutcome::Success
        } else {
            ConnectOutcome::HubConnectionNotInNonemptyWhitelist
        }
    }

    /// Add an already-connected hub to the managed set, after policy has
    /// been evaluated by the caller (connection establishment itself is the
    /// out-of-scope `HubStore` collaborator's job).
    pub async fn add_hub(&self, hub: Arc<GatewayHub<S>>) {
        self.hubs.lock().await.push(hub);
    }

    /// Idempotent: removing a hub that is not present is a no-op.
    pub async fn disengage_hub(&self, gateway_name: &str) {
        self.hubs.lock().await.retain(|hub| hub.gateway_name() != gateway_name);
    }

    pub async fn connected_hub_names(&self) -> Vec<String> {
        self.hubs.lock().await.iter().map(|hub| hub.gateway_name().to_string()).collect()
    }

    pub async fn hub_count(&self) -> usize {
        self.hubs.lock().await.len()
    }

    /// A snapshot of every currently connected hub handle, for callers (the
    /// watcher loop) that need per-hub operations this manager doesn't
    /// itself expose as a fan-out (posting/reading the flip mailbox, liveness).
    pub async fn hubs(&self) -> Vec<Arc<GatewayHub<S>>> {
        self.hubs.lock().await.clone()
    }

    /// Evaluate connect policy, then retry hub registration every 300 ms
    /// until it succeeds or `timeout` elapses (§5, §7). On success, adds the
    /// hub to the managed set and, if registration detected a public-key
    /// change from a previous process lifetime, sweeps this gateway's
    /// outbound flips to RESEND against every gateway the hub already knows
    /// about (§4.5, §9's key-rotation handling).
    #[allow(clippy::too_many_arguments)]
    pub async fn connect_to_hub_with_timeout(
        &self,
        store: Arc<S>,
        config: HubConfig,
        gateway_name: &str,
        ip: &str,
        hub_name: Option<&str>,
        private_key: RsaPrivateKey,
        public_key: RsaPublicKey,
        timeout: Duration,
    ) -> Result<Arc<GatewayHub<S>>, ConnectOutcome> {
        if ip.trim().is_empty() {
            return Err(ConnectOutcome::HubConnectionUnresolvable);
        }
        if hub_name.is_some_and(|name| name.trim().is_empty()) {
            return Err(ConnectOutcome::HubNameNotFound);
        }

        let policy = self.evaluate_connect_policy(ip, hub_name);
        if policy != ConnectOutcome::Success {
            return Err(policy);
        }

        let hub = Arc::new(GatewayHub::new(store, config, gateway_name, private_key, public_key));
        let deadline = Instant::now() + timeout;
        loop {
            match hub.register(ip).await {
                Ok(rotated) => {
                    if rotated {
                        if let Ok(receivers) = hub.list_remote_gateway_names().await {
                            if let Err(error) = hub.resend_all_outbound_flips(&receivers).await {
                                tracing::warn!(%error, "failed to sweep outbound flips to RESEND after key rotation");
                            }
                        }
                    }
                    self.add_hub(hub.clone()).await;
                    return Ok(hub);
                }
                Err(error) => {
                    if Instant::now() >= deadline {
                        tracing::warn!(%error, "giving up connecting to hub after timeout");
                        return Err(ConnectOutcome::HubUnknownError);
                    }
                    tokio::time::sleep(Duration::from_millis(300)).await;
                }
            }
        }
    }

    /// Fan out an advertise to every connected hub; a per-hub failure
    /// disengages that hub but does not abort the fan-out (§4.8).
    pub async fn advertise(&self, connection: &Connection) {
        self.for_each_hub_fail_soft(|hub| {
            let connection = connection.clone();
            async move { hub.advertise(&connection).await }
        })
        .await;
    }

    pub async fn unadvertise(&self, connection: &Connection) {
        self.for_each_hub_fail_soft(|hub| {
            let connection = connection.clone();
            async move { hub.unadvertise(&connection).await }
        })
        .await;
    }

    pub async fn send_unflip_request(&self, receiver: &str, rule: &Rule) {
        self.for_each_hub_fail_soft(|hub| {
            let rule = rule.clone();
            let receiver = receiver.to_string();
            async move { hub.remove_flip_request(&receiver, &rule).await }
        })
        .await;
    }

    /// Fan out posting a flip request to every connected hub (§4.5, §4.8).
    /// The receiver's public key is only ever visible on the hub(s) that
    /// both gateways share, so hubs the receiver isn't registered on simply
    /// time out on [`GatewayHub::post_flip_request`] and are disengaged like
    /// any other per-hub failure.
    pub async fn post_flip_request(&self, receiver: &str, status: FlipStatus, connection: &Connection) {
        self.for_each_hub_fail_soft(|hub| {
            let connection = connection.clone();
            let receiver = receiver.to_string();
            async move { hub.post_flip_request(&receiver, status, &connection).await }
        })
        .await;
    }

    pub async fn publish_network_stats(&self, stats: &NetworkStats) {
        self.for_each_hub_fail_soft(|hub| {
            let stats = stats.clone();
            async move { hub.publish_network_stats(&stats).await }
        })
        .await;
    }

    pub async fn publish_latency(&self, latency: LatencyStats) {
        self.for_each_hub_fail_soft(|hub| async move { hub.publish_latency(&latency).await }).await;
    }

    /// Unregister and drop every connected hub (§5's shutdown sequence).
    /// Best-effort: a hub that fails to unregister is disengaged anyway,
    /// since the process is going away regardless.
    pub async fn unregister_all(&self) {
        self.for_each_hub_fail_soft(|hub| async move { hub.unregister().await }).await;
        self.hubs.lock().await.clear();
    }

    /// Union of every connected hub's known remote gateway names (§4.8):
    /// the watcher's one source of truth for "which gateways currently
    /// exist" when reconciling flipped/pulled rules and draining the inbox.
    pub async fn known_gateway_names(&self) -> Vec<String> {
        self.match_remote_gateway_name(".*").await
    }

    /// Every connected hub's public advertisements for `remote_gateway`,
    /// de-duplicated across hubs that both happen to know about it.
    pub async fn remote_gateway_info(&self, remote_gateway: &str) -> Vec<Connection> {
        let hubs = self.hubs.lock().await.clone();
        let mut all = Vec::new();
        for hub in hubs {
            if let Ok(connections) = hub.remote_advertisements(remote_gateway).await {
                all.extend(connections);
            }
        }
        all.sort_by(|a, b| format!("{:?}", a.rule).cmp(&format!("{:?}", b.rule)));
        all.dedup();
        all
    }

    /// Union of every connected hub's remote gateway names matching
    /// `pattern`, de-duplicated.
    pub async fn match_remote_gateway_name(&self, pattern: &str) -> Vec<String> {
        let hubs = self.hubs.lock().await.clone();
        let mut names = Vec::new();
        for hub in hubs {
            if let Ok(matched) = hub.matches_remote_gateway_name(pattern).await {
                names.extend(matched);
            }
        }
        names.sort();
        names.dedup();
        names
    }

    async fn for_each_hub_fail_soft<F, Fut>(&self, op: F)
    where
        F: Fn(Arc<GatewayHub<S>>) -> Fut,
        Fut: std::future::Future<Output = Result<(), HubError>>,
    {
        let hubs = self.hubs.lock().await.clone();
        for hub in hubs {
            let name = hub.gateway_name().to_string();
            if let Err(error) = op(hub).await {
                tracing::warn!(hub = %name, %error, "hub operation failed, disengaging");
                self.disengage_hub(&name).await;
            }
        }
    }
}

fn matches_any(patterns: &[String], candidate: &str) -> bool {
    patterns.iter().any(|pattern| match Regex::new(&format!("^{pattern}$")) {
        Ok(re) => re.is_match(candidate),
        Err(_) => pattern == candidate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fake::InMemoryHub;
    use assert_matches::assert_matches;
    use gateway_codec::generate_keypair;

    fn make_manager() -> HubManager<InMemoryHub> {
        HubManager::new(vec![], vec!["evil_.*".to_string()])
    }

    #[test]
    fn blacklist_dominates_empty_whitelist() {
        let manager: HubManager<InMemoryHub> = make_manager();
        assert_matches!(manager.evaluate_connect_policy("10.0.0.1", Some("evil_hub")), ConnectOutcome::HubConnectionBlacklisted);
        assert_matches!(manager.evaluate_connect_policy("10.0.0.1", Some("good_hub")), ConnectOutcome::Success);
    }

    #[test]
    fn nonempty_whitelist_requires_a_match() {
        let manager: HubManager<InMemoryHub> = HubManager::new(vec!["trusted_.*".to_string()], vec![]);
        assert_matches!(manager.evaluate_connect_policy("10.0.0.1", Some("trusted_hub")), ConnectOutcome::Success);
        assert_matches!(manager.evaluate_connect_policy("10.0.0.1", Some("other_hub")), ConnectOutcome::HubConnectionNotInNonemptyWhitelist);
    }

    #[tokio::test]
    async fn disengage_is_idempotent() {
        let manager: HubManager<InMemoryHub> = make_manager();
        let (private_key, public_key) = generate_keypair().unwrap();
        let hub = Arc::new(GatewayHub::new(Arc::new(InMemoryHub::default()), HubConfig::new(), "gw_a", private_key, public_key));
        manager.add_hub(hub).await;
        assert_eq!(manager.hub_count().await, 1);
        manager.disengage_hub("gw_a").await;
        manager.disengage_hub("gw_a").await;
        assert_eq!(manager.hub_count().await, 0);
    }

    #[tokio::test]
    async fn connect_to_hub_with_timeout_adds_the_hub_on_success() {
        let manager: HubManager<InMemoryHub> = make_manager();
        let (private_key, public_key) = generate_keypair().unwrap();
        let store = Arc::new(InMemoryHub::default());

        let hub = manager
            .connect_to_hub_with_timeout(store, HubConfig::new(), "gw_a", "10.0.0.1", None, private_key, public_key, std::time::Duration::from_secs(1))
            .await
            .unwrap();

        assert!(hub.is_registered().await.unwrap());
        assert_eq!(manager.hub_count().await, 1);
    }

    #[tokio::test]
    async fn connect_to_hub_with_timeout_rejects_blacklisted_hub_without_connecting() {
        let manager: HubManager<InMemoryHub> = make_manager();
        let (private_key, public_key) = generate_keypair().unwrap();
        let store = Arc::new(InMemoryHub::default());

        let outcome = manager
            .connect_to_hub_with_timeout(store, HubConfig::new(), "gw_a", "10.0.0.1", Some("evil_hub"), private_key, public_key, std::time::Duration::from_secs(1))
            .await;

        assert_matches!(outcome, Err(ConnectOutcome::HubConnectionBlacklisted));
        assert_eq!(manager.hub_count().await, 0);
    }

    #[tokio::test]
    async fn connect_rejects_an_empty_ip_as_unresolvable() {
        let manager: HubManager<InMemoryHub> = make_manager();
        let (private_key, public_key) = generate_keypair().unwrap();
        let store = Arc::new(InMemoryHub::default());

        let outcome = manager.connect_to_hub_with_timeout(store, HubConfig::new(), "gw_a", "", None, private_key, public_key, std::time::Duration::from_secs(1)).await;

        assert_matches!(outcome, Err(ConnectOutcome::HubConnectionUnresolvable));
        assert_eq!(manager.hub_count().await, 0);
    }

    #[tokio::test]
    async fn connect_rejects_an_empty_hub_name_as_not_found() {
        let manager: HubManager<InMemoryHub> = make_manager();
        let (private_key, public_key) = generate_keypair().unwrap();
        let store = Arc::new(InMemoryHub::default());

        let outcome = manager
            .connect_to_hub_with_timeout(store, HubConfig::new(), "gw_a", "10.0.0.1", Some("  "), private_key, public_key, std::time::Duration::from_secs(1))
            .await;

        assert_matches!(outcome, Err(ConnectOutcome::HubNameNotFound));
        assert_eq!(manager.hub_count().await, 0);
    }

    #[tokio::test]
    async fn unregister_all_clears_the_managed_set_and_the_hubs_gatewaylist_entry() {
        let manager: HubManager<InMemoryHub> = make_manager();
        let (private_key, public_key) = generate_keypair().unwrap();
        let store = Arc::new(InMemoryHub::default());

        let hub = manager
            .connect_to_hub_with_timeout(store, HubConfig::new(), "gw_a", "10.0.0.1", None, private_key, public_key, std::time::Duration::from_secs(1))
            .await
            .unwrap();

        manager.unregister_all().await;
        assert_eq!(manager.hub_count().await, 0);
        assert!(!hub.is_registered().await.unwrap());
    }
}
