use crate::NetworkStatsSource;
use crate::WatcherConfig;
use crate::WatcherError;
use gateway_hub::HubManager;
use gateway_hub::HubStore;
use gateway_interfaces::FlippedInterface;
use gateway_interfaces::PublicInterface;
use gateway_interfaces::PulledInterface;
use gateway_master::MasterApi;
use gateway_master::Mirror;
use gateway_model::assemble_action_status;
use gateway_model::explode_rule;
use gateway_model::Connection;
use gateway_model::FlipStatus;
use gateway_model::Registration;
use gateway_model::Rule;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::sync::Mutex;

/// The single periodic driver that reconciles local state, rules, and the
/// hub mailbox into concrete register/unregister/advertise/flip actions
/// (§4.8). Owns no state of its own beyond inbox bookkeeping: the public,
/// flipped, and pulled interfaces each own their own rules/active sets.
pub struct Watcher<M, S> {
    config: WatcherConfig,
    mirror: Arc<Mirror<M>>,
    public: Arc<PublicInterface>,
    flipped: Arc<FlippedInterface>,
    pulled: Arc<PulledInterface>,
    hubs: Arc<HubManager<S>>,
    network: Arc<dyn NetworkStatsSource>,
    /// Registrations realized on behalf of *inbound* flips, per hub
    /// (different hubs have independent flip-in mailboxes), keyed by the
    /// (source gateway, rule) the inbox entry carried.
    inbox_registrations: Mutex<HashMap<String, HashMap<(String, Rule), Registration>>>,
}

impl<M: MasterApi, S: HubStore> Watcher<M, S> {
    pub fn new(
        config: WatcherConfig,
        mirror: Arc<Mirror<M>>,
        public: Arc<PublicInterface>,
        flipped: Arc<FlippedInterface>,
        pulled: Arc<PulledInterface>,
        hubs: Arc<HubManager<S>>,
        network: Arc<dyn NetworkStatsSource>,
    ) -> Watcher<M, S> {
        Watcher {
            config,
            mirror,
            public,
            flipped,
            pulled,
            hubs,
            network,
            inbox_registrations: Mutex::new(HashMap::new()),
        }
    }

    /// Run the watcher loop until `shutdown` flips true, ticking at
    /// `config.period` (§4.8, §5). Each tick is independent: a snapshot
    /// failure is logged and the loop waits for the next tick rather than
    /// exiting, since a transient local-master hiccup should not bring the
    /// gateway down.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.period);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                    continue;
                }
            }

            if let Err(error) = self.tick().await {
                tracing::warn!(%error, "watcher tick aborted early");
            }
        }
    }

    /// One reconciliation pass (§4.8's six steps). Public for direct use in
    /// tests and by callers that want to drive ticks manually rather than
    /// through [`Watcher::run`]'s timer.
    pub async fn tick(&self) -> Result<(), WatcherError> {
        let local = self.mirror.get_connection_state().await?;
        let known_gateways = self.hubs.known_gateway_names().await;

        self.reconcile_public(&local).await;
        self.reconcile_flipped(&local, &known_gateways).await;
        self.reconcile_pulled(&known_gateways).await;
        self.drain_inbox(&known_gateways).await;
        self.publish_stats().await;

        Ok(())
    }

    async fn reconcile_public(&self, local: &[Connection]) {
        let delta = self.public.update(local).await;
        for connection in &delta.to_advertise {
            self.hubs.advertise(connection).await;
        }
        for connection in &delta.to_unadvertise {
            self.hubs.unadvertise(connection).await;
        }
    }

    async fn reconcile_flipped(&self, local: &[Connection], known_gateways: &[String]) {
        self.reinstate_resent_flips().await;

        let delta = self.flipped.reconcile(local, known_gateways).await;
        for (receiver, connection) in &delta.to_post {
            self.hubs.post_flip_request(receiver, FlipStatus::Pending, connection).await;
        }
        for (receiver, rule) in &delta.to_remove {
            self.hubs.send_unflip_request(receiver, rule).await;
        }
    }

    /// Drop any outbound flip the receiving hub has marked RESEND (a key
    /// rotation invalidated the encryption it was posted under) from the
    /// in-memory active set, so the reconcile that follows re-posts it in
    /// this same tick (§8 scenario 6).
    async fn reinstate_resent_flips(&self) {
        for (receiver, rule) in self.flipped.active_entries().await {
            if self.flip_status(&receiver, &rule).await == FlipStatus::Resend {
                self.flipped.mark_stale(&receiver, &rule).await;
            }
        }
    }

    async fn reconcile_pulled(&self, known_gateways: &[String]) {
        let mut remote_advertisements = Vec::with_capacity(known_gateways.len());
        for gateway in known_gateways {
            remote_advertisements.push((gateway.clone(), self.hubs.remote_gateway_info(gateway).await));
        }

        let delta = self.pulled.reconcile(&remote_advertisements).await;
        for (gateway, connection) in delta.to_register {
            match self.mirror.register(connection, &gateway).await {
                Ok(Some(registration)) => self.pulled.confirm_registered(&gateway, registration).await,
                Ok(None) => {}
                Err(error) => tracing::warn!(%gateway, %error, "pull registration failed"),
            }
        }
        for registration in delta.to_unregister {
            if let Err(error) = self.mirror.unregister(&registration).await {
                tracing::warn!(%error, "pull unregistration failed");
            }
        }
    }

    /// Read every connected hub's inbox once (§4.5): realize newly
    /// discoverable, unblocked entries via the mirror; tear down
    /// registrations whose entry vanished or whose source is no longer
    /// discoverable.
    async fn drain_inbox(&self, known_gateways: &[String]) {
        let discoverable: HashSet<&str> = known_gateways.iter().map(String::as_str).collect();
        let hubs = self.hubs.hubs().await;
        let mut registrations = self.inbox_registrations.lock().await;

        for (index, hub) in hubs.iter().enumerate() {
            let hub_id = hub.hub_name().map(str::to_string).unwrap_or_else(|| format!("hub#{index}"));
            let entries = match hub.read_inbox().await {
                Ok(entries) => entries,
                Err(error) => {
                    tracing::warn!(%error, "failed to read flip inbox");
                    continue;
                }
            };

            let bucket = registrations.entry(hub_id).or_default();
            let mut seen = HashSet::new();

            for (raw, request) in entries {
                if matches!(request.status, FlipStatus::Blocked | FlipStatus::Resend) {
                    continue;
                }
                if !discoverable.contains(request.source_gateway.as_str()) {
                    continue;
                }

                let connection = match hub.decrypt(&request) {
                    Ok(connection) => connection,
                    Err(error) => {
                        tracing::warn!(%error, source = %request.source_gateway, "failed to decrypt inbound flip");
                        continue;
                    }
                };
                let key = (request.source_gateway.clone(), connection.rule.clone());
                seen.insert(key.clone());

                if self.config.firewall {
                    if let Err(error) = hub.update_inbox_status(&raw, FlipStatus::Blocked).await {
                        tracing::warn!(%error, "failed to mark inbound flip blocked");
                    }
                    continue;
                }

                if bucket.contains_key(&key) {
                    continue;
                }

                match self.mirror.register(connection, &request.source_gateway).await {
                    Ok(Some(registration)) => {
                        bucket.insert(key, registration);
                        if let Err(error) = hub.update_inbox_status(&raw, FlipStatus::Accepted).await {
                            tracing::warn!(%error, "failed to mark inbound flip accepted");
                        }
                    }
                    Ok(None) => {}
                    Err(error) => tracing::warn!(%error, source = %request.source_gateway, "inbound flip registration failed"),
                }
            }

            let stale: Vec<(String, Rule)> = bucket.keys().filter(|key| !seen.contains(*key)).cloned().collect();
            for key in stale {
                if let Some(registration) = bucket.remove(&key) {
                    if let Err(error) = self.mirror.unregister(&registration).await {
                        tracing::warn!(%error, "failed to unregister stale inbound flip");
                    }
                }
            }
        }
    }

    async fn publish_stats(&self) {
        let network = self.network.sample_network_stats().await;
        self.hubs.publish_network_stats(&network).await;
        let latency = self.network.sample_latency().await;
        self.hubs.publish_latency(latency).await;
    }

    /// Assembled status of an outbound flip rule this gateway posted to
    /// `receiver` (§4.5): one [`GatewayHub::flip_request_status`] call per
    /// exploded topic for action rules, rolled up with
    /// [`assemble_action_status`]; a single lookup otherwise.
    pub async fn flip_status(&self, receiver: &str, rule: &Rule) -> FlipStatus {
        let parts = if rule.connection_type.is_action() { explode_rule(rule) } else { vec![rule.clone()] };

        let mut statuses = Vec::with_capacity(parts.len());
        for part in &parts {
            let mut found = None;
            for hub in self.hubs.hubs().await {
                if let Ok(Some(status)) = hub.flip_request_status(receiver, part).await {
                    found = Some(status);
                    break;
                }
            }
            statuses.push(found.unwrap_or(FlipStatus::Unknown));
        }

        if parts.len() == 1 {
            statuses[0]
        } else {
            assemble_action_status(&statuses)
        }
    }
}
