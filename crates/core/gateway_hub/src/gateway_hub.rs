use crate::keyspace;
use crate::HubConfig;
use crate::HubError;
use crate::HubStore;
use gateway_codec::deserialize_key;
use gateway_codec::deserialize_request;
use gateway_codec::deserialize_connection;
use gateway_codec::encrypt_connection;
use gateway_codec::serialize_connection;
use gateway_codec::serialize_key;
use gateway_codec::serialize_request;
use gateway_codec::FlipRequest;
use gateway_model::Connection;
use gateway_model::FlipStatus;
use gateway_model::Rule;
use regex::Regex;
use rsa::RsaPrivateKey;
use rsa::RsaPublicKey;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;
use tokio::time::timeout;

/// All interaction with one hub: registration, advertisements, the flip
/// mailbox, and liveness (§4.6).
pub struct GatewayHub<S> {
    store: Arc<S>,
    config: HubConfig,
    gateway_name: String,
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    lost_hook_fired: AtomicBool,
    /// The per-hub pub/sub channel handed back by `register`'s
    /// `store.subscribe` call, drained by `run_listener` (§4.6, §5).
    listener_rx: Mutex<Option<UnboundedReceiver<String>>>,
}

impl<S: HubStore> GatewayHub<S> {
    pub fn new(store: Arc<S>, config: HubConfig, gateway_name: impl Into<String>, private_key: RsaPrivateKey, public_key: RsaPublicKey) -> GatewayHub<S> {
        GatewayHub {
            store,
            config,
            gateway_name: gateway_name.into(),
            private_key,
            public_key,
            lost_hook_fired: AtomicBool::new(false),
            listener_rx: Mutex::new(None),
        }
    }

    pub fn gateway_name(&self) -> &str {
        &self.gateway_name
    }

    /// The hub's own descriptive name, if configured (used by `HubManager`
    /// for whitelist/blacklist matching, never part of the keyspace).
    pub fn hub_name(&self) -> Option<&str> {
        self.config.name.as_deref()
    }

    /// Register this gateway with the hub: add to the gatewaylist, publish
    /// ip/firewall/public key, and set an initial ping. Returns `true` if
    /// the previously stored public key differs from ours, the signal that
    /// triggers the outbound-flip RESEND sweep (§4.5, §9).
    pub async fn register(&self, ip: &str) -> Result<bool, HubError> {
        self.store.set_add(&keyspace::gatewaylist_key(), &self.gateway_name).await?;
        self.store.set(&keyspace::ip_key(&self.gateway_name), ip).await?;
        self.store.set(&keyspace::firewall_key(&self.gateway_name), if self.config.firewall { "1" } else { "0" }).await?;

        let previous_key = self.store.get(&keyspace::public_key_key(&self.gateway_name)).await?;
        let rotated = previous_key.as_deref() != Some(&serialize_key(&self.public_key)?);
        self.store.set(&keyspace::public_key_key(&self.gateway_name), &serialize_key(&self.public_key)?).await?;

        let receiver = self.store.subscribe(&self.gateway_name).await?;
        *self.listener_rx.lock().await = Some(receiver);

        self.ping().await?;
        Ok(rotated)
    }

    /// Delete every `rocon:<gw>:*` key and remove self from the gatewaylist.
    pub async fn unregister(&self) -> Result<(), HubError> {
        self.store.set_remove(&keyspace::gatewaylist_key(), &self.gateway_name).await?;
        for key in [
            keyspace::ip_key(&self.gateway_name),
            keyspace::firewall_key(&self.gateway_name),
            keyspace::public_key_key(&self.gateway_name),
            keyspace::advertisements_key(&self.gateway_name),
            keyspace::flips_key(&self.gateway_name),
            keyspace::pulls_key(&self.gateway_name),
            keyspace::flip_ins_key(&self.gateway_name),
            keyspace::ping_key(&self.gateway_name),
        ] {
            self.store.delete(&key).await?;
        }
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), HubError> {
        self.store.set(&keyspace::ping_key(&self.gateway_name), "alive").await?;
        self.store.expire(&keyspace::ping_key(&self.gateway_name), self.config.max_ttl).await
    }

    pub async fn is_registered(&self) -> Result<bool, HubError> {
        Ok(self.store.set_members(&keyspace::gatewaylist_key()).await?.iter().any(|g| g == &self.gateway_name))
    }

    pub async fn advertise(&self, connection: &Connection) -> Result<(), HubError> {
        let wire = serialize_connection(connection)?;
        self.store.set_add(&keyspace::advertisements_key(&self.gateway_name), &wire).await
    }

    pub async fn unadvertise(&self, connection: &Connection) -> Result<(), HubError> {
        let wire = serialize_connection(connection)?;
        self.store.set_remove(&keyspace::advertisements_key(&self.gateway_name), &wire).await
    }

    /// The public advertisements posted by `gateway` (any gateway, including self).
    pub async fn remote_advertisements(&self, gateway: &str) -> Result<Vec<Connection>, HubError> {
        let members = self.store.set_members(&keyspace::advertisements_key(gateway)).await?;
        members.iter().map(|wire| deserialize_connection(wire).map_err(HubError::from)).collect()
    }

    pub async fn list_remote_gateway_names(&self) -> Result<Vec<String>, HubError> {
        let mut names = self.store.set_members(&keyspace::gatewaylist_key()).await?;
        names.retain(|name| name != &self.gateway_name);
        names.sort();
        names.dedup();
        Ok(names)
    }

    pub async fn matches_remote_gateway_name(&self, pattern: &str) -> Result<Vec<String>, HubError> {
        let names = self.list_remote_gateway_names().await?;
        Ok(filter_by_pattern(&names, pattern))
    }

    pub async fn matches_remote_gateway_basename(&self, pattern: &str) -> Result<Vec<String>, HubError> {
        let names = self.list_remote_gateway_names().await?;
        let base_names: Vec<String> = names.iter().map(|n| keyspace::base_name(n).to_string()).collect();
        Ok(filter_by_pattern(&base_names, pattern))
    }

    async fn public_key_of(&self, gateway: &str) -> Result<Option<RsaPublicKey>, HubError> {
        match self.store.get(&keyspace::public_key_key(gateway)).await? {
            Some(wire) => Ok(Some(deserialize_key(&wire)?)),
            None => Ok(None),
        }
    }

    /// Bounded wait for `receiver`'s public key to show up on the hub
    /// (§5's 15 s default), then seal and post a flip-request entry in its
    /// inbox with the given status.
    pub async fn post_flip_request(&self, receiver: &str, status: FlipStatus, connection: &Connection) -> Result<(), HubError> {
        let public_key = self.wait_for_public_key(receiver).await?;
        let encrypted = encrypt_connection(connection, &public_key)?;

        self.remove_flip_request(receiver, &connection.rule).await?;
        let wire = serialize_request(status, &self.gateway_name, &encrypted)?;
        self.store.set_add(&keyspace::flip_ins_key(receiver), &wire).await
    }

    async fn wait_for_public_key(&self, receiver: &str) -> Result<RsaPublicKey, HubError> {
        let deadline = self.config.public_key_wait_timeout;
        let poll_period = Duration::from_millis(200).min(deadline);
        let result = timeout(deadline, async {
            loop {
                if let Some(key) = self.public_key_of(receiver).await? {
                    return Ok(key);
                }
                tokio::time::sleep(poll_period).await;
            }
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => Err(HubError::PublicKeyTimeout(receiver.to_string())),
        }
    }

    /// Remove whatever entry this gateway currently has posted in
    /// `receiver`'s inbox for `rule`, if any (used both to clear a
    /// superseded entry before re-posting, and to unflip outright).
    pub async fn remove_flip_request(&self, receiver: &str, rule: &Rule) -> Result<(), HubError> {
        if let Some(raw) = self.find_flip_request_raw(receiver, rule).await? {
            self.store.set_remove(&keyspace::flip_ins_key(receiver), &raw).await?;
        }
        Ok(())
    }

    async fn find_flip_request_raw(&self, receiver: &str, rule: &Rule) -> Result<Option<String>, HubError> {
        for raw in self.store.set_members(&keyspace::flip_ins_key(receiver)).await? {
            let request = deserialize_request(&raw)?;
            if request.source_gateway == self.gateway_name && request.connection.rule == *rule {
                return Ok(Some(raw));
            }
        }
        Ok(None)
    }

    /// This gateway's own inbox, as `(raw wire entry, parsed request)` pairs
    /// so the caller can update an entry in place by its raw form.
    pub async fn read_inbox(&self) -> Result<Vec<(String, FlipRequest)>, HubError> {
        let mut entries = Vec::new();
        for raw in self.store.set_members(&keyspace::flip_ins_key(&self.gateway_name)).await? {
            entries.push((raw.clone(), deserialize_request(&raw)?));
        }
        Ok(entries)
    }

    /// Rewrite an inbox entry in place with a new status, re-encrypting for
    /// this gateway's own current public key (the receiver always decrypts
    /// with its own private key, so the ciphertext is unchanged by a status
    /// update, only the status field and wire encoding are rewritten).
    pub async fn update_inbox_status(&self, raw: &str, new_status: FlipStatus) -> Result<(), HubError> {
        let mut request = deserialize_request(raw)?;
        request.status = new_status;
        let rewritten = serialize_request(request.status, &request.source_gateway, &request.connection)?;
        let key = keyspace::flip_ins_key(&self.gateway_name);
        self.store.set_remove(&key, raw).await?;
        self.store.set_add(&key, &rewritten).await
    }

    /// Decrypt an inbox entry's connection with this gateway's private key.
    pub fn decrypt(&self, request: &FlipRequest) -> Result<Connection, HubError> {
        gateway_codec::decrypt_connection(&request.connection, &self.private_key).map_err(HubError::from)
    }

    /// Rewrite every outbound flip entry this gateway has posted across
    /// `known_receivers`' inboxes to RESEND, per the key-rotation handling
    /// in §4.5/§9.
    pub async fn resend_all_outbound_flips(&self, known_receivers: &[String]) -> Result<(), HubError> {
        for receiver in known_receivers {
            let key = keyspace::flip_ins_key(receiver);
            for raw in self.store.set_members(&key).await? {
                let mut request = deserialize_request(&raw)?;
                if request.source_gateway != self.gateway_name {
                    continue;
                }
                request.status = FlipStatus::Resend;
                let rewritten = serialize_request(request.status, &request.source_gateway, &request.connection)?;
                self.store.set_remove(&key, &raw).await?;
                self.store.set_add(&key, &rewritten).await?;
            }
        }
        Ok(())
    }

    /// Run the liveness loop (§5): ping at the configured period, verify
    /// self-registration each cycle, fire `on_lost` exactly once on either
    /// failure, then stop.
    pub async fn run_liveness(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>, on_lost: impl Fn() + Send + Sync + 'static) {
        let mut interval = tokio::time::interval(self.config.ping_period);
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

            let lost = match self.ping().await {
                Err(_) => true,
                Ok(()) => !self.is_registered().await.unwrap_or(false),
            };

            if lost {
                self.fire_lost_hook(&on_lost);
                return;
            }
        }
    }

    /// Drain this gateway's own hub pub/sub channel until `shutdown` flips
    /// true or the channel closes (§4.6, §5's per-hub listener task).
    /// A no-op if `register` was never called, since no channel exists yet.
    pub async fn run_listener(
        self: Arc<Self>,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
        mut on_message: impl FnMut(String) + Send + 'static,
        on_lost: impl Fn() + Send + Sync + 'static,
    ) {
        let mut receiver = match self.listener_rx.lock().await.take() {
            Some(receiver) => receiver,
            None => return,
        };

        loop {
            tokio::select! {
                message = receiver.recv() => {
                    match message {
                        Some(message) => on_message(message),
                        None => {
                            self.fire_lost_hook(&on_lost);
                            return;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }

    fn fire_lost_hook(&self, on_lost: &(impl Fn() + Send + Sync + 'static)) {
        if self.lost_hook_fired.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            tracing::warn!(gateway = %self.gateway_name, "hub connection lost");
            on_lost();
        }
    }

    /// Current status of the entry this gateway has posted for `rule` in
    /// `receiver`'s inbox, used to report back an outbound flip's progress
    /// (§4.5's action status assembly is built on top of this, one call per
    /// exploded topic).
    pub async fn flip_request_status(&self, receiver: &str, rule: &Rule) -> Result<Option<FlipStatus>, HubError> {
        for raw in self.store.set_members(&keyspace::flip_ins_key(receiver)).await? {
            let request = deserialize_request(&raw)?;
            if request.source_gateway == self.gateway_name && request.connection.rule == *rule {
                return Ok(Some(request.status));
            }
        }
        Ok(None)
    }

    /// Publish this gateway's self-reported network interface stats (§4.6's
    /// `network:*`/`wireless:*` keys). Gathering the actual interface state
    /// is an external collaborator; the caller supplies already-sampled values.
    pub async fn publish_network_stats(&self, stats: &NetworkStats) -> Result<(), HubError> {
        self.store
            .set(&keyspace::network_info_available_key(&self.gateway_name), if stats.info_available { "1" } else { "0" })
            .await?;
        if let Some(network_type) = &stats.network_type {
            self.store.set(&keyspace::network_type_key(&self.gateway_name), network_type).await?;
        }
        for (stat, value) in [
            ("bitrate", &stats.wireless_bitrate),
            ("quality", &stats.wireless_quality),
            ("signal_level", &stats.wireless_signal_level),
            ("noise_level", &stats.wireless_noise_level),
        ] {
            if let Some(value) = value {
                self.store.set(&keyspace::wireless_key(&self.gateway_name, stat), value).await?;
            }
        }
        Ok(())
    }

    /// Publish this gateway's hub-observed-equivalent ping latency stats
    /// (§4.6's `latency:*` keys). In the reference topology these are
    /// measured by the hub itself; a gateway that wants to self-report an
    /// estimate (e.g. from its own ping round-trips) uses this.
    pub async fn publish_latency(&self, latency: &LatencyStats) -> Result<(), HubError> {
        self.store.set(&keyspace::latency_key(&self.gateway_name, "min"), &latency.min.to_string()).await?;
        self.store.set(&keyspace::latency_key(&self.gateway_name, "avg"), &latency.avg.to_string()).await?;
        self.store.set(&keyspace::latency_key(&self.gateway_name, "max"), &latency.max.to_string()).await?;
        self.store.set(&keyspace::latency_key(&self.gateway_name, "mdev"), &latency.mdev.to_string()).await?;
        Ok(())
    }
}

/// Self-reported network interface state (§4.6). Sampling the actual
/// interface is out of scope for this crate; this is the shape a caller
/// fills in from whatever platform-specific source it has.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkStats {
    pub info_available: bool,
    pub network_type: Option<String>,
    pub wireless_bitrate: Option<String>,
    pub wireless_quality: Option<String>,
    pub wireless_signal_level: Option<String>,
    pub wireless_noise_level: Option<String>,
}

/// Self-reported ping latency stats (§4.6), in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub mdev: f64,
}

fn filter_by_pattern(candidates: &[String], pattern: &str) -> Vec<String> {
    let anchored = format!("^{pattern}$");
    let mut matched: Vec<String> = match Regex::new(&anchored) {
        Ok(re) => candidates.iter().filter(|c| re.is_match(c)).cloned().collect(),
        Err(_) => candidates.iter().filter(|c| c.as_str() == pattern).cloned().collect(),
    };
    matched.sort();
    matched.dedup();
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fake::InMemoryHub;
    use gateway_codec::generate_keypair;
    use gateway_model::ConnectionType;

    fn hub(name: &str) -> GatewayHub<InMemoryHub> {
        let (private_key, public_key) = generate_keypair().unwrap();
        GatewayHub::new(Arc::new(InMemoryHub::default()), HubConfig::new(), name, private_key, public_key)
    }

    #[tokio::test]
    async fn register_adds_self_to_gatewaylist() {
        let hub = hub("gw_a");
        hub.register("10.0.0.1").await.unwrap();
        assert!(hub.is_registered().await.unwrap());
    }

    #[tokio::test]
    async fn register_detects_key_rotation_on_second_call_with_new_keys() {
        let store = Arc::new(InMemoryHub::default());
        let (private_key_1, public_key_1) = generate_keypair().unwrap();
        let hub_1 = GatewayHub::new(store.clone(), HubConfig::new(), "gw_a", private_key_1, public_key_1);
        let first = hub_1.register("10.0.0.1").await.unwrap();
        assert!(first, "no stored key yet, so this counts as a change");

        let (private_key_2, public_key_2) = generate_keypair().unwrap();
        let hub_2 = GatewayHub::new(store, HubConfig::new(), "gw_a", private_key_2, public_key_2);
        let rotated = hub_2.register("10.0.0.1").await.unwrap();
        assert!(rotated);
    }

    #[tokio::test]
    async fn advertise_then_unadvertise_removes_the_entry() {
        let hub = hub("gw_a");
        hub.register("10.0.0.1").await.unwrap();
        let connection = Connection::new(Rule::new(ConnectionType::Publisher, "/chatter", "/talker"), "std_msgs/String", "http://talker:11311/");
        hub.advertise(&connection).await.unwrap();
        assert_eq!(hub.remote_advertisements("gw_a").await.unwrap(), vec![connection.clone()]);
        hub.unadvertise(&connection).await.unwrap();
        assert!(hub.remote_advertisements("gw_a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn post_flip_request_is_readable_from_receivers_inbox() {
        let store = Arc::new(InMemoryHub::default());
        let (sender_private, sender_public) = generate_keypair().unwrap();
        let (receiver_private, receiver_public) = generate_keypair().unwrap();
        let sender = GatewayHub::new(store.clone(), HubConfig::new(), "gw_a", sender_private, sender_public);
        let receiver = GatewayHub::new(store, HubConfig::new(), "gw_b", receiver_private, receiver_public);

        receiver.register("10.0.0.2").await.unwrap();
        let connection = Connection::new(Rule::new(ConnectionType::Publisher, "/chatter", "/talker"), "std_msgs/String", "http://talker:11311/");
        sender.post_flip_request("gw_b", FlipStatus::Pending, &connection).await.unwrap();

        let inbox = receiver.read_inbox().await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].1.status, FlipStatus::Pending);
        let decrypted = receiver.decrypt(&inbox[0].1).unwrap();
        assert_eq!(decrypted, connection);
    }

    #[tokio::test]
    async fn unregister_clears_gatewaylist_membership() {
        let hub = hub("gw_a");
        hub.register("10.0.0.1").await.unwrap();
        hub.unregister().await.unwrap();
        assert!(!hub.is_registered().await.unwrap());
    }

    #[tokio::test]
    async fn flip_request_status_reflects_inbox_entry() {
        let store = Arc::new(InMemoryHub::default());
        let (sender_private, sender_public) = generate_keypair().unwrap();
        let (receiver_private, receiver_public) = generate_keypair().unwrap();
        let sender = GatewayHub::new(store.clone(), HubConfig::new(), "gw_a", sender_private, sender_public);
        let receiver = GatewayHub::new(store, HubConfig::new(), "gw_b", receiver_private, receiver_public);

        receiver.register("10.0.0.2").await.unwrap();
        let rule = Rule::new(ConnectionType::Publisher, "/chatter", "/talker");
        let connection = Connection::new(rule.clone(), "std_msgs/String", "http://talker:11311/");
        assert_eq!(sender.flip_request_status("gw_b", &rule).await.unwrap(), None);

        sender.post_flip_request("gw_b", FlipStatus::Pending, &connection).await.unwrap();
        assert_eq!(sender.flip_request_status("gw_b", &rule).await.unwrap(), Some(FlipStatus::Pending));
    }

    #[tokio::test]
    async fn publish_network_and_latency_stats_round_trip_through_the_store() {
        let hub = hub("gw_a");
        let stats = NetworkStats {
            info_available: true,
            network_type: Some("wireless".to_string()),
            wireless_bitrate: Some("54 Mb/s".to_string()),
            wireless_quality: None,
            wireless_signal_level: None,
            wireless_noise_level: None,
        };
        hub.publish_network_stats(&stats).await.unwrap();
        hub.publish_latency(&LatencyStats { min: 1.0, avg: 2.0, max: 3.0, mdev: 0.5 }).await.unwrap();

        assert_eq!(hub.store.get(&keyspace::network_type_key("gw_a")).await.unwrap().as_deref(), Some("wireless"));
        assert_eq!(hub.store.get(&keyspace::latency_key("gw_a", "avg")).await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn run_listener_delivers_messages_published_on_its_own_channel() {
        let store = Arc::new(InMemoryHub::default());
        let (private_key, public_key) = generate_keypair().unwrap();
        let hub = Arc::new(GatewayHub::new(store.clone(), HubConfig::new(), "gw_a", private_key, public_key));
        hub.register("10.0.0.1").await.unwrap();

        let received: Arc<std::sync::Mutex<Vec<String>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let received_clone = received.clone();
        let handle = tokio::spawn(hub.clone().run_listener(shutdown_rx, move |message| received_clone.lock().unwrap().push(message), || {}));

        store.publish("gw_a", "hello").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(*received.lock().unwrap(), vec!["hello".to_string()]);
    }
}
