//! Entry point for the rocon gateway process: loads configuration, wires the
//! mirror/interfaces/hub manager/watcher together, and drives the
//! reconciliation loop until a termination signal arrives.
//!
//! The local master RPC and the networked hub store are external
//! collaborators (§4.2, §4.6 of the design this crate implements) that this
//! repository deliberately does not ship a production backend for. This
//! binary wires the in-memory `fake` implementations instead, so it runs
//! standalone as a demo of the reconciliation loop; swapping in a real
//! `MasterApi`/`HubStore` is the documented extension point.

use clap::Parser;
use gateway_codec::generate_keypair;
use gateway_config::GatewayConfig;
use gateway_hub::fake::InMemoryHub;
use gateway_hub::HubConfig;
use gateway_hub::HubManager;
use gateway_interfaces::FlippedInterface;
use gateway_interfaces::PublicInterface;
use gateway_interfaces::PulledInterface;
use gateway_master::fake::FakeMaster;
use gateway_master::Mirror;
use gateway_utils::logging::initialise_tracing_subscriber;
use gateway_utils::signals::Interruption;
use gateway_utils::signals::TermSignals;
use gateway_watcher::NoNetworkStats;
use gateway_watcher::Watcher;
use gateway_watcher::WatcherConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, clap::Parser)]
#[clap(
    name = clap::crate_name!(),
    version = clap::crate_version!(),
    about = clap::crate_description!()
)]
struct GatewayOpt {
    /// Path to a TOML configuration file. Falls back to built-in defaults
    /// plus `ROCON_GATEWAY_*` environment overrides when omitted.
    #[clap(long = "config")]
    config_path: Option<PathBuf>,

    /// Turn on debug-level logging.
    #[clap(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let opt = GatewayOpt::parse();
    initialise_tracing_subscriber(opt.debug);

    let config = GatewayConfig::load(opt.config_path.as_deref())?;
    let gateway_name = config.unique_name();
    tracing::info!(name = %gateway_name, "starting gateway");

    let (private_key, public_key) = generate_keypair()?;

    let mirror = Arc::new(Mirror::new(FakeMaster::default()));
    let public = Arc::new(PublicInterface::new(config.default_public_blacklist()?));
    public.advertise(config.default_public_interface()?, false).await;
    let flipped = Arc::new(FlippedInterface::new());
    let pulled = Arc::new(PulledInterface::new());
    let hubs: Arc<HubManager<InMemoryHub>> = Arc::new(HubManager::new(config.hub_whitelist.clone(), config.hub_blacklist.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if let Some(hub_uri) = &config.hub_uri {
        let hub_config = HubConfig::new().with_firewall(config.firewall).with_max_ttl(config.max_ttl());
        match hubs
            .connect_to_hub_with_timeout(Arc::new(InMemoryHub::default()), hub_config, &gateway_name, hub_uri, None, private_key, public_key, Duration::from_secs(5))
            .await
        {
            Ok(hub) => {
                tracing::info!(hub = %hub_uri, "connected to hub");
                tokio::spawn(hub.clone().run_liveness(shutdown_rx.clone(), || tracing::warn!("lost registration with hub")));
                tokio::spawn(hub.run_listener(
                    shutdown_rx.clone(),
                    |message| tracing::debug!(%message, "hub pub/sub message"),
                    || tracing::warn!("lost hub pub/sub channel"),
                ));
            }
            Err(error) => {
                tracing::error!(hub = %hub_uri, ?error, "failed to connect to hub at startup");
            }
        }
    } else {
        tracing::info!("no hub_uri configured, starting with no connected hubs");
    }

    let watcher = Arc::new(Watcher::new(
        WatcherConfig::new(config.watcher_period(), config.firewall),
        mirror,
        public,
        flipped,
        pulled,
        hubs.clone(),
        Arc::new(NoNetworkStats),
    ));

    let watcher_task = tokio::spawn(watcher.run(shutdown_rx));

    let mut signals = TermSignals::new(None);
    match signals.might_interrupt(std::future::pending::<()>()).await {
        Err(Interruption::Interrupted) => tracing::info!("termination signal received, shutting down"),
        Err(Interruption::Timeout) => unreachable!("no timeout was configured"),
        Ok(()) => unreachable!("pending future never completes"),
    }

    let _ = shutdown_tx.send(true);
    let _ = watcher_task.await;
    hubs.unregister_all().await;
    Ok(())
}
