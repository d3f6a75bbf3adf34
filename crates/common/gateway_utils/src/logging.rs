/// Initialize a `tracing_subscriber` for the gateway process.
///
/// Reports all the log events sent either with the `log` crate or the `tracing` crate.
/// The filter is driven by `ROCON_GATEWAY_LOG` (falling back to `debug`'s value) so
/// operators can scope verbosity per module without a code change.
pub fn initialise_tracing_subscriber(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("ROCON_GATEWAY_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
