use std::sync::Arc;

use paybridge_relayer::api;
use paybridge_relayer::config::{Config, NetworkConfig};
use paybridge_relayer::dispatcher::Dispatcher;
use paybridge_relayer::guard::IdempotencyGuard;
use paybridge_relayer::monitor::MonitorConfig;
use paybridge_relayer::registry::Registry;
use paybridge_relayer::rpc::{HttpChainClient, RetryPolicy};
use paybridge_relayer::types::ChainEndpoint;

fn main() -> eyre::Result<()> {
    // Install color-eyre for better error reporting
    color_eyre::install()?;

    // Run the async main
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    tracing::info!("Starting payout relayer");

    let config = Config::load()?;
    tracing::info!(
        source_chain = %config.source.chain,
        destination_chain = %config.destination.chain,
        assets = config.assets.len(),
        "Configuration loaded"
    );

    let endpoints = build_endpoints(&config)?;
    let registry = Arc::new(Registry::new(
        &config.receiving_wallet,
        config.assets.clone(),
        endpoints.clone(),
    )?);

    let destination = endpoints
        .into_iter()
        .find(|e| e.chain == config.destination.chain)
        .ok_or_else(|| eyre::eyre!("destination endpoint missing from registry"))?;

    let guard = IdempotencyGuard::new();
    tokio::spawn(guard.clone().run_expiry(config.guard.expiry));

    let retry = RetryPolicy {
        max_retries: config.rpc.retry_budget,
        initial_backoff: config.rpc.initial_backoff,
        ..RetryPolicy::default()
    };
    let monitor_config = MonitorConfig {
        poll_interval: config.monitor.poll_interval,
        max_attempts: config.monitor.max_attempts,
        scan_chunk: config.monitor.scan_chunk,
    };

    let dispatcher = Arc::new(Dispatcher::new(
        registry,
        guard,
        destination,
        monitor_config,
        retry,
    ));

    tracing::info!(bind_addr = %config.bind_addr, "Relayer initialized, serving");

    tokio::select! {
        result = api::serve(&config.bind_addr, dispatcher) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "API server error");
            }
        }
        _ = wait_for_shutdown_signal() => {}
    }

    tracing::info!("Payout relayer stopped");
    Ok(())
}

/// Construct chain endpoints from the network configuration.
fn build_endpoints(config: &Config) -> eyre::Result<Vec<ChainEndpoint>> {
    [&config.source, &config.destination]
        .into_iter()
        .map(|network: &NetworkConfig| {
            let client = HttpChainClient::new(&network.rpc_url, network.submitter.clone())
                .map_err(|e| eyre::eyre!("{e}"))?;
            Ok(ChainEndpoint {
                chain: network.chain.clone(),
                client: Arc::new(client),
                submitter: network.submitter.clone(),
                fee_params: network.fee_params,
                native_decimals: network.native_decimals,
            })
        })
        .collect()
}

/// Initialize tracing/logging with structured output
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,paybridge_relayer=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(filter)
        .init();
}

/// Wait for shutdown signals (SIGINT/SIGTERM)
async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
