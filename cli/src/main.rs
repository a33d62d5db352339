//! Binary entry point: wires the ambient stack (`copytrade_core`'s
//! config/logging/supervisor) to the replication engine (`copytrade_store`,
//! `copytrade_broker`, `copytrade_replicator`, `copytrade_stream`) and
//! drives the `INIT -> AUTHENTICATING -> CONNECTING -> READY -> DRAINING
//! -> STOPPED` lifecycle described for the Supervisor.
//!
//! Credential loading and rotation are out of scope for this workspace
//! (spec §1) — the broker client is constructed from a plain base URL
//! and whatever auth headers `reqwest::Client` was built with by the
//! (external) credential loader; this binary only reads `BROKER_BASE_URL`.

use clap::Parser;
use copytrade_broker::mock::MockBrokerClient;
use copytrade_broker::rest::{RestBrokerClient, RestBrokerConfig};
use copytrade_broker::BrokerClient;
use copytrade_core::config::Config;
use copytrade_core::supervisor::{Supervisor, SupervisorState};
use copytrade_core::{logging, CoreError};
use copytrade_model::SizingStrategy;
use copytrade_replicator::{FundsCache, InstrumentCache, LockRegistry, RateLimiter, Replicator, SizingPolicy};
use copytrade_stream::{Recovery, StreamConsumer};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "copytrade", about = "Leader-to-follower order replication engine")]
struct Cli {
    /// Run against an in-memory mock broker instead of the configured
    /// REST endpoint. Intended for paper-trading and local smoke tests.
    #[arg(long)]
    paper: bool,
}

fn main() -> Result<(), CoreError> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    if config.json_logs {
        logging::init_json_logging();
    } else {
        logging::init_logging();
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CoreError::Other(e.to_string()))?
        .block_on(run(config, cli.paper))
}

async fn run(config: Config, paper: bool) -> Result<(), CoreError> {
    let mut supervisor = Supervisor::new(config.drain_timeout);

    supervisor.transition(SupervisorState::Authenticating);
    let store: Arc<dyn copytrade_store::Store> = {
        let pg = copytrade_store::PostgresStore::connect(&config.database_url).await?;
        pg.run_migrations().await?;
        Arc::new(pg)
    };

    supervisor.transition(SupervisorState::Connecting);
    let broker: Arc<dyn BrokerClient> = if paper {
        tracing::info!("starting in paper-trading mode against the in-memory mock broker");
        Arc::new(MockBrokerClient::new())
    } else {
        let base_url = config
            .broker_base_url
            .parse()
            .map_err(|_| CoreError::Other(format!("invalid BROKER_BASE_URL: {}", config.broker_base_url)))?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CoreError::Other(e.to_string()))?;
        Arc::new(RestBrokerClient::new(http, RestBrokerConfig { base_url }))
    };

    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_max_orders as usize,
        config.rate_limit_window,
    ));
    let instruments = Arc::new(InstrumentCache::new(store.clone(), broker.clone(), rate_limiter.clone()));
    let funds = Arc::new(FundsCache::new(store.clone(), broker.clone(), Duration::from_secs(30)));
    let locks = Arc::new(LockRegistry::new());

    let sizing = SizingPolicy {
        strategy: parse_sizing_strategy(&config.default_sizing_strategy),
        fixed_ratio: Decimal::from_str(&config.fixed_ratio).unwrap_or(Decimal::ONE),
        max_position_pct: Decimal::from_str(&config.max_position_pct).unwrap_or(Decimal::from(2)),
    };

    let replicator = Arc::new(Replicator::new(
        store.clone(),
        broker.clone(),
        instruments,
        funds,
        rate_limiter,
        locks,
        sizing,
        chrono::Duration::seconds(60),
        supervisor.counters.clone(),
        config.copy_eligible_products.clone(),
    ));

    let recovery = Arc::new(Recovery::new(
        store.clone(),
        broker.clone(),
        replicator.clone(),
        chrono::Duration::from_std(config.cold_start_lookback)
            .unwrap_or(chrono::Duration::hours(1)),
    ));

    let mut consumer = StreamConsumer::new(
        broker.clone(),
        replicator.clone(),
        recovery.clone(),
        config.heartbeat_timeout,
        config.reconnect_backoff_min,
        config.reconnect_backoff_max,
        config.max_reconnect_attempts,
        supervisor.counters.clone(),
    );

    supervisor.transition(SupervisorState::Ready);
    let shutdown_rx = supervisor.subscribe_shutdown();

    let consumer_task = tokio::spawn(async move { consumer.run(shutdown_rx).await });

    match supervisor.run_until_shutdown(consumer_task).await {
        None => Ok(()),
        Some(Ok(Ok(()))) => Ok(()),
        Some(Ok(Err(stream_err))) => {
            tracing::error!(error = %stream_err, "stream consumer exited fatally");
            Err(CoreError::Other(stream_err.to_string()))
        }
        Some(Err(join_err)) => {
            tracing::error!(error = %join_err, "stream consumer task panicked");
            Err(CoreError::from(join_err))
        }
    }
}

fn parse_sizing_strategy(value: &str) -> SizingStrategy {
    match value {
        "fixed_ratio" => SizingStrategy::FixedRatio,
        "risk_based" => SizingStrategy::RiskBased,
        _ => SizingStrategy::CapitalProportional,
    }
}
