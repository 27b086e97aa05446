//! Recalculation Runtime
//!
//! Keeps POKT staker credentials in line with on-chain stake and wPOKT
//! liquidity:
//! - Loads configuration from the environment (`.env` supported)
//! - Builds the DNS, POKTscan, MyGateway and Uniswap clients
//! - Runs the recalculation daily at `RECALCULATE_AT_UTC`
//!
//! Usage:
//!   cargo run --release --bin recalculate_runtime
//!   cargo run --release --bin recalculate_runtime -- --run-now
//!
//! Environment variables:
//!   RECALCULATE_AT_UTC - Daily trigger time (default: 00:00)
//!   JOB_LISTENER_BATCH_SIZE - Concurrent credential writes (default: 2)
//!   JOB_LISTENER_LATENCY_MS - Pause between write batches (default: 2000)
//!   DEBUG_MODE - Debug logging when RUST_LOG is unset (default: false)

use dotenv::dotenv;
use log::{error, info};
use pokt_recalculate::config::RuntimeConfig;
use pokt_recalculate::dns::TxtRecordResolver;
use pokt_recalculate::error_chain;
use pokt_recalculate::pda::MyGatewayClient;
use pokt_recalculate::pipeline::scheduler::daily_scheduler_task;
use pokt_recalculate::pipeline::{Collaborators, Orchestrator, RunSettings};
use pokt_recalculate::poktscan::PoktScanRetriever;
use pokt_recalculate::wpokt::WPoktValuator;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;

fn init_logging(default_filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    // Config loads first: DEBUG_MODE selects the default log filter
    let config = RuntimeConfig::from_env();
    init_logging(config.as_ref().map_or("info", RuntimeConfig::log_filter));

    let run_now = env::args().skip(1).any(|arg| arg == "--run-now");

    info!("🚀 Recalculation Runtime");
    info!("   └─ Mode: {}", if run_now { "single run" } else { "daily schedule" });

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("✅ Configuration loaded");
    info!("   ├─ MyGateway: {}", config.mygateway_endpoint_url);
    info!("   ├─ POKTscan: {}", config.poktscan_api_url);
    info!("   ├─ Uniswap V2: {}", config.uniswap_v2_endpoint_url);
    info!("   ├─ Organization: {}", config.org_gateway_id);
    info!(
        "   ├─ Listener: batch {} every {}ms",
        config.pipeline.listener_batch_size, config.pipeline.listener_latency_ms
    );
    info!(
        "   └─ Schedule: {:02}:{:02} UTC",
        config.pipeline.run_at_hour, config.pipeline.run_at_minute
    );

    let orchestrator = match build_orchestrator(&config) {
        Ok(orchestrator) => Arc::new(orchestrator),
        Err(e) => {
            error!("❌ Failed to build clients: {}", error_chain(&e));
            return ExitCode::FAILURE;
        }
    };
    info!("✅ Clients ready");

    if run_now {
        return match orchestrator.run().await {
            Ok(report) => {
                info!("✅ Run finished: {:?}", report);
                ExitCode::SUCCESS
            }
            Err(_) => ExitCode::FAILURE,
        };
    }

    let scheduler = tokio::spawn(daily_scheduler_task(
        orchestrator,
        config.pipeline.run_at_hour,
        config.pipeline.run_at_minute,
    ));

    info!("🔄 Press CTRL+C to shutdown");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("");
            info!("⚠️  Received CTRL+C, shutting down...");
        }
        Err(err) => {
            error!("❌ Failed to listen for CTRL+C: {}", err);
        }
    }

    scheduler.abort();
    info!("✅ Recalculation runtime stopped");
    ExitCode::SUCCESS
}

fn build_orchestrator(config: &RuntimeConfig) -> pokt_recalculate::Result<Orchestrator> {
    let mygateway = Arc::new(MyGatewayClient::from_config(config)?);

    let collaborators = Collaborators {
        resolver: Arc::new(TxtRecordResolver::from_system()),
        nodes: Arc::new(PoktScanRetriever::from_config(config)?),
        directory: mygateway.clone(),
        valuator: Arc::new(WPoktValuator::from_config(config)?),
        writer: mygateway,
    };

    let settings = RunSettings::new(
        &config.pipeline,
        config.supply_logo_url.clone(),
        config.liquidity_logo_url.clone(),
    );

    Ok(Orchestrator::new(collaborators, settings))
}
