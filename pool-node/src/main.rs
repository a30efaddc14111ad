use std::path::PathBuf;

use clap::Parser;
use pool_coordinator::{Coordinator, CoordinatorConfig};
use pool_server::TcpFramedServer;
use pool_shares::{InMemoryShareLedger, ShareLedgerConfig};
use pool_upstream::RpcUpstream;
use tracing::info;

mod config;
mod webhook;

use config::PoolConfig;
use webhook::ReqwestWebhookSink;

#[derive(Parser, Debug)]
#[command(name = "pool-node")]
#[command(about = "Mining pool coordinator", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Run with an in-process development configuration
    #[arg(long)]
    dev: bool,

    /// Config file path (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = if let Some(path) = &args.config {
        PoolConfig::from_file(path)?
    } else if args.dev {
        PoolConfig::development()
    } else {
        anyhow::bail!("pass --config <file> or --dev");
    };

    init_tracing(&config);

    info!(pool = %config.pool.name, "starting pool-node");

    let upstream = RpcUpstream::new(config.upstream.rpc_url.clone());
    let server = TcpFramedServer::new(config.server.listen_addr.parse()?);
    let shares = InMemoryShareLedger::new(ShareLedgerConfig {
        window: std::time::Duration::from_secs(config.shares.rate_window_secs),
    });
    let webhooks = std::sync::Arc::new(ReqwestWebhookSink::new(
        config.webhooks.url.clone(),
        config.webhooks.enabled,
    ));

    let coordinator_config = CoordinatorConfig {
        pool_name: config.pool.name.clone(),
        pool_difficulty: config.pool.difficulty,
        retry_interval: config.retry_interval(),
        retarget_delay: std::time::Duration::from_secs(10),
        status_interval: config.status_interval(),
    };

    let coordinator = Coordinator::new(coordinator_config, upstream, server.clone(), shares, webhooks)?;
    server.wire(coordinator.clone());

    coordinator.start();
    info!(addr = %config.server.listen_addr, "pool is running, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    coordinator.stop();
    coordinator.wait_for_stop().await;
    info!("pool-node stopped cleanly");

    Ok(())
}

fn init_tracing(config: &PoolConfig) {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.operational.log_level.clone());
    let filter = tracing_subscriber::EnvFilter::try_new(&log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if config.operational.structured_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
