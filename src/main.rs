mod analyzer;
mod client;
mod codec;
mod config;
mod decoder;
mod error;
mod inspector;
mod raw;
mod rpc_server;
mod tracer;
mod utils;

use config::Config;
use rpc_server::RpcServer;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tx_inspector=info")),
        )
        .init();

    let config = Config::from_env()?;
    info!(rpc_url = %config.rpc_url, "using execution node");

    // Probe the node once; the server still starts if it is unreachable
    match client::NodeClient::connect(&config.rpc_url, config.rpc_timeout()).await {
        Ok(_) => info!("node endpoint configured"),
        Err(e) => warn!(error = %e, "node endpoint unusable, inspect_transaction will need rpc_url"),
    }

    let server = RpcServer::new(config).await?;
    info!(
        addr = %server.local_addr(),
        methods = "inspect_transaction, decode_transaction, analyze_gas, build_trace",
        "JSON-RPC server running"
    );
    println!();
    println!("Example request:");
    println!(
        r#"{{
  "jsonrpc": "2.0",
  "method": "inspect_transaction",
  "params": [{{
    "tx_hash": "0x...",
    "rpc_url": null
  }}],
  "id": 1
}}"#
    );
    println!();
    println!("Press Ctrl+C to stop the server");

    // Wait for shutdown signal
    signal::ctrl_c().await?;
    info!("shutting down server");

    server.stop().await?;
    info!("server stopped");

    Ok(())
}
