//! docbridge entry point

use anyhow::Context;
use clap::Parser;
use docbridge_server::cli::Cli;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config().context("loading configuration")?;
    let _guard = config.logging.init().context("initializing logging")?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                signal.cancel();
            }
            Err(err) => warn!(error = %err, "could not listen for shutdown signal"),
        }
    });

    docbridge_server::serve(config, shutdown)
        .await
        .context("docbridge server failed")
}
