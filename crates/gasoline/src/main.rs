// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use gasoline::config::GasolineConfig;

#[derive(Parser)]
#[command(name = "gasoline", version, about = "Local observability broker bridging a browser to an AI coding agent.")]
struct Cli {
    #[command(flatten)]
    config: GasolineConfig,
}

#[tokio::main]
async fn main() {
    gasoline::init_tracing();
    let cli = Cli::parse();

    let broker = match gasoline::run(cli.config).await {
        Ok(broker) => broker,
        Err(e) => {
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to install ctrl-c handler: {e:#}");
    }
    broker.shutdown().await;
}
