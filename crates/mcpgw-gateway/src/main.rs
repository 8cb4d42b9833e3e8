use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod orchestration;
mod server;

use cli::Cli;
use server::GatewayEndpoint;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_tracing_filter())),
        )
        .try_init()
        .ok();

    if let Err(err) = run(cli).await {
        tracing::error!(error = %err, "gateway exited with an error");
        eprintln!("mcpgw: {err:#}");
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let state = orchestration::start(&cli.config).await?;

    let endpoint = GatewayEndpoint::start(&cli.host, cli.port, state.clone()).await?;
    tracing::info!(addr = %endpoint.addr, "gateway listening");
    println!("mcpgw listening on http://{}", endpoint.addr);

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    endpoint.shutdown().await;
    orchestration::stop(&state).await;

    Ok(())
}
