use std::net::SocketAddr;

use alex_common::{CertPaths, DEFAULT_PORT};
use alex_robot_sim::{RobotSimulator, SimulatorConfig};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "alex-robot-sim")]
#[command(about = "Simulated Alex robot endpoint for testing the operator console")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))]
    bind: SocketAddr,

    /// Accept clients that present no certificate
    #[arg(long)]
    no_client_auth: bool,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Alex robot simulator...");

    let config = SimulatorConfig::new(args.bind)
        .with_cert_paths(CertPaths::robot())
        .with_client_auth(!args.no_client_auth);
    let simulator = RobotSimulator::bind(config)
        .await
        .context("Failed to start robot simulator")?;

    simulator
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("✓ Robot simulator stopped");
    Ok(())
}
