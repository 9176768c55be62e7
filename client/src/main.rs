use std::{path::PathBuf, process::ExitCode};

use alex_client::{
    Client, ConnectionConfig, ConsoleHandler, ConsoleSource, ControlState, TurnParameters,
    UnknownTagPolicy,
};
use alex_common::{CertPaths, DEFAULT_ROBOT_NAME};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "alex-client")]
#[command(about = "Operator console for the Alex robot")]
struct Args {
    /// Robot host name or IP address
    server: String,

    /// Robot TCP port
    port: u16,

    /// CA certificate used to verify the robot
    #[arg(long)]
    ca: Option<PathBuf>,

    /// Operator certificate presented to the robot
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Private key for the operator certificate
    #[arg(long)]
    key: Option<PathBuf>,

    /// Name the robot's certificate must carry
    #[arg(long, default_value = DEFAULT_ROBOT_NAME)]
    peer_name: String,

    /// Skip verification of the robot's certificate
    #[arg(long)]
    no_verify: bool,

    /// Connect without presenting an operator certificate
    #[arg(long)]
    no_identity: bool,

    /// Fixed turn angle in degrees instead of asking on every turn
    #[arg(long, requires = "turn_power")]
    turn_angle: Option<i32>,

    /// Fixed turn power in percent instead of asking on every turn
    #[arg(long, requires = "turn_angle")]
    turn_power: Option<i32>,

    /// End the session on frames with an unknown tag instead of skipping them
    #[arg(long)]
    strict_frames: bool,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Setup logging; stdout is left to the console
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(args));
    // A pending console read would otherwise keep the process alive
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let certs = CertPaths::operator();
    let mut config = ConnectionConfig::new(args.server, args.port)
        .with_verify_peer(!args.no_verify)
        .with_trust_anchor(args.ca.unwrap_or(certs.ca_path))
        .with_expected_peer_name(args.peer_name)
        .with_identity(
            args.cert.unwrap_or(certs.cert_path),
            args.key.unwrap_or(certs.key_path),
        )
        .with_unknown_tags(if args.strict_frames {
            UnknownTagPolicy::Reject
        } else {
            UnknownTagPolicy::Drop
        });
    if args.no_identity {
        config = config.without_identity();
    }

    let turns = match (args.turn_angle, args.turn_power) {
        (Some(angle), Some(power)) => TurnParameters::Fixed { angle, power },
        _ => TurnParameters::Prompt,
    };

    let control = ControlState::new();
    control
        .install_signal_handlers()
        .context("Failed to install signal handlers")?;

    tracing::info!("Starting Alex operator console...");
    let client = Client::start_with_control(
        config,
        control,
        Some(ConsoleHandler::stdout()),
        Some(ConsoleSource::stdio(turns)),
    );

    client.wait().await.context("Connection to Alex failed")?;
    Ok(())
}
