use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rover_teleop::config::Config;
use rover_teleop::runtime::{self, RuntimeError};

/// Gamepad teleop: streams UDP motor commands to the robot receiver.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Session config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Override the receiver address from the config file
    #[arg(short, long)]
    remote: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    let mut cfg = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::from(2);
        }
    };
    if let Some(remote) = args.remote {
        cfg.remote = remote;
    }

    match runtime::run(&cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ RuntimeError::Macro(_)) => {
            eprintln!("Macro error: {}", e);
            ExitCode::from(3)
        }
        Err(e) => {
            eprintln!("Runtime error: {}", e);
            ExitCode::FAILURE
        }
    }
}
