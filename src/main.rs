use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mecanum_drive_runtime::config::{
    CMD_TIMEOUT, DriveConfig, LOOP_HZ, MOVE_TIMEOUT, RuntimeConfig, TOPIC_PREFIX,
};

/// Mecanum drivetrain runtime: takes drive commands over Zenoh and publishes wheel powers
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON file with drivetrain calibration (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Control loop rate in Hz
    #[arg(long, default_value_t = LOOP_HZ, value_parser = clap::value_parser!(u64).range(1..))]
    loop_hz: u64,

    /// Stop the robot when no command arrives for this long
    #[arg(long, default_value_t = CMD_TIMEOUT.as_millis() as u64)]
    cmd_timeout_ms: u64,

    /// Abort encoder moves that take longer than this
    #[arg(long, default_value_t = MOVE_TIMEOUT.as_secs())]
    move_timeout_secs: u64,

    /// Zenoh key prefix for all topics
    #[arg(long, default_value = TOPIC_PREFIX)]
    prefix: String,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init(); // installs the subscriber globally

    let args = Args::parse();

    let drive = match args.config {
        Some(path) => match DriveConfig::load(&path) {
            Ok(drive) => drive,
            Err(e) => {
                eprintln!("Config error: {}", e);
                std::process::exit(2);
            }
        },
        None => DriveConfig::default(),
    };

    let config = RuntimeConfig {
        loop_hz: args.loop_hz,
        cmd_timeout: Duration::from_millis(args.cmd_timeout_ms),
        move_timeout: Duration::from_secs(args.move_timeout_secs),
        topic_prefix: args.prefix,
        drive,
    };

    if let Err(e) = mecanum_drive_runtime::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
