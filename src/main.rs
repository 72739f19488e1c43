use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sabertooth_teleop::config::DriveConfig;
use sabertooth_teleop::input::TerminalKeys;
use sabertooth_teleop::motor::{MaestroOutput, PulseOutput, SimulatedOutput};
use sabertooth_teleop::runtime::{Runtime, RuntimeError};

/// WASD teleop for a two-motor differential drive with smooth ramping
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON file overriding pulse bounds, ramp step, tick period or channels
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port of the servo controller
    #[arg(long)]
    port: Option<String>,

    /// Run without hardware, logging pulses instead
    #[arg(long)]
    simulate: bool,
}

async fn run(args: Args) -> Result<(), RuntimeError> {
    let mut config = match &args.config {
        Some(path) => DriveConfig::load(path)?,
        None => DriveConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }

    let output: Box<dyn PulseOutput> = if args.simulate {
        Box::new(SimulatedOutput::without_history())
    } else {
        Box::new(MaestroOutput::new(
            &config.port,
            config.baud_rate,
            config.left_channel,
            config.right_channel,
            config.pulse.neutral,
        ))
    };

    let mut runtime = Runtime::new(&config, TerminalKeys::new(), output, std::io::stdout())?;
    runtime.run().await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Logs go to stderr (set RUST_LOG=debug or trace); stdout is the operator transcript
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("Teleop error: {}", e);
        std::process::exit(1);
    }
}
