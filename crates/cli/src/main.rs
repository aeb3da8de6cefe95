//! callroute - replay audio routing scenarios from the command line
//!
//! ```bash
//! # Replay a scenario against the in-memory ports
//! callroute replay scenario.toml --config route.toml
//!
//! # Same, on hardware without an earpiece and with JSON logs
//! callroute --json-logs --log-level debug replay scenario.json --no-earpiece
//!
//! # List device names accepted by select/toggle steps
//! callroute devices
//! ```

mod logging;
mod replay;
mod script;

use std::path::PathBuf;

use anyhow::{Context, Result};
use callroute_core::{AudioDevice, RouteConfig, SpeakerphonePreference};
use clap::{Args, Parser, Subcommand};

use crate::logging::{log_welcome, setup_logging, LogArgs, LoggingConfig};
use crate::replay::{Replay, ReplayOptions, StepOutcome};
use crate::script::Script;

/// In-call audio route selection tool
#[derive(Parser, Debug)]
#[command(name = "callroute")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    log: LogArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a JSON or TOML scenario through a routing session
    Replay(ReplayArgs),

    /// List routable device names
    Devices,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Scenario file (`.toml` for TOML, JSON otherwise)
    script: PathBuf,

    /// Routing configuration file
    #[arg(short, long, env = "CALLROUTE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the speakerphone preference (auto, true, false)
    #[arg(long)]
    speakerphone: Option<SpeakerphonePreference>,

    /// Simulate hardware without an earpiece
    #[arg(long)]
    no_earpiece: bool,

    /// Start with a wired headset plugged in
    #[arg(long)]
    wired_headset: bool,

    /// Start with a Bluetooth headset connected
    #[arg(long)]
    bluetooth_headset: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&LoggingConfig::from_args(&cli.log)?)?;
    log_welcome("callroute", callroute_core::VERSION);

    match cli.command {
        Commands::Replay(args) => run_replay(args).await,
        Commands::Devices => {
            list_devices();
            Ok(())
        }
    }
}

async fn run_replay(args: ReplayArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => RouteConfig::from_file(path).with_context(|| format!("failed to load {}", path.display()))?,
        None => RouteConfig::default(),
    };
    if let Some(preference) = args.speakerphone {
        config = config.with_speakerphone(preference);
    }

    let script = Script::from_file(&args.script)?;
    let options = ReplayOptions {
        no_earpiece: args.no_earpiece,
        wired_headset: args.wired_headset,
        bluetooth_headset: args.bluetooth_headset,
    };

    let outcomes = Replay::new(config, &options)?.run(&script).await?;
    for outcome in &outcomes {
        print_outcome(outcome);
    }

    Ok(())
}

fn print_outcome(outcome: &StepOutcome) {
    let label = match outcome.index {
        Some(index) => format!("{:>3}", index + 1),
        None => "  -".to_string(),
    };

    println!(
        "{} {:<40} selected={:<14} available={}",
        label,
        outcome.description,
        outcome.snapshot.selected.to_string(),
        outcome.snapshot.available
    );

    if let Some(reason) = &outcome.rejected {
        println!("      rejected: {}", reason);
    }
    for change in &outcome.changes {
        println!("      route -> {} {}", change.selected, change.available);
    }
}

fn list_devices() {
    for device in AudioDevice::ROUTABLE {
        let builtin = if device.is_builtin() { " (built-in, toggle)" } else { "" };
        println!("{}{}", device, builtin);
    }
}
