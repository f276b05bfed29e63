//! ==============================================================================
//! main.rs - sensor bridge entry point
//! ==============================================================================
//!
//! purpose:
//!     one binary, two roles.
//!
//!     `sensor-bridge agent`   - the isolated sampler. reads hardware every
//!                               second and fires snapshots at the monitor.
//!                               exits by itself once heartbeats stop.
//!     `sensor-bridge monitor` - the controller. spawns the agent, keeps it
//!                               alive with pings, consumes its snapshots.
//!
//! architecture:
//!
//!     ┌────────────────────────────┐  snapshots (udp 127.0.0.1:14242)  ┌───────────────────────────┐
//!     │ agent                      │ ────────────────────────────────> │ monitor                   │
//!     │  sampler -> codec -> send  │                                   │  listener -> ingress      │
//!     │  heartbeat rx -> watchdog  │ <──────────────────────────────── │  heartbeat tx             │
//!     └────────────────────────────┘   "ping" (udp 127.0.0.1:14243)    └───────────────────────────┘
//!
//! ==============================================================================

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sensor_bridge::config::BridgeConfig;
use sensor_bridge::{agent, controller};

/// Loopback hardware telemetry bridge
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the sampling agent (exits when heartbeats stop)
    Agent,
    /// Run the monitor: spawn the agent, send heartbeats, consume snapshots
    Monitor {
        /// Do not spawn an agent; attach to one that is already running
        #[arg(long)]
        no_spawn: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // step 1: load configuration (reported once logging is up)
    let (mut config, origin) = BridgeConfig::load_or_default(cli.config.as_deref());

    // step 2: logging - RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    origin.report();
    config.print_summary();

    // step 3: run the selected role
    match cli.command {
        Commands::Agent => {
            tracing::info!("Starting sensor agent");
            agent::run(&config).await
        }
        Commands::Monitor { no_spawn } => {
            if no_spawn {
                config.controller.spawn_agent = false;
            }
            tracing::info!("Starting monitor");
            controller::run(&config, cli.config.as_deref()).await
        }
    }
}
