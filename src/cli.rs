//! Command line interface for the `airharness` binary.
//!
//! Kept free of crate imports so the build script can render the man page
//! from it.

use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, ValueEnum};

/// Scenarios selectable on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ScenarioArg {
    /// Every scenario, in order.
    All,
    /// Connecting without an agent fails with NoAgent.
    NoAgent,
    /// A registered agent supplies the passphrase.
    OwnAgent,
    /// Only the first of two registered agents is consulted.
    FirstAgent,
    /// Roaming goes directly from roaming to connected.
    Roam,
    /// A roam through disconnected is caught.
    RoamFault,
}

/// Command line arguments for the `airharness` binary.
#[derive(Debug, Parser)]
#[command(
    name = "airharness",
    version,
    about = "Run the canonical connection scenarios against a simulated station"
)]
pub struct Cli {
    /// Scenario to run.
    #[arg(short, long, value_enum, default_value_t = ScenarioArg::All)]
    pub scenario: ScenarioArg,
    /// Default wait timeout in seconds.
    #[arg(long, default_value_t = 50)]
    pub timeout_secs: u64,
    /// Pause between simulated station steps in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub step_delay_ms: u64,
    /// Publish credential requests as AgentRequest entities.
    #[arg(long)]
    pub mirror_agent_requests: bool,
    /// Fixture storage directory, cleared after each scenario.
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,
    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    pub metrics_listen: Option<SocketAddr>,
}
