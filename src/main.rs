//! Runs the canonical scenarios against the simulated station.
//!
//! Prints one line per scenario and exits non-zero if any failed.

mod cli;

use std::{net::SocketAddr, process::ExitCode, time::Duration};

use airharness::{
    HarnessConfig,
    scenario::{self, Scenario, ScenarioConfig},
    sim::SimConfig,
};
use clap::Parser;
use cli::{Cli, ScenarioArg};
use tracing::warn;

fn selected(arg: ScenarioArg) -> Vec<Scenario> {
    match arg {
        ScenarioArg::All => Scenario::ALL.to_vec(),
        ScenarioArg::NoAgent => vec![Scenario::NoAgent],
        ScenarioArg::OwnAgent => vec![Scenario::OwnAgent],
        ScenarioArg::FirstAgent => vec![Scenario::FirstAgent],
        ScenarioArg::Roam => vec![Scenario::Roam],
        ScenarioArg::RoamFault => vec![Scenario::RoamFault],
    }
}

#[cfg(feature = "metrics")]
fn serve_metrics(addr: SocketAddr) {
    if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        warn!(error = %e, %addr, "failed to start metrics exporter");
    }
}

#[cfg(not(feature = "metrics"))]
fn serve_metrics(addr: SocketAddr) {
    warn!(%addr, "built without the metrics feature; not serving metrics");
}

#[tokio::main]
async fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Some(addr) = cli.metrics_listen {
        serve_metrics(addr);
    }

    let config = ScenarioConfig {
        harness: HarnessConfig {
            wait_timeout: Duration::from_secs(cli.timeout_secs),
            mirror_agent_requests: cli.mirror_agent_requests,
            storage_dir: cli.storage_dir.clone(),
            ..HarnessConfig::default()
        },
        sim: SimConfig::default().step_delay(Duration::from_millis(cli.step_delay_ms)),
    };

    let mut failed = 0usize;
    for scenario in selected(cli.scenario) {
        match scenario::run(scenario, &config).await {
            Ok(report) => println!("PASS {scenario} ({:?})", report.elapsed),
            Err(e) => {
                failed += 1;
                println!("FAIL {scenario}: {e}");
            }
        }
    }

    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
