//! The canonical scenarios run end to end against the simulated station.

use std::time::Duration;

use airharness::{
    HarnessConfig,
    scenario::{self, Scenario, ScenarioConfig},
    sim::SimConfig,
};
use rstest::{fixture, rstest};

#[fixture]
fn config() -> ScenarioConfig {
    ScenarioConfig {
        harness: HarnessConfig {
            wait_timeout: Duration::from_secs(5),
            ..HarnessConfig::default()
        },
        sim: SimConfig::default(),
    }
}

#[rstest]
#[case::no_agent(Scenario::NoAgent)]
#[case::own_agent(Scenario::OwnAgent)]
#[case::first_agent(Scenario::FirstAgent)]
#[case::roam(Scenario::Roam)]
#[case::roam_fault(Scenario::RoamFault)]
#[tokio::test]
async fn scenario_passes(config: ScenarioConfig, #[case] which: Scenario) {
    let report = scenario::run(which, &config)
        .await
        .unwrap_or_else(|e| panic!("{which} failed: {e}"));
    assert_eq!(report.scenario, which);
}

#[rstest]
#[tokio::test]
async fn scenarios_pass_with_mirroring_and_storage(mut config: ScenarioConfig) {
    let dir = tempfile::tempdir().expect("tempdir");
    config.harness.mirror_agent_requests = true;
    config.harness.storage_dir = Some(dir.path().to_path_buf());

    for (which, result) in scenario::run_all(&config).await {
        if let Err(e) = result {
            panic!("{which} failed: {e}");
        }
    }
    let left = std::fs::read_dir(dir.path()).expect("read dir").count();
    assert_eq!(left, 0, "fixture storage not cleared");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn scenarios_tolerate_slow_station(mut config: ScenarioConfig) {
    config.sim = config.sim.step_delay(Duration::from_millis(250));
    for which in [Scenario::OwnAgent, Scenario::Roam, Scenario::RoamFault] {
        scenario::run(which, &config)
            .await
            .unwrap_or_else(|e| panic!("{which} failed: {e}"));
    }
}

#[rstest]
#[tokio::test]
async fn invalid_config_is_rejected_before_running(mut config: ScenarioConfig) {
    config.harness.wait_timeout = Duration::ZERO;

    let err = scenario::run(Scenario::NoAgent, &config)
        .await
        .expect_err("zero timeout must be rejected");
    assert!(matches!(err, scenario::ScenarioError::Config(_)), "unexpected error: {err}");
}
