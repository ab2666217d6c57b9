//! Ramp-aware duration splitting, end to end.

use std::sync::Arc;
use std::time::Duration;

use surge_core::{ConfigStore, Runner};

use crate::support::{RecordingFactory, offline_connections, static_scenario};

fn store(yaml: &str) -> Arc<ConfigStore> {
    Arc::new(ConfigStore::from_yaml(yaml).unwrap())
}

const MINUTE: Duration = Duration::from_secs(60);

#[tokio::test]
async fn test_linear_ramp_splits_total_duration_evenly() {
    let output = tempfile::tempdir().unwrap();
    let factory = Arc::new(RecordingFactory::new());
    let calls = factory.calls();

    let runner = Runner::new("ramp-a", output.path(), offline_connections(1))
        .with_scenarios(vec![static_scenario("list-clusters")])
        .with_engine_factory(factory);

    // 9 minutes over 3 steps with no explicit ramp duration: three equal
    // windows at the interpolated rates.
    let config = store(
        r#"
duration: 9
cooldown: 0
tests:
  list-clusters:
    ramp-type: linear
    start-rate: 2
    end-rate: 10
    ramp-steps: 3
"#,
    );
    runner.run(&config).await.unwrap();

    let calls = calls.lock();
    let rates: Vec<u64> = calls.iter().map(|c| c.freq).collect();
    let durations: Vec<Duration> = calls.iter().map(|c| c.duration).collect();
    assert_eq!(rates, vec![2, 6, 10]);
    assert_eq!(durations, vec![3 * MINUTE, 3 * MINUTE, 3 * MINUTE]);
}

#[tokio::test]
async fn test_explicit_ramp_duration_appends_remainder_to_final_step() {
    let output = tempfile::tempdir().unwrap();
    let factory = Arc::new(RecordingFactory::new());
    let calls = factory.calls();

    let runner = Runner::new("ramp-b", output.path(), offline_connections(1))
        .with_scenarios(vec![static_scenario("list-clusters")])
        .with_engine_factory(factory);

    // The ramp completes within its 6-minute budget; the remaining 4
    // minutes of the 10-minute total are sustained at end-rate in the
    // final step only.
    let config = store(
        r#"
duration: 10
cooldown: 0
tests:
  list-clusters:
    ramp-type: linear
    start-rate: 2
    end-rate: 10
    ramp-steps: 3
    ramp-duration: 6
"#,
    );
    runner.run(&config).await.unwrap();

    let calls = calls.lock();
    let rates: Vec<u64> = calls.iter().map(|c| c.freq).collect();
    let durations: Vec<Duration> = calls.iter().map(|c| c.duration).collect();
    assert_eq!(rates, vec![2, 6, 10]);
    assert_eq!(durations, vec![2 * MINUTE, 2 * MINUTE, 6 * MINUTE]);
}

#[tokio::test]
async fn test_exponential_ramp_follows_geometric_schedule() {
    let output = tempfile::tempdir().unwrap();
    let factory = Arc::new(RecordingFactory::new());
    let calls = factory.calls();

    let runner = Runner::new("ramp-c", output.path(), offline_connections(1))
        .with_scenarios(vec![static_scenario("list-clusters")])
        .with_engine_factory(factory);

    let config = store(
        r#"
duration: 16
cooldown: 0
tests:
  list-clusters:
    ramp-type: exponential
    start-rate: 2
    end-rate: 20
    ramp-steps: 8
"#,
    );
    runner.run(&config).await.unwrap();

    let rates: Vec<u64> = calls.lock().iter().map(|c| c.freq).collect();
    assert_eq!(rates, vec![3, 4, 5, 6, 8, 11, 15, 20]);
}

#[tokio::test]
async fn test_invalid_ramp_bounds_degrade_to_steady_state() {
    let output = tempfile::tempdir().unwrap();
    let factory = Arc::new(RecordingFactory::new());
    let calls = factory.calls();

    let runner = Runner::new("ramp-d", output.path(), offline_connections(1))
        .with_scenarios(vec![static_scenario("list-clusters")])
        .with_engine_factory(factory);

    // end == start fails validation; the scenario still runs, once, at
    // its configured steady rate for the full duration.
    let config = store(
        r#"
rate: 4/s
duration: 5
cooldown: 0
tests:
  list-clusters:
    ramp-type: linear
    start-rate: 5
    end-rate: 5
    ramp-steps: 2
"#,
    );
    runner.run(&config).await.unwrap();

    let calls = calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].freq, 4);
    assert_eq!(calls[0].duration, 5 * MINUTE);
}

#[tokio::test]
async fn test_ramp_step_rates_divide_across_connections() {
    let output = tempfile::tempdir().unwrap();
    let factory = Arc::new(RecordingFactory::new());
    let calls = factory.calls();

    let runner = Runner::new("ramp-e", output.path(), offline_connections(2))
        .with_scenarios(vec![static_scenario("list-clusters")])
        .with_engine_factory(factory);

    let config = store(
        r#"
duration: 6
cooldown: 0
tests:
  list-clusters:
    ramp-type: linear
    start-rate: 4
    end-rate: 10
    ramp-steps: 3
"#,
    );
    runner.run(&config).await.unwrap();

    let calls = calls.lock();
    // Two workers, three steps each.
    assert_eq!(calls.len(), 6);
    let mut per_worker_rates: Vec<u64> = calls.iter().map(|c| c.freq).collect();
    per_worker_rates.sort_unstable();
    // Aggregate step rates 4, 7, 10 divide to 2, 3, 5 per connection.
    assert_eq!(per_worker_rates, vec![2, 2, 3, 3, 5, 5]);
}
