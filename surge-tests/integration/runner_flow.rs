//! Runner orchestration: selection, fan-out, outputs, failures.

use std::sync::Arc;
use std::time::Duration;

use surge_core::attack::Outcome;
use surge_core::{ConfigStore, Runner, SurgeError};

use crate::support::{
    FailingFactory, RecordingFactory, offline_connections, static_scenario,
};

fn store(yaml: &str) -> Arc<ConfigStore> {
    Arc::new(ConfigStore::from_yaml(yaml).unwrap())
}

#[tokio::test]
async fn test_only_enabled_scenarios_run() {
    let output = tempfile::tempdir().unwrap();
    let factory = Arc::new(RecordingFactory::new());
    let calls = factory.calls();

    let runner = Runner::new("run-a", output.path(), offline_connections(1))
        .with_scenarios(vec![
            static_scenario("list-clusters"),
            static_scenario("create-cluster"),
        ])
        .with_engine_factory(factory);

    let config = store(
        r#"
cooldown: 0
tests:
  create-cluster:
"#,
    );
    runner.run(&config).await.unwrap();

    let calls = calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].scenario, "create-cluster");
}

#[tokio::test]
async fn test_all_enables_every_scenario_in_order() {
    let output = tempfile::tempdir().unwrap();
    let factory = Arc::new(RecordingFactory::new());
    let calls = factory.calls();

    let runner = Runner::new("run-b", output.path(), offline_connections(1))
        .with_scenarios(vec![
            static_scenario("list-clusters"),
            static_scenario("create-cluster"),
        ])
        .with_engine_factory(factory);

    let config = store("cooldown: 0\ntests:\n  all:\n");
    runner.run(&config).await.unwrap();

    let names: Vec<String> = calls.lock().iter().map(|c| c.scenario.clone()).collect();
    // The barrier serializes scenarios in declaration order.
    assert_eq!(names, vec!["list-clusters", "create-cluster"]);
}

#[tokio::test]
async fn test_rate_divides_across_connections_and_files_are_per_worker() {
    let output = tempfile::tempdir().unwrap();
    let factory = Arc::new(RecordingFactory::new());
    let calls = factory.calls();

    let runner = Runner::new("run-c", output.path(), offline_connections(2))
        .with_scenarios(vec![static_scenario("list-clusters")])
        .with_engine_factory(factory);

    let config = store(
        r#"
rate: "10"
duration: 2
cooldown: 0
tests:
  all:
"#,
    );
    runner.run(&config).await.unwrap();

    let calls = calls.lock();
    assert_eq!(calls.len(), 2);
    for call in calls.iter() {
        // Aggregate 10/s across two connections: 5/s each.
        assert_eq!(call.freq, 5);
        assert_eq!(call.per, Duration::from_secs(1));
        assert_eq!(call.duration, Duration::from_secs(120));
    }

    for index in 0..2 {
        let path = output.path().join(format!("run-c_list-clusters_{index}.json"));
        let contents = std::fs::read_to_string(&path).unwrap();
        let outcomes: Vec<Outcome> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(outcomes.len(), 2, "file {}", path.display());
        assert_eq!(outcomes[0].attack, "list-clusters");
        assert_eq!(outcomes[0].seq, 0);
    }
}

#[tokio::test]
async fn test_scenario_scoped_rate_overrides_global() {
    let output = tempfile::tempdir().unwrap();
    let factory = Arc::new(RecordingFactory::new());
    let calls = factory.calls();

    let runner = Runner::new("run-d", output.path(), offline_connections(1))
        .with_scenarios(vec![
            static_scenario("list-clusters"),
            static_scenario("create-cluster"),
        ])
        .with_engine_factory(factory);

    let config = store(
        r#"
rate: 5/s
cooldown: 0
tests:
  list-clusters:
    rate: 2/s
  create-cluster:
"#,
    );
    runner.run(&config).await.unwrap();

    let calls = calls.lock();
    assert_eq!(calls[0].freq, 2);
    assert_eq!(calls[1].freq, 5);
}

#[tokio::test]
async fn test_unparseable_scenario_rate_falls_back_to_default() {
    let output = tempfile::tempdir().unwrap();
    let factory = Arc::new(RecordingFactory::new());
    let calls = factory.calls();

    let runner = Runner::new("run-e", output.path(), offline_connections(1))
        .with_scenarios(vec![static_scenario("list-clusters")])
        .with_engine_factory(factory);

    let config = store(
        r#"
rate: 7/s
cooldown: 0
tests:
  list-clusters:
    rate: not-a-rate
"#,
    );
    // Parse failure is never fatal; the scenario still runs.
    runner.run(&config).await.unwrap();
    assert_eq!(calls.lock()[0].freq, 7);
}

#[tokio::test]
async fn test_handler_failure_aborts_the_run() {
    let output = tempfile::tempdir().unwrap();
    let runner = Runner::new("run-f", output.path(), offline_connections(2))
        .with_scenarios(vec![static_scenario("list-clusters")])
        .with_engine_factory(Arc::new(FailingFactory));

    let config = store("cooldown: 0\ntests:\n  all:\n");
    let err = runner.run(&config).await.unwrap_err();
    assert!(matches!(err, SurgeError::Scenario(_)), "got {err}");
}

#[tokio::test]
async fn test_cooldown_separates_scenarios_but_not_the_last() {
    let output = tempfile::tempdir().unwrap();
    let factory = Arc::new(RecordingFactory::new());

    // A single scenario: the cooldown never applies, so even a large
    // configured pause must not delay completion.
    let runner = Runner::new("run-h", output.path(), offline_connections(1))
        .with_scenarios(vec![static_scenario("list-clusters")])
        .with_engine_factory(factory.clone());
    let started = std::time::Instant::now();
    runner
        .run(&store("cooldown: 30\ntests:\n  all:\n"))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    // Two scenarios: exactly one cooldown in between.
    let runner = Runner::new("run-i", output.path(), offline_connections(1))
        .with_scenarios(vec![
            static_scenario("list-clusters"),
            static_scenario("create-cluster"),
        ])
        .with_engine_factory(factory);
    let started = std::time::Instant::now();
    runner
        .run(&store("cooldown: 1\ntests:\n  all:\n"))
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_nothing_enabled_is_a_no_op() {
    let output = tempfile::tempdir().unwrap();
    let factory = Arc::new(RecordingFactory::new());
    let calls = factory.calls();

    let runner = Runner::new("run-g", output.path(), offline_connections(1))
        .with_scenarios(vec![static_scenario("list-clusters")])
        .with_engine_factory(factory);

    let config = store("cooldown: 0\ntests:\n  other-suite:\n");
    runner.run(&config).await.unwrap();
    assert!(calls.lock().is_empty());
}
