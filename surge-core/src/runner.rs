//! Scenario orchestration.
//!
//! The runner walks the scenario table in order, skipping every scenario
//! the configuration does not enable, and fans each enabled one out as a
//! structured task group — one worker per pre-authenticated connection.
//! Each worker resolves its own effective rate, duration and ramp
//! parameters, then drives the scenario's handler once (steady state) or
//! once per ramp step. All workers of a scenario are joined before the
//! next scenario starts, so scenarios never overlap, and a cooldown pause
//! separates consecutive scenarios.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::attack::{AttackEngine, HttpAttackEngine, ResponseHook};
use crate::cleanup::{CleanupRegistry, ClusterCleanupHook};
use crate::config::{ConfigResolver, ConfigStore, RunDefaults};
use crate::connection::ApiConnection;
use crate::ramp::{RampKind, RampSchedule};
use crate::rate::{Rate, parse_rate};
use crate::scenario::{ExecutionContext, Scenario, scenario_table};
use crate::sink::{JsonLinesSink, output_file_name};
use crate::{Result, SurgeError};

/// Builds the attack engine for one worker.
///
/// One engine per worker keeps outcome sequences starting at zero for
/// every output stream; tests substitute a recording implementation.
pub trait EngineFactory: Send + Sync {
    fn engine(&self, connection: &Arc<ApiConnection>) -> Arc<dyn AttackEngine>;
}

/// Default factory: a reqwest-backed engine per worker, sharing the
/// connection's authenticated client and the cleanup hook.
pub struct HttpEngineFactory {
    hook: Option<Arc<dyn ResponseHook>>,
}

impl HttpEngineFactory {
    pub fn new() -> Self {
        Self { hook: None }
    }

    pub fn with_hook(hook: Arc<dyn ResponseHook>) -> Self {
        Self { hook: Some(hook) }
    }
}

impl Default for HttpEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineFactory for HttpEngineFactory {
    fn engine(&self, connection: &Arc<ApiConnection>) -> Arc<dyn AttackEngine> {
        let engine = HttpAttackEngine::new(connection.client().clone());
        match &self.hook {
            Some(hook) => Arc::new(engine.with_hook(hook.clone())),
            None => Arc::new(engine),
        }
    }
}

/// Drives the full scenario suite to completion.
pub struct Runner {
    run_id: String,
    output_directory: PathBuf,
    connections: Vec<Arc<ApiConnection>>,
    scenarios: Vec<Scenario>,
    engine_factory: Arc<dyn EngineFactory>,
    cleanup: CleanupRegistry,
}

impl Runner {
    /// Creates a runner over the default scenario table.
    pub fn new(
        run_id: impl Into<String>,
        output_directory: impl Into<PathBuf>,
        connections: Vec<Arc<ApiConnection>>,
    ) -> Self {
        let cleanup = CleanupRegistry::new();
        let hook = Arc::new(ClusterCleanupHook::new(cleanup.clone()));
        Self {
            run_id: run_id.into(),
            output_directory: output_directory.into(),
            connections,
            scenarios: scenario_table(),
            engine_factory: Arc::new(HttpEngineFactory::with_hook(hook)),
            cleanup,
        }
    }

    /// Replaces the scenario table.
    pub fn with_scenarios(mut self, scenarios: Vec<Scenario>) -> Self {
        self.scenarios = scenarios;
        self
    }

    /// Replaces the attack engine factory.
    pub fn with_engine_factory(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.engine_factory = factory;
        self
    }

    pub fn cleanup_registry(&self) -> &CleanupRegistry {
        &self.cleanup
    }

    /// Runs every enabled scenario in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the first worker failure of the first failing scenario,
    /// after every worker of that scenario has finished. Completed
    /// scenarios' result files remain on disk.
    pub async fn run(&self, store: &Arc<ConfigStore>) -> Result<()> {
        tracing::info!("Run id: {}", self.run_id);
        let defaults = RunDefaults::from_store(store);
        let connection_count = self.connections.len().max(1);
        let default_rate = parse_rate(&defaults.rate, connection_count)?;
        let tests = Arc::new(store.section("tests"));

        let enabled: Vec<Scenario> = self
            .scenarios
            .iter()
            .filter(|scenario| tests.contains(scenario.name) || tests.contains("all"))
            .cloned()
            .collect();
        if enabled.is_empty() {
            tracing::warn!("No scenarios enabled, nothing to do");
            return Ok(());
        }

        let total = enabled.len();
        for (position, scenario) in enabled.into_iter().enumerate() {
            let mut workers: JoinSet<Result<()>> = JoinSet::new();
            for (index, connection) in self.connections.iter().enumerate() {
                workers.spawn(run_worker(WorkerSpec {
                    run_id: self.run_id.clone(),
                    output_directory: self.output_directory.clone(),
                    scenario: scenario.clone(),
                    connection: connection.clone(),
                    connection_count,
                    index,
                    tests: tests.clone(),
                    defaults: defaults.clone(),
                    default_rate,
                    engine: self.engine_factory.engine(connection),
                }));
            }

            // Barrier: every worker of this scenario finishes before the
            // next scenario starts. The first failure is returned after
            // the join; remaining failures are only logged.
            let mut first_error: Option<SurgeError> = None;
            while let Some(joined) = workers.join_next().await {
                let result = match joined {
                    Ok(result) => result,
                    Err(join_error) => Err(SurgeError::Worker {
                        reason: join_error.to_string(),
                    }),
                };
                if let Err(err) = result {
                    if first_error.is_none() {
                        first_error = Some(err);
                    } else {
                        tracing::error!("Additional worker failure: {}", err);
                    }
                }
            }
            if let Some(err) = first_error {
                return Err(err);
            }

            if position + 1 < total {
                tracing::info!(
                    "Cooling down for next scenario for: {}s",
                    defaults.cooldown_seconds
                );
                tokio::time::sleep(Duration::from_secs(defaults.cooldown_seconds.max(0) as u64))
                    .await;
            }
        }

        // End-of-run sweep of clusters the attacks created; logged and
        // accumulated, never fatal.
        if let Some(connection) = self.connections.first() {
            self.cleanup.sweep(connection).await;
        }
        Ok(())
    }
}

struct WorkerSpec {
    run_id: String,
    output_directory: PathBuf,
    scenario: Scenario,
    connection: Arc<ApiConnection>,
    connection_count: usize,
    index: usize,
    tests: Arc<ConfigStore>,
    defaults: RunDefaults,
    default_rate: Rate,
    engine: Arc<dyn AttackEngine>,
}

/// One worker: a single (scenario, connection) pair.
async fn run_worker(spec: WorkerSpec) -> Result<()> {
    let WorkerSpec {
        run_id,
        output_directory,
        scenario,
        connection,
        connection_count,
        index,
        tests,
        defaults,
        default_rate,
        engine,
    } = spec;
    let resolver = ConfigResolver::new(&tests);
    let name = scenario.name;

    let file_name = output_file_name(&run_id, name, index);
    let sink = JsonLinesSink::create(&output_directory, &file_name)?;

    let rate_string = resolver.resolve_string(&defaults.rate, &format!("{name}.rate"));
    let rate = match parse_rate(&rate_string, connection_count) {
        Ok(rate) => rate,
        Err(err) => {
            tracing::warn!(
                "Error parsing rate {:?} for scenario {}: {}. Using default",
                rate_string,
                name,
                err
            );
            default_rate
        }
    };
    let duration_minutes = resolver.resolve_int(defaults.duration_minutes, &format!("{name}.duration"));

    let mut ctx = ExecutionContext {
        run_id,
        scenario: scenario.clone(),
        connection,
        engine,
        sink,
        rate,
        duration: minutes(duration_minutes),
    };

    let (ramp_duration_minutes, ramp) = build_ramp(&resolver, name, &defaults);
    match ramp {
        None => {
            tracing::info!("Executing scenario: {}", name);
            tracing::info!("Rate: {}", ctx.rate);
            tracing::info!("Duration: {:?}", ctx.duration);
            tracing::info!("Endpoint: {}", scenario.path);
            scenario.handler.handle(&mut ctx).await?;
        }
        Some(mut schedule) => {
            tracing::info!("Executing scenario: {}", name);
            tracing::info!("Ramp type: {}", schedule.label());
            tracing::info!("Endpoint: {}", scenario.path);

            let steps = schedule.steps();
            // Without an explicit ramp duration the total is divided
            // evenly across steps; with one, only the ramp budget is
            // divided and whatever remains of the total is sustained at
            // end-rate in the final step.
            let mut remaining_minutes = 0;
            let step_minutes = if ramp_duration_minutes == 0 {
                (duration_minutes as f64 / steps as f64).round() as i64
            } else {
                remaining_minutes = duration_minutes - ramp_duration_minutes;
                (ramp_duration_minutes as f64 / steps as f64).round() as i64
            };

            for step in 1..=steps {
                tracing::info!("Ramping up... step {}", step);
                let step_rate = schedule.next_rate();
                ctx.rate =
                    parse_rate(&step_rate.to_string(), connection_count).unwrap_or(default_rate);
                let mut step_duration = minutes(step_minutes);
                if step == steps && remaining_minutes > 0 {
                    step_duration += minutes(remaining_minutes);
                }
                ctx.duration = step_duration;
                tracing::info!("Rate: {}", ctx.rate);
                tracing::info!("Duration: {:?}", ctx.duration);
                scenario.handler.handle(&mut ctx).await?;
            }
        }
    }

    ctx.sink.flush()?;
    tracing::info!("Results written to: {}", file_name);
    Ok(())
}

/// Resolves the scenario's ramp configuration.
///
/// Returns the resolved ramp duration (in minutes) and the schedule, or
/// `None` when no ramp is configured, the bounds fail validation, or the
/// kind is unknown — all of which degrade to steady-state execution.
fn build_ramp(
    resolver: &ConfigResolver<'_>,
    name: &str,
    defaults: &RunDefaults,
) -> (i64, Option<Box<dyn RampSchedule>>) {
    let ramp_type = resolver.resolve_string(&defaults.ramp_type, &format!("{name}.ramp-type"));
    if ramp_type.is_empty() {
        return (0, None);
    }

    let ramp_duration =
        resolver.resolve_int(defaults.ramp_duration_minutes, &format!("{name}.ramp-duration"));
    let start_rate = resolver.resolve_int(defaults.start_rate, &format!("{name}.start-rate"));
    let end_rate = resolver.resolve_int(defaults.end_rate, &format!("{name}.end-rate"));
    let steps = resolver.resolve_int(defaults.ramp_steps, &format!("{name}.ramp-steps"));

    tracing::info!("Validating ramp configuration for scenario {}", name);
    if !resolver.validate_ramp_config(start_rate, end_rate, steps) {
        return (ramp_duration, None);
    }
    match RampKind::parse(&ramp_type) {
        Some(kind) => (ramp_duration, Some(kind.schedule(start_rate, end_rate, steps))),
        None => {
            tracing::warn!("Unknown ramp type {:?}, running steady-state", ramp_type);
            (ramp_duration, None)
        }
    }
}

fn minutes(minutes: i64) -> Duration {
    Duration::from_secs(minutes.max(0) as u64 * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> RunDefaults {
        RunDefaults::default()
    }

    #[test]
    fn test_build_ramp_without_configuration() {
        let store = ConfigStore::empty();
        let resolver = ConfigResolver::new(&store);
        let (ramp_duration, schedule) = build_ramp(&resolver, "list-clusters", &defaults());
        assert_eq!(ramp_duration, 0);
        assert!(schedule.is_none());
    }

    #[test]
    fn test_build_ramp_from_scenario_scope() {
        let store = ConfigStore::from_yaml(
            r#"
list-clusters:
  ramp-type: exponential
  start-rate: 2
  end-rate: 20
  ramp-steps: 8
  ramp-duration: 4
"#,
        )
        .unwrap();
        let resolver = ConfigResolver::new(&store);
        let (ramp_duration, schedule) = build_ramp(&resolver, "list-clusters", &defaults());
        assert_eq!(ramp_duration, 4);
        let mut schedule = schedule.unwrap();
        assert_eq!(schedule.label(), "Exponential ramp");
        assert_eq!(schedule.steps(), 8);
        assert_eq!(schedule.next_rate(), 3);
    }

    #[test]
    fn test_build_ramp_invalid_bounds_fall_back_to_steady() {
        let store = ConfigStore::from_yaml(
            r#"
list-clusters:
  ramp-type: linear
  start-rate: 10
  end-rate: 5
  ramp-steps: 4
"#,
        )
        .unwrap();
        let resolver = ConfigResolver::new(&store);
        let (_, schedule) = build_ramp(&resolver, "list-clusters", &defaults());
        assert!(schedule.is_none());
    }

    #[test]
    fn test_build_ramp_unknown_kind_falls_back_to_steady() {
        let store = ConfigStore::from_yaml(
            r#"
list-clusters:
  ramp-type: quadratic
  start-rate: 1
  end-rate: 5
  ramp-steps: 2
"#,
        )
        .unwrap();
        let resolver = ConfigResolver::new(&store);
        let (_, schedule) = build_ramp(&resolver, "list-clusters", &defaults());
        assert!(schedule.is_none());
    }

    #[test]
    fn test_minutes_clamps_negative_values() {
        assert_eq!(minutes(3), Duration::from_secs(180));
        assert_eq!(minutes(-2), Duration::ZERO);
    }
}
