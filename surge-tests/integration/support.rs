//! Recording collaborators shared by the integration tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::Method;
use surge_core::attack::{AttackEngine, AttackError, Outcome, OutcomeStream, TargetFactory};
use surge_core::handlers::StaticEndpoint;
use surge_core::rate::Rate;
use surge_core::runner::EngineFactory;
use surge_core::{ApiConnection, Scenario};
use tokio::sync::mpsc;

/// One attack invocation as seen by a worker's engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackCall {
    pub scenario: String,
    pub freq: u64,
    pub per: Duration,
    pub duration: Duration,
}

/// Engine that records every invocation and emits two synthetic outcomes
/// instead of issuing requests.
pub struct RecordingEngine {
    calls: Arc<Mutex<Vec<AttackCall>>>,
}

#[async_trait]
impl AttackEngine for RecordingEngine {
    async fn attack(
        &self,
        mut targets: Box<dyn TargetFactory>,
        rate: Rate,
        duration: Duration,
        name: &str,
    ) -> Result<OutcomeStream, AttackError> {
        self.calls.lock().push(AttackCall {
            scenario: name.to_string(),
            freq: rate.freq,
            per: rate.per,
            duration,
        });

        let (sender, receiver) = mpsc::channel(4);
        for seq in 0..2 {
            // Exercise the factory the way the real engine would.
            let target = targets.next_target()?;
            let outcome = Outcome {
                attack: name.to_string(),
                seq,
                code: 200,
                timestamp: Utc::now(),
                latency: 1_000_000,
                bytes_out: target.body.map_or(0, |body| body.len() as u64),
                bytes_in: 2,
                error: String::new(),
            };
            sender.send(outcome).await.expect("bounded channel has room");
        }
        Ok(receiver)
    }
}

/// Factory handing every worker the same recording engine.
pub struct RecordingFactory {
    calls: Arc<Mutex<Vec<AttackCall>>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<AttackCall>>> {
        self.calls.clone()
    }
}

impl EngineFactory for RecordingFactory {
    fn engine(&self, _connection: &Arc<ApiConnection>) -> Arc<dyn AttackEngine> {
        Arc::new(RecordingEngine {
            calls: self.calls.clone(),
        })
    }
}

/// Engine whose every attack fails to start.
pub struct FailingEngine;

#[async_trait]
impl AttackEngine for FailingEngine {
    async fn attack(
        &self,
        _targets: Box<dyn TargetFactory>,
        _rate: Rate,
        _duration: Duration,
        _name: &str,
    ) -> Result<OutcomeStream, AttackError> {
        Err(AttackError::Target {
            reason: "engine rigged to fail".to_string(),
        })
    }
}

pub struct FailingFactory;

impl EngineFactory for FailingFactory {
    fn engine(&self, _connection: &Arc<ApiConnection>) -> Arc<dyn AttackEngine> {
        Arc::new(FailingEngine)
    }
}

/// A static GET scenario against the clusters listing endpoint.
pub fn static_scenario(name: &'static str) -> Scenario {
    Scenario {
        name,
        path: surge_core::scenario::CLUSTERS_PATH,
        method: Method::GET,
        body: None,
        handler: Arc::new(StaticEndpoint),
    }
}

/// Connections that never see network traffic in these tests.
pub fn offline_connections(count: usize) -> Vec<Arc<ApiConnection>> {
    (0..count)
        .map(|_| {
            Arc::new(
                ApiConnection::with_access_token("https://api.example.com", "test-token")
                    .expect("static test gateway url parses"),
            )
        })
        .collect()
}
