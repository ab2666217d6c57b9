//! Scenario handler capabilities.
//!
//! A handler drives one scenario kind for a single worker: it builds a
//! target factory for the scenario's endpoint, invokes the worker's
//! attack engine with the currently effective rate and duration, and
//! streams every outcome into the worker's result sink. The runner calls
//! a handler once per (scenario, connection, ramp-step).

mod accounts;
mod clusters;
mod registrations;
mod static_endpoint;

pub use accounts::QuotaCost;
pub use clusters::CreateCluster;
pub use registrations::{RegisterExistingCluster, RegisterNewCluster};
pub use static_endpoint::StaticEndpoint;

use async_trait::async_trait;

use crate::attack::{AttackError, TargetFactory};
use crate::connection::ConnectionError;
use crate::scenario::ExecutionContext;
use crate::sink::SinkError;

/// Errors fatal to the enclosing scenario worker.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Attack(#[from] AttackError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("scenario setup request failed: {0}")]
    Connection(#[from] ConnectionError),

    #[error("scenario setup failed: {reason}")]
    Setup { reason: String },
}

/// Capability that drives one scenario kind.
#[async_trait]
pub trait ScenarioHandler: Send + Sync {
    /// Runs one attack window with the context's current rate and
    /// duration.
    ///
    /// # Errors
    ///
    /// Any error is fatal to the enclosing worker and aborts the run;
    /// per-request failures are recorded as outcomes instead.
    async fn handle(&self, ctx: &mut ExecutionContext) -> Result<(), ScenarioError>;
}

/// Shared attack loop: invoke the engine and drain the outcome stream
/// into the worker's sink.
pub(crate) async fn drive(
    ctx: &mut ExecutionContext,
    targets: Box<dyn TargetFactory>,
) -> Result<(), ScenarioError> {
    let mut outcomes = ctx
        .engine
        .attack(targets, ctx.rate, ctx.duration, ctx.scenario.name)
        .await?;
    while let Some(outcome) = outcomes.recv().await {
        ctx.sink.write(&outcome)?;
    }
    Ok(())
}
