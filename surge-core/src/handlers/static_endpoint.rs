//! Generic handler for fixed-endpoint scenarios.

use async_trait::async_trait;

use super::{ScenarioError, ScenarioHandler, drive};
use crate::attack::{StaticTargets, Target};
use crate::scenario::ExecutionContext;

/// Repeats the scenario's method, path and optional static body for every
/// request. Covers every scenario that needs no per-request state.
pub struct StaticEndpoint;

#[async_trait]
impl ScenarioHandler for StaticEndpoint {
    async fn handle(&self, ctx: &mut ExecutionContext) -> Result<(), ScenarioError> {
        let url = ctx.connection.absolute(ctx.scenario.path)?;
        let target = Target {
            method: ctx.scenario.method.clone(),
            url,
            body: ctx.scenario.body.clone(),
        };
        drive(ctx, Box::new(StaticTargets::new(target))).await
    }
}
