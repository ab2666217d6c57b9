//! Account-scoped scenario handlers.

use async_trait::async_trait;

use super::{ScenarioError, ScenarioHandler, drive};
use crate::attack::{StaticTargets, Target};
use crate::scenario::ExecutionContext;

/// Drives the quota-cost endpoint, which is scoped to the caller's
/// organization. The organization id is resolved once per worker and
/// substituted into the path before the attack starts.
pub struct QuotaCost;

#[async_trait]
impl ScenarioHandler for QuotaCost {
    async fn handle(&self, ctx: &mut ExecutionContext) -> Result<(), ScenarioError> {
        let organization_id = ctx.connection.organization_id().await?;
        tracing::info!("Using organization id: {}", organization_id);

        let path = ctx.scenario.path.replacen("{orgId}", &organization_id, 1);
        let url = ctx.connection.absolute(&path)?;
        let target = Target {
            method: ctx.scenario.method.clone(),
            url,
            body: ctx.scenario.body.clone(),
        };
        drive(ctx, Box::new(StaticTargets::new(target))).await
    }
}
