//! Cluster-creation scenario handler.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use url::Url;

use super::{ScenarioError, ScenarioHandler, drive};
use crate::attack::{AttackError, Target, TargetFactory};
use crate::scenario::ExecutionContext;

/// Drives the cluster-creation endpoint with a fresh body per request.
///
/// The clusters created are fake clusters — they consume no real
/// infrastructure on the target system — and carry monotonically
/// increasing indexes so every request names a distinct cluster.
pub struct CreateCluster;

#[async_trait]
impl ScenarioHandler for CreateCluster {
    async fn handle(&self, ctx: &mut ExecutionContext) -> Result<(), ScenarioError> {
        let url = ctx.connection.absolute(ctx.scenario.path)?;
        let targets = ClusterTargets::new(ctx.scenario.method.clone(), url, &ctx.run_id);
        drive(ctx, Box::new(targets)).await
    }
}

/// Generates create-cluster targets with monotonically indexed names.
struct ClusterTargets {
    method: Method,
    url: Url,
    name_prefix: String,
    index: u64,
}

impl ClusterTargets {
    fn new(method: Method, url: Url, run_id: &str) -> Self {
        // Cluster names must match ^[a-z]([-a-z0-9]*[a-z0-9])?$, so only
        // a short lowercase slice of the run id is usable.
        let name_prefix: String = run_id.chars().take(4).collect::<String>().to_lowercase();
        Self {
            method,
            url,
            name_prefix,
            index: 0,
        }
    }
}

impl TargetFactory for ClusterTargets {
    fn next_target(&mut self) -> Result<Target, AttackError> {
        let body = json!({
            "name": format!("perf-{}-{}", self.name_prefix, self.index),
            "properties": {
                "fake_cluster": "true",
            },
            "multi_az": true,
        });
        let body = serde_json::to_vec(&body).map_err(|err| AttackError::Target {
            reason: format!("encoding create-cluster body: {err}"),
        })?;
        self.index += 1;
        Ok(Target {
            method: self.method.clone(),
            url: self.url.clone(),
            body: Some(body),
        })
    }
}
