//! Cluster-registration scenario handlers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use url::Url;
use uuid::Uuid;

use super::{ScenarioError, ScenarioHandler, drive};
use crate::attack::{AttackError, Target, TargetFactory};
use crate::scenario::ExecutionContext;

/// Drives the registration endpoint with a brand-new cluster id on every
/// request. This endpoint is typically used by provisioning agents rather
/// than interactive clients.
pub struct RegisterNewCluster;

#[async_trait]
impl ScenarioHandler for RegisterNewCluster {
    async fn handle(&self, ctx: &mut ExecutionContext) -> Result<(), ScenarioError> {
        let authorization_token = fetch_authorization_token(ctx).await;
        let url = ctx.connection.absolute(ctx.scenario.path)?;
        let targets = NewRegistrationTargets {
            method: ctx.scenario.method.clone(),
            url,
            authorization_token,
        };
        drive(ctx, Box::new(targets)).await
    }
}

/// Re-registers a fixed pool of clusters, cycling through their ids.
///
/// The pool is registered up-front, one cluster per second to stay under
/// the API's rate limiting, sized to the effective per-connection
/// frequency.
pub struct RegisterExistingCluster;

#[async_trait]
impl ScenarioHandler for RegisterExistingCluster {
    async fn handle(&self, ctx: &mut ExecutionContext) -> Result<(), ScenarioError> {
        let authorization_token = fetch_authorization_token(ctx).await;
        let url = ctx.connection.absolute(ctx.scenario.path)?;

        let quantity = ctx.rate.freq.max(1) as usize;
        tracing::info!(
            "Registering {} clusters to use for the re-registration scenario",
            quantity
        );
        let mut cluster_ids = Vec::with_capacity(quantity);
        for position in 0..quantity {
            let cluster_id = Uuid::new_v4().to_string();
            let body = registration_body(&authorization_token, &cluster_id);
            let response = ctx
                .connection
                .client()
                .post(url.clone())
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await
                .map_err(|err| ScenarioError::Setup {
                    reason: format!("registering cluster {cluster_id}: {err}"),
                })?;
            tracing::info!(
                "[{}/{}] Registered cluster '{}'. Response: {}",
                position + 1,
                quantity,
                cluster_id,
                response.status()
            );
            cluster_ids.push(cluster_id);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        let targets = ExistingRegistrationTargets {
            method: ctx.scenario.method.clone(),
            url,
            authorization_token,
            cluster_ids,
            current: 0,
        };
        drive(ctx, Box::new(targets)).await
    }
}

/// Fetches the account's registry authorization token once per worker.
/// Registration continues with an empty token on failure — requests will
/// be rejected by the API and recorded as failed outcomes.
async fn fetch_authorization_token(ctx: &ExecutionContext) -> String {
    match ctx.connection.authorization_token().await {
        Ok(token) => {
            if token.is_empty() {
                tracing::warn!(
                    "Authorization token appears to be empty, requests may not succeed"
                );
            } else {
                tracing::info!("Successfully fetched authorization token");
            }
            token
        }
        Err(err) => {
            tracing::error!("Unable to retrieve authorization token: {}", err);
            String::new()
        }
    }
}

fn registration_body(authorization_token: &str, cluster_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "authorization_token": authorization_token,
        "cluster_id": cluster_id,
    }))
    .unwrap_or_default()
}

struct NewRegistrationTargets {
    method: Method,
    url: Url,
    authorization_token: String,
}

impl TargetFactory for NewRegistrationTargets {
    fn next_target(&mut self) -> Result<Target, AttackError> {
        // A fresh UUID per request keeps every registration unique.
        let cluster_id = Uuid::new_v4().to_string();
        Ok(Target {
            method: self.method.clone(),
            url: self.url.clone(),
            body: Some(registration_body(&self.authorization_token, &cluster_id)),
        })
    }
}

struct ExistingRegistrationTargets {
    method: Method,
    url: Url,
    authorization_token: String,
    cluster_ids: Vec<String>,
    current: usize,
}

impl TargetFactory for ExistingRegistrationTargets {
    fn next_target(&mut self) -> Result<Target, AttackError> {
        let cluster_id = &self.cluster_ids[self.current];
        let body = registration_body(&self.authorization_token, cluster_id);
        self.current = (self.current + 1) % self.cluster_ids.len();
        Ok(Target {
            method: self.method.clone(),
            url: self.url.clone(),
            body: Some(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registrations_are_unique() {
        let mut targets = NewRegistrationTargets {
            method: Method::POST,
            url: Url::parse("https://api.example.com/api/accounts_mgmt/v1/cluster_registrations")
                .unwrap(),
            authorization_token: "token".to_string(),
        };
        let first: serde_json::Value =
            serde_json::from_slice(targets.next_target().unwrap().body.as_deref().unwrap())
                .unwrap();
        let second: serde_json::Value =
            serde_json::from_slice(targets.next_target().unwrap().body.as_deref().unwrap())
                .unwrap();
        assert_ne!(first["cluster_id"], second["cluster_id"]);
        assert_eq!(first["authorization_token"], "token");
    }

    #[test]
    fn test_existing_registrations_cycle_through_pool() {
        let mut targets = ExistingRegistrationTargets {
            method: Method::POST,
            url: Url::parse("https://api.example.com/api/accounts_mgmt/v1/cluster_registrations")
                .unwrap(),
            authorization_token: "token".to_string(),
            cluster_ids: vec!["one".to_string(), "two".to_string()],
            current: 0,
        };
        let ids: Vec<String> = (0..4)
            .map(|_| {
                let target = targets.next_target().unwrap();
                let body: serde_json::Value =
                    serde_json::from_slice(target.body.as_deref().unwrap()).unwrap();
                body["cluster_id"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(ids, vec!["one", "two", "one", "two"]);
    }
}
