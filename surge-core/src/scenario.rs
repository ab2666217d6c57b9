//! Scenario definitions and the per-worker execution context.
//!
//! Scenarios are declared once in an ordered table; adding one means
//! appending an entry and nothing else. Each entry binds an endpoint to a
//! handler capability that knows how to drive that scenario kind — a
//! static endpoint, a dynamic-body endpoint, or a registration flow.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::IndexedRandom;
use reqwest::Method;
use serde_json::json;

use crate::attack::AttackEngine;
use crate::connection::ApiConnection;
use crate::handlers::{
    CreateCluster, QuotaCost, RegisterExistingCluster, RegisterNewCluster, ScenarioHandler,
    StaticEndpoint,
};
use crate::rate::Rate;
use crate::sink::JsonLinesSink;

// API endpoints driven by the suite.
pub const CLUSTERS_PATH: &str = "/api/clusters_mgmt/v1/clusters";
pub const SELF_ACCESS_TOKEN_PATH: &str = "/api/accounts_mgmt/v1/access_token";
pub const LIST_SUBSCRIPTIONS_PATH: &str = "/api/accounts_mgmt/v1/subscriptions";
pub const ACCESS_REVIEW_PATH: &str = "/api/authorizations/v1/access_review";
pub const CLUSTER_REGISTRATIONS_PATH: &str = "/api/accounts_mgmt/v1/cluster_registrations";
pub const CURRENT_ACCOUNT_PATH: &str = "/api/accounts_mgmt/v1/current_account";
pub const QUOTA_COST_PATH: &str = "/api/accounts_mgmt/v1/organizations/{orgId}/quota_cost";
pub const RESOURCE_REVIEW_PATH: &str = "/api/authorizations/v1/resource_review";
pub const SELF_TERMS_REVIEW_PATH: &str = "/api/authorizations/v1/self_terms_review";
pub const CERTIFICATES_PATH: &str = "/api/accounts_mgmt/v1/certificates";

/// Account username injected into review request bodies.
pub const ACCOUNT_USERNAME: &str = "perfscale-tester";

/// One named, independently schedulable load-test definition.
#[derive(Clone)]
pub struct Scenario {
    /// Unique, stable key used for configuration scoping and output files.
    pub name: &'static str,
    pub path: &'static str,
    pub method: Method,
    /// Static request body, used by the generic static-endpoint handler.
    pub body: Option<Vec<u8>>,
    /// Capability that drives this scenario kind.
    pub handler: Arc<dyn ScenarioHandler>,
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Per-worker binding of everything a handler needs to drive one attack:
/// the connection, the attack engine, the exclusively-owned result sink
/// and the currently effective rate and duration. Never shared across
/// workers; the runner mutates `rate` and `duration` between ramp steps.
pub struct ExecutionContext {
    pub run_id: String,
    pub scenario: Scenario,
    pub connection: Arc<ApiConnection>,
    pub engine: Arc<dyn AttackEngine>,
    pub sink: JsonLinesSink,
    pub rate: Rate,
    pub duration: Duration,
}

/// The scenario suite, in execution order.
///
/// Written declaratively to re-use handler functionality where possible
/// and make extending the suite a one-entry change.
pub fn scenario_table() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "self-access-token",
            path: SELF_ACCESS_TOKEN_PATH,
            method: Method::POST,
            body: None,
            handler: Arc::new(StaticEndpoint),
        },
        Scenario {
            name: "list-subscriptions",
            path: LIST_SUBSCRIPTIONS_PATH,
            method: Method::GET,
            body: None,
            handler: Arc::new(StaticEndpoint),
        },
        Scenario {
            name: "access-review",
            path: ACCESS_REVIEW_PATH,
            method: Method::POST,
            body: Some(access_review_body()),
            handler: Arc::new(StaticEndpoint),
        },
        Scenario {
            name: "register-new-cluster",
            path: CLUSTER_REGISTRATIONS_PATH,
            method: Method::POST,
            body: None,
            handler: Arc::new(RegisterNewCluster),
        },
        Scenario {
            name: "register-existing-cluster",
            path: CLUSTER_REGISTRATIONS_PATH,
            method: Method::POST,
            body: None,
            handler: Arc::new(RegisterExistingCluster),
        },
        Scenario {
            name: "create-cluster",
            path: CLUSTERS_PATH,
            method: Method::POST,
            body: None,
            handler: Arc::new(CreateCluster),
        },
        Scenario {
            name: "list-clusters",
            path: CLUSTERS_PATH,
            method: Method::GET,
            body: None,
            handler: Arc::new(StaticEndpoint),
        },
        Scenario {
            name: "get-current-account",
            path: CURRENT_ACCOUNT_PATH,
            method: Method::GET,
            body: None,
            handler: Arc::new(StaticEndpoint),
        },
        Scenario {
            name: "quota-cost",
            path: QUOTA_COST_PATH,
            method: Method::GET,
            body: None,
            handler: Arc::new(QuotaCost),
        },
        Scenario {
            name: "resource-review",
            path: RESOURCE_REVIEW_PATH,
            method: Method::POST,
            body: Some(resource_review_body()),
            handler: Arc::new(StaticEndpoint),
        },
        Scenario {
            name: "self-terms-review",
            path: SELF_TERMS_REVIEW_PATH,
            method: Method::POST,
            body: None,
            handler: Arc::new(StaticEndpoint),
        },
        Scenario {
            name: "certificates",
            path: CERTIFICATES_PATH,
            method: Method::POST,
            body: Some(certificates_body()),
            handler: Arc::new(StaticEndpoint),
        },
    ]
}

fn access_review_body() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "account_username": ACCOUNT_USERNAME,
        "action": "get",
        "resource_type": "Subscription",
    }))
    .unwrap_or_default()
}

fn resource_review_body() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "account_username": ACCOUNT_USERNAME,
        "resource_type": "Cluster",
        "action": "get",
    }))
    .unwrap_or_default()
}

const CERTIFICATE_ARCHES: [&str; 9] = [
    "x86", "x86_64", "ppc", "ppc64", "ppc64le", "s390", "s390x", "ia64", "aarch64",
];

fn certificates_body() -> Vec<u8> {
    let arch = CERTIFICATE_ARCHES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or("x86_64");
    serde_json::to_vec(&json!({
        "type": "sca",
        "arch": arch,
    }))
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_scenario_names_are_unique() {
        let table = scenario_table();
        let names: HashSet<&str> = table.iter().map(|s| s.name).collect();
        assert_eq!(names.len(), table.len());
    }

    #[test]
    fn test_static_bodies_are_valid_json() {
        for scenario in scenario_table() {
            if let Some(body) = scenario.body {
                let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
                assert!(parsed.is_object(), "scenario {}", scenario.name);
            }
        }
    }

    #[test]
    fn test_certificates_body_uses_known_arch() {
        let body: serde_json::Value =
            serde_json::from_slice(&certificates_body()).unwrap();
        assert_eq!(body["type"], "sca");
        let arch = body["arch"].as_str().unwrap();
        assert!(CERTIFICATE_ARCHES.contains(&arch));
    }
}
