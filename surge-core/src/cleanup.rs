//! Post-run cleanup of clusters created by the attack suite.
//!
//! Creation happens inside the attack engine, which never parses
//! responses on the worker path — instead a [`ResponseHook`] watches
//! completed exchanges and records every cluster the target system
//! reports as created. After the last scenario the runner sweeps the
//! registry, deleting each recorded cluster. Cleanup failures are
//! collected and reported; they never fail the run.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Method;
use url::Url;

use crate::attack::ResponseHook;
use crate::connection::{ApiConnection, ConnectionError};
use crate::scenario::CLUSTERS_PATH;

/// Errors raised while deleting a single cluster during the sweep.
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("delete request for cluster {cluster_id:?} failed: {source}")]
    Transport {
        cluster_id: String,
        source: reqwest::Error,
    },

    #[error("deleting cluster {cluster_id:?} returned status {status}")]
    UnexpectedStatus { cluster_id: String, status: u16 },
}

#[derive(Default)]
struct CleanupState {
    /// Cluster id mapped to its `deprovision` flag.
    created: BTreeMap<String, bool>,
    failed: Vec<String>,
}

/// Shared registry of clusters awaiting deletion.
#[derive(Clone, Default)]
pub struct CleanupRegistry {
    inner: Arc<Mutex<CleanupState>>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a cluster for deletion at end of run.
    pub fn record(&self, cluster_id: &str, deprovision: bool) {
        tracing::info!(
            "Marking cluster '{}' for cleanup with deprovision={}",
            cluster_id,
            deprovision
        );
        self.inner
            .lock()
            .created
            .insert(cluster_id.to_string(), deprovision);
    }

    /// Drops a cluster from the registry after the target system already
    /// deleted it.
    pub fn unrecord(&self, cluster_id: &str) {
        tracing::info!("Removing cluster '{}' from cleanup", cluster_id);
        self.inner.lock().created.remove(cluster_id);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().created.is_empty()
    }

    /// Cluster ids currently awaiting deletion, in stable order.
    pub fn tracked(&self) -> Vec<String> {
        self.inner.lock().created.keys().cloned().collect()
    }

    /// Cluster ids whose deletion failed during the sweep.
    pub fn failures(&self) -> Vec<String> {
        self.inner.lock().failed.clone()
    }

    /// Deletes every recorded cluster through `connection`.
    ///
    /// Failures are logged and accumulated; the sweep always completes.
    pub async fn sweep(&self, connection: &ApiConnection) {
        let created: Vec<(String, bool)> = {
            let mut state = self.inner.lock();
            std::mem::take(&mut state.created).into_iter().collect()
        };
        if created.is_empty() {
            return;
        }

        tracing::info!("About to clean up {} clusters", created.len());
        for (cluster_id, deprovision) in created {
            match delete_cluster(connection, &cluster_id, deprovision).await {
                Ok(()) => tracing::info!("Cluster '{}' deleted", cluster_id),
                Err(err) => {
                    tracing::error!("Failed to delete cluster '{}': {}", cluster_id, err);
                    self.inner.lock().failed.push(cluster_id);
                }
            }
        }

        let failed = self.failures();
        if !failed.is_empty() {
            tracing::warn!("The following clusters failed deletion: {:?}", failed);
        }
    }
}

async fn delete_cluster(
    connection: &ApiConnection,
    cluster_id: &str,
    deprovision: bool,
) -> Result<(), CleanupError> {
    tracing::info!("Deleting cluster '{}'", cluster_id);
    let url = connection.absolute(&format!("{CLUSTERS_PATH}/{cluster_id}"))?;
    let response = connection
        .client()
        .delete(url)
        .query(&[("deprovision", deprovision)])
        .send()
        .await
        .map_err(|source| CleanupError::Transport {
            cluster_id: cluster_id.to_string(),
            source,
        })?;
    if response.status().as_u16() != 204 {
        return Err(CleanupError::UnexpectedStatus {
            cluster_id: cluster_id.to_string(),
            status: response.status().as_u16(),
        });
    }
    Ok(())
}

/// Response hook feeding the registry from the attack path.
///
/// Records a cluster when the creation endpoint answers 201 with an id in
/// the body, and unrecords one when a delete answers 204.
pub struct ClusterCleanupHook {
    registry: CleanupRegistry,
}

impl ClusterCleanupHook {
    pub fn new(registry: CleanupRegistry) -> Self {
        Self { registry }
    }
}

impl ResponseHook for ClusterCleanupHook {
    fn observe(&self, method: &Method, url: &Url, status: u16, body: &[u8]) {
        if *method == Method::POST && status == 201 && is_clusters_collection(url) {
            match serde_json::from_slice::<serde_json::Value>(body) {
                Ok(cluster) => match cluster.get("id").and_then(|id| id.as_str()) {
                    Some(cluster_id) => self.registry.record(cluster_id, true),
                    None => tracing::error!(
                        "Create-cluster response for {} carries no cluster id",
                        url
                    ),
                },
                Err(err) => tracing::error!(
                    "Failed to decode create-cluster response for {}: {}",
                    url,
                    err
                ),
            }
        }

        if *method == Method::DELETE && status == 204 {
            if let Some(cluster_id) = deleted_cluster_id(url) {
                self.registry.unrecord(cluster_id);
            }
        }
    }
}

fn is_clusters_collection(url: &Url) -> bool {
    url.path().trim_end_matches('/').ends_with("/clusters")
}

fn deleted_cluster_id(url: &Url) -> Option<&str> {
    let mut segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    let cluster_id = segments.pop()?;
    if segments.last() == Some(&"clusters") {
        Some(cluster_id)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://api.example.com{path}")).unwrap()
    }

    #[test]
    fn test_hook_records_created_clusters() {
        let registry = CleanupRegistry::new();
        let hook = ClusterCleanupHook::new(registry.clone());

        hook.observe(
            &Method::POST,
            &url(CLUSTERS_PATH),
            201,
            br#"{"id": "abc-123", "name": "perf-1"}"#,
        );
        assert_eq!(registry.tracked(), vec!["abc-123".to_string()]);
    }

    #[test]
    fn test_hook_ignores_failed_creations_and_other_endpoints() {
        let registry = CleanupRegistry::new();
        let hook = ClusterCleanupHook::new(registry.clone());

        hook.observe(&Method::POST, &url(CLUSTERS_PATH), 400, b"{}");
        hook.observe(
            &Method::POST,
            &url("/api/accounts_mgmt/v1/cluster_registrations"),
            201,
            br#"{"id": "not-a-cluster"}"#,
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_hook_unrecords_deleted_clusters() {
        let registry = CleanupRegistry::new();
        registry.record("abc-123", true);
        let hook = ClusterCleanupHook::new(registry.clone());

        hook.observe(
            &Method::DELETE,
            &url("/api/clusters_mgmt/v1/clusters/abc-123"),
            204,
            b"",
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_deleted_cluster_id_requires_clusters_parent() {
        assert_eq!(
            deleted_cluster_id(&url("/api/clusters_mgmt/v1/clusters/abc")),
            Some("abc")
        );
        assert_eq!(
            deleted_cluster_id(&url("/api/accounts_mgmt/v1/subscriptions/abc")),
            None
        );
    }
}
