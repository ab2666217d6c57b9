//! Open-loop HTTP attack primitive.
//!
//! An attack issues requests at a fixed target rate for a fixed duration
//! and emits one [`Outcome`] record per request as a finite stream. The
//! stream is lazy and non-restartable: records arrive as responses
//! complete and the channel closes once the attack window ends and the
//! in-flight requests drain. Pacing is open-loop — each request is spawned
//! on its own task so a slow response never delays the next request start.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use url::Url;

use crate::rate::Rate;

/// Errors raised while driving an attack.
#[derive(Debug, thiserror::Error)]
pub enum AttackError {
    #[error("building attack target: {reason}")]
    Target { reason: String },

    #[error("attack transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// One HTTP request to issue.
#[derive(Debug, Clone)]
pub struct Target {
    pub method: Method,
    pub url: Url,
    pub body: Option<Vec<u8>>,
}

/// Produces the next request of an attack.
///
/// Implementations range from a fixed target repeated for every request to
/// generators that mint a fresh body per call. A factory is owned by a
/// single attack and called once per issued request, in order.
pub trait TargetFactory: Send {
    fn next_target(&mut self) -> Result<Target, AttackError>;
}

/// Factory that repeats one fixed target.
#[derive(Debug, Clone)]
pub struct StaticTargets {
    target: Target,
}

impl StaticTargets {
    pub fn new(target: Target) -> Self {
        Self { target }
    }
}

impl TargetFactory for StaticTargets {
    fn next_target(&mut self) -> Result<Target, AttackError> {
        Ok(self.target.clone())
    }
}

/// Raw record for a single request/response exchange.
///
/// Field names follow the on-disk JSON-lines result format consumed by
/// downstream tooling; latency is in nanoseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub attack: String,
    pub seq: u64,
    pub code: u16,
    pub timestamp: DateTime<Utc>,
    pub latency: u64,
    pub bytes_out: u64,
    pub bytes_in: u64,
    pub error: String,
}

/// Finite stream of attack outcomes.
pub type OutcomeStream = mpsc::Receiver<Outcome>;

/// Observes completed exchanges without the worker parsing responses.
///
/// The cleanup service hooks in here to track resources the attack
/// created on the target system.
pub trait ResponseHook: Send + Sync {
    fn observe(&self, method: &Method, url: &Url, status: u16, body: &[u8]);
}

/// The attack capability the orchestration runner configures and invokes.
#[async_trait]
pub trait AttackEngine: Send + Sync {
    /// Issues requests from `targets` at `rate` for `duration`, labelling
    /// every outcome with the attack `name`.
    ///
    /// # Errors
    ///
    /// - `AttackError::Transport` - If the attack cannot start at all;
    ///   per-request failures are reported as outcome records instead.
    async fn attack(
        &self,
        targets: Box<dyn TargetFactory>,
        rate: Rate,
        duration: Duration,
        name: &str,
    ) -> Result<OutcomeStream, AttackError>;
}

/// Reqwest-backed attack engine.
///
/// The client carries the connection's authentication; one engine is built
/// per worker so result sequences restart at zero for every output stream.
pub struct HttpAttackEngine {
    client: reqwest::Client,
    hook: Option<Arc<dyn ResponseHook>>,
}

impl HttpAttackEngine {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client, hook: None }
    }

    /// Attaches a response hook observing every completed exchange.
    pub fn with_hook(mut self, hook: Arc<dyn ResponseHook>) -> Self {
        self.hook = Some(hook);
        self
    }
}

#[async_trait]
impl AttackEngine for HttpAttackEngine {
    async fn attack(
        &self,
        mut targets: Box<dyn TargetFactory>,
        rate: Rate,
        duration: Duration,
        name: &str,
    ) -> Result<OutcomeStream, AttackError> {
        let (sender, receiver) = mpsc::channel(1024);
        let client = self.client.clone();
        let hook = self.hook.clone();
        let name = name.to_string();

        tokio::spawn(async move {
            let deadline = tokio::time::Instant::now() + duration;
            let mut ticker = rate.interval().map(|interval| {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
                ticker
            });
            let mut seq: u64 = 0;

            loop {
                match ticker.as_mut() {
                    Some(ticker) => {
                        ticker.tick().await;
                    }
                    // Unrestricted rate: no pacing, just keep the
                    // scheduler responsive.
                    None => tokio::task::yield_now().await,
                }
                if tokio::time::Instant::now() >= deadline {
                    break;
                }

                let timestamp = Utc::now();
                let target = match targets.next_target() {
                    Ok(target) => target,
                    Err(err) => {
                        let failure = Outcome {
                            attack: name.clone(),
                            seq,
                            code: 0,
                            timestamp,
                            latency: 0,
                            bytes_out: 0,
                            bytes_in: 0,
                            error: err.to_string(),
                        };
                        seq += 1;
                        if sender.send(failure).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                let request_sender = sender.clone();
                let client = client.clone();
                let hook = hook.clone();
                let attack = name.clone();
                let request_seq = seq;
                seq += 1;
                tokio::spawn(async move {
                    let outcome =
                        hit(&client, hook.as_deref(), attack, request_seq, timestamp, target).await;
                    let _ = request_sender.send(outcome).await;
                });
            }
            // Dropping the issuing half closes the stream once in-flight
            // request tasks finish.
        });

        Ok(receiver)
    }
}

async fn hit(
    client: &reqwest::Client,
    hook: Option<&dyn ResponseHook>,
    attack: String,
    seq: u64,
    timestamp: DateTime<Utc>,
    target: Target,
) -> Outcome {
    let bytes_out = target.body.as_ref().map_or(0, |body| body.len() as u64);
    let started = std::time::Instant::now();

    let mut request = client.request(target.method.clone(), target.url.clone());
    if let Some(body) = target.body.clone() {
        request = request
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
    }

    let mut outcome = Outcome {
        attack,
        seq,
        code: 0,
        timestamp,
        latency: 0,
        bytes_out,
        bytes_in: 0,
        error: String::new(),
    };

    match request.send().await {
        Ok(response) => {
            let status = response.status();
            outcome.code = status.as_u16();
            match response.bytes().await {
                Ok(body) => {
                    outcome.latency = started.elapsed().as_nanos() as u64;
                    outcome.bytes_in = body.len() as u64;
                    outcome.error = status_error(status.as_u16());
                    if let Some(hook) = hook {
                        hook.observe(&target.method, &target.url, status.as_u16(), &body);
                    }
                }
                Err(err) => {
                    outcome.latency = started.elapsed().as_nanos() as u64;
                    outcome.error = err.to_string();
                }
            }
        }
        Err(err) => {
            outcome.latency = started.elapsed().as_nanos() as u64;
            outcome.error = err.to_string();
        }
    }
    outcome
}

/// Non-2xx/3xx statuses mark the outcome failed, mirroring the result
/// format's convention of an empty error string on success.
fn status_error(code: u16) -> String {
    if (200..400).contains(&code) {
        String::new()
    } else {
        format!("http status {code}")
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::rate::parse_rate;

    #[test]
    fn test_static_targets_repeat() {
        let target = Target {
            method: Method::GET,
            url: Url::parse("https://api.example.com/api/clusters_mgmt/v1/clusters").unwrap(),
            body: None,
        };
        let mut factory = StaticTargets::new(target.clone());
        assert_eq!(factory.next_target().unwrap().url, target.url);
        assert_eq!(factory.next_target().unwrap().url, target.url);
    }

    #[test]
    fn test_status_error_boundaries() {
        assert!(status_error(200).is_empty());
        assert!(status_error(399).is_empty());
        assert_eq!(status_error(404), "http status 404");
        assert_eq!(status_error(500), "http status 500");
    }

    #[test]
    fn test_outcome_record_field_names() {
        let outcome = Outcome {
            attack: "list-clusters".to_string(),
            seq: 0,
            code: 200,
            timestamp: Utc::now(),
            latency: 1_500_000,
            bytes_out: 0,
            bytes_in: 42,
            error: String::new(),
        };
        let line = serde_json::to_value(&outcome).unwrap();
        for field in [
            "attack",
            "seq",
            "code",
            "timestamp",
            "latency",
            "bytes_out",
            "bytes_in",
            "error",
        ] {
            assert!(line.get(field).is_some(), "missing field {field}");
        }
    }

    /// Minimal HTTP server answering every request with 200, enough for
    /// reqwest to complete an exchange.
    async fn serve_ok(listener: TcpListener) {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buffer = [0u8; 4096];
                let _ = socket.read(&mut buffer).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok",
                    )
                    .await;
            });
        }
    }

    #[tokio::test]
    async fn test_attack_emits_outcomes_until_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(serve_ok(listener));

        let engine = HttpAttackEngine::new(reqwest::Client::new());
        let target = Target {
            method: Method::GET,
            url: Url::parse(&format!("http://{address}/api/test")).unwrap(),
            body: None,
        };
        let mut outcomes = engine
            .attack(
                Box::new(StaticTargets::new(target)),
                parse_rate("20/s", 1).unwrap(),
                Duration::from_millis(300),
                "static-check",
            )
            .await
            .unwrap();

        let mut collected = Vec::new();
        while let Some(outcome) = outcomes.recv().await {
            collected.push(outcome);
        }
        assert!(!collected.is_empty());
        for outcome in &collected {
            assert_eq!(outcome.attack, "static-check");
            assert_eq!(outcome.code, 200);
            assert!(outcome.error.is_empty());
        }
        // Sequence numbers restart at zero per attack and stay dense.
        let mut seqs: Vec<u64> = collected.iter().map(|o| o.seq).collect();
        seqs.sort_unstable();
        assert_eq!(seqs, (0..collected.len() as u64).collect::<Vec<_>>());
    }
}
