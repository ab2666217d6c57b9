//! Integration tests for Surge
//!
//! These tests drive the orchestration runner end-to-end against a
//! recording attack engine, verifying scenario selection, fan-out,
//! ramp-aware duration splitting and failure propagation without any
//! network traffic.

#[path = "integration/support.rs"]
mod support;

#[path = "integration/runner_flow.rs"]
mod runner_flow;

#[path = "integration/ramp_flow.rs"]
mod ramp_flow;
