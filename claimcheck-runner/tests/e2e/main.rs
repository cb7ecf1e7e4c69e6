//! E2E integration tests for claimcheck-runner.
//!
//! These tests drive full runs (provision, readiness, hygiene, pipeline,
//! poison, teardown) against an in-memory cloud under tokio's paused clock.
//!
//! # Test Structure
//!
//! - `helpers/` -- Shared test utilities (fake cloud, fixture builders, assertions)
//! - `scenarios/` -- Test files organized by scenario
//!
//! # Running
//!
//! ```bash
//! cargo test -p claimcheck-runner --test e2e
//! ```
