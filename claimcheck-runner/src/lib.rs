//! claimcheck-runner library
//!
//! Exposes the runner's building blocks so integration tests can drive a full
//! run against in-memory service implementations.

pub mod cli;
pub mod drivers;
pub mod error;
pub mod hygiene;
pub mod logging;
pub mod metrics_export;
pub mod orchestrator;
pub mod output;
pub mod probe;
pub mod provision;
pub mod report;

pub use drivers::Services;
pub use orchestrator::{Orchestrator, RunOptions};
pub use provision::{AnyProvisioner, Provisioner, StaticFixtureProvisioner, TofuProvisioner};
pub use report::{Phase, PhaseReport, PhaseStatus, RunReport, Verdict};
