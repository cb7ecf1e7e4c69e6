//! Runner-specific error types and exit code mapping

use claimcheck_core::error::{ClaimcheckError, ErrorKind};

/// Errors that stop the runner before a report can be produced.
///
/// Once phases have started, outcomes are carried by the
/// [`RunReport`](crate::report::RunReport) instead.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// Logging or metrics setup failed.
    #[error("setup error: {0}")]
    Setup(String),

    /// Wrapped harness error.
    #[error("{0}")]
    Harness(#[from] ClaimcheckError),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, metrics textfile, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                              |
    /// |------|--------------------------------------|
    /// | 1    | Assertion failure / output error     |
    /// | 2    | Configuration or environment error   |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Setup(_) | Self::Io(_) => 2,
            Self::Harness(e) => match e.kind() {
                ErrorKind::Assertion => 1,
                ErrorKind::Environment | ErrorKind::Cleanup => 2,
            },
            Self::JsonSerialize(_) => 1,
        }
    }
}
