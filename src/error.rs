//! Typed failure taxonomy for planning, verification and execution.
//!
//! Trust and verification failures are dedicated variants so callers can
//! never downgrade them to warnings by accident; every variant that relates
//! to a single application carries its identifier.

use crate::models::VerificationStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppVetError {
    /// The requested identifier is not in the catalog. Recoverable.
    #[error("application '{id}' was not found in the catalog")]
    NotFound { id: String },

    /// The catalog itself is unusable (duplicate id, dangling dependency,
    /// malformed entry). Fatal for that catalog.
    #[error("invalid catalog: {reason}")]
    InvalidCatalog { reason: String },

    /// The caller tried to execute a plan that still contains Blocked steps.
    #[error("plan for '{target}' contains {blocked} blocked step(s) and cannot be executed")]
    PlanNotExecutable { target: String, blocked: usize },

    /// Artifact verification returned anything other than Valid.
    #[error("verification of '{id}' failed ({status}): {detail}")]
    VerificationFailed {
        id: String,
        status: VerificationStatus,
        detail: String,
    },

    /// The installer process exited with a non-zero code.
    #[error("installer for '{id}' exited with code {exit_code}")]
    ProcessFailure { id: String, exit_code: i32 },

    /// The transport collaborator could not produce the artifact.
    #[error("failed to fetch artifact for '{id}': {reason}")]
    FetchFailed { id: String, reason: String },

    /// The installer process could not be spawned at all.
    #[error("failed to launch installer for '{id}': {reason}")]
    LaunchFailed { id: String, reason: String },

    /// Execution was cancelled before or during this step.
    #[error("installation of '{id}' was cancelled")]
    Cancelled { id: String },

    /// State store I/O failure (read, write or atomic replace).
    #[error("state store I/O failure: {0}")]
    StateIo(#[from] std::io::Error),

    /// The persisted state file exists but does not parse.
    #[error("state file is malformed: {0}")]
    StateMalformed(#[from] serde_json::Error),
}
