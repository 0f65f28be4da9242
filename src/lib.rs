//! Verified application installation planning and execution.
//!
//! Given a catalog of vetted application descriptors, this crate computes
//! an ordered, deduplicated installation plan for a requested application,
//! cryptographically verifies every artifact before it runs, executes the
//! installers in dependency order, and durably records install state.
//!
//! The typical flow mirrors what a UI or CLI drives:
//!
//! 1. [`catalog::Catalog::from_file`] loads and validates the catalog.
//! 2. [`planner::Planner::build_plan`] resolves the target into a
//!    [`models::Plan`] for the caller to confirm.
//! 3. [`executor::Executor::run`] fetches, verifies and launches each
//!    Install step, updating the [`state::StateStore`] as it goes.
//!
//! Network transport and process creation stay behind the
//! [`transport::ArtifactFetcher`] and [`launcher::InstallerLauncher`]
//! seams; the crate itself performs no HTTP.

pub mod catalog;
pub mod error;
pub mod executor;
pub mod launcher;
pub mod models;
pub mod planner;
pub mod signing;
pub mod state;
pub mod transport;
pub mod verifier;

pub use catalog::Catalog;
pub use error::AppVetError;
pub use executor::{cancellation_pair, CancelFlag, CancelHandle, Executor, StepOutcome, StepStatus};
pub use launcher::{InstallerLauncher, TokioLauncher};
pub use models::{
    AppDescriptor, ExecutionResult, InstallRecord, InstallerKind, Plan, PlanAction, PlanStep,
    VerificationOutcome, VerificationStatus,
};
pub use planner::Planner;
pub use state::StateStore;
pub use transport::{ArtifactFetcher, FetchedArtifact};
pub use verifier::Verifier;
