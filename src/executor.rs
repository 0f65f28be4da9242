//! Sequential plan execution: fetch, verify, launch, record.
//!
//! Steps run strictly in plan order so a dependent never starts before its
//! dependency. Any verification failure, fetch failure, non-zero exit or
//! cancellation halts the remainder of the plan; the state store then
//! reflects exactly the steps that succeeded.

use crate::catalog::Catalog;
use crate::error::AppVetError;
use crate::launcher::InstallerLauncher;
use crate::models::{ExecutionResult, InstallRecord, Plan, PlanAction, PlanStep};
use crate::state::StateStore;
use crate::transport::ArtifactFetcher;
use crate::verifier::Verifier;
use chrono::Utc;
use tokio::sync::watch;

// -----------------------------------------------------------------------------
// Cancellation
// -----------------------------------------------------------------------------
/// Creates a linked cancel handle/flag pair. The handle side belongs to
/// the UI or CLI; the flag side is checked between steps and propagated to
/// the running installer process.
pub fn cancellation_pair() -> (CancelHandle, CancelFlag) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelFlag { rx: Some(rx) })
}

/// Caller-side trigger for cooperative cancellation.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Executor-side view of the cancellation signal.
#[derive(Clone)]
pub struct CancelFlag {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelFlag {
    /// A flag that can never fire, for callers without a cancel path.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolves once cancellation is requested; pends forever on a flag
    /// that cannot fire or whose handle was dropped without firing.
    pub async fn cancelled(&self) {
        let Some(mut rx) = self.rx.clone() else {
            return std::future::pending::<()>().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending::<()>().await;
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Step Outcomes
// -----------------------------------------------------------------------------
/// Per-step result surfaced to the caller, in plan order. A halted plan
/// simply has no outcomes for the steps that never ran.
#[derive(Debug)]
pub struct StepOutcome {
    pub identifier: String,
    pub status: StepStatus,
}

#[derive(Debug)]
pub enum StepStatus {
    /// Installer ran, exited zero, and the install record was written.
    Installed(ExecutionResult),
    /// Already installed at the catalog version; nothing was launched.
    Skipped,
    /// The step failed; `execution` is present when a process actually ran.
    Failed {
        error: AppVetError,
        execution: Option<ExecutionResult>,
    },
}

impl StepOutcome {
    /// The captured process result, when a process ran for this step.
    pub fn execution(&self) -> Option<&ExecutionResult> {
        match &self.status {
            StepStatus::Installed(result) => Some(result),
            StepStatus::Skipped => None,
            StepStatus::Failed { execution, .. } => execution.as_ref(),
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.status, StepStatus::Installed(_) | StepStatus::Skipped)
    }
}

// -----------------------------------------------------------------------------
// Executor
// -----------------------------------------------------------------------------
/// Runs installation plans against the shared state store, delegating
/// artifact transport and process creation to its collaborators.
pub struct Executor<'a> {
    catalog: &'a Catalog,
    state: &'a StateStore,
    fetcher: &'a dyn ArtifactFetcher,
    launcher: &'a dyn InstallerLauncher,
    verifier: Verifier,
}

impl<'a> Executor<'a> {
    pub fn new(
        catalog: &'a Catalog,
        state: &'a StateStore,
        fetcher: &'a dyn ArtifactFetcher,
        launcher: &'a dyn InstallerLauncher,
    ) -> Self {
        Self {
            catalog,
            state,
            fetcher,
            launcher,
            verifier: Verifier::new(),
        }
    }

    /// Executes `plan` step by step. A plan with Blocked steps is rejected
    /// outright before any side effect. The returned outcomes are ordered;
    /// a failed step is always the last entry because the rest of the plan
    /// is halted.
    pub async fn run(
        &self,
        plan: &Plan,
        cancel: &CancelFlag,
    ) -> Result<Vec<StepOutcome>, AppVetError> {
        if plan.has_blocked_steps() {
            log::error!(
                "Refusing to execute plan for '{}': {} blocked step(s)",
                plan.target,
                plan.blocked_count()
            );
            return Err(AppVetError::PlanNotExecutable {
                target: plan.target.clone(),
                blocked: plan.blocked_count(),
            });
        }

        log::info!("Executing {}", plan.summary());
        let mut outcomes = Vec::with_capacity(plan.steps.len());

        for step in &plan.steps {
            match step.action {
                PlanAction::Skip => {
                    log::info!(
                        "Skipping '{}' ({} already installed)",
                        step.identifier,
                        step.version
                    );
                    outcomes.push(StepOutcome {
                        identifier: step.identifier.clone(),
                        status: StepStatus::Skipped,
                    });
                }
                PlanAction::Blocked => {
                    // Unreachable past the guard above; bail rather than
                    // execute past a blocked step if it ever is.
                    return Err(AppVetError::PlanNotExecutable {
                        target: plan.target.clone(),
                        blocked: plan.blocked_count(),
                    });
                }
                PlanAction::Install => {
                    if cancel.is_cancelled() {
                        log::warn!(
                            "Plan for '{}' cancelled before step '{}'",
                            plan.target,
                            step.identifier
                        );
                        outcomes.push(StepOutcome {
                            identifier: step.identifier.clone(),
                            status: StepStatus::Failed {
                                error: AppVetError::Cancelled {
                                    id: step.identifier.clone(),
                                },
                                execution: None,
                            },
                        });
                        break;
                    }

                    let outcome = self.run_install_step(step, cancel).await;
                    let failed = !outcome.succeeded();
                    outcomes.push(outcome);
                    if failed {
                        // Later steps may depend on this one; halt.
                        log::error!(
                            "Step '{}' failed; halting the remaining plan for '{}'",
                            step.identifier,
                            plan.target
                        );
                        break;
                    }
                }
            }
        }

        Ok(outcomes)
    }

    async fn run_install_step(&self, step: &PlanStep, cancel: &CancelFlag) -> StepOutcome {
        let fail = |error, execution| StepOutcome {
            identifier: step.identifier.clone(),
            status: StepStatus::Failed { error, execution },
        };

        let descriptor = match self.catalog.lookup(&step.identifier) {
            Some(descriptor) => descriptor,
            None => {
                return fail(
                    AppVetError::NotFound {
                        id: step.identifier.clone(),
                    },
                    None,
                )
            }
        };

        let artifact = match self.fetcher.fetch(&descriptor.source_uri).await {
            Ok(artifact) => artifact,
            Err(reason) => {
                return fail(
                    AppVetError::FetchFailed {
                        id: step.identifier.clone(),
                        reason,
                    },
                    None,
                )
            }
        };

        let domain = self
            .fetcher
            .source_domain_of(&descriptor.source_uri)
            .unwrap_or_default();
        let verification = self.verifier.verify(descriptor, &artifact.bytes, &domain);
        if !verification.authorizes_execution() {
            return fail(
                AppVetError::VerificationFailed {
                    id: step.identifier.clone(),
                    status: verification.status,
                    detail: verification
                        .detail
                        .unwrap_or_else(|| "no detail".to_string()),
                },
                None,
            );
        }

        let result = match self
            .launcher
            .launch(&artifact.path, &descriptor.silent_args, cancel)
            .await
        {
            Ok(result) => result,
            Err(reason) => {
                let error = if cancel.is_cancelled() {
                    AppVetError::Cancelled {
                        id: step.identifier.clone(),
                    }
                } else {
                    AppVetError::LaunchFailed {
                        id: step.identifier.clone(),
                        reason,
                    }
                };
                return fail(error, None);
            }
        };

        if !result.success() {
            return fail(
                AppVetError::ProcessFailure {
                    id: step.identifier.clone(),
                    exit_code: result.exit_code,
                },
                Some(result),
            );
        }

        let record = InstallRecord {
            identifier: step.identifier.clone(),
            version: descriptor.version.clone(),
            installed: true,
            installed_at: Utc::now(),
            artifact_path: artifact.path.display().to_string(),
            dependencies: step.dependencies.clone(),
        };
        if let Err(error) = self.state.record(record) {
            return fail(error, Some(result));
        }

        StepOutcome {
            identifier: step.identifier.clone(),
            status: StepStatus::Installed(result),
        }
    }
}
