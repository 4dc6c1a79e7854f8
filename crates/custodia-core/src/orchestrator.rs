//! # Deployment Orchestrator
//!
//! Sequences the full module lifecycle as an explicit, resumable step
//! list rather than one atomic transaction:
//!
//! 1. create the module (bootstrap grants land on the deployer),
//! 2. grant every role to the governance authority, admin first,
//! 3. revoke every role from the deployer, admin last,
//! 4. optionally wire a timelock: create it, make the orchestrated
//!    module its sole proposer, revoke the deployer's timelock
//!    administration.
//!
//! Step N+1 is never issued until step N is confirmed. A failed step
//! aborts the run with [`GovernanceError::SequenceAborted`] carrying the
//! step index; completed steps are not rolled back, and because every
//! step is idempotent the run (or the whole plan) can be re-issued
//! safely after operator inspection.

use crate::config::GovernanceConfig;
use crate::ledger::LedgerStore;
use crate::ownership::OwnershipTransfer;
use crate::primitives::MAX_PLAN_STEPS;
use crate::registry::RoleRegistry;
use crate::{GovernanceError, ImplementationId, ModuleId, ModuleKind, Role, SubjectId};
use serde::{Deserialize, Serialize};

// =============================================================================
// DEPLOY STEPS
// =============================================================================

/// One confirmable unit of a deployment sequence.
///
/// Steps that act on the module being deployed resolve it through the
/// plan's proxy identity; timelock steps resolve the timelock the same
/// way. Every step is safe to re-issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployStep {
    /// Register the module and run its bootstrap grant path.
    Create,
    /// Grant `role` on the module to `subject` (the governance authority).
    Grant { role: Role, subject: SubjectId },
    /// Revoke `role` on the module from `subject` (the deployer).
    Revoke { role: Role, subject: SubjectId },
    /// Hand single-owner control to `new_owner` (ownable kinds only).
    TransferOwnership { new_owner: SubjectId },
    /// Register the timelock module.
    CreateTimelock,
    /// Grant `role` on the timelock to `subject`.
    GrantOnTimelock { role: Role, subject: SubjectId },
    /// Revoke `role` on the timelock from `subject`.
    RevokeOnTimelock { role: Role, subject: SubjectId },
}

impl std::fmt::Display for DeployStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployStep::Create => write!(f, "create module"),
            DeployStep::Grant { role, subject } => {
                write!(f, "grant {} to subject {}", role, subject.0)
            }
            DeployStep::Revoke { role, subject } => {
                write!(f, "revoke {} from subject {}", role, subject.0)
            }
            DeployStep::TransferOwnership { new_owner } => {
                write!(f, "transfer ownership to subject {}", new_owner.0)
            }
            DeployStep::CreateTimelock => write!(f, "create timelock"),
            DeployStep::GrantOnTimelock { role, subject } => {
                write!(f, "grant {} on timelock to subject {}", role, subject.0)
            }
            DeployStep::RevokeOnTimelock { role, subject } => {
                write!(f, "revoke {} on timelock from subject {}", role, subject.0)
            }
        }
    }
}

// =============================================================================
// TIMELOCK WIRING
// =============================================================================

/// Identities for the optional timelock created alongside a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelockWiring {
    pub label: String,
    pub proxy: SubjectId,
    pub implementation: ImplementationId,
}

// =============================================================================
// DEPLOY PLAN
// =============================================================================

/// The full, precomputed step sequence for deploying one module.
///
/// Plans are data: serializable, loggable, and deterministic for the
/// same inputs, which is what makes cross-process resume possible
/// (rebuild the plan, seek to the confirmed cursor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployPlan {
    pub kind: ModuleKind,
    pub label: String,
    pub proxy: SubjectId,
    pub implementation: ImplementationId,
    pub deployer: SubjectId,
    pub governance: SubjectId,
    pub timelock: Option<TimelockWiring>,
    pub steps: Vec<DeployStep>,
}

impl DeployPlan {
    /// Build the grant-all-then-revoke-all plan for one module.
    ///
    /// Grants go to the governance authority admin-first; revocations
    /// strip the deployer admin-last. Any other ordering risks a window
    /// where no admin exists, which the registry would reject anyway.
    pub fn build(
        kind: ModuleKind,
        label: impl Into<String>,
        proxy: SubjectId,
        implementation: ImplementationId,
        config: &GovernanceConfig,
    ) -> Result<Self, GovernanceError> {
        config.validate()?;

        let mut steps = vec![DeployStep::Create];

        if kind.is_ownable() {
            steps.push(DeployStep::TransferOwnership {
                new_owner: config.governance,
            });
        } else {
            let roles = config.effective_roles(kind);
            let admin = kind.admin_role();

            steps.push(DeployStep::Grant {
                role: admin,
                subject: config.governance,
            });
            for &role in roles.iter().filter(|&&r| r != admin) {
                steps.push(DeployStep::Grant {
                    role,
                    subject: config.governance,
                });
            }
            for &role in roles.iter().filter(|&&r| r != admin) {
                steps.push(DeployStep::Revoke {
                    role,
                    subject: config.deployer,
                });
            }
            steps.push(DeployStep::Revoke {
                role: admin,
                subject: config.deployer,
            });
        }

        Ok(Self {
            kind,
            label: label.into(),
            proxy,
            implementation,
            deployer: config.deployer,
            governance: config.governance,
            timelock: None,
            steps,
        })
    }

    /// Append timelock wiring: create the timelock, make this module its
    /// sole proposer, then strip the deployer's timelock administration.
    ///
    /// The timelock keeps administering itself through its own proxy
    /// identity, so the final revocation leaves no zero-admin window.
    #[must_use]
    pub fn with_timelock(
        mut self,
        label: impl Into<String>,
        proxy: SubjectId,
        implementation: ImplementationId,
    ) -> Self {
        self.timelock = Some(TimelockWiring {
            label: label.into(),
            proxy,
            implementation,
        });
        self.steps.push(DeployStep::CreateTimelock);
        self.steps.push(DeployStep::GrantOnTimelock {
            role: Role::Proposer,
            subject: self.proxy,
        });
        // Strip the deployer's bootstrap seats; admin comes off last.
        self.steps.push(DeployStep::RevokeOnTimelock {
            role: Role::Proposer,
            subject: self.deployer,
        });
        self.steps.push(DeployStep::RevokeOnTimelock {
            role: Role::Executor,
            subject: self.deployer,
        });
        self.steps.push(DeployStep::RevokeOnTimelock {
            role: Role::TimelockAdmin,
            subject: self.deployer,
        });
        self
    }

    /// Number of steps in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

// =============================================================================
// DEPLOYMENT RUN
// =============================================================================

/// A confirmed step, reported back for operator logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedStep {
    /// Position in the plan.
    pub index: usize,
    /// The step that was confirmed.
    pub step: DeployStep,
}

/// Cursor over a [`DeployPlan`], issuing one step at a time.
///
/// The cursor only moves on confirmation, so after an abort it points at
/// the failed step and `advance` re-issues exactly that step.
#[derive(Debug, Clone)]
pub struct DeploymentRun {
    plan: DeployPlan,
    cursor: usize,
}

impl DeploymentRun {
    /// Start a fresh run at step zero.
    #[must_use]
    pub fn new(plan: DeployPlan) -> Self {
        Self { plan, cursor: 0 }
    }

    /// Resume a run from a previously confirmed cursor.
    ///
    /// The plan must be rebuilt from the same inputs; the cursor is
    /// clamped to the plan length.
    #[must_use]
    pub fn resume(plan: DeployPlan, confirmed: usize) -> Self {
        let cursor = confirmed.min(plan.len());
        Self { plan, cursor }
    }

    /// The plan being executed.
    #[must_use]
    pub fn plan(&self) -> &DeployPlan {
        &self.plan
    }

    /// Index of the next step to issue.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether every step has been confirmed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cursor >= self.plan.len()
    }

    /// Issue the next step and wait for its confirmation.
    ///
    /// Returns `Ok(None)` once the run is complete. On failure the
    /// cursor stays on the failed step and the error is wrapped in
    /// `SequenceAborted` with that index.
    pub fn advance<S: LedgerStore>(
        &mut self,
        store: &mut S,
    ) -> Result<Option<ConfirmedStep>, GovernanceError> {
        if self.is_complete() {
            return Ok(None);
        }
        if self.cursor >= MAX_PLAN_STEPS {
            return Err(GovernanceError::SequenceAborted {
                step: self.cursor,
                reason: "plan exceeds the step bound".to_string(),
            });
        }

        let step = self.plan.steps[self.cursor].clone();
        self.execute_step(store, &step)
            .map_err(|e| GovernanceError::SequenceAborted {
                step: self.cursor,
                reason: e.to_string(),
            })?;

        let confirmed = ConfirmedStep {
            index: self.cursor,
            step,
        };
        self.cursor = self.cursor.saturating_add(1);
        Ok(Some(confirmed))
    }

    /// Drive the run to completion. Returns the number of steps
    /// confirmed by this call.
    pub fn run_to_completion<S: LedgerStore>(
        &mut self,
        store: &mut S,
    ) -> Result<usize, GovernanceError> {
        let mut confirmed = 0;
        while self.advance(store)?.is_some() {
            confirmed += 1;
        }
        Ok(confirmed)
    }

    // =========================================================================
    // STEP EXECUTION
    // =========================================================================

    fn execute_step<S: LedgerStore>(
        &self,
        store: &mut S,
        step: &DeployStep,
    ) -> Result<(), GovernanceError> {
        match step {
            DeployStep::Create => Self::ensure_created(
                store,
                self.plan.kind,
                &self.plan.label,
                self.plan.proxy,
                self.plan.implementation,
                self.plan.deployer,
            ),
            DeployStep::Grant { role, subject } => {
                let module = self.resolve(store, self.plan.proxy)?;
                RoleRegistry::grant(store, module, self.plan.deployer, *role, *subject)
            }
            DeployStep::Revoke { role, subject } => {
                let module = self.resolve(store, self.plan.proxy)?;
                RoleRegistry::revoke(store, module, self.plan.deployer, *role, *subject)
            }
            DeployStep::TransferOwnership { new_owner } => {
                let module = self.resolve(store, self.plan.proxy)?;
                // Confirmed already if a previous attempt landed.
                if OwnershipTransfer::owner_of(store, module)? == Some(*new_owner) {
                    return Ok(());
                }
                OwnershipTransfer::transfer(store, module, self.plan.deployer, *new_owner)
            }
            DeployStep::CreateTimelock => {
                let wiring = self.wiring()?;
                Self::ensure_created(
                    store,
                    ModuleKind::Timelock,
                    &wiring.label,
                    wiring.proxy,
                    wiring.implementation,
                    self.plan.deployer,
                )
            }
            DeployStep::GrantOnTimelock { role, subject } => {
                let wiring = self.wiring()?;
                let module = self.resolve(store, wiring.proxy)?;
                RoleRegistry::grant(store, module, self.plan.deployer, *role, *subject)
            }
            DeployStep::RevokeOnTimelock { role, subject } => {
                let wiring = self.wiring()?;
                let module = self.resolve(store, wiring.proxy)?;
                RoleRegistry::revoke(store, module, self.plan.deployer, *role, *subject)
            }
        }
    }

    /// Create a module unless a matching one already exists (resume path).
    fn ensure_created<S: LedgerStore>(
        store: &mut S,
        kind: ModuleKind,
        label: &str,
        proxy: SubjectId,
        implementation: ImplementationId,
        deployer: SubjectId,
    ) -> Result<(), GovernanceError> {
        if let Some(existing) = store.module_by_proxy(proxy) {
            let record = store
                .lookup(existing)?
                .ok_or(GovernanceError::ModuleNotFound(existing))?;
            if record.kind == kind {
                return Ok(());
            }
            return Err(GovernanceError::ModuleExists(proxy));
        }
        RoleRegistry::bootstrap(store, kind, label, proxy, implementation, deployer)?;
        Ok(())
    }

    fn resolve<S: LedgerStore>(
        &self,
        store: &S,
        proxy: SubjectId,
    ) -> Result<ModuleId, GovernanceError> {
        store
            .module_by_proxy(proxy)
            .ok_or(GovernanceError::UnknownProxy(proxy))
    }

    fn wiring(&self) -> Result<&TimelockWiring, GovernanceError> {
        self.plan
            .timelock
            .as_ref()
            .ok_or_else(|| GovernanceError::SequenceAborted {
                step: self.cursor,
                reason: "timelock step without wiring".to_string(),
            })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use crate::pause::PauseGate;

    const DEPLOYER: SubjectId = SubjectId(1);
    const GOVERNANCE: SubjectId = SubjectId(2);
    const PROXY: SubjectId = SubjectId(100);
    const TIMELOCK_PROXY: SubjectId = SubjectId(200);

    fn config() -> GovernanceConfig {
        GovernanceConfig::new(DEPLOYER, GOVERNANCE)
    }

    fn treasury_plan() -> DeployPlan {
        DeployPlan::build(
            ModuleKind::Treasury,
            "treasury",
            PROXY,
            ImplementationId(1),
            &config(),
        )
        .expect("plan")
    }

    #[test]
    fn plan_orders_admin_first_on_grant_last_on_revoke() {
        let plan = treasury_plan();

        let first_grant = plan
            .steps
            .iter()
            .find_map(|s| match s {
                DeployStep::Grant { role, .. } => Some(*role),
                _ => None,
            })
            .expect("grant step");
        let last_revoke = plan
            .steps
            .iter()
            .rev()
            .find_map(|s| match s {
                DeployStep::Revoke { role, .. } => Some(*role),
                _ => None,
            })
            .expect("revoke step");

        assert_eq!(first_grant, Role::Admin);
        assert_eq!(last_revoke, Role::Admin);
    }

    #[test]
    fn full_run_hands_control_to_governance() {
        let mut ledger = Ledger::new();
        let mut run = DeploymentRun::new(treasury_plan());
        run.run_to_completion(&mut ledger).expect("run");

        let module = ledger.module_by_proxy(PROXY).expect("module");
        for &role in ModuleKind::Treasury.role_table() {
            assert!(RoleRegistry::has_role(&ledger, module, role, GOVERNANCE).expect("query"));
            assert!(!RoleRegistry::has_role(&ledger, module, role, DEPLOYER).expect("query"));
        }
        assert!(!PauseGate::is_paused(&ledger, module).expect("query"));
        assert!(run.is_complete());
    }

    #[test]
    fn ownable_plan_transfers_ownership() {
        let mut ledger = Ledger::new();
        let plan = DeployPlan::build(
            ModuleKind::Collectible,
            "seed",
            PROXY,
            ImplementationId(1),
            &config(),
        )
        .expect("plan");
        DeploymentRun::new(plan)
            .run_to_completion(&mut ledger)
            .expect("run");

        let module = ledger.module_by_proxy(PROXY).expect("module");
        assert_eq!(
            OwnershipTransfer::owner_of(&ledger, module).expect("query"),
            Some(GOVERNANCE)
        );
    }

    #[test]
    fn timelock_wiring_leaves_module_as_sole_proposer() {
        let mut ledger = Ledger::new();
        let plan = treasury_plan().with_timelock("timelock", TIMELOCK_PROXY, ImplementationId(5));
        DeploymentRun::new(plan)
            .run_to_completion(&mut ledger)
            .expect("run");

        let timelock = ledger.module_by_proxy(TIMELOCK_PROXY).expect("timelock");
        assert!(
            RoleRegistry::has_role(&ledger, timelock, Role::Proposer, PROXY).expect("query")
        );
        assert!(
            !RoleRegistry::has_role(&ledger, timelock, Role::Proposer, DEPLOYER).expect("query")
        );
        assert!(
            !RoleRegistry::has_role(&ledger, timelock, Role::TimelockAdmin, DEPLOYER)
                .expect("query")
        );
        // The timelock still administers itself.
        assert!(
            RoleRegistry::has_role(&ledger, timelock, Role::TimelockAdmin, TIMELOCK_PROXY)
                .expect("query")
        );
    }

    #[test]
    fn abort_keeps_cursor_on_failed_step() {
        let mut ledger = Ledger::new();
        // Occupy the proxy with a different kind so Create fails.
        RoleRegistry::bootstrap(
            &mut ledger,
            ModuleKind::Faucet,
            "squatter",
            PROXY,
            ImplementationId(9),
            DEPLOYER,
        )
        .expect("bootstrap");

        let mut run = DeploymentRun::new(treasury_plan());
        let err = run.run_to_completion(&mut ledger).expect_err("must abort");
        assert!(matches!(
            err,
            GovernanceError::SequenceAborted { step: 0, .. }
        ));
        assert_eq!(run.cursor(), 0);
    }

    #[test]
    fn resumed_run_completes_after_partial_failure() {
        let mut ledger = Ledger::new();
        let plan = treasury_plan();

        // Confirm the first three steps, then simulate an operator
        // restart: rebuild the plan and resume from the cursor.
        let mut first = DeploymentRun::new(plan.clone());
        for _ in 0..3 {
            first.advance(&mut ledger).expect("advance");
        }
        let confirmed = first.cursor();

        let mut resumed = DeploymentRun::resume(plan, confirmed);
        resumed.run_to_completion(&mut ledger).expect("resume");

        let module = ledger.module_by_proxy(PROXY).expect("module");
        assert!(
            RoleRegistry::has_role(&ledger, module, Role::Admin, GOVERNANCE).expect("query")
        );
        assert!(!RoleRegistry::has_role(&ledger, module, Role::Admin, DEPLOYER).expect("query"));
    }

    #[test]
    fn rerunning_whole_plan_is_idempotent() {
        let mut ledger = Ledger::new();
        let plan = treasury_plan();

        DeploymentRun::new(plan.clone())
            .run_to_completion(&mut ledger)
            .expect("first run");
        let events_after_first = ledger.audit_log().len();

        // Re-running skips creation and finds nothing to change, except
        // grants the deployer no longer has authority for.
        let err = DeploymentRun::new(plan)
            .run_to_completion(&mut ledger)
            .expect_err("deployer lost admin");
        assert!(matches!(err, GovernanceError::SequenceAborted { .. }));
        assert_eq!(ledger.audit_log().len(), events_after_first);
    }

    #[test]
    fn plan_steps_render_for_operators() {
        let plan = treasury_plan();
        let rendered: Vec<String> = plan.steps.iter().map(|s| s.to_string()).collect();
        assert!(rendered[0].contains("create"));
        assert!(rendered[1].contains("grant ADMIN"));
    }
}
