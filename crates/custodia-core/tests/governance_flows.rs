//! # Governance Flow Tests
//!
//! End-to-end scenarios over the full engine: deployment handoff, pause
//! discipline, upgrade identity preservation, resumable orchestration,
//! timelock wiring, and persistence across reopen.

// Standard for test code.
#![allow(clippy::unwrap_used, clippy::panic)]

use custodia_core::{
    DeployPlan, DeploymentRun, GovernanceConfig, GovernanceError, ImplementationId, Ledger,
    LedgerStore, ModuleKind, RedbLedger, Role, Session, SubjectId,
};

const DEPLOYER: SubjectId = SubjectId(1);
const GOVERNANCE: SubjectId = SubjectId(2);
const OUTSIDER: SubjectId = SubjectId(3);
const PROXY: SubjectId = SubjectId(100);
const TIMELOCK_PROXY: SubjectId = SubjectId(200);

fn config() -> GovernanceConfig {
    GovernanceConfig::new(DEPLOYER, GOVERNANCE)
}

fn plan_for(kind: ModuleKind, label: &str) -> DeployPlan {
    DeployPlan::build(kind, label, PROXY, ImplementationId(1), &config()).expect("plan")
}

// =============================================================================
// DEPLOYMENT HANDOFF
// =============================================================================

mod deployment {
    use super::*;

    /// The spec scenario: deploy with roles held by the deployer,
    /// orchestrate grant-to-governance then revoke-from-deployer, and
    /// verify the end state for every role.
    #[test]
    fn handoff_end_state() {
        let mut ledger = Ledger::new();
        DeploymentRun::new(plan_for(ModuleKind::Treasury, "treasury"))
            .run_to_completion(&mut ledger)
            .expect("run");

        let session = Session::with_ledger(ledger);
        for &role in ModuleKind::Treasury.role_table() {
            assert!(session.has_role(PROXY, role, GOVERNANCE).expect("query"));
            assert!(!session.has_role(PROXY, role, DEPLOYER).expect("query"));
        }
    }

    /// At no point during the handoff does the module lack an admin.
    #[test]
    fn no_zero_admin_window_at_any_step() {
        let mut ledger = Ledger::new();
        let mut run = DeploymentRun::new(plan_for(ModuleKind::Treasury, "treasury"));

        let mut created = false;
        while !run.is_complete() {
            run.advance(&mut ledger).expect("advance");
            if let Some(module) = ledger.module_by_proxy(PROXY) {
                created = true;
                let record = ledger.lookup(module).expect("lookup").expect("present");
                assert!(
                    record.control.holder_count(Role::Admin) >= 1,
                    "zero-admin window at step {}",
                    run.cursor()
                );
            }
        }
        assert!(created);
    }

    /// Every deployable kind completes its plan cleanly.
    #[test]
    fn every_kind_deploys() {
        for (offset, &kind) in custodia_core::ALL_KINDS.iter().enumerate() {
            let mut ledger = Ledger::new();
            let proxy = SubjectId(1000 + offset as u64);
            let plan = DeployPlan::build(
                kind,
                format!("{}-module", kind),
                proxy,
                ImplementationId(1),
                &config(),
            )
            .expect("plan");
            DeploymentRun::new(plan)
                .run_to_completion(&mut ledger)
                .expect("run");
            assert!(ledger.module_by_proxy(proxy).is_some());
        }
    }
}

// =============================================================================
// PAUSE DISCIPLINE
// =============================================================================

mod pause {
    use super::*;

    /// The spec scenario: pause from a subject without PAUSER fails with
    /// Unauthorized and the flag stays down.
    #[test]
    fn unauthorized_pause_leaves_state_unchanged() {
        let mut ledger = Ledger::new();
        DeploymentRun::new(plan_for(ModuleKind::Registry, "apps"))
            .run_to_completion(&mut ledger)
            .expect("run");

        let mut session = Session::with_ledger(ledger);
        let result = session.pause(PROXY, OUTSIDER);
        assert!(matches!(result, Err(GovernanceError::Unauthorized)));
        assert!(!session.is_paused(PROXY).expect("query"));
    }

    /// Guarded business actions are rejected from pause until unpause.
    #[test]
    fn guard_respects_pause_window() {
        let mut ledger = Ledger::new();
        DeploymentRun::new(plan_for(ModuleKind::Registry, "apps"))
            .run_to_completion(&mut ledger)
            .expect("run");

        let mut session = Session::with_ledger(ledger);
        session.require_active(PROXY).expect("active before pause");

        session.pause(PROXY, GOVERNANCE).expect("pause");
        assert!(matches!(
            session.require_active(PROXY),
            Err(GovernanceError::ModulePaused)
        ));

        session.unpause(PROXY, GOVERNANCE).expect("unpause");
        session.require_active(PROXY).expect("active after unpause");
    }

    /// Governance operations keep working while paused.
    #[test]
    fn governance_continues_while_paused() {
        let mut ledger = Ledger::new();
        DeploymentRun::new(plan_for(ModuleKind::Registry, "apps"))
            .run_to_completion(&mut ledger)
            .expect("run");

        let mut session = Session::with_ledger(ledger);
        session.pause(PROXY, GOVERNANCE).expect("pause");

        session
            .grant(PROXY, GOVERNANCE, Role::Operator, OUTSIDER)
            .expect("grant while paused");
        session
            .propose_upgrade(PROXY, GOVERNANCE, ImplementationId(2))
            .expect("propose while paused");
        session
            .execute_upgrade(PROXY, GOVERNANCE)
            .expect("execute while paused");
    }
}

// =============================================================================
// UPGRADE IDENTITY
// =============================================================================

mod upgrade {
    use super::*;

    /// The spec scenario: proxy identity is identical before and after
    /// an executed upgrade while the implementation differs.
    #[test]
    fn identity_preserved_across_upgrade() {
        let mut ledger = Ledger::new();
        DeploymentRun::new(plan_for(ModuleKind::Token, "coin"))
            .run_to_completion(&mut ledger)
            .expect("run");

        let mut session = Session::with_ledger(ledger);
        let before = session.module(PROXY).expect("module");

        session
            .propose_upgrade(PROXY, GOVERNANCE, ImplementationId(2))
            .expect("propose");
        session.execute_upgrade(PROXY, GOVERNANCE).expect("execute");

        let after = session.module(PROXY).expect("module");
        assert_eq!(before.proxy, after.proxy);
        assert_ne!(before.implementation, after.implementation);
        assert_eq!(after.history, vec![ImplementationId(1)]);
    }

    /// The spec scenario: execute twice without a new proposal between;
    /// the second call fails with NoPendingUpgrade.
    #[test]
    fn double_execute_rejected() {
        let mut ledger = Ledger::new();
        DeploymentRun::new(plan_for(ModuleKind::Token, "coin"))
            .run_to_completion(&mut ledger)
            .expect("run");

        let mut session = Session::with_ledger(ledger);
        session
            .propose_upgrade(PROXY, GOVERNANCE, ImplementationId(2))
            .expect("propose");
        session.execute_upgrade(PROXY, GOVERNANCE).expect("execute");

        let result = session.execute_upgrade(PROXY, GOVERNANCE);
        assert!(matches!(result, Err(GovernanceError::NoPendingUpgrade)));
    }
}

// =============================================================================
// RESUMABLE ORCHESTRATION
// =============================================================================

mod resume {
    use super::*;

    /// An aborted run leaves partial state; resuming from the confirmed
    /// cursor completes the handoff without repeating earlier steps.
    #[test]
    fn abort_then_resume_completes() {
        let mut ledger = Ledger::new();
        let plan = plan_for(ModuleKind::Faucet, "faucet");

        let mut first = DeploymentRun::new(plan.clone());
        for _ in 0..4 {
            first.advance(&mut ledger).expect("advance");
        }
        let confirmed = first.cursor();
        let events_mid = ledger.audit_log().len();

        // Operator restart: plan is rebuilt, cursor restored.
        let mut resumed = DeploymentRun::resume(plan, confirmed);
        resumed.run_to_completion(&mut ledger).expect("resume");

        let session = Session::with_ledger(ledger);
        for &role in ModuleKind::Faucet.role_table() {
            assert!(session.has_role(PROXY, role, GOVERNANCE).expect("query"));
            assert!(!session.has_role(PROXY, role, DEPLOYER).expect("query"));
        }
        // Resume did not replay the already confirmed grants.
        let snapshot = session.export_snapshot().expect("snapshot");
        assert!(snapshot.audit_log().len() > events_mid);
    }

    /// The abort error names the failing step so operators can inspect
    /// before retrying.
    #[test]
    fn abort_carries_step_index() {
        let mut ledger = Ledger::new();
        // Squat the proxy with a different kind; Create must fail.
        let mut session_plan = DeployPlan::build(
            ModuleKind::Token,
            "squatter",
            PROXY,
            ImplementationId(9),
            &config(),
        )
        .expect("plan");
        session_plan.steps.truncate(1); // create only
        DeploymentRun::new(session_plan)
            .run_to_completion(&mut ledger)
            .expect("squat");

        let err = DeploymentRun::new(plan_for(ModuleKind::Faucet, "faucet"))
            .run_to_completion(&mut ledger)
            .expect_err("abort");
        match err {
            GovernanceError::SequenceAborted { step, reason } => {
                assert_eq!(step, 0);
                assert!(!reason.is_empty());
            }
            other => panic!("expected SequenceAborted, got {other:?}"),
        }
    }
}

// =============================================================================
// TIMELOCK WIRING
// =============================================================================

mod timelock {
    use super::*;

    #[test]
    fn wiring_end_state() {
        let mut ledger = Ledger::new();
        let plan = plan_for(ModuleKind::Registry, "apps").with_timelock(
            "timelock",
            TIMELOCK_PROXY,
            ImplementationId(7),
        );
        DeploymentRun::new(plan)
            .run_to_completion(&mut ledger)
            .expect("run");

        let session = Session::with_ledger(ledger);

        // The orchestrated module is the sole proposer.
        assert!(
            session
                .has_role(TIMELOCK_PROXY, Role::Proposer, PROXY)
                .expect("query")
        );
        assert!(
            !session
                .has_role(TIMELOCK_PROXY, Role::Proposer, DEPLOYER)
                .expect("query")
        );

        // The deployer renounced administration; the timelock retains it
        // through its own proxy identity.
        assert!(
            !session
                .has_role(TIMELOCK_PROXY, Role::TimelockAdmin, DEPLOYER)
                .expect("query")
        );
        assert!(
            session
                .has_role(TIMELOCK_PROXY, Role::TimelockAdmin, TIMELOCK_PROXY)
                .expect("query")
        );
    }
}

// =============================================================================
// PERSISTENCE
// =============================================================================

mod persistence {
    use super::*;

    /// A deployment confirmed into redb survives process restart, and
    /// the reopened ledger continues from the same counters.
    #[test]
    fn redb_state_survives_reopen() {
        let file = tempfile::NamedTempFile::new().expect("temp file");

        {
            let mut ledger = RedbLedger::open(file.path()).expect("open");
            DeploymentRun::new(plan_for(ModuleKind::Treasury, "treasury"))
                .run_to_completion(&mut ledger)
                .expect("run");
        }

        let reopened = RedbLedger::open(file.path()).expect("reopen");
        let session = Session::with_redb_ledger(reopened);

        for &role in ModuleKind::Treasury.role_table() {
            assert!(session.has_role(PROXY, role, GOVERNANCE).expect("query"));
        }
        let metrics = session.metrics().expect("metrics");
        assert_eq!(metrics.module_count, 1);
        assert!(metrics.event_count > 0);
    }

    /// A run aborted mid-way against redb resumes after reopen.
    #[test]
    fn redb_resume_across_reopen() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let plan = plan_for(ModuleKind::Treasury, "treasury");
        let confirmed;

        {
            let mut ledger = RedbLedger::open(file.path()).expect("open");
            let mut run = DeploymentRun::new(plan.clone());
            for _ in 0..3 {
                run.advance(&mut ledger).expect("advance");
            }
            confirmed = run.cursor();
        }

        {
            let mut ledger = RedbLedger::open(file.path()).expect("reopen");
            DeploymentRun::resume(plan, confirmed)
                .run_to_completion(&mut ledger)
                .expect("resume");
        }

        let session = Session::with_redb(file.path()).expect("final open");
        assert!(
            session
                .has_role(PROXY, Role::Admin, GOVERNANCE)
                .expect("query")
        );
        assert!(
            !session
                .has_role(PROXY, Role::Admin, DEPLOYER)
                .expect("query")
        );
    }

    /// Canonical export of an in-memory mirror equals the export of the
    /// persistent ledger with the same history.
    #[test]
    fn canonical_export_is_backend_independent() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let plan = plan_for(ModuleKind::Token, "coin");

        let mut memory = Ledger::new();
        DeploymentRun::new(plan.clone())
            .run_to_completion(&mut memory)
            .expect("memory run");

        let mut persistent = RedbLedger::open(file.path()).expect("open");
        DeploymentRun::new(plan)
            .run_to_completion(&mut persistent)
            .expect("redb run");

        let persistent_snapshot = Session::with_redb_ledger(persistent)
            .export_snapshot()
            .expect("snapshot");

        assert_eq!(
            custodia_core::export_canonical(&memory).expect("export"),
            custodia_core::export_canonical(&persistent_snapshot).expect("export")
        );
    }
}
