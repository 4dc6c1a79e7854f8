//! # Pause Gate
//!
//! Per-module circuit breaker. Pausing gates the business layer, not
//! governance: role administration, ownership transfer, and upgrades keep
//! working while a module is paused.
//!
//! The business layer is contractually required to consult
//! [`PauseGate::require_active`] (or [`PauseGate::is_paused`]) before
//! executing any guarded mutating action.

use crate::audit::AuditAction;
use crate::ledger::LedgerStore;
use crate::{GovernanceError, ModuleId, Role, SubjectId};

/// State transitions and queries for the per-module paused flag.
pub struct PauseGate;

impl PauseGate {
    /// Pause `module`. Requires the `Pauser` role.
    ///
    /// Fails with `AlreadyPaused` if the flag is already set; the flag is
    /// untouched on any failure.
    pub fn pause<S: LedgerStore>(
        store: &mut S,
        module: ModuleId,
        caller: SubjectId,
    ) -> Result<(), GovernanceError> {
        let mut record = store
            .lookup(module)?
            .ok_or(GovernanceError::ModuleNotFound(module))?;

        if !record.control.holds(Role::Pauser, caller) {
            return Err(GovernanceError::Unauthorized);
        }
        if record.paused {
            return Err(GovernanceError::AlreadyPaused);
        }

        record.paused = true;
        store.append_event(record.proxy, caller, AuditAction::Paused)?;
        store.put_module(record)
    }

    /// Unpause `module`. Symmetric to [`PauseGate::pause`].
    pub fn unpause<S: LedgerStore>(
        store: &mut S,
        module: ModuleId,
        caller: SubjectId,
    ) -> Result<(), GovernanceError> {
        let mut record = store
            .lookup(module)?
            .ok_or(GovernanceError::ModuleNotFound(module))?;

        if !record.control.holds(Role::Pauser, caller) {
            return Err(GovernanceError::Unauthorized);
        }
        if !record.paused {
            return Err(GovernanceError::NotPaused);
        }

        record.paused = false;
        store.append_event(record.proxy, caller, AuditAction::Unpaused)?;
        store.put_module(record)
    }

    /// Query the paused flag.
    pub fn is_paused<S: LedgerStore>(
        store: &S,
        module: ModuleId,
    ) -> Result<bool, GovernanceError> {
        Ok(store
            .lookup(module)?
            .ok_or(GovernanceError::ModuleNotFound(module))?
            .paused)
    }

    /// The cross-cutting guard for the business layer: succeeds only if
    /// the module exists and is not paused.
    pub fn require_active<S: LedgerStore>(
        store: &S,
        module: ModuleId,
    ) -> Result<(), GovernanceError> {
        if Self::is_paused(store, module)? {
            Err(GovernanceError::ModulePaused)
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use crate::registry::RoleRegistry;
    use crate::{ImplementationId, ModuleKind};

    const DEPLOYER: SubjectId = SubjectId(1);
    const OUTSIDER: SubjectId = SubjectId(3);

    fn bootstrap(ledger: &mut Ledger) -> ModuleId {
        RoleRegistry::bootstrap(
            ledger,
            ModuleKind::Registry,
            "apps",
            SubjectId(100),
            ImplementationId(1),
            DEPLOYER,
        )
        .expect("bootstrap")
    }

    #[test]
    fn pause_unpause_round_trip() {
        let mut ledger = Ledger::new();
        let id = bootstrap(&mut ledger);

        PauseGate::pause(&mut ledger, id, DEPLOYER).expect("pause");
        assert!(PauseGate::is_paused(&ledger, id).expect("query"));

        PauseGate::unpause(&mut ledger, id, DEPLOYER).expect("unpause");
        assert!(!PauseGate::is_paused(&ledger, id).expect("query"));
    }

    #[test]
    fn pause_without_role_leaves_state_unchanged() {
        let mut ledger = Ledger::new();
        let id = bootstrap(&mut ledger);

        let result = PauseGate::pause(&mut ledger, id, OUTSIDER);
        assert!(matches!(result, Err(GovernanceError::Unauthorized)));
        assert!(!PauseGate::is_paused(&ledger, id).expect("query"));
    }

    #[test]
    fn double_pause_rejected() {
        let mut ledger = Ledger::new();
        let id = bootstrap(&mut ledger);

        PauseGate::pause(&mut ledger, id, DEPLOYER).expect("pause");
        let result = PauseGate::pause(&mut ledger, id, DEPLOYER);
        assert!(matches!(result, Err(GovernanceError::AlreadyPaused)));
    }

    #[test]
    fn unpause_when_running_rejected() {
        let mut ledger = Ledger::new();
        let id = bootstrap(&mut ledger);

        let result = PauseGate::unpause(&mut ledger, id, DEPLOYER);
        assert!(matches!(result, Err(GovernanceError::NotPaused)));
    }

    #[test]
    fn guard_blocks_business_actions_until_unpause() {
        let mut ledger = Ledger::new();
        let id = bootstrap(&mut ledger);

        PauseGate::require_active(&ledger, id).expect("running module passes guard");

        PauseGate::pause(&mut ledger, id, DEPLOYER).expect("pause");
        assert!(matches!(
            PauseGate::require_active(&ledger, id),
            Err(GovernanceError::ModulePaused)
        ));

        PauseGate::unpause(&mut ledger, id, DEPLOYER).expect("unpause");
        PauseGate::require_active(&ledger, id).expect("guard passes again");
    }
}
