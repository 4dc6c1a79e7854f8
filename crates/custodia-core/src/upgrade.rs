//! # Upgrade Coordinator
//!
//! Tracks the implementation identity behind each module's stable proxy
//! identity and drives the per-module upgrade state machine:
//!
//! ```text
//! Stable --propose--> Pending --execute--> Stable (new pointer)
//!            ^            |
//!            +--propose---+   (re-proposing replaces the candidate)
//! ```
//!
//! The central guarantee: the proxy identity third parties hold never
//! changes across an upgrade. Only the implementation pointer moves, and
//! every superseded pointer is appended to the module's history.
//!
//! After execution an external registrar may be asked to confirm the new
//! implementation against a known artifact ([`Verifier`]). Verification
//! failure is audit-only; it never rolls back an executed upgrade.

use crate::audit::AuditAction;
use crate::ledger::LedgerStore;
use crate::{
    Control, GovernanceError, ImplementationId, ModuleId, Role, SubjectId, UpgradeState,
};
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// UPGRADE COORDINATOR
// =============================================================================

/// Propose/execute operations over the module upgrade state machine.
pub struct UpgradeCoordinator;

impl UpgradeCoordinator {
    /// Record `candidate` as the pending upgrade for `module`.
    ///
    /// Requires the `Upgrader` role (the owner, for ownable kinds). A
    /// pending candidate is replaced; that is the only way to abandon one.
    pub fn propose<S: LedgerStore>(
        store: &mut S,
        module: ModuleId,
        caller: SubjectId,
        candidate: ImplementationId,
    ) -> Result<(), GovernanceError> {
        let mut record = store
            .lookup(module)?
            .ok_or(GovernanceError::ModuleNotFound(module))?;

        Self::check_upgrade_authority(&record, caller)?;

        record.upgrade = UpgradeState::Pending(candidate);
        store.append_event(
            record.proxy,
            caller,
            AuditAction::UpgradeProposed {
                implementation: candidate,
            },
        )?;
        store.put_module(record)
    }

    /// Execute the pending upgrade on `module`.
    ///
    /// Swaps the implementation pointer behind the unchanged proxy
    /// identity, appends the superseded pointer to history, and returns
    /// the machine to `Stable`. Fails with `NoPendingUpgrade` when no
    /// candidate is recorded. Returns the new implementation identity.
    pub fn execute<S: LedgerStore>(
        store: &mut S,
        module: ModuleId,
        caller: SubjectId,
    ) -> Result<ImplementationId, GovernanceError> {
        let mut record = store
            .lookup(module)?
            .ok_or(GovernanceError::ModuleNotFound(module))?;

        Self::check_upgrade_authority(&record, caller)?;

        let UpgradeState::Pending(candidate) = record.upgrade else {
            return Err(GovernanceError::NoPendingUpgrade);
        };

        let previous = record.implementation;
        record.history.push(previous);
        record.implementation = candidate;
        record.upgrade = UpgradeState::Stable;

        store.append_event(
            record.proxy,
            caller,
            AuditAction::UpgradeExecuted {
                previous,
                new: candidate,
            },
        )?;
        store.put_module(record)?;
        Ok(candidate)
    }

    fn check_upgrade_authority(
        record: &crate::ledger::ModuleRecord,
        caller: SubjectId,
    ) -> Result<(), GovernanceError> {
        let authorized = match &record.control {
            Control::Rbac { .. } => record.control.holds(Role::Upgrader, caller),
            Control::Owned { owner } => *owner == caller,
        };
        if authorized {
            Ok(())
        } else {
            Err(GovernanceError::Unauthorized)
        }
    }
}

// =============================================================================
// EXTERNAL VERIFICATION
// =============================================================================

/// Verification failed: the implementation does not match any known
/// artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("implementation {implementation:?} failed verification: {reason}")]
pub struct VerifyError {
    /// The implementation that was checked.
    pub implementation: ImplementationId,
    /// Registrar-supplied reason.
    pub reason: String,
}

/// External registrar that confirms an implementation matches a known
/// artifact.
///
/// # Extension Point
///
/// This trait is the seam for real registrars (block explorers, artifact
/// stores). A failing `verify` is reported to operators but never rolls
/// back an executed upgrade.
pub trait Verifier {
    /// Confirm `implementation` against the registrar's records.
    fn verify(&self, implementation: ImplementationId) -> Result<(), VerifyError>;
}

/// In-process registrar backed by a table of known artifact checksums.
#[derive(Debug, Clone, Default)]
pub struct ArtifactVerifier {
    known: BTreeMap<ImplementationId, u64>,
}

impl ArtifactVerifier {
    /// Create an empty registrar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a known artifact and its checksum.
    pub fn register(&mut self, implementation: ImplementationId, checksum: u64) {
        self.known.insert(implementation, checksum);
    }

    /// The expected checksum for a known artifact.
    #[must_use]
    pub fn expected_checksum(&self, implementation: ImplementationId) -> Option<u64> {
        self.known.get(&implementation).copied()
    }
}

impl Verifier for ArtifactVerifier {
    fn verify(&self, implementation: ImplementationId) -> Result<(), VerifyError> {
        if self.known.contains_key(&implementation) {
            Ok(())
        } else {
            Err(VerifyError {
                implementation,
                reason: "no matching artifact registered".to_string(),
            })
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
    use crate::ModuleKind;

    const DEPLOYER: SubjectId = SubjectId(1);
    const OUTSIDER: SubjectId = SubjectId(3);

    fn bootstrap(ledger: &mut Ledger) -> ModuleId {
        RoleRegistry::bootstrap(
            ledger,
            ModuleKind::Token,
            "coin",
            SubjectId(100),
            ImplementationId(1),
            DEPLOYER,
        )
        .expect("bootstrap")
    }

    #[test]
    fn upgrade_preserves_proxy_identity() {
        let mut ledger = Ledger::new();
        let id = bootstrap(&mut ledger);
        let before = ledger.lookup(id).expect("lookup").expect("present");

        UpgradeCoordinator::propose(&mut ledger, id, DEPLOYER, ImplementationId(2))
            .expect("propose");
        UpgradeCoordinator::execute(&mut ledger, id, DEPLOYER).expect("execute");

        let after = ledger.lookup(id).expect("lookup").expect("present");
        assert_eq!(before.proxy, after.proxy);
        assert_ne!(before.implementation, after.implementation);
        assert_eq!(after.implementation, ImplementationId(2));
    }

    #[test]
    fn history_is_append_only() {
        let mut ledger = Ledger::new();
        let id = bootstrap(&mut ledger);

        for next in 2..5 {
            UpgradeCoordinator::propose(&mut ledger, id, DEPLOYER, ImplementationId(next))
                .expect("propose");
            UpgradeCoordinator::execute(&mut ledger, id, DEPLOYER).expect("execute");
        }

        let record = ledger.lookup(id).expect("lookup").expect("present");
        assert_eq!(
            record.history,
            vec![
                ImplementationId(1),
                ImplementationId(2),
                ImplementationId(3)
            ]
        );
    }

    #[test]
    fn execute_without_proposal_fails() {
        let mut ledger = Ledger::new();
        let id = bootstrap(&mut ledger);

        let result = UpgradeCoordinator::execute(&mut ledger, id, DEPLOYER);
        assert!(matches!(result, Err(GovernanceError::NoPendingUpgrade)));
    }

    #[test]
    fn double_execute_fails_second_time() {
        let mut ledger = Ledger::new();
        let id = bootstrap(&mut ledger);

        UpgradeCoordinator::propose(&mut ledger, id, DEPLOYER, ImplementationId(2))
            .expect("propose");
        UpgradeCoordinator::execute(&mut ledger, id, DEPLOYER).expect("execute");

        let result = UpgradeCoordinator::execute(&mut ledger, id, DEPLOYER);
        assert!(matches!(result, Err(GovernanceError::NoPendingUpgrade)));
    }

    #[test]
    fn reproposal_replaces_candidate() {
        let mut ledger = Ledger::new();
        let id = bootstrap(&mut ledger);

        UpgradeCoordinator::propose(&mut ledger, id, DEPLOYER, ImplementationId(2))
            .expect("propose");
        UpgradeCoordinator::propose(&mut ledger, id, DEPLOYER, ImplementationId(3))
            .expect("repropose");
        UpgradeCoordinator::execute(&mut ledger, id, DEPLOYER).expect("execute");

        let record = ledger.lookup(id).expect("lookup").expect("present");
        assert_eq!(record.implementation, ImplementationId(3));
    }

    #[test]
    fn propose_requires_upgrader() {
        let mut ledger = Ledger::new();
        let id = bootstrap(&mut ledger);

        let result = UpgradeCoordinator::propose(&mut ledger, id, OUTSIDER, ImplementationId(2));
        assert!(matches!(result, Err(GovernanceError::Unauthorized)));
    }

    #[test]
    fn owner_upgrades_ownable_modules() {
        let mut ledger = Ledger::new();
        let id = RoleRegistry::bootstrap(
            &mut ledger,
            ModuleKind::Collectible,
            "seed",
            SubjectId(300),
            ImplementationId(1),
            DEPLOYER,
        )
        .expect("bootstrap");

        UpgradeCoordinator::propose(&mut ledger, id, DEPLOYER, ImplementationId(2))
            .expect("propose");
        let new = UpgradeCoordinator::execute(&mut ledger, id, DEPLOYER).expect("execute");
        assert_eq!(new, ImplementationId(2));

        assert!(matches!(
            UpgradeCoordinator::propose(&mut ledger, id, OUTSIDER, ImplementationId(3)),
            Err(GovernanceError::Unauthorized)
        ));
    }

    #[test]
    fn verification_failure_does_not_roll_back() {
        let mut ledger = Ledger::new();
        let id = bootstrap(&mut ledger);
        let mut verifier = ArtifactVerifier::new();
        verifier.register(ImplementationId(1), 0xBEEF);

        UpgradeCoordinator::propose(&mut ledger, id, DEPLOYER, ImplementationId(2))
            .expect("propose");
        let new = UpgradeCoordinator::execute(&mut ledger, id, DEPLOYER).expect("execute");

        // Unknown artifact: verification fails, state stays upgraded.
        assert!(verifier.verify(new).is_err());
        let record = ledger.lookup(id).expect("lookup").expect("present");
        assert_eq!(record.implementation, ImplementationId(2));
        assert_eq!(record.upgrade, UpgradeState::Stable);
    }

    #[test]
    fn known_artifact_verifies() {
        let mut verifier = ArtifactVerifier::new();
        verifier.register(ImplementationId(7), 0xC0FFEE);

        assert!(verifier.verify(ImplementationId(7)).is_ok());
        assert_eq!(
            verifier.expected_checksum(ImplementationId(7)),
            Some(0xC0FFEE)
        );
    }
}
