//! # Role Registry
//!
//! Grant, revoke, and query the module-scoped (Role, Subject) relation.
//!
//! Two paths mutate the relation:
//! - the one-time bootstrap at module creation, which hands the deployer
//!   the module's full role table (owner seat for ownable kinds), exactly
//!   as the governed units' initializers do;
//! - admin-gated grant/revoke thereafter.
//!
//! Both grant and revoke are idempotent, which is what makes aborted
//! deployment sequences safe to retry. A revoke that would leave a module
//! with zero holders of its admin role is rejected outright: the safe
//! handoff ordering is grant-the-new-authority-first, and the registry
//! does not allow any call sequence that creates an unadministrable
//! module.

use crate::audit::AuditAction;
use crate::ledger::LedgerStore;
use crate::primitives::MAX_LABEL_LENGTH;
use crate::{
    Control, GovernanceError, ImplementationId, ModuleId, ModuleKind, Role, SubjectId,
};

/// The RoleRegistry consolidates all role-relation mutations.
///
/// Stateless: every operation runs against a [`LedgerStore`] and appends
/// audit events for actual state transitions only.
pub struct RoleRegistry;

impl RoleRegistry {
    // =========================================================================
    // BOOTSTRAP
    // =========================================================================

    /// Create a module and run the privileged one-time bootstrap path.
    ///
    /// For RBAC kinds the deployer receives every role in the kind's
    /// table; a timelock additionally grants its own proxy identity the
    /// `TimelockAdmin` role, so the deployer can later renounce without
    /// leaving the module unadministrable. For ownable kinds the deployer
    /// becomes the owner.
    pub fn bootstrap<S: LedgerStore>(
        store: &mut S,
        kind: ModuleKind,
        label: &str,
        proxy: SubjectId,
        implementation: ImplementationId,
        deployer: SubjectId,
    ) -> Result<ModuleId, GovernanceError> {
        if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
            return Err(GovernanceError::InvalidLabel);
        }
        if proxy.is_null() || deployer.is_null() {
            return Err(GovernanceError::InvalidOwner);
        }

        let id = store.create_module(kind, label.to_string(), proxy, implementation)?;
        let mut record = store
            .lookup(id)?
            .ok_or(GovernanceError::ModuleNotFound(id))?;

        store.append_event(
            proxy,
            deployer,
            AuditAction::ModuleCreated {
                kind,
                implementation,
            },
        )?;

        match &mut record.control {
            Control::Owned { owner } => {
                *owner = deployer;
                store.append_event(
                    proxy,
                    deployer,
                    AuditAction::OwnershipTransferred {
                        previous: SubjectId::NULL,
                        new: deployer,
                    },
                )?;
            }
            Control::Rbac { grants } => {
                for &role in kind.role_table() {
                    if grants.insert((role, deployer)) {
                        store.append_event(
                            proxy,
                            deployer,
                            AuditAction::RoleGranted {
                                role,
                                subject: deployer,
                            },
                        )?;
                    }
                }
                // A timelock administers itself once the deployer steps back.
                if kind == ModuleKind::Timelock && grants.insert((Role::TimelockAdmin, proxy)) {
                    store.append_event(
                        proxy,
                        deployer,
                        AuditAction::RoleGranted {
                            role: Role::TimelockAdmin,
                            subject: proxy,
                        },
                    )?;
                }
            }
        }

        store.put_module(record)?;
        Ok(id)
    }

    // =========================================================================
    // GRANT / REVOKE
    // =========================================================================

    /// Grant `role` on `module` to `subject`.
    ///
    /// Requires `caller` to hold the module's admin role. Granting an
    /// already-granted role is a no-op returning success, with no audit
    /// event emitted.
    pub fn grant<S: LedgerStore>(
        store: &mut S,
        module: ModuleId,
        caller: SubjectId,
        role: Role,
        subject: SubjectId,
    ) -> Result<(), GovernanceError> {
        let mut record = store
            .lookup(module)?
            .ok_or(GovernanceError::ModuleNotFound(module))?;

        Self::check_role_in_table(record.kind, role)?;
        Self::check_admin(&record, caller)?;

        let Control::Rbac { grants } = &mut record.control else {
            return Err(GovernanceError::Unauthorized);
        };

        if grants.insert((role, subject)) {
            store.append_event(record.proxy, caller, AuditAction::RoleGranted { role, subject })?;
            store.put_module(record)?;
        }
        Ok(())
    }

    /// Revoke `role` on `module` from `subject`.
    ///
    /// Requires `caller` to hold the module's admin role. Revoking an
    /// ungranted role is a no-op. Revoking the last holder of the admin
    /// role fails with `LastAdmin`.
    pub fn revoke<S: LedgerStore>(
        store: &mut S,
        module: ModuleId,
        caller: SubjectId,
        role: Role,
        subject: SubjectId,
    ) -> Result<(), GovernanceError> {
        let mut record = store
            .lookup(module)?
            .ok_or(GovernanceError::ModuleNotFound(module))?;

        Self::check_role_in_table(record.kind, role)?;
        Self::check_admin(&record, caller)?;

        let admin_role = record.kind.admin_role();
        let Control::Rbac { grants } = &mut record.control else {
            return Err(GovernanceError::Unauthorized);
        };

        if role == admin_role
            && grants.contains(&(role, subject))
            && grants.iter().filter(|(r, _)| *r == admin_role).count() == 1
        {
            return Err(GovernanceError::LastAdmin);
        }

        if grants.remove(&(role, subject)) {
            store.append_event(record.proxy, caller, AuditAction::RoleRevoked { role, subject })?;
            store.put_module(record)?;
        }
        Ok(())
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Pure query: does `subject` hold `role` on `module`?
    ///
    /// Never fails on governance grounds; an unknown module reads as no
    /// grants held. Storage errors still surface.
    pub fn has_role<S: LedgerStore>(
        store: &S,
        module: ModuleId,
        role: Role,
        subject: SubjectId,
    ) -> Result<bool, GovernanceError> {
        Ok(store
            .lookup(module)?
            .is_some_and(|record| record.control.holds(role, subject)))
    }

    // =========================================================================
    // INTERNAL CHECKS
    // =========================================================================

    fn check_role_in_table(kind: ModuleKind, role: Role) -> Result<(), GovernanceError> {
        if kind.role_table().contains(&role) {
            Ok(())
        } else {
            Err(GovernanceError::InvalidRole { role, kind })
        }
    }

    fn check_admin(
        record: &crate::ledger::ModuleRecord,
        caller: SubjectId,
    ) -> Result<(), GovernanceError> {
        if record.control.holds(record.kind.admin_role(), caller) {
            Ok(())
        } else {
            Err(GovernanceError::Unauthorized)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
