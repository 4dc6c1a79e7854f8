//! # Ownership Transfer
//!
//! Single-owner handoff for ownable modules. The swap is atomic: the old
//! owner loses every owner-gated capability in the same step the new
//! owner gains them, with no overlap window and no intermediate
//! multi-owner state.

use crate::audit::AuditAction;
use crate::ledger::LedgerStore;
use crate::{Control, GovernanceError, ModuleId, SubjectId};

/// Owner queries and the atomic handoff primitive.
pub struct OwnershipTransfer;

impl OwnershipTransfer {
    /// Transfer ownership of `module` to `new_owner`.
    ///
    /// Requires `caller` to be the current owner; rejects the null
    /// subject as a target. On RBAC modules there is no owner seat and
    /// every caller is unauthorized.
    pub fn transfer<S: LedgerStore>(
        store: &mut S,
        module: ModuleId,
        caller: SubjectId,
        new_owner: SubjectId,
    ) -> Result<(), GovernanceError> {
        let mut record = store
            .lookup(module)?
            .ok_or(GovernanceError::ModuleNotFound(module))?;

        let Control::Owned { owner } = &mut record.control else {
            return Err(GovernanceError::Unauthorized);
        };
        if *owner != caller {
            return Err(GovernanceError::Unauthorized);
        }
        if new_owner.is_null() {
            return Err(GovernanceError::InvalidOwner);
        }

        let previous = *owner;
        *owner = new_owner;
        store.append_event(
            record.proxy,
            caller,
            AuditAction::OwnershipTransferred {
                previous,
                new: new_owner,
            },
        )?;
        store.put_module(record)
    }

    /// The current owner, if the module is ownable.
    pub fn owner_of<S: LedgerStore>(
        store: &S,
        module: ModuleId,
    ) -> Result<Option<SubjectId>, GovernanceError> {
        let record = store
            .lookup(module)?
            .ok_or(GovernanceError::ModuleNotFound(module))?;
        Ok(match record.control {
            Control::Owned { owner } => Some(owner),
            Control::Rbac { .. } => None,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
