//! # Audit Trail
//!
//! Every mutating governance operation is observable: the ledger appends
//! an [`AuditEvent`] for each actual state transition (idempotent no-ops
//! emit nothing, so event count equals state-change count).
//!
//! Events are stamped with a ledger-assigned monotonic sequence number
//! rather than wall-clock time; the engine is deterministic and clock-free.
//! The app layer attaches wall-clock timestamps when it forwards events to
//! its structured logs.

use crate::{ImplementationId, ModuleKind, Role, SubjectId};
use serde::{Deserialize, Serialize};

// =============================================================================
// AUDIT ACTION
// =============================================================================

/// The state transition an audit event records, carrying the role or
/// field that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    /// A module was created and bootstrap-granted to its deployer.
    ModuleCreated {
        kind: ModuleKind,
        implementation: ImplementationId,
    },
    /// A role was granted to a subject.
    RoleGranted { role: Role, subject: SubjectId },
    /// A role was revoked from a subject.
    RoleRevoked { role: Role, subject: SubjectId },
    /// The module was paused.
    Paused,
    /// The module was unpaused.
    Unpaused,
    /// Single-owner control changed hands.
    OwnershipTransferred {
        previous: SubjectId,
        new: SubjectId,
    },
    /// An upgrade candidate was recorded.
    UpgradeProposed { implementation: ImplementationId },
    /// A pending upgrade was executed behind an unchanged proxy identity.
    UpgradeExecuted {
        previous: ImplementationId,
        new: ImplementationId,
    },
}

impl AuditAction {
    /// Short machine-readable label for log lines and wire output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            AuditAction::ModuleCreated { .. } => "module_created",
            AuditAction::RoleGranted { .. } => "role_granted",
            AuditAction::RoleRevoked { .. } => "role_revoked",
            AuditAction::Paused => "paused",
            AuditAction::Unpaused => "unpaused",
            AuditAction::OwnershipTransferred { .. } => "ownership_transferred",
            AuditAction::UpgradeProposed { .. } => "upgrade_proposed",
            AuditAction::UpgradeExecuted { .. } => "upgrade_executed",
        }
    }
}

// =============================================================================
// AUDIT EVENT
// =============================================================================

/// One observable governance state transition.
///
/// `module` is the proxy identity (the stable external reference), not the
/// ledger-internal handle, so external monitors can correlate events with
/// the identities third parties actually hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Monotonic sequence number assigned by the ledger.
    pub seq: u64,
    /// Proxy identity of the module the transition happened on.
    pub module: SubjectId,
    /// The subject that performed the operation.
    pub actor: SubjectId,
    /// What changed.
    pub action: AuditAction,
}

// =============================================================================
// TESTS
// =============================================================================
