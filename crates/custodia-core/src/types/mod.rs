//! # Core Type Definitions
//!
//! This module contains all core types for the Custodia governance engine:
//! - External and internal identifiers (`SubjectId`, `ModuleId`, `ImplementationId`)
//! - The fixed role vocabulary (`Role`) and module taxonomy (`ModuleKind`)
//! - Per-module control models (`Control`) and upgrade state (`UpgradeState`)
//! - Error types (`GovernanceError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Carry no clocks or randomness

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Opaque identity of an external actor: a signer key, a governance
/// multisig, or a deployed module acting through its proxy identity.
///
/// Subjects have no internal structure beyond equality and ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubjectId(pub u64);

impl SubjectId {
    /// The null subject. Never a valid owner or grantee.
    pub const NULL: SubjectId = SubjectId(0);

    /// Check whether this is the null subject.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Internal handle for a governed module within the ledger.
///
/// The *external* stable reference to a module is its proxy identity
/// (a [`SubjectId`]); `ModuleId` is the ledger-internal key, assigned
/// at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub u64);

/// Identity of the implementation currently bound behind a proxy identity.
///
/// Swapped on upgrade while the proxy identity stays fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImplementationId(pub u64);

// =============================================================================
// ROLES
// =============================================================================

/// The fixed role vocabulary.
///
/// Roles are module-scoped: holding `Operator` on one module says nothing
/// about any other module. Which roles a module recognizes is determined
/// by its [`ModuleKind`] role table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Operator,
    Pauser,
    Upgrader,
    Minter,
    Banker,
    Staff,
    Withdraw,
    UriSetter,
    Remuneration,
    /// Timelock-only: may queue proposals.
    Proposer,
    /// Timelock-only: may execute matured proposals.
    Executor,
    /// Timelock-only: administers the timelock's own role set.
    TimelockAdmin,
}

impl Role {
    /// Canonical uppercase name, matching the on-chain role identifiers.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Operator => "OPERATOR",
            Role::Pauser => "PAUSER",
            Role::Upgrader => "UPGRADER",
            Role::Minter => "MINTER",
            Role::Banker => "BANKER",
            Role::Staff => "STAFF",
            Role::Withdraw => "WITHDRAW",
            Role::UriSetter => "URI_SETTER",
            Role::Remuneration => "REMUNERATION",
            Role::Proposer => "PROPOSER",
            Role::Executor => "EXECUTOR",
            Role::TimelockAdmin => "TIMELOCK_ADMIN",
        }
    }

    /// Parse a role from its canonical name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Role> {
        let normalized = s.trim().to_ascii_uppercase();
        ALL_ROLES
            .iter()
            .copied()
            .find(|role| role.name() == normalized)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// All roles, in declaration order. Used for parsing and exhaustive checks.
pub const ALL_ROLES: [Role; 13] = [
    Role::Admin,
    Role::Operator,
    Role::Pauser,
    Role::Upgrader,
    Role::Minter,
    Role::Banker,
    Role::Staff,
    Role::Withdraw,
    Role::UriSetter,
    Role::Remuneration,
    Role::Proposer,
    Role::Executor,
    Role::TimelockAdmin,
];

// =============================================================================
// MODULE KINDS
// =============================================================================

/// The taxonomy of deployable governed units.
///
/// Every kind carries a fixed default role table; `Collectible` is the one
/// ownable kind (single owner, no RBAC). Tables can be narrowed per
/// environment through `GovernanceConfig`, never widened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    /// Fungible token.
    Token,
    /// Non-fungible collectible; ownable rather than role-managed.
    Collectible,
    /// Balance-holding safe / internal accounts.
    Treasury,
    /// Rate-limited token dispenser.
    Faucet,
    /// Purchase/mint storefront.
    Storefront,
    /// Ecosystem application registry.
    Registry,
    /// Token vesting pool.
    VestingPool,
    /// Delay-enforcing proposal gate.
    Timelock,
}

impl ModuleKind {
    /// The default role table for this kind.
    ///
    /// Empty for ownable kinds.
    #[must_use]
    pub const fn role_table(self) -> &'static [Role] {
        match self {
            ModuleKind::Token => &[Role::Admin, Role::Minter, Role::Pauser, Role::Upgrader],
            ModuleKind::Collectible => &[],
            ModuleKind::Treasury | ModuleKind::Registry => {
                &[Role::Admin, Role::Operator, Role::Pauser, Role::Upgrader]
            }
            ModuleKind::Faucet => &[
                Role::Admin,
                Role::Operator,
                Role::Banker,
                Role::Pauser,
                Role::Upgrader,
            ],
            ModuleKind::Storefront => &[
                Role::Admin,
                Role::Operator,
                Role::Banker,
                Role::Staff,
                Role::Pauser,
                Role::Upgrader,
            ],
            ModuleKind::VestingPool => &[
                Role::Admin,
                Role::Operator,
                Role::Withdraw,
                Role::Remuneration,
                Role::Pauser,
                Role::Upgrader,
            ],
            ModuleKind::Timelock => &[Role::TimelockAdmin, Role::Proposer, Role::Executor],
        }
    }

    /// The role that administers grants and revocations on this kind.
    #[must_use]
    pub const fn admin_role(self) -> Role {
        match self {
            ModuleKind::Timelock => Role::TimelockAdmin,
            _ => Role::Admin,
        }
    }

    /// Whether modules of this kind use single-owner control instead of RBAC.
    #[must_use]
    pub const fn is_ownable(self) -> bool {
        matches!(self, ModuleKind::Collectible)
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ModuleKind::Token => "token",
            ModuleKind::Collectible => "collectible",
            ModuleKind::Treasury => "treasury",
            ModuleKind::Faucet => "faucet",
            ModuleKind::Storefront => "storefront",
            ModuleKind::Registry => "registry",
            ModuleKind::VestingPool => "vesting-pool",
            ModuleKind::Timelock => "timelock",
        }
    }

    /// Parse a kind from its canonical name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<ModuleKind> {
        let normalized = s.trim().to_ascii_lowercase();
        ALL_KINDS
            .iter()
            .copied()
            .find(|kind| kind.name() == normalized)
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// All module kinds, in declaration order.
pub const ALL_KINDS: [ModuleKind; 8] = [
    ModuleKind::Token,
    ModuleKind::Collectible,
    ModuleKind::Treasury,
    ModuleKind::Faucet,
    ModuleKind::Storefront,
    ModuleKind::Registry,
    ModuleKind::VestingPool,
    ModuleKind::Timelock,
];

// =============================================================================
// CONTROL MODEL
// =============================================================================

/// How a module is controlled: a role-grant relation, or a single owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    /// Role-based access control. The grant set is the (Role, Subject)
    /// relation; iteration order is deterministic.
    Rbac {
        grants: BTreeSet<(Role, SubjectId)>,
    },
    /// Single-owner control, transferable in one atomic step.
    Owned { owner: SubjectId },
}

impl Control {
    /// Check whether `subject` holds `role` under this control model.
    ///
    /// Always false for owned modules; ownership is not a role.
    #[must_use]
    pub fn holds(&self, role: Role, subject: SubjectId) -> bool {
        match self {
            Control::Rbac { grants } => grants.contains(&(role, subject)),
            Control::Owned { .. } => false,
        }
    }

    /// Count the holders of `role`.
    #[must_use]
    pub fn holder_count(&self, role: Role) -> usize {
        match self {
            Control::Rbac { grants } => grants.iter().filter(|(r, _)| *r == role).count(),
            Control::Owned { .. } => 0,
        }
    }
}

// =============================================================================
// UPGRADE STATE
// =============================================================================

/// Per-module upgrade state machine.
///
/// `Stable` is both initial and terminal: executing a pending upgrade
/// returns to `Stable` with a new implementation pointer. There is no
/// timeout; a pending candidate is replaced only by a newer proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UpgradeState {
    /// No upgrade in flight.
    #[default]
    Stable,
    /// A candidate implementation awaits execution.
    Pending(ImplementationId),
}

impl UpgradeState {
    /// Check whether an upgrade is in flight.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, UpgradeState::Pending(_))
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Custodia governance engine.
///
/// - No silent failures
/// - Use `Result<T, GovernanceError>` for fallible operations
/// - The engine never panics; all errors must be recoverable
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// The caller lacks the role or ownership required for the operation.
    #[error("caller is not authorized")]
    Unauthorized,

    /// Pause requested on a module that is already paused.
    #[error("module is already paused")]
    AlreadyPaused,

    /// Unpause requested on a module that is not paused.
    #[error("module is not paused")]
    NotPaused,

    /// A guarded business-layer action was attempted on a paused module.
    #[error("module is paused")]
    ModulePaused,

    /// The null subject was supplied where a real identity is required
    /// (new owner, proxy identity, deployer, governance authority).
    #[error("null subject where a real identity is required")]
    InvalidOwner,

    /// Upgrade execution requested with no candidate proposed.
    #[error("no pending upgrade")]
    NoPendingUpgrade,

    /// A deployment step failed; earlier steps persist, later steps were
    /// never issued. The run can be resumed from `step`.
    #[error("deployment aborted at step {step}: {reason}")]
    SequenceAborted { step: usize, reason: String },

    /// The requested module does not exist in the ledger.
    #[error("module not found: {0:?}")]
    ModuleNotFound(ModuleId),

    /// A module with this proxy identity is already registered.
    #[error("proxy identity already registered: {0:?}")]
    ModuleExists(SubjectId),

    /// No module is registered behind this proxy identity.
    #[error("no module registered for proxy identity {0:?}")]
    UnknownProxy(SubjectId),

    /// The role is not in the module kind's role table.
    #[error("role {role} is not in the {kind} role table")]
    InvalidRole { role: Role, kind: ModuleKind },

    /// The revocation would leave the module with zero admin-role holders.
    #[error("revocation would leave the module without an admin")]
    LastAdmin,

    /// Module label is empty or exceeds the length bound.
    #[error("invalid module label")]
    InvalidLabel,

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_subject_is_null() {
        assert!(SubjectId::NULL.is_null());
        assert!(!SubjectId(7).is_null());
    }

    #[test]
    fn role_names_round_trip() {
        for role in ALL_ROLES {
            assert_eq!(Role::parse(role.name()), Some(role));
        }
        assert_eq!(Role::parse("uri_setter"), Some(Role::UriSetter));
        assert_eq!(Role::parse("no-such-role"), None);
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in ALL_KINDS {
            assert_eq!(ModuleKind::parse(kind.name()), Some(kind));
        }
        assert_eq!(
            ModuleKind::parse("Vesting-Pool"),
            Some(ModuleKind::VestingPool)
        );
        assert_eq!(ModuleKind::parse("oracle"), None);
    }

    #[test]
    fn every_rbac_kind_has_its_admin_role_in_table() {
        for kind in ALL_KINDS {
            if kind.is_ownable() {
                assert!(kind.role_table().is_empty());
            } else {
                assert!(kind.role_table().contains(&kind.admin_role()));
            }
        }
    }

    #[test]
    fn timelock_admin_differs_from_default_admin() {
        assert_eq!(ModuleKind::Timelock.admin_role(), Role::TimelockAdmin);
        assert_eq!(ModuleKind::Faucet.admin_role(), Role::Admin);
    }

    #[test]
    fn control_holds_and_counts() {
        let mut grants = BTreeSet::new();
        grants.insert((Role::Admin, SubjectId(1)));
        grants.insert((Role::Admin, SubjectId(2)));
        grants.insert((Role::Pauser, SubjectId(1)));
        let control = Control::Rbac { grants };

        assert!(control.holds(Role::Admin, SubjectId(1)));
        assert!(!control.holds(Role::Pauser, SubjectId(2)));
        assert_eq!(control.holder_count(Role::Admin), 2);
        assert_eq!(control.holder_count(Role::Upgrader), 0);

        let owned = Control::Owned {
            owner: SubjectId(9),
        };
        assert!(!owned.holds(Role::Admin, SubjectId(9)));
    }

    #[test]
    fn upgrade_state_default_is_stable() {
        assert_eq!(UpgradeState::default(), UpgradeState::Stable);
        assert!(UpgradeState::Pending(ImplementationId(3)).is_pending());
    }
}
