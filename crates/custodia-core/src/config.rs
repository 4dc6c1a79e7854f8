//! # Governance Configuration
//!
//! The per-environment inputs to orchestration: the well-known subjects
//! (deployer key, governance multisig/DAO, any named extras) and optional
//! per-kind role-table narrowing.
//!
//! This is injected configuration, not global state: the core only
//! defines the types and validation. The binary loads one file per
//! environment (development, staging, ...) in TOML form, for example:
//!
//! ```toml
//! deployer = 0xA11CE
//! governance = 0xDA0
//!
//! [subjects]
//! fee-collector = 0xFEE
//!
//! [role_overrides]
//! treasury = ["ADMIN", "PAUSER", "UPGRADER"]
//! ```

use crate::{GovernanceError, ModuleKind, Role, SubjectId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// GOVERNANCE CONFIG
// =============================================================================

/// Well-known subjects and role-table overrides for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// The key that performs deployments and is stripped of every role at
    /// the end of each orchestration.
    pub deployer: SubjectId,

    /// The long-term authority (multisig / DAO) control is handed to.
    pub governance: SubjectId,

    /// Named extras (fee collectors, pool addresses, ...). Purely
    /// informational to the core; the binary resolves names from here.
    #[serde(default)]
    pub subjects: BTreeMap<String, SubjectId>,

    /// Per-kind narrowing of the default role tables. An override must be
    /// a subset of the kind's table and keep the kind's admin role.
    #[serde(default)]
    pub role_overrides: BTreeMap<ModuleKind, Vec<Role>>,
}

impl GovernanceConfig {
    /// A minimal config with just the two required subjects.
    #[must_use]
    pub fn new(deployer: SubjectId, governance: SubjectId) -> Self {
        Self {
            deployer,
            governance,
            subjects: BTreeMap::new(),
            role_overrides: BTreeMap::new(),
        }
    }

    /// The effective role table for `kind`: the override if present,
    /// otherwise the kind's default table.
    #[must_use]
    pub fn effective_roles(&self, kind: ModuleKind) -> Vec<Role> {
        self.role_overrides
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| kind.role_table().to_vec())
    }

    /// Validate subjects and overrides.
    ///
    /// Rejects null subjects, a deployer that doubles as governance (the
    /// whole point of orchestration is to separate them), overrides with
    /// roles outside the kind's table, and overrides that drop the
    /// kind's admin role.
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.deployer.is_null() || self.governance.is_null() {
            return Err(GovernanceError::InvalidOwner);
        }
        if self.deployer == self.governance {
            return Err(GovernanceError::InvalidOwner);
        }
        for (&kind, roles) in &self.role_overrides {
            let table = kind.role_table();
            for &role in roles {
                if !table.contains(&role) {
                    return Err(GovernanceError::InvalidRole { role, kind });
                }
            }
            if !kind.is_ownable() && !roles.contains(&kind.admin_role()) {
                return Err(GovernanceError::InvalidRole {
                    role: kind.admin_role(),
                    kind,
                });
            }
        }
        Ok(())
    }

    /// Look up a named extra subject.
    #[must_use]
    pub fn subject(&self, name: &str) -> Option<SubjectId> {
        self.subjects.get(name).copied()
    }
}

// =============================================================================
// TESTS
// =============================================================================
