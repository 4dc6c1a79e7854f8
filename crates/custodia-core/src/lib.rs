//! # custodia-core
//!
//! The deterministic governance engine for Custodia - THE LOGIC.
//!
//! This crate models the access-control and upgrade-governance state
//! machine that every governed module follows: who may act, when, and
//! how control is handed from a deployer key to a long-term governance
//! authority. It is the off-chain reference against which deployment
//! plans are validated and on-chain role state is mirrored and audited.
//!
//! ## Architectural Constraints
//!
//! The engine:
//! - Is the ONLY place where governance state exists (stateful)
//! - Is closed: no external logic may be injected
//! - Rejects unauthorized or out-of-order calls; it does not schedule
//! - Has NO async, NO network dependencies, NO clocks (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod audit;
pub mod config;
pub mod export;
pub mod formats;
pub mod ledger;
pub mod orchestrator;
pub mod ownership;
pub mod pause;
pub mod primitives;
pub mod registry;
pub mod session;
pub mod storage;
pub mod types;
pub mod upgrade;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ALL_KINDS, ALL_ROLES, Control, GovernanceError, ImplementationId, ModuleId, ModuleKind,
    Role, SubjectId, UpgradeState,
};

// =============================================================================
// RE-EXPORTS: Governance Engine
// =============================================================================

pub use audit::{AuditAction, AuditEvent};
pub use config::GovernanceConfig;
pub use export::{
    CanonicalHeader, CanonicalLedger, canonical_checksum, export_canonical, import_canonical,
    verify_canonical,
};
pub use ledger::{Ledger, LedgerMetrics, LedgerStore, ModuleRecord, SerializableLedger};
pub use orchestrator::{ConfirmedStep, DeployPlan, DeployStep, DeploymentRun, TimelockWiring};
pub use ownership::OwnershipTransfer;
pub use pause::PauseGate;
pub use registry::RoleRegistry;
pub use session::{Session, StorageBackend};
pub use storage::RedbLedger;
pub use upgrade::{ArtifactVerifier, UpgradeCoordinator, Verifier, VerifyError};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, ledger_from_bytes, ledger_to_bytes};
