//! # Session Module
//!
//! The single facade the binary talks to: a storage backend (in-memory
//! or redb) plus every governance operation, with modules addressed by
//! their proxy identity — the stable reference external callers hold.
//!
//! ## Storage Backends
//!
//! - `InMemory`: fast, volatile unless explicitly saved to a snapshot
//! - `Persistent`: `RedbLedger`, disk-backed ACID storage

use crate::audit::AuditEvent;
use crate::ledger::{Ledger, LedgerMetrics, LedgerStore, ModuleRecord, SerializableLedger};
use crate::orchestrator::{ConfirmedStep, DeploymentRun};
use crate::ownership::OwnershipTransfer;
use crate::pause::PauseGate;
use crate::registry::RoleRegistry;
use crate::storage::RedbLedger;
use crate::upgrade::UpgradeCoordinator;
use crate::{
    GovernanceError, ImplementationId, ModuleId, ModuleKind, Role, SubjectId,
};
use std::path::Path;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory ledger (fast, volatile).
    InMemory(Ledger),
    /// Disk-backed ledger using redb (ACID, persistent).
    Persistent(RedbLedger),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(Ledger::new())
    }
}

// NOTE: StorageBackend does NOT implement Clone.
// RedbLedger (database handle) cannot be safely cloned.

/// A Session wraps a storage backend with the governance operations.
#[derive(Debug, Default)]
pub struct Session {
    /// The storage backend (in-memory or persistent).
    backend: StorageBackend,
}

impl Session {
    /// Create a new empty session with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session around an existing in-memory ledger.
    #[must_use]
    pub fn with_ledger(ledger: Ledger) -> Self {
        Self {
            backend: StorageBackend::InMemory(ledger),
        }
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path. All confirmed
    /// mutations are automatically persisted to disk.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, GovernanceError> {
        let redb = RedbLedger::open(path)?;
        Ok(Self {
            backend: StorageBackend::Persistent(redb),
        })
    }

    /// Create a session around an existing RedbLedger.
    #[must_use]
    pub fn with_redb_ledger(redb: RedbLedger) -> Self {
        Self {
            backend: StorageBackend::Persistent(redb),
        }
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    /// Resolve a proxy identity to its ledger handle.
    pub fn resolve(&self, proxy: SubjectId) -> Result<ModuleId, GovernanceError> {
        let found = match &self.backend {
            StorageBackend::InMemory(ledger) => ledger.module_by_proxy(proxy),
            StorageBackend::Persistent(redb) => redb.module_by_proxy(proxy),
        };
        found.ok_or(GovernanceError::UnknownProxy(proxy))
    }

    // =========================================================================
    // MODULE LIFECYCLE
    // =========================================================================

    /// Create a module and run its bootstrap grant path.
    pub fn bootstrap(
        &mut self,
        kind: ModuleKind,
        label: &str,
        proxy: SubjectId,
        implementation: ImplementationId,
        deployer: SubjectId,
    ) -> Result<ModuleId, GovernanceError> {
        match &mut self.backend {
            StorageBackend::InMemory(ledger) => {
                RoleRegistry::bootstrap(ledger, kind, label, proxy, implementation, deployer)
            }
            StorageBackend::Persistent(redb) => {
                RoleRegistry::bootstrap(redb, kind, label, proxy, implementation, deployer)
            }
        }
    }

    /// Issue the next step of a deployment run against this session.
    pub fn advance_deployment(
        &mut self,
        run: &mut DeploymentRun,
    ) -> Result<Option<ConfirmedStep>, GovernanceError> {
        match &mut self.backend {
            StorageBackend::InMemory(ledger) => run.advance(ledger),
            StorageBackend::Persistent(redb) => run.advance(redb),
        }
    }

    // =========================================================================
    // ROLES
    // =========================================================================

    /// Grant a role, authorized by `caller`.
    pub fn grant(
        &mut self,
        proxy: SubjectId,
        caller: SubjectId,
        role: Role,
        subject: SubjectId,
    ) -> Result<(), GovernanceError> {
        let module = self.resolve(proxy)?;
        match &mut self.backend {
            StorageBackend::InMemory(ledger) => {
                RoleRegistry::grant(ledger, module, caller, role, subject)
            }
            StorageBackend::Persistent(redb) => {
                RoleRegistry::grant(redb, module, caller, role, subject)
            }
        }
    }

    /// Revoke a role, authorized by `caller`.
    pub fn revoke(
        &mut self,
        proxy: SubjectId,
        caller: SubjectId,
        role: Role,
        subject: SubjectId,
    ) -> Result<(), GovernanceError> {
        let module = self.resolve(proxy)?;
        match &mut self.backend {
            StorageBackend::InMemory(ledger) => {
                RoleRegistry::revoke(ledger, module, caller, role, subject)
            }
            StorageBackend::Persistent(redb) => {
                RoleRegistry::revoke(redb, module, caller, role, subject)
            }
        }
    }

    /// Pure query: does `subject` hold `role` on the module behind `proxy`?
    pub fn has_role(
        &self,
        proxy: SubjectId,
        role: Role,
        subject: SubjectId,
    ) -> Result<bool, GovernanceError> {
        let module = self.resolve(proxy)?;
        match &self.backend {
            StorageBackend::InMemory(ledger) => {
                RoleRegistry::has_role(ledger, module, role, subject)
            }
            StorageBackend::Persistent(redb) => {
                RoleRegistry::has_role(redb, module, role, subject)
            }
        }
    }

    // =========================================================================
    // PAUSE
    // =========================================================================

    /// Pause the module behind `proxy`.
    pub fn pause(&mut self, proxy: SubjectId, caller: SubjectId) -> Result<(), GovernanceError> {
        let module = self.resolve(proxy)?;
        match &mut self.backend {
            StorageBackend::InMemory(ledger) => PauseGate::pause(ledger, module, caller),
            StorageBackend::Persistent(redb) => PauseGate::pause(redb, module, caller),
        }
    }

    /// Unpause the module behind `proxy`.
    pub fn unpause(&mut self, proxy: SubjectId, caller: SubjectId) -> Result<(), GovernanceError> {
        let module = self.resolve(proxy)?;
        match &mut self.backend {
            StorageBackend::InMemory(ledger) => PauseGate::unpause(ledger, module, caller),
            StorageBackend::Persistent(redb) => PauseGate::unpause(redb, module, caller),
        }
    }

    /// Query the paused flag.
    pub fn is_paused(&self, proxy: SubjectId) -> Result<bool, GovernanceError> {
        let module = self.resolve(proxy)?;
        match &self.backend {
            StorageBackend::InMemory(ledger) => PauseGate::is_paused(ledger, module),
            StorageBackend::Persistent(redb) => PauseGate::is_paused(redb, module),
        }
    }

    /// The guard the business layer consults before mutating actions.
    pub fn require_active(&self, proxy: SubjectId) -> Result<(), GovernanceError> {
        let module = self.resolve(proxy)?;
        match &self.backend {
            StorageBackend::InMemory(ledger) => PauseGate::require_active(ledger, module),
            StorageBackend::Persistent(redb) => PauseGate::require_active(redb, module),
        }
    }

    // =========================================================================
    // OWNERSHIP
    // =========================================================================

    /// Transfer single-owner control.
    pub fn transfer_ownership(
        &mut self,
        proxy: SubjectId,
        caller: SubjectId,
        new_owner: SubjectId,
    ) -> Result<(), GovernanceError> {
        let module = self.resolve(proxy)?;
        match &mut self.backend {
            StorageBackend::InMemory(ledger) => {
                OwnershipTransfer::transfer(ledger, module, caller, new_owner)
            }
            StorageBackend::Persistent(redb) => {
                OwnershipTransfer::transfer(redb, module, caller, new_owner)
            }
        }
    }

    /// The current owner, if the module is ownable.
    pub fn owner_of(&self, proxy: SubjectId) -> Result<Option<SubjectId>, GovernanceError> {
        let module = self.resolve(proxy)?;
        match &self.backend {
            StorageBackend::InMemory(ledger) => OwnershipTransfer::owner_of(ledger, module),
            StorageBackend::Persistent(redb) => OwnershipTransfer::owner_of(redb, module),
        }
    }

    // =========================================================================
    // UPGRADES
    // =========================================================================

    /// Record an upgrade candidate.
    pub fn propose_upgrade(
        &mut self,
        proxy: SubjectId,
        caller: SubjectId,
        candidate: ImplementationId,
    ) -> Result<(), GovernanceError> {
        let module = self.resolve(proxy)?;
        match &mut self.backend {
            StorageBackend::InMemory(ledger) => {
                UpgradeCoordinator::propose(ledger, module, caller, candidate)
            }
            StorageBackend::Persistent(redb) => {
                UpgradeCoordinator::propose(redb, module, caller, candidate)
            }
        }
    }

    /// Execute the pending upgrade; returns the new implementation.
    pub fn execute_upgrade(
        &mut self,
        proxy: SubjectId,
        caller: SubjectId,
    ) -> Result<ImplementationId, GovernanceError> {
        let module = self.resolve(proxy)?;
        match &mut self.backend {
            StorageBackend::InMemory(ledger) => {
                UpgradeCoordinator::execute(ledger, module, caller)
            }
            StorageBackend::Persistent(redb) => UpgradeCoordinator::execute(redb, module, caller),
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// The full record of the module behind `proxy`.
    pub fn module(&self, proxy: SubjectId) -> Result<ModuleRecord, GovernanceError> {
        let module = self.resolve(proxy)?;
        let record = match &self.backend {
            StorageBackend::InMemory(ledger) => ledger.lookup(module)?,
            StorageBackend::Persistent(redb) => redb.lookup(module)?,
        };
        record.ok_or(GovernanceError::ModuleNotFound(module))
    }

    /// All module records in handle order.
    pub fn modules(&self) -> Result<Vec<ModuleRecord>, GovernanceError> {
        match &self.backend {
            StorageBackend::InMemory(ledger) => ledger.modules(),
            StorageBackend::Persistent(redb) => redb.modules(),
        }
    }

    /// Aggregate metrics for status reporting.
    pub fn metrics(&self) -> Result<LedgerMetrics, GovernanceError> {
        let modules = self.modules()?;
        let event_count = match &self.backend {
            StorageBackend::InMemory(ledger) => ledger.event_count()?,
            StorageBackend::Persistent(redb) => redb.event_count()?,
        };
        Ok(LedgerMetrics::compute(&modules, event_count))
    }

    /// Audit events with `seq > since`, capped at `limit`.
    pub fn audit(&self, since: u64, limit: usize) -> Result<Vec<AuditEvent>, GovernanceError> {
        match &self.backend {
            StorageBackend::InMemory(ledger) => ledger.events_since(since, limit),
            StorageBackend::Persistent(redb) => redb.events_since(since, limit),
        }
    }

    // =========================================================================
    // EXPORT SUPPORT
    // =========================================================================

    /// Build an in-memory ledger snapshot for export purposes.
    ///
    /// - For in-memory backends: clones the existing ledger.
    /// - For persistent backends: rebuilds a ledger from the stored
    ///   modules, audit log, and counters.
    pub fn export_snapshot(&self) -> Result<Ledger, GovernanceError> {
        match &self.backend {
            StorageBackend::InMemory(ledger) => Ok(ledger.clone()),
            StorageBackend::Persistent(redb) => {
                let snapshot = SerializableLedger {
                    modules: redb.modules()?,
                    events: redb.audit_log()?,
                    next_module_id: redb.next_module_id(),
                    next_seq: redb.next_seq(),
                };
                Ok(Ledger::from(snapshot))
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const DEPLOYER: SubjectId = SubjectId(1);
    const GOVERNANCE: SubjectId = SubjectId(2);
    const PROXY: SubjectId = SubjectId(100);

    fn bootstrapped_session() -> Session {
        let mut session = Session::new();
        session
            .bootstrap(
                ModuleKind::Faucet,
                "faucet",
                PROXY,
                ImplementationId(1),
                DEPLOYER,
            )
            .expect("bootstrap");
        session
    }

    #[test]
    fn operations_address_modules_by_proxy() {
        let mut session = bootstrapped_session();

        session
            .grant(PROXY, DEPLOYER, Role::Banker, GOVERNANCE)
            .expect("grant");
        assert!(session.has_role(PROXY, Role::Banker, GOVERNANCE).expect("query"));

        session.pause(PROXY, DEPLOYER).expect("pause");
        assert!(session.is_paused(PROXY).expect("query"));
        assert!(matches!(
            session.require_active(PROXY),
            Err(GovernanceError::ModulePaused)
        ));
    }

    #[test]
    fn unknown_proxy_is_an_error() {
        let session = Session::new();
        assert!(matches!(
            session.has_role(SubjectId(5), Role::Admin, DEPLOYER),
            Err(GovernanceError::UnknownProxy(_))
        ));
    }

    #[test]
    fn upgrade_round_trip_through_session() {
        let mut session = bootstrapped_session();

        session
            .propose_upgrade(PROXY, DEPLOYER, ImplementationId(2))
            .expect("propose");
        let new = session.execute_upgrade(PROXY, DEPLOYER).expect("execute");
        assert_eq!(new, ImplementationId(2));

        let record = session.module(PROXY).expect("module");
        assert_eq!(record.proxy, PROXY);
        assert_eq!(record.history, vec![ImplementationId(1)]);
    }

    #[test]
    fn metrics_and_audit_reflect_activity() {
        let mut session = bootstrapped_session();
        session.pause(PROXY, DEPLOYER).expect("pause");

        let metrics = session.metrics().expect("metrics");
        assert_eq!(metrics.module_count, 1);
        assert_eq!(metrics.paused_count, 1);
        assert!(metrics.event_count > 0);

        let events = session.audit(0, 100).expect("audit");
        assert_eq!(events.len() as u64, metrics.event_count);
    }

    #[test]
    fn snapshot_matches_in_memory_state() {
        let session = bootstrapped_session();
        let snapshot = session.export_snapshot().expect("snapshot");
        assert_eq!(snapshot.module_count().expect("count"), 1);
        assert!(snapshot.module_by_proxy(PROXY).is_some());
    }
}
