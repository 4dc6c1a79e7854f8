//! # Governance Ledger
//!
//! The shared state store behind all governance components.
//!
//! This module defines the `LedgerStore` trait and its in-memory
//! implementation. All data structures use `BTreeMap` for deterministic
//! ordering.

use crate::audit::{AuditAction, AuditEvent};
use crate::primitives::MAX_AUDIT_QUERY;
use crate::{
    Control, GovernanceError, ImplementationId, ModuleId, ModuleKind, SubjectId, UpgradeState,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// MODULE RECORD
// =============================================================================

/// The ledger's record of one governed module.
///
/// `proxy` is the stable external identity; `implementation` is the code
/// currently bound behind it. `history` is append-only: every superseded
/// implementation identity is retained for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Ledger-internal handle.
    pub id: ModuleId,
    /// What kind of unit this is; fixes the role table.
    pub kind: ModuleKind,
    /// Human-readable label, unique only by convention.
    pub label: String,
    /// Stable external identity. Never changes after creation.
    pub proxy: SubjectId,
    /// Current implementation identity.
    pub implementation: ImplementationId,
    /// Superseded implementation identities, oldest first.
    pub history: Vec<ImplementationId>,
    /// Upgrade state machine position.
    pub upgrade: UpgradeState,
    /// Circuit-breaker flag, mutated only through the pause gate.
    pub paused: bool,
    /// RBAC grant relation or single owner.
    pub control: Control,
}

impl ModuleRecord {
    /// Create a fresh record with empty control.
    ///
    /// Callers are expected to run the bootstrap grant path immediately;
    /// a record with empty control is unadministrable.
    #[must_use]
    pub fn new(
        id: ModuleId,
        kind: ModuleKind,
        label: String,
        proxy: SubjectId,
        implementation: ImplementationId,
    ) -> Self {
        let control = if kind.is_ownable() {
            Control::Owned {
                owner: SubjectId::NULL,
            }
        } else {
            Control::Rbac {
                grants: std::collections::BTreeSet::new(),
            }
        };
        Self {
            id,
            kind,
            label,
            proxy,
            implementation,
            history: Vec::new(),
            upgrade: UpgradeState::Stable,
            paused: false,
            control,
        }
    }

    /// Number of role grants currently recorded on this module.
    #[must_use]
    pub fn grant_count(&self) -> usize {
        match &self.control {
            Control::Rbac { grants } => grants.len(),
            Control::Owned { .. } => 0,
        }
    }
}

// =============================================================================
// LEDGERSTORE TRAIT
// =============================================================================

/// The LedgerStore trait defines the primitive store operations.
///
/// All fallible operations return `Result<T, GovernanceError>` to support
/// both in-memory and persistent storage backends uniformly. Semantic
/// checks (authorization, state-machine preconditions) live in the
/// component engines, not here.
pub trait LedgerStore {
    /// Register a module. Returns its new ledger handle.
    /// Fails with `ModuleExists` if the proxy identity is already taken.
    fn create_module(
        &mut self,
        kind: ModuleKind,
        label: String,
        proxy: SubjectId,
        implementation: ImplementationId,
    ) -> Result<ModuleId, GovernanceError>;

    /// Fetch a module record by handle. Returns owned data for storage
    /// compatibility.
    fn lookup(&self, id: ModuleId) -> Result<Option<ModuleRecord>, GovernanceError>;

    /// Resolve a proxy identity to its module handle. Infallible (uses an
    /// in-memory index).
    fn module_by_proxy(&self, proxy: SubjectId) -> Option<ModuleId>;

    /// Write back a modified module record.
    /// Fails with `ModuleNotFound` if the handle was never created.
    fn put_module(&mut self, record: ModuleRecord) -> Result<(), GovernanceError>;

    /// Append an audit event, assigning the next sequence number.
    fn append_event(
        &mut self,
        module: SubjectId,
        actor: SubjectId,
        action: AuditAction,
    ) -> Result<u64, GovernanceError>;

    /// Audit events with `seq > since`, capped at
    /// `min(limit, MAX_AUDIT_QUERY)`, in sequence order.
    fn events_since(&self, since: u64, limit: usize)
    -> Result<Vec<AuditEvent>, GovernanceError>;

    /// Total number of registered modules.
    fn module_count(&self) -> Result<usize, GovernanceError>;

    /// Total number of audit events ever appended.
    fn event_count(&self) -> Result<u64, GovernanceError>;

    /// All module records in handle order.
    fn modules(&self) -> Result<Vec<ModuleRecord>, GovernanceError>;
}

// =============================================================================
// IN-MEMORY LEDGER
// =============================================================================

/// The in-memory ledger.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
/// No `HashMap` allowed.
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Module storage: ModuleId -> ModuleRecord
    modules: BTreeMap<ModuleId, ModuleRecord>,

    /// Reverse lookup: proxy SubjectId -> ModuleId
    proxy_index: BTreeMap<SubjectId, ModuleId>,

    /// Append-only audit log.
    events: Vec<AuditEvent>,

    /// Next available ModuleId. Handle 0 is never assigned.
    next_module_id: u64,

    /// Next audit sequence number. Seq 0 is never assigned, so
    /// `events_since(0, ..)` returns everything.
    next_seq: u64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            modules: BTreeMap::new(),
            proxy_index: BTreeMap::new(),
            events: Vec::new(),
            next_module_id: 1,
            next_seq: 1,
        }
    }
}

impl Ledger {
    /// Create a new empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All module records in deterministic handle order.
    pub fn iter_modules(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.modules.values()
    }

    /// The full audit log, oldest first.
    #[must_use]
    pub fn audit_log(&self) -> &[AuditEvent] {
        &self.events
    }

    /// The next module handle that would be assigned.
    #[must_use]
    pub fn next_module_id(&self) -> u64 {
        self.next_module_id
    }

    /// The next audit sequence number that would be assigned.
    #[must_use]
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }
}

impl LedgerStore for Ledger {
    fn create_module(
        &mut self,
        kind: ModuleKind,
        label: String,
        proxy: SubjectId,
        implementation: ImplementationId,
    ) -> Result<ModuleId, GovernanceError> {
        if self.proxy_index.contains_key(&proxy) {
            return Err(GovernanceError::ModuleExists(proxy));
        }

        let id = ModuleId(self.next_module_id);
        self.next_module_id = self.next_module_id.saturating_add(1);

        let record = ModuleRecord::new(id, kind, label, proxy, implementation);
        self.modules.insert(id, record);
        self.proxy_index.insert(proxy, id);

        Ok(id)
    }

    fn lookup(&self, id: ModuleId) -> Result<Option<ModuleRecord>, GovernanceError> {
        Ok(self.modules.get(&id).cloned())
    }

    fn module_by_proxy(&self, proxy: SubjectId) -> Option<ModuleId> {
        self.proxy_index.get(&proxy).copied()
    }

    fn put_module(&mut self, record: ModuleRecord) -> Result<(), GovernanceError> {
        if !self.modules.contains_key(&record.id) {
            return Err(GovernanceError::ModuleNotFound(record.id));
        }
        self.modules.insert(record.id, record);
        Ok(())
    }

    fn append_event(
        &mut self,
        module: SubjectId,
        actor: SubjectId,
        action: AuditAction,
    ) -> Result<u64, GovernanceError> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        self.events.push(AuditEvent {
            seq,
            module,
            actor,
            action,
        });
        Ok(seq)
    }

    fn events_since(
        &self,
        since: u64,
        limit: usize,
    ) -> Result<Vec<AuditEvent>, GovernanceError> {
        let cap = limit.min(MAX_AUDIT_QUERY);
        Ok(self
            .events
            .iter()
            .filter(|e| e.seq > since)
            .take(cap)
            .cloned()
            .collect())
    }

    fn module_count(&self) -> Result<usize, GovernanceError> {
        Ok(self.modules.len())
    }

    fn event_count(&self) -> Result<u64, GovernanceError> {
        Ok(self.events.len() as u64)
    }

    fn modules(&self) -> Result<Vec<ModuleRecord>, GovernanceError> {
        Ok(self.modules.values().cloned().collect())
    }
}

// =============================================================================
// METRICS
// =============================================================================

/// Aggregate ledger state for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerMetrics {
    /// Total registered modules.
    pub module_count: usize,
    /// Total role grants across all modules.
    pub grant_count: usize,
    /// Modules currently paused.
    pub paused_count: usize,
    /// Modules with an upgrade in flight.
    pub pending_upgrades: usize,
    /// Total audit events appended.
    pub event_count: u64,
}

impl LedgerMetrics {
    /// Compute metrics from a module listing and the event total.
    #[must_use]
    pub fn compute(modules: &[ModuleRecord], event_count: u64) -> Self {
        Self {
            module_count: modules.len(),
            grant_count: modules.iter().map(ModuleRecord::grant_count).sum(),
            paused_count: modules.iter().filter(|m| m.paused).count(),
            pending_upgrades: modules.iter().filter(|m| m.upgrade.is_pending()).count(),
            event_count,
        }
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Serializable representation of the ledger for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableLedger {
    pub modules: Vec<ModuleRecord>,
    pub events: Vec<AuditEvent>,
    pub next_module_id: u64,
    pub next_seq: u64,
}

impl From<&Ledger> for SerializableLedger {
    fn from(ledger: &Ledger) -> Self {
        Self {
            modules: ledger.modules.values().cloned().collect(),
            events: ledger.events.clone(),
            next_module_id: ledger.next_module_id,
            next_seq: ledger.next_seq,
        }
    }
}

impl From<SerializableLedger> for Ledger {
    fn from(sl: SerializableLedger) -> Self {
        let mut ledger = Ledger {
            next_module_id: sl.next_module_id,
            next_seq: sl.next_seq,
            ..Ledger::default()
        };
        for record in sl.modules {
            ledger.proxy_index.insert(record.proxy, record.id);
            ledger.modules.insert(record.id, record);
        }
        ledger.events = sl.events;
        ledger
    }
}

// =============================================================================
// TESTS
// =============================================================================
