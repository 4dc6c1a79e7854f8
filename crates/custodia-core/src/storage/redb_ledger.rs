//! # redb-backed Ledger Storage
//!
//! A disk-backed governance ledger using the redb embedded database:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//! - Zero configuration
//!
//! ## Integration with Session
//!
//! `RedbLedger` is the persistent storage backend for sessions. Unlike
//! the in-memory `Ledger`, every confirmed mutation survives process
//! restarts — which is what makes aborted deployment runs resumable
//! across operator sessions.

use crate::audit::{AuditAction, AuditEvent};
use crate::ledger::{LedgerStore, ModuleRecord};
use crate::primitives::MAX_AUDIT_QUERY;
use crate::{GovernanceError, ImplementationId, ModuleId, ModuleKind, SubjectId};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::BTreeMap;
use std::path::Path;

/// Table for modules: ModuleId(u64) -> serialized ModuleRecord bytes
const MODULES: TableDefinition<u64, &[u8]> = TableDefinition::new("modules");

/// Table for proxy index: proxy SubjectId(u64) -> ModuleId(u64)
const PROXY_INDEX: TableDefinition<u64, u64> = TableDefinition::new("proxy_index");

/// Table for audit events: seq(u64) -> serialized AuditEvent bytes
const AUDIT: TableDefinition<u64, &[u8]> = TableDefinition::new("audit");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// A disk-backed governance ledger using redb.
///
/// Maintains an in-memory proxy index for fast lookups; the index is
/// rebuilt from the `PROXY_INDEX` table on open.
pub struct RedbLedger {
    /// The redb database handle.
    db: Database,
    /// In-memory cache of proxy -> module mapping for fast lookups.
    proxy_cache: BTreeMap<SubjectId, ModuleId>,
    /// Next available module handle.
    next_module_id: u64,
    /// Next audit sequence number.
    next_seq: u64,
}

impl std::fmt::Debug for RedbLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbLedger")
            .field("proxy_cache_size", &self.proxy_cache.len())
            .field("next_module_id", &self.next_module_id)
            .field("next_seq", &self.next_seq)
            .finish_non_exhaustive()
    }
}

impl RedbLedger {
    /// Open or create a ledger database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GovernanceError> {
        let db = Database::create(path.as_ref())
            .map_err(|e| GovernanceError::IoError(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| GovernanceError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(MODULES)
                .map_err(|e| GovernanceError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(PROXY_INDEX)
                .map_err(|e| GovernanceError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(AUDIT)
                .map_err(|e| GovernanceError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(METADATA)
                .map_err(|e| GovernanceError::IoError(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| GovernanceError::IoError(e.to_string()))?;
        }

        // Load metadata
        let read_txn = db
            .begin_read()
            .map_err(|e| GovernanceError::IoError(e.to_string()))?;

        let (next_module_id, next_seq) = {
            let table = read_txn
                .open_table(METADATA)
                .map_err(|e| GovernanceError::IoError(e.to_string()))?;
            let next_module_id = table
                .get("next_module_id")
                .map_err(|e| GovernanceError::IoError(e.to_string()))?
                .map(|v| v.value())
                .unwrap_or(1);
            let next_seq = table
                .get("next_seq")
                .map_err(|e| GovernanceError::IoError(e.to_string()))?
                .map(|v| v.value())
                .unwrap_or(1);
            (next_module_id, next_seq)
        };

        // Load proxy cache
        let proxy_cache = {
            let table = read_txn
                .open_table(PROXY_INDEX)
                .map_err(|e| GovernanceError::IoError(e.to_string()))?;
            let mut cache = BTreeMap::new();
            for entry in table
                .iter()
                .map_err(|e| GovernanceError::IoError(e.to_string()))?
            {
                let (key, value) = entry.map_err(|e| GovernanceError::IoError(e.to_string()))?;
                cache.insert(SubjectId(key.value()), ModuleId(value.value()));
            }
            cache
        };

        Ok(Self {
            db,
            proxy_cache,
            next_module_id,
            next_seq,
        })
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), GovernanceError> {
        self.db
            .compact()
            .map_err(|e| GovernanceError::IoError(e.to_string()))?;
        Ok(())
    }

    /// The full audit log, oldest first.
    pub fn audit_log(&self) -> Result<Vec<AuditEvent>, GovernanceError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| GovernanceError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(AUDIT)
            .map_err(|e| GovernanceError::IoError(e.to_string()))?;

        let mut events = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| GovernanceError::IoError(e.to_string()))?
        {
            let (_, value) = entry.map_err(|e| GovernanceError::IoError(e.to_string()))?;
            let event: AuditEvent = postcard::from_bytes(value.value())
                .map_err(|e| GovernanceError::SerializationError(e.to_string()))?;
            events.push(event);
        }
        Ok(events)
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

    fn write_record(&self, record: &ModuleRecord) -> Result<(), GovernanceError> {
        let bytes = postcard::to_allocvec(record)
            .map_err(|e| GovernanceError::SerializationError(e.to_string()))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| GovernanceError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(MODULES)
                .map_err(|e| GovernanceError::IoError(e.to_string()))?;
            table
                .insert(record.id.0, bytes.as_slice())
                .map_err(|e| GovernanceError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| GovernanceError::IoError(e.to_string()))
    }
}

// =============================================================================
// LEDGERSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl LedgerStore for RedbLedger {
    fn create_module(
        &mut self,
        kind: ModuleKind,
        label: String,
        proxy: SubjectId,
        implementation: ImplementationId,
    ) -> Result<ModuleId, GovernanceError> {
        if self.proxy_cache.contains_key(&proxy) {
            return Err(GovernanceError::ModuleExists(proxy));
        }

        let id = ModuleId(self.next_module_id);
        let next_module_id = self.next_module_id.saturating_add(1);

        let record = ModuleRecord::new(id, kind, label, proxy, implementation);
        let record_bytes = postcard::to_allocvec(&record)
            .map_err(|e| GovernanceError::SerializationError(e.to_string()))?;

        {
            let write_txn = self
                .db
                .begin_write()
                .map_err(|e| GovernanceError::IoError(e.to_string()))?;
            {
                let mut modules_table = write_txn
                    .open_table(MODULES)
                    .map_err(|e| GovernanceError::IoError(e.to_string()))?;
                modules_table
                    .insert(id.0, record_bytes.as_slice())
                    .map_err(|e| GovernanceError::IoError(e.to_string()))?;
            }
            {
                let mut proxy_table = write_txn
                    .open_table(PROXY_INDEX)
                    .map_err(|e| GovernanceError::IoError(e.to_string()))?;
                proxy_table
                    .insert(proxy.0, id.0)
                    .map_err(|e| GovernanceError::IoError(e.to_string()))?;
            }
            {
                let mut meta_table = write_txn
                    .open_table(METADATA)
                    .map_err(|e| GovernanceError::IoError(e.to_string()))?;
                meta_table
                    .insert("next_module_id", next_module_id)
                    .map_err(|e| GovernanceError::IoError(e.to_string()))?;
            }
            write_txn
                .commit()
                .map_err(|e| GovernanceError::IoError(e.to_string()))?;
        }

        // Update in-memory state only after successful commit.
        self.next_module_id = next_module_id;
        self.proxy_cache.insert(proxy, id);

        Ok(id)
    }

    fn lookup(&self, id: ModuleId) -> Result<Option<ModuleRecord>, GovernanceError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| GovernanceError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(MODULES)
            .map_err(|e| GovernanceError::IoError(e.to_string()))?;

        let Some(guard) = table
            .get(id.0)
            .map_err(|e| GovernanceError::IoError(e.to_string()))?
        else {
            return Ok(None);
        };

        let record: ModuleRecord = postcard::from_bytes(guard.value())
            .map_err(|e| GovernanceError::SerializationError(e.to_string()))?;
        Ok(Some(record))
    }

    fn module_by_proxy(&self, proxy: SubjectId) -> Option<ModuleId> {
        self.proxy_cache.get(&proxy).copied()
    }

    fn put_module(&mut self, record: ModuleRecord) -> Result<(), GovernanceError> {
        if self.lookup(record.id)?.is_none() {
            return Err(GovernanceError::ModuleNotFound(record.id));
        }
        self.write_record(&record)
    }

    fn append_event(
        &mut self,
        module: SubjectId,
        actor: SubjectId,
        action: AuditAction,
    ) -> Result<u64, GovernanceError> {
        let seq = self.next_seq;
        let next_seq = self.next_seq.saturating_add(1);

        let event = AuditEvent {
            seq,
            module,
            actor,
            action,
        };
        let event_bytes = postcard::to_allocvec(&event)
            .map_err(|e| GovernanceError::SerializationError(e.to_string()))?;

        {
            let write_txn = self
                .db
                .begin_write()
                .map_err(|e| GovernanceError::IoError(e.to_string()))?;
            {
                let mut audit_table = write_txn
                    .open_table(AUDIT)
                    .map_err(|e| GovernanceError::IoError(e.to_string()))?;
                audit_table
                    .insert(seq, event_bytes.as_slice())
                    .map_err(|e| GovernanceError::IoError(e.to_string()))?;
            }
            {
                let mut meta_table = write_txn
                    .open_table(METADATA)
                    .map_err(|e| GovernanceError::IoError(e.to_string()))?;
                meta_table
                    .insert("next_seq", next_seq)
                    .map_err(|e| GovernanceError::IoError(e.to_string()))?;
            }
            write_txn
                .commit()
                .map_err(|e| GovernanceError::IoError(e.to_string()))?;
        }

        self.next_seq = next_seq;
        Ok(seq)
    }

    fn events_since(
        &self,
        since: u64,
        limit: usize,
    ) -> Result<Vec<AuditEvent>, GovernanceError> {
        let cap = limit.min(MAX_AUDIT_QUERY);
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| GovernanceError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(AUDIT)
            .map_err(|e| GovernanceError::IoError(e.to_string()))?;

        let mut events = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| GovernanceError::IoError(e.to_string()))?
        {
            let (key, value) = entry.map_err(|e| GovernanceError::IoError(e.to_string()))?;
            if key.value() <= since {
                continue;
            }
            if events.len() >= cap {
                break;
            }
            let event: AuditEvent = postcard::from_bytes(value.value())
                .map_err(|e| GovernanceError::SerializationError(e.to_string()))?;
            events.push(event);
        }
        Ok(events)
    }

    fn module_count(&self) -> Result<usize, GovernanceError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| GovernanceError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(MODULES)
            .map_err(|e| GovernanceError::IoError(e.to_string()))?;
        Ok(table
            .len()
            .map_err(|e| GovernanceError::IoError(e.to_string()))? as usize)
    }

    fn event_count(&self) -> Result<u64, GovernanceError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| GovernanceError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(AUDIT)
            .map_err(|e| GovernanceError::IoError(e.to_string()))?;
        table
            .len()
            .map_err(|e| GovernanceError::IoError(e.to_string()))
    }

    fn modules(&self) -> Result<Vec<ModuleRecord>, GovernanceError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| GovernanceError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(MODULES)
            .map_err(|e| GovernanceError::IoError(e.to_string()))?;

        let mut records = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| GovernanceError::IoError(e.to_string()))?
        {
            let (_, value) = entry.map_err(|e| GovernanceError::IoError(e.to_string()))?;
            let record: ModuleRecord = postcard::from_bytes(value.value())
                .map_err(|e| GovernanceError::SerializationError(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RoleRegistry;
    use crate::Role;
    use tempfile::NamedTempFile;

    fn temp_ledger() -> (RedbLedger, NamedTempFile) {
        let file = NamedTempFile::new().expect("temp file");
        let ledger = RedbLedger::open(file.path()).expect("open");
        (ledger, file)
    }

    #[test]
    fn create_and_lookup_module() {
        let (mut ledger, _file) = temp_ledger();
        let id = ledger
            .create_module(
                ModuleKind::Token,
                "coin".to_string(),
                SubjectId(100),
                ImplementationId(1),
            )
            .expect("create");

        let record = ledger.lookup(id).expect("lookup").expect("present");
        assert_eq!(record.proxy, SubjectId(100));
        assert_eq!(ledger.module_by_proxy(SubjectId(100)), Some(id));
    }

    #[test]
    fn duplicate_proxy_rejected() {
        let (mut ledger, _file) = temp_ledger();
        ledger
            .create_module(
                ModuleKind::Token,
                "coin".to_string(),
                SubjectId(100),
                ImplementationId(1),
            )
            .expect("create");

        let result = ledger.create_module(
            ModuleKind::Faucet,
            "faucet".to_string(),
            SubjectId(100),
            ImplementationId(2),
        );
        assert!(matches!(result, Err(GovernanceError::ModuleExists(_))));
    }

    #[test]
    fn state_survives_reopen() {
        let file = NamedTempFile::new().expect("temp file");

        {
            let mut ledger = RedbLedger::open(file.path()).expect("open");
            RoleRegistry::bootstrap(
                &mut ledger,
                ModuleKind::Treasury,
                "treasury",
                SubjectId(100),
                ImplementationId(1),
                SubjectId(1),
            )
            .expect("bootstrap");
        }

        let reopened = RedbLedger::open(file.path()).expect("reopen");
        let id = reopened.module_by_proxy(SubjectId(100)).expect("module");
        assert!(
            RoleRegistry::has_role(&reopened, id, Role::Admin, SubjectId(1)).expect("query")
        );
        assert!(reopened.event_count().expect("count") > 0);
        assert_eq!(reopened.next_module_id(), 2);
    }

    #[test]
    fn events_since_pages_in_order() {
        let (mut ledger, _file) = temp_ledger();
        for _ in 0..4 {
            ledger
                .append_event(SubjectId(1), SubjectId(2), AuditAction::Paused)
                .expect("append");
        }

        let tail = ledger.events_since(1, 2).expect("query");
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].seq, 2);
        assert_eq!(tail[1].seq, 3);
    }

    #[test]
    fn put_module_round_trips_mutation() {
        let (mut ledger, _file) = temp_ledger();
        let id = ledger
            .create_module(
                ModuleKind::Token,
                "coin".to_string(),
                SubjectId(100),
                ImplementationId(1),
            )
            .expect("create");

        let mut record = ledger.lookup(id).expect("lookup").expect("present");
        record.paused = true;
        ledger.put_module(record).expect("put");

        let reread = ledger.lookup(id).expect("lookup").expect("present");
        assert!(reread.paused);
    }
}
