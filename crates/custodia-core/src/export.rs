//! # Canonical Export Module
//!
//! > **The "Redb Compromise":**
//! > - Runtime: the engine uses `redb` for ACID persistence.
//! > - Verification: `redb` files are NOT guaranteed bit-identical across runs.
//! > - Mandate: `export_canonical()` serializes the governance ledger to a
//! >   sorted, bit-exact `postcard` stream.
//! >   **This export is the Source of Truth for verification.**
//!
//! External monitors compare canonical exports (or their checksums) to
//! assert that two ledgers — say, an off-chain mirror and a freshly
//! replayed audit log — describe the same governance state.

use crate::audit::AuditEvent;
use crate::ledger::{Ledger, LedgerStore, ModuleRecord, SerializableLedger};
use crate::primitives::{MAX_IMPORT_EVENT_COUNT, MAX_IMPORT_MODULE_COUNT};
use crate::{
    Control, GovernanceError, ImplementationId, ModuleId, ModuleKind, Role, SubjectId,
    UpgradeState,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// CANONICAL FORMAT
// =============================================================================

/// Magic bytes for canonical export format.
pub const CANONICAL_MAGIC: [u8; 4] = *b"CSTX"; // Custodia Export

/// Current canonical format version.
pub const CANONICAL_VERSION: u8 = 1;

/// Header for canonical export files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalHeader {
    /// Magic bytes to identify the format.
    pub magic: [u8; 4],

    /// Format version for compatibility.
    pub version: u8,

    /// Number of modules in the export.
    pub module_count: u64,

    /// Number of audit events in the export.
    pub event_count: u64,

    /// Checksum of the data section (XOR-based for determinism).
    pub checksum: u64,
}

impl CanonicalHeader {
    /// Create a new header with the given counts.
    #[must_use]
    pub fn new(module_count: u64, event_count: u64, checksum: u64) -> Self {
        Self {
            magic: CANONICAL_MAGIC,
            version: CANONICAL_VERSION,
            module_count,
            event_count,
            checksum,
        }
    }

    /// Validate the header.
    ///
    /// Error messages are intentionally generic to avoid leaking format
    /// details.
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.magic != CANONICAL_MAGIC {
            return Err(GovernanceError::SerializationError(
                "Invalid file format".to_string(),
            ));
        }
        if self.version != CANONICAL_VERSION {
            return Err(GovernanceError::SerializationError(
                "Unsupported file version".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// CANONICAL MODULE (Sorted, Deterministic)
// =============================================================================

/// A module in canonical format.
///
/// Sorted by ModuleId; grants sorted by (role, subject).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct CanonicalModule {
    /// The module handle (sort key).
    pub id: u64,
    pub kind: ModuleKind,
    pub label: String,
    pub proxy: u64,
    pub implementation: u64,
    pub history: Vec<u64>,
    /// Pending upgrade candidate, if any.
    pub pending: Option<u64>,
    pub paused: bool,
    /// Owner seat for ownable kinds.
    pub owner: Option<u64>,
    /// Sorted (role, subject) grants for RBAC kinds.
    pub grants: Vec<(Role, u64)>,
}

impl From<&ModuleRecord> for CanonicalModule {
    fn from(record: &ModuleRecord) -> Self {
        let (owner, grants) = match &record.control {
            Control::Owned { owner } => (Some(owner.0), Vec::new()),
            Control::Rbac { grants } => (
                None,
                grants.iter().map(|(role, s)| (*role, s.0)).collect(),
            ),
        };
        Self {
            id: record.id.0,
            kind: record.kind,
            label: record.label.clone(),
            proxy: record.proxy.0,
            implementation: record.implementation.0,
            history: record.history.iter().map(|i| i.0).collect(),
            pending: match record.upgrade {
                UpgradeState::Pending(candidate) => Some(candidate.0),
                UpgradeState::Stable => None,
            },
            paused: record.paused,
            owner,
            grants,
        }
    }
}

impl From<&CanonicalModule> for ModuleRecord {
    fn from(cm: &CanonicalModule) -> Self {
        let control = match cm.owner {
            Some(owner) => Control::Owned {
                owner: SubjectId(owner),
            },
            None => Control::Rbac {
                grants: cm
                    .grants
                    .iter()
                    .map(|(role, s)| (*role, SubjectId(*s)))
                    .collect::<BTreeSet<_>>(),
            },
        };
        Self {
            id: ModuleId(cm.id),
            kind: cm.kind,
            label: cm.label.clone(),
            proxy: SubjectId(cm.proxy),
            implementation: ImplementationId(cm.implementation),
            history: cm.history.iter().map(|i| ImplementationId(*i)).collect(),
            upgrade: match cm.pending {
                Some(candidate) => UpgradeState::Pending(ImplementationId(candidate)),
                None => UpgradeState::Stable,
            },
            paused: cm.paused,
            control,
        }
    }
}

// =============================================================================
// CANONICAL LEDGER (Sorted, Deterministic)
// =============================================================================

/// The ledger in canonical format for bit-exact serialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalLedger {
    /// Modules sorted by handle.
    pub modules: Vec<CanonicalModule>,

    /// Audit events sorted by sequence number.
    pub events: Vec<AuditEvent>,

    /// Next module handle counter.
    pub next_module_id: u64,

    /// Next audit sequence counter.
    pub next_seq: u64,
}

impl CanonicalLedger {
    /// Create a canonical ledger from a regular ledger.
    ///
    /// This ensures deterministic ordering by sorting all elements.
    #[must_use]
    pub fn from_ledger(ledger: &Ledger) -> Self {
        let mut modules: Vec<CanonicalModule> =
            ledger.iter_modules().map(CanonicalModule::from).collect();
        modules.sort();

        let mut events = ledger.audit_log().to_vec();
        events.sort_by_key(|e| e.seq);

        Self {
            modules,
            events,
            next_module_id: ledger.next_module_id(),
            next_seq: ledger.next_seq(),
        }
    }

    /// Convert back to a regular ledger, preserving original handles.
    #[must_use]
    pub fn to_ledger(&self) -> Ledger {
        Ledger::from(SerializableLedger {
            modules: self.modules.iter().map(ModuleRecord::from).collect(),
            events: self.events.clone(),
            next_module_id: self.next_module_id,
            next_seq: self.next_seq,
        })
    }

    /// Compute a deterministic checksum of the data.
    ///
    /// XOR-based hashing: no floating point, no randomness.
    ///
    /// # Security Note
    ///
    /// This is **NOT** a cryptographic hash. It detects accidental
    /// corruption and supports quick equality checks; it does not resist
    /// intentional tampering. For security-sensitive use cases enable the
    /// `crypto-hash` feature and use [`canonical_crypto_hash`].
    #[must_use]
    pub fn checksum(&self) -> u64 {
        let mut hash: u64 = 0;

        for module in &self.modules {
            hash ^= module.id.rotate_left(13);
            hash ^= module.proxy.rotate_left(7);
            hash ^= module.implementation.rotate_left(17);
            hash ^= (module.kind as u64).rotate_left(11);
            hash ^= u64::from(module.paused).rotate_left(5);
            for byte in module.label.as_bytes() {
                hash ^= (*byte as u64).rotate_left(23);
            }
            for (i, impl_id) in module.history.iter().enumerate() {
                hash ^= impl_id.rotate_left((i as u32) % 63);
            }
            if let Some(pending) = module.pending {
                hash ^= pending.rotate_left(31);
            }
            if let Some(owner) = module.owner {
                hash ^= owner.rotate_left(37);
            }
            for (role, subject) in &module.grants {
                hash ^= (*role as u64).rotate_left(41);
                hash ^= subject.rotate_left(43);
            }
        }

        for event in &self.events {
            hash ^= event.seq.rotate_left(19);
            hash ^= event.module.0.rotate_left(29);
            hash ^= event.actor.0.rotate_left(47);
        }

        hash ^= self.next_module_id.rotate_left(3);
        hash ^= self.next_seq.rotate_left(53);

        hash
    }
}

// =============================================================================
// EXPORT FUNCTIONS
// =============================================================================

/// Export a ledger to canonical postcard format.
///
/// Format:
/// ```text
/// [header_len: u32] [CanonicalHeader (postcard)] [CanonicalLedger (postcard)]
/// ```
///
/// # Errors
///
/// Returns `GovernanceError::SerializationError` if serialization fails.
pub fn export_canonical(ledger: &Ledger) -> Result<Vec<u8>, GovernanceError> {
    let canonical = CanonicalLedger::from_ledger(ledger);
    let checksum = canonical.checksum();

    let header = CanonicalHeader::new(
        canonical.modules.len() as u64,
        canonical.events.len() as u64,
        checksum,
    );

    let header_bytes = postcard::to_allocvec(&header)
        .map_err(|e| GovernanceError::SerializationError(format!("Header: {}", e)))?;
    let data_bytes = postcard::to_allocvec(&canonical)
        .map_err(|e| GovernanceError::SerializationError(format!("Data: {}", e)))?;

    let mut result = Vec::with_capacity(4 + header_bytes.len() + data_bytes.len());
    result.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    result.extend_from_slice(&header_bytes);
    result.extend_from_slice(&data_bytes);

    Ok(result)
}

/// Import a ledger from canonical postcard format.
///
/// # Errors
///
/// Returns `GovernanceError::SerializationError` if deserialization
/// fails or the data is corrupted.
pub fn import_canonical(data: &[u8]) -> Result<Ledger, GovernanceError> {
    if data.len() < 4 {
        return Err(GovernanceError::SerializationError(
            "Data too short".to_string(),
        ));
    }

    let header_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < 4 + header_len {
        return Err(GovernanceError::SerializationError(
            "Data too short for header".to_string(),
        ));
    }

    let header: CanonicalHeader = postcard::from_bytes(&data[4..4 + header_len])
        .map_err(|e| GovernanceError::SerializationError(format!("Header: {}", e)))?;
    header.validate()?;

    // Validate size limits BEFORE deserializing the full payload.
    if header.module_count > MAX_IMPORT_MODULE_COUNT {
        return Err(GovernanceError::SerializationError(format!(
            "Module count {} exceeds maximum allowed {}",
            header.module_count, MAX_IMPORT_MODULE_COUNT
        )));
    }
    if header.event_count > MAX_IMPORT_EVENT_COUNT {
        return Err(GovernanceError::SerializationError(format!(
            "Event count {} exceeds maximum allowed {}",
            header.event_count, MAX_IMPORT_EVENT_COUNT
        )));
    }

    let canonical: CanonicalLedger = postcard::from_bytes(&data[4 + header_len..])
        .map_err(|e| GovernanceError::SerializationError(format!("Data: {}", e)))?;

    if canonical.checksum() != header.checksum {
        return Err(GovernanceError::SerializationError(format!(
            "Checksum mismatch: expected {}, got {}",
            header.checksum,
            canonical.checksum()
        )));
    }
    if canonical.modules.len() as u64 != header.module_count {
        return Err(GovernanceError::SerializationError(
            "Module count mismatch".to_string(),
        ));
    }
    if canonical.events.len() as u64 != header.event_count {
        return Err(GovernanceError::SerializationError(
            "Event count mismatch".to_string(),
        ));
    }

    Ok(canonical.to_ledger())
}

/// Verify that a ledger matches a canonical export.
pub fn verify_canonical(ledger: &Ledger, canonical_data: &[u8]) -> Result<bool, GovernanceError> {
    let imported = import_canonical(canonical_data)?;

    if ledger.module_count()? != imported.module_count()? {
        return Ok(false);
    }
    if ledger.event_count()? != imported.event_count()? {
        return Ok(false);
    }

    let original = CanonicalLedger::from_ledger(ledger);
    let restored = CanonicalLedger::from_ledger(&imported);
    Ok(original == restored)
}

/// Compute the canonical checksum of a ledger.
///
/// This can be used to quickly compare two ledgers for equality.
#[must_use]
pub fn canonical_checksum(ledger: &Ledger) -> u64 {
    CanonicalLedger::from_ledger(ledger).checksum()
}

// =============================================================================
// CRYPTOGRAPHIC HASH SUPPORT
// =============================================================================

/// Compute a BLAKE3 cryptographic hash of the canonical export.
///
/// Collision-resistant, for security-sensitive comparisons; complements
/// the fast XOR checksum. Returns the hash as a 64-character hex string.
///
/// Only available with the `crypto-hash` feature enabled.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn canonical_crypto_hash(ledger: &Ledger) -> String {
    let data = export_canonical(ledger).unwrap_or_default();
    blake3::hash(&data).to_hex().to_string()
}

/// Verify a ledger against a BLAKE3 hash.
///
/// Only available with the `crypto-hash` feature enabled.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn verify_crypto_hash(ledger: &Ledger, expected_hash: &str) -> bool {
    canonical_crypto_hash(ledger) == expected_hash
}

// =============================================================================
// TESTS
// =============================================================================
