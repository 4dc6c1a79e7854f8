//! # Persistence Format
//!
//! Binary serialization for ledger snapshots (the CLI's file backend).
//! File I/O itself lives in the app layer; this module is a pure
//! transformation.
//!
//! Format: Header (5 bytes) + postcard-serialized ledger data.
//! - 4 bytes: Magic ("CSTD")
//! - 1 byte: Version
//!
//! ## Security
//!
//! Pre-deserialization validation prevents allocation DoS:
//! - Maximum payload size limit (`MAX_PERSISTENCE_PAYLOAD_SIZE`)
//! - Header validation before payload parsing

use crate::ledger::{Ledger, SerializableLedger};
use crate::{GovernanceError, primitives};

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed payload size for persistence format.
///
/// Validated BEFORE attempting deserialization to prevent
/// allocation-based DoS. 100 MB comfortably covers any real ledger.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 100 * 1024 * 1024; // 100 MB

/// Minimum valid file size (header only).
const MIN_FILE_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all ledger data.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(GovernanceError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(GovernanceError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GovernanceError> {
        if bytes.len() < 5 {
            return Err(GovernanceError::SerializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a ledger to bytes (header + payload).
pub fn ledger_to_bytes(ledger: &Ledger) -> Result<Vec<u8>, GovernanceError> {
    let header = PersistenceHeader::new();
    let serializable = SerializableLedger::from(ledger);

    let payload = postcard::to_stdvec(&serializable)
        .map_err(|e| GovernanceError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(5 + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);

    Ok(result)
}

/// Deserialize a ledger from bytes.
///
/// Validates minimum size, maximum payload size, and the header before
/// touching the payload.
pub fn ledger_from_bytes(bytes: &[u8]) -> Result<Ledger, GovernanceError> {
    if bytes.len() < MIN_FILE_SIZE {
        return Err(GovernanceError::SerializationError(
            "Data too short: minimum 5 bytes required".to_string(),
        ));
    }
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(GovernanceError::SerializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[5..];
    let serializable: SerializableLedger = postcard::from_bytes(payload).map_err(|e| {
        GovernanceError::SerializationError(format!("Failed to deserialize ledger data: {}", e))
    })?;

    Ok(Ledger::from(serializable))
}

// =============================================================================
// TESTS
// =============================================================================
