//! # Innate Primitives
//!
//! Hardcoded runtime constants for the Custodia governance engine.
//!
//! The engine starts with zero state but fixed rules. These constants are
//! compiled into the binary and immutable at runtime.

/// Magic bytes for the ledger snapshot file header.
///
/// File Header = Magic Bytes ("CSTD") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"CSTD";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for module labels.
///
/// Labels longer than this are rejected at module creation.
/// This prevents memory exhaustion from malformed input.
pub const MAX_LABEL_LENGTH: usize = 128;

/// Maximum number of steps in a single deployment plan.
///
/// A full deploy with timelock wiring needs well under this; the bound
/// guards against runaway plan construction from bad config.
pub const MAX_PLAN_STEPS: usize = 256;

/// Maximum number of audit events returned by a single query.
///
/// Limits the computational cost of audit scans; callers page with `since`.
pub const MAX_AUDIT_QUERY: usize = 1000;

/// Maximum allowed module count in canonical imports.
///
/// This prevents memory exhaustion from malicious or corrupted data.
pub const MAX_IMPORT_MODULE_COUNT: u64 = 100_000;

/// Maximum allowed audit-event count in canonical imports.
pub const MAX_IMPORT_EVENT_COUNT: u64 = 10_000_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"CSTD");
    }

    #[test]
    fn plan_bound_covers_full_deploy_with_timelock() {
        // create + grants + revokes for the widest role table, plus
        // timelock wiring, stays far below the bound
        assert!(MAX_PLAN_STEPS >= 32);
    }
}
