//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API. Subjects,
//! proxies, and implementations travel as raw u64 identities; roles
//! travel as their canonical uppercase names.

use custodia_core::{AuditEvent, Control, ImplementationId, ModuleRecord, Role, UpgradeState};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Ledger status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub module_count: usize,
    pub grant_count: usize,
    pub paused_count: usize,
    pub pending_upgrades: usize,
    pub event_count: u64,
}

// =============================================================================
// MODULE LISTING
// =============================================================================

/// One role grant in wire form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantJson {
    pub role: Role,
    pub subject: u64,
}

/// One module in wire form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleJson {
    pub proxy: u64,
    pub kind: String,
    pub label: String,
    pub implementation: u64,
    pub paused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_upgrade: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<u64>,
    pub history: Vec<u64>,
    pub grants: Vec<GrantJson>,
}

impl From<&ModuleRecord> for ModuleJson {
    fn from(record: &ModuleRecord) -> Self {
        let (owner, grants) = match &record.control {
            Control::Owned { owner } => (Some(owner.0), Vec::new()),
            Control::Rbac { grants } => (
                None,
                grants
                    .iter()
                    .map(|(role, subject)| GrantJson {
                        role: *role,
                        subject: subject.0,
                    })
                    .collect(),
            ),
        };
        Self {
            proxy: record.proxy.0,
            kind: record.kind.name().to_string(),
            label: record.label.clone(),
            implementation: record.implementation.0,
            paused: record.paused,
            pending_upgrade: match record.upgrade {
                UpgradeState::Pending(ImplementationId(candidate)) => Some(candidate),
                UpgradeState::Stable => None,
            },
            owner,
            history: record.history.iter().map(|i| i.0).collect(),
            grants,
        }
    }
}

/// Module listing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesResponse {
    pub success: bool,
    pub modules: Vec<ModuleJson>,
    pub error: Option<String>,
}

impl ModulesResponse {
    pub fn success(modules: Vec<ModuleJson>) -> Self {
        Self {
            success: true,
            modules,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            modules: vec![],
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// MUTATION REQUESTS
// =============================================================================

/// Grant or revoke a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRequest {
    pub proxy: u64,
    pub caller: u64,
    pub role: Role,
    pub subject: u64,
}

/// Query a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub proxy: u64,
    pub role: Role,
    pub subject: u64,
}

/// Pause or unpause a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseRequest {
    pub proxy: u64,
    pub caller: u64,
}

/// Ownership handoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub proxy: u64,
    pub caller: u64,
    pub new_owner: u64,
}

/// Upgrade proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeRequest {
    pub proxy: u64,
    pub caller: u64,
    pub implementation: u64,
}

/// Upgrade execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub proxy: u64,
    pub caller: u64,
}

// =============================================================================
// GENERIC RESPONSES
// =============================================================================

/// Response for mutations with no payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub error: Option<String>,
}

impl ActionResponse {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
        }
    }
}

/// Role query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub success: bool,
    pub held: Option<bool>,
    pub error: Option<String>,
}

impl CheckResponse {
    pub fn success(held: bool) -> Self {
        Self {
            success: true,
            held: Some(held),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            held: None,
            error: Some(msg.into()),
        }
    }
}

/// Upgrade execution response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeResponse {
    pub success: bool,
    pub implementation: Option<u64>,
    pub error: Option<String>,
}

impl UpgradeResponse {
    pub fn success(implementation: ImplementationId) -> Self {
        Self {
            success: true,
            implementation: Some(implementation.0),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            implementation: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// AUDIT
// =============================================================================

/// Query parameters for the audit endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditParams {
    /// Return events with sequence number greater than this.
    #[serde(default)]
    pub since: u64,
    /// Maximum number of events.
    #[serde(default = "default_audit_limit")]
    pub limit: usize,
}

fn default_audit_limit() -> usize {
    100
}

/// Audit log response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResponse {
    pub success: bool,
    pub events: Vec<AuditEvent>,
    pub error: Option<String>,
}

impl AuditResponse {
    pub fn success(events: Vec<AuditEvent>) -> Self {
        Self {
            success: true,
            events,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            events: vec![],
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// EXPORT / HASH
// =============================================================================

/// Canonical export response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: Option<String>, // Base64 encoded
    pub checksum: Option<u64>,
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn success(data: Vec<u8>, checksum: u64) -> Self {
        Self {
            success: true,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                &data,
            )),
            checksum: Some(checksum),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            checksum: None,
            error: Some(msg.into()),
        }
    }
}

/// BLAKE3 hash response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashResponse {
    pub success: bool,
    pub hash: Option<String>,
    pub error: Option<String>,
}

impl HashResponse {
    pub fn success(hash: String) -> Self {
        Self {
            success: true,
            hash: Some(hash),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            hash: None,
            error: Some(msg.into()),
        }
    }
}
