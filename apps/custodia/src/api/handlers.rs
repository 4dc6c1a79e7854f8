//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers. Every
//! rejected mutation surfaces its governance reason in the response
//! body; the status code classifies it (403 authorization, 404 unknown
//! module, 409 state-machine precondition, 400 everything else).

use super::{
    AppState,
    types::{
        ActionResponse, AuditParams, AuditResponse, CheckRequest, CheckResponse, ExecuteRequest,
        ExportResponse, HashResponse, HealthResponse, ModuleJson, ModulesResponse, PauseRequest,
        ProposeRequest, RoleRequest, StatusResponse, TransferRequest, UpgradeResponse,
    },
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use custodia_core::{
    GovernanceError, ImplementationId, SubjectId,
    export::{canonical_checksum, canonical_crypto_hash, export_canonical},
};

/// Map a governance error to an HTTP status.
fn status_for(error: &GovernanceError) -> StatusCode {
    match error {
        GovernanceError::Unauthorized => StatusCode::FORBIDDEN,
        GovernanceError::UnknownProxy(_) | GovernanceError::ModuleNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        GovernanceError::AlreadyPaused
        | GovernanceError::NotPaused
        | GovernanceError::NoPendingUpgrade
        | GovernanceError::ModuleExists(_)
        | GovernanceError::LastAdmin => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Get ledger status.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    match session.metrics() {
        Ok(metrics) => (
            StatusCode::OK,
            Json(StatusResponse {
                module_count: metrics.module_count,
                grant_count: metrics.grant_count,
                paused_count: metrics.paused_count,
                pending_upgrades: metrics.pending_upgrades,
                event_count: metrics.event_count,
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ActionResponse::error(format!("Status failed: {}", e))),
        )
            .into_response(),
    }
}

// =============================================================================
// MODULES HANDLER
// =============================================================================

/// List all modules with their governance state.
pub async fn modules_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    match session.modules() {
        Ok(records) => {
            let modules = records.iter().map(ModuleJson::from).collect();
            (StatusCode::OK, Json(ModulesResponse::success(modules)))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ModulesResponse::error(format!("Listing failed: {}", e))),
        ),
    }
}

// =============================================================================
// ROLE HANDLERS
// =============================================================================

/// Grant a role.
pub async fn grant_handler(
    State(state): State<AppState>,
    Json(request): Json<RoleRequest>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    match session.grant(
        SubjectId(request.proxy),
        SubjectId(request.caller),
        request.role,
        SubjectId(request.subject),
    ) {
        Ok(()) => (StatusCode::OK, Json(ActionResponse::success())),
        Err(e) => (status_for(&e), Json(ActionResponse::error(e.to_string()))),
    }
}

/// Revoke a role.
pub async fn revoke_handler(
    State(state): State<AppState>,
    Json(request): Json<RoleRequest>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    match session.revoke(
        SubjectId(request.proxy),
        SubjectId(request.caller),
        request.role,
        SubjectId(request.subject),
    ) {
        Ok(()) => (StatusCode::OK, Json(ActionResponse::success())),
        Err(e) => (status_for(&e), Json(ActionResponse::error(e.to_string()))),
    }
}

/// Role query.
pub async fn check_handler(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> impl IntoResponse {
    let session = state.session.read().await;
    match session.has_role(
        SubjectId(request.proxy),
        request.role,
        SubjectId(request.subject),
    ) {
        Ok(held) => (StatusCode::OK, Json(CheckResponse::success(held))),
        Err(e) => (status_for(&e), Json(CheckResponse::error(e.to_string()))),
    }
}

// =============================================================================
// PAUSE HANDLERS
// =============================================================================

/// Pause a module.
pub async fn pause_handler(
    State(state): State<AppState>,
    Json(request): Json<PauseRequest>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    match session.pause(SubjectId(request.proxy), SubjectId(request.caller)) {
        Ok(()) => (StatusCode::OK, Json(ActionResponse::success())),
        Err(e) => (status_for(&e), Json(ActionResponse::error(e.to_string()))),
    }
}

/// Unpause a module.
pub async fn unpause_handler(
    State(state): State<AppState>,
    Json(request): Json<PauseRequest>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    match session.unpause(SubjectId(request.proxy), SubjectId(request.caller)) {
        Ok(()) => (StatusCode::OK, Json(ActionResponse::success())),
        Err(e) => (status_for(&e), Json(ActionResponse::error(e.to_string()))),
    }
}

// =============================================================================
// OWNERSHIP HANDLER
// =============================================================================

/// Ownership handoff for ownable modules.
pub async fn transfer_handler(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    match session.transfer_ownership(
        SubjectId(request.proxy),
        SubjectId(request.caller),
        SubjectId(request.new_owner),
    ) {
        Ok(()) => (StatusCode::OK, Json(ActionResponse::success())),
        Err(e) => (status_for(&e), Json(ActionResponse::error(e.to_string()))),
    }
}

// =============================================================================
// UPGRADE HANDLERS
// =============================================================================

/// Record an upgrade candidate.
pub async fn propose_handler(
    State(state): State<AppState>,
    Json(request): Json<ProposeRequest>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    match session.propose_upgrade(
        SubjectId(request.proxy),
        SubjectId(request.caller),
        ImplementationId(request.implementation),
    ) {
        Ok(()) => (StatusCode::OK, Json(ActionResponse::success())),
        Err(e) => (status_for(&e), Json(ActionResponse::error(e.to_string()))),
    }
}

/// Execute the pending upgrade.
pub async fn execute_handler(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    match session.execute_upgrade(SubjectId(request.proxy), SubjectId(request.caller)) {
        Ok(implementation) => (StatusCode::OK, Json(UpgradeResponse::success(implementation))),
        Err(e) => (status_for(&e), Json(UpgradeResponse::error(e.to_string()))),
    }
}

// =============================================================================
// AUDIT HANDLER
// =============================================================================

/// Page through the audit log.
pub async fn audit_handler(
    State(state): State<AppState>,
    Query(params): Query<AuditParams>,
) -> impl IntoResponse {
    let session = state.session.read().await;
    match session.audit(params.since, params.limit) {
        Ok(events) => (StatusCode::OK, Json(AuditResponse::success(events))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AuditResponse::error(format!("Audit failed: {}", e))),
        ),
    }
}

// =============================================================================
// EXPORT HANDLER
// =============================================================================

/// Export the ledger in canonical format.
///
/// Works with both in-memory and persistent backends through
/// `export_snapshot()`.
pub async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;

    let ledger = match session.export_snapshot() {
        Ok(l) => l,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ExportResponse::error(format!(
                    "Failed to build ledger snapshot: {}",
                    e
                ))),
            );
        }
    };

    match export_canonical(&ledger) {
        Ok(data) => {
            let checksum = canonical_checksum(&ledger);
            (StatusCode::OK, Json(ExportResponse::success(data, checksum)))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ExportResponse::error(format!("Export failed: {}", e))),
        ),
    }
}

// =============================================================================
// HASH HANDLER
// =============================================================================

/// BLAKE3 cryptographic hash of the canonical export.
pub async fn hash_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;

    match session.export_snapshot() {
        Ok(ledger) => (
            StatusCode::OK,
            Json(HashResponse::success(canonical_crypto_hash(&ledger))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HashResponse::error(format!("Hash failed: {}", e))),
        ),
    }
}
