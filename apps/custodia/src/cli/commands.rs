//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use custodia_core::{
    ArtifactVerifier, DeployPlan, DeploymentRun, GovernanceConfig, GovernanceError,
    ImplementationId, ModuleKind, Role, Session, SubjectId, Verifier, canonical_checksum,
    export_canonical, import_canonical, ledger_from_bytes, ledger_to_bytes,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for config and artifact files (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Maximum file size for ledger imports (200 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 200 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), GovernanceError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| GovernanceError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(GovernanceError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate an input file path.
///
/// Canonicalizes the path (resolving symlinks and "..") and ensures it
/// is a regular file, preventing path-traversal reads.
fn validate_file_path(path: &Path) -> Result<PathBuf, GovernanceError> {
    let canonical = path.canonicalize().map_err(|e| {
        GovernanceError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(GovernanceError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Validate an output file path: the parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, GovernanceError> {
    let parent = path.parent().unwrap_or(Path::new("."));

    let canonical_parent = parent.canonicalize().map_err(|e| {
        GovernanceError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(GovernanceError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| GovernanceError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Parse a role name, with a helpful error listing valid names.
fn parse_role(name: &str) -> Result<Role, GovernanceError> {
    Role::parse(name).ok_or_else(|| {
        GovernanceError::SerializationError(format!(
            "Unknown role '{}'. Valid roles: {}",
            name,
            custodia_core::ALL_ROLES
                .iter()
                .map(|r| r.name())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })
}

/// Parse a module kind name, with a helpful error listing valid names.
fn parse_kind(name: &str) -> Result<ModuleKind, GovernanceError> {
    ModuleKind::parse(name).ok_or_else(|| {
        GovernanceError::SerializationError(format!(
            "Unknown module kind '{}'. Valid kinds: {}",
            name,
            custodia_core::ALL_KINDS
                .iter()
                .map(|k| k.name())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })
}

// =============================================================================
// CONFIG / ARTIFACT LOADING
// =============================================================================

/// Load and validate an environment config (TOML address book).
fn load_config(path: &Path) -> Result<GovernanceConfig, GovernanceError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, MAX_CONFIG_FILE_SIZE)?;

    let contents = std::fs::read_to_string(&validated)
        .map_err(|e| GovernanceError::IoError(format!("Read config: {}", e)))?;
    let config: GovernanceConfig = toml::from_str(&contents)
        .map_err(|e| GovernanceError::SerializationError(format!("Parse config: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// One known artifact in an artifacts file.
#[derive(Debug, Deserialize)]
struct ArtifactEntry {
    implementation: u64,
    checksum: u64,
}

/// TOML shape of a known-artifacts file.
#[derive(Debug, Deserialize)]
struct ArtifactsFile {
    artifacts: Vec<ArtifactEntry>,
}

/// Load a known-artifacts file into a verifier.
fn load_artifacts(path: &Path) -> Result<ArtifactVerifier, GovernanceError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, MAX_CONFIG_FILE_SIZE)?;

    let contents = std::fs::read_to_string(&validated)
        .map_err(|e| GovernanceError::IoError(format!("Read artifacts: {}", e)))?;
    let file: ArtifactsFile = toml::from_str(&contents)
        .map_err(|e| GovernanceError::SerializationError(format!("Parse artifacts: {}", e)))?;

    let mut verifier = ArtifactVerifier::new();
    for entry in file.artifacts {
        verifier.register(ImplementationId(entry.implementation), entry.checksum);
    }
    Ok(verifier)
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    db_path: &PathBuf,
    backend: &str,
    host: &str,
    port: u16,
) -> Result<(), GovernanceError> {
    let session = load_or_create_session(db_path, backend)?;

    println!("Custodia Governance Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", backend);
    println!("  Database: {:?}", db_path);
    println!();
    println!("Endpoints:");
    println!("  GET  /health             - Health check");
    println!("  GET  /status             - Ledger status");
    println!("  GET  /modules            - Module listing");
    println!("  POST /role/grant         - Grant a role");
    println!("  POST /role/revoke        - Revoke a role");
    println!("  POST /role/check         - Role query");
    println!("  POST /pause /unpause     - Circuit breaker");
    println!("  POST /ownership/transfer - Ownership handoff");
    println!("  POST /upgrade/propose    - Propose upgrade");
    println!("  POST /upgrade/execute    - Execute upgrade");
    println!("  GET  /audit              - Audit log");
    println!("  POST /export             - Canonical export");
    println!("  GET  /hash               - BLAKE3 ledger hash");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, session).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show ledger status.
pub fn cmd_status(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
) -> Result<(), GovernanceError> {
    let session = load_or_create_session(db_path, backend)?;
    let metrics = session.metrics()?;

    if json_mode {
        let output = serde_json::json!({
            "database": db_path.to_string_lossy(),
            "backend": backend,
            "module_count": metrics.module_count,
            "grant_count": metrics.grant_count,
            "paused_count": metrics.paused_count,
            "pending_upgrades": metrics.pending_upgrades,
            "event_count": metrics.event_count
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Custodia Ledger Status");
    println!("======================");
    println!("Database: {:?}", db_path);
    println!("Backend:  {}", backend);
    println!();
    println!("Modules:          {}", metrics.module_count);
    println!("Role Grants:      {}", metrics.grant_count);
    println!("Paused:           {}", metrics.paused_count);
    println!("Pending Upgrades: {}", metrics.pending_upgrades);
    println!("Audit Events:     {}", metrics.event_count);

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize new database.
pub fn cmd_init(db_path: &PathBuf, backend: &str, force: bool) -> Result<(), GovernanceError> {
    if db_path.exists() && !force {
        return Err(GovernanceError::SerializationError(
            "Database already exists. Use --force to overwrite.".to_string(),
        ));
    }

    match backend {
        "redb" => {
            let _session = Session::with_redb(db_path)?;
            println!("Initialized new redb database at {:?}", db_path);
        }
        _ => {
            let session = Session::new();
            save_session(&session, db_path)?;
            println!("Initialized new file database at {:?}", db_path);
        }
    }

    Ok(())
}

// =============================================================================
// DEPLOY COMMAND
// =============================================================================

/// Run a deployment plan: create, grant-all, revoke-all, optional
/// timelock wiring. Each step is confirmed before the next is issued; an
/// abort leaves partial state on disk and prints the resume cursor.
#[allow(clippy::too_many_arguments)]
pub fn cmd_deploy(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    config_path: &Path,
    kind: &str,
    label: &str,
    proxy: u64,
    implementation: u64,
    timelock_proxy: Option<u64>,
    timelock_implementation: Option<u64>,
    resume: Option<usize>,
) -> Result<(), GovernanceError> {
    let config = load_config(config_path)?;
    let kind = parse_kind(kind)?;

    let mut plan = DeployPlan::build(
        kind,
        label,
        SubjectId(proxy),
        ImplementationId(implementation),
        &config,
    )?;

    match (timelock_proxy, timelock_implementation) {
        (Some(tl_proxy), Some(tl_impl)) => {
            plan = plan.with_timelock(
                format!("{}-timelock", label),
                SubjectId(tl_proxy),
                ImplementationId(tl_impl),
            );
        }
        (None, None) => {}
        _ => {
            return Err(GovernanceError::SerializationError(
                "Timelock wiring needs both --timelock-proxy and --timelock-implementation"
                    .to_string(),
            ));
        }
    }

    let total = plan.len();
    let mut run = match resume {
        Some(confirmed) => {
            tracing::info!(confirmed, "resuming deployment");
            DeploymentRun::resume(plan, confirmed)
        }
        None => DeploymentRun::new(plan),
    };

    let mut session = load_or_create_session(db_path, backend)?;

    if !json_mode {
        println!("Deploying {} '{}' behind proxy {}", kind, label, proxy);
        println!("Plan: {} steps, resuming at {}", total, run.cursor());
        println!();
    }

    loop {
        match session.advance_deployment(&mut run) {
            Ok(Some(confirmed)) => {
                tracing::info!(step = confirmed.index, "step confirmed");
                if !json_mode {
                    println!("  [{}/{}] confirmed: {}", confirmed.index + 1, total, confirmed.step);
                }
            }
            Ok(None) => break,
            Err(e) => {
                // Completed steps stay persisted for resume.
                save_session(&session, db_path)?;
                tracing::error!(cursor = run.cursor(), "deployment aborted");
                if !json_mode {
                    println!();
                    println!(
                        "Deployment aborted. Inspect the failure, then re-run with --resume {}",
                        run.cursor()
                    );
                }
                return Err(e);
            }
        }
    }

    save_session(&session, db_path)?;

    if json_mode {
        let output = serde_json::json!({
            "deployed": true,
            "kind": kind.name(),
            "label": label,
            "proxy": proxy,
            "steps": total
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else {
        println!();
        println!(
            "Deployment complete. Control handed to governance subject {}.",
            config.governance.0
        );
    }

    Ok(())
}

// =============================================================================
// ROLE COMMANDS
// =============================================================================

/// Grant a role.
pub fn cmd_grant(
    db_path: &PathBuf,
    backend: &str,
    proxy: u64,
    caller: u64,
    role: &str,
    subject: u64,
) -> Result<(), GovernanceError> {
    let role = parse_role(role)?;
    let mut session = load_or_create_session(db_path, backend)?;

    session.grant(
        SubjectId(proxy),
        SubjectId(caller),
        role,
        SubjectId(subject),
    )?;
    save_session(&session, db_path)?;

    println!("Granted {} on module {} to subject {}", role, proxy, subject);
    Ok(())
}

/// Revoke a role.
pub fn cmd_revoke(
    db_path: &PathBuf,
    backend: &str,
    proxy: u64,
    caller: u64,
    role: &str,
    subject: u64,
) -> Result<(), GovernanceError> {
    let role = parse_role(role)?;
    let mut session = load_or_create_session(db_path, backend)?;

    session.revoke(
        SubjectId(proxy),
        SubjectId(caller),
        role,
        SubjectId(subject),
    )?;
    save_session(&session, db_path)?;

    println!(
        "Revoked {} on module {} from subject {}",
        role, proxy, subject
    );
    Ok(())
}

/// Check a role.
pub fn cmd_check(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    proxy: u64,
    role: &str,
    subject: u64,
) -> Result<(), GovernanceError> {
    let role = parse_role(role)?;
    let session = load_or_create_session(db_path, backend)?;

    let held = session.has_role(SubjectId(proxy), role, SubjectId(subject))?;

    if json_mode {
        let output = serde_json::json!({
            "proxy": proxy,
            "role": role.name(),
            "subject": subject,
            "held": held
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else {
        println!(
            "Subject {} {} {} on module {}",
            subject,
            if held { "holds" } else { "does not hold" },
            role,
            proxy
        );
    }
    Ok(())
}

// =============================================================================
// PAUSE COMMANDS
// =============================================================================

/// Pause a module.
pub fn cmd_pause(
    db_path: &PathBuf,
    backend: &str,
    proxy: u64,
    caller: u64,
) -> Result<(), GovernanceError> {
    let mut session = load_or_create_session(db_path, backend)?;
    session.pause(SubjectId(proxy), SubjectId(caller))?;
    save_session(&session, db_path)?;

    println!("Module {} paused", proxy);
    Ok(())
}

/// Unpause a module.
pub fn cmd_unpause(
    db_path: &PathBuf,
    backend: &str,
    proxy: u64,
    caller: u64,
) -> Result<(), GovernanceError> {
    let mut session = load_or_create_session(db_path, backend)?;
    session.unpause(SubjectId(proxy), SubjectId(caller))?;
    save_session(&session, db_path)?;

    println!("Module {} unpaused", proxy);
    Ok(())
}

// =============================================================================
// OWNERSHIP COMMAND
// =============================================================================

/// Transfer ownership of an ownable module.
pub fn cmd_transfer(
    db_path: &PathBuf,
    backend: &str,
    proxy: u64,
    caller: u64,
    new_owner: u64,
) -> Result<(), GovernanceError> {
    let mut session = load_or_create_session(db_path, backend)?;
    session.transfer_ownership(SubjectId(proxy), SubjectId(caller), SubjectId(new_owner))?;
    save_session(&session, db_path)?;

    println!("Module {} ownership transferred to subject {}", proxy, new_owner);
    Ok(())
}

// =============================================================================
// UPGRADE COMMANDS
// =============================================================================

/// Propose an upgrade candidate.
pub fn cmd_propose(
    db_path: &PathBuf,
    backend: &str,
    proxy: u64,
    caller: u64,
    implementation: u64,
) -> Result<(), GovernanceError> {
    let mut session = load_or_create_session(db_path, backend)?;
    session.propose_upgrade(
        SubjectId(proxy),
        SubjectId(caller),
        ImplementationId(implementation),
    )?;
    save_session(&session, db_path)?;

    println!(
        "Upgrade to implementation {} proposed for module {}",
        implementation, proxy
    );
    Ok(())
}

/// Execute the pending upgrade, then optionally verify the new
/// implementation against a known-artifacts file. Verification failure
/// is reported but never rolls back the executed upgrade.
pub fn cmd_execute(
    db_path: &PathBuf,
    backend: &str,
    proxy: u64,
    caller: u64,
    artifacts: Option<&Path>,
) -> Result<(), GovernanceError> {
    let mut session = load_or_create_session(db_path, backend)?;
    let new = session.execute_upgrade(SubjectId(proxy), SubjectId(caller))?;
    save_session(&session, db_path)?;

    println!(
        "Module {} upgraded to implementation {} (proxy identity unchanged)",
        proxy, new.0
    );

    if let Some(artifacts_path) = artifacts {
        let verifier = load_artifacts(artifacts_path)?;
        match verifier.verify(new) {
            Ok(()) => {
                println!(
                    "Verification OK: implementation {} matches a known artifact (checksum {})",
                    new.0,
                    verifier.expected_checksum(new).unwrap_or_default()
                );
            }
            Err(e) => {
                tracing::warn!(implementation = new.0, "artifact verification failed");
                println!("Verification FAILED (audit-only, upgrade stands): {}", e);
            }
        }
    }

    Ok(())
}

// =============================================================================
// AUDIT COMMAND
// =============================================================================

/// Show audit events.
pub fn cmd_audit(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    since: u64,
    limit: usize,
) -> Result<(), GovernanceError> {
    let session = load_or_create_session(db_path, backend)?;
    let events = session.audit(since, limit)?;

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&events).unwrap_or_default()
        );
        return Ok(());
    }

    if events.is_empty() {
        println!("No audit events after sequence {}", since);
        return Ok(());
    }

    println!("Audit events (after sequence {}):", since);
    for event in &events {
        println!(
            "  #{:<6} module={:<8} actor={:<8} {:?}",
            event.seq, event.module.0, event.actor.0, event.action
        );
    }
    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Export the ledger.
pub fn cmd_export(
    db_path: &PathBuf,
    backend: &str,
    output: &Path,
    format: &str,
) -> Result<(), GovernanceError> {
    let validated_output = validate_output_path(output)?;

    let session = load_or_create_session(db_path, backend)?;
    let ledger = session.export_snapshot()?;

    let data = match format {
        "canonical" => {
            let data = export_canonical(&ledger)?;
            let checksum = canonical_checksum(&ledger);
            println!("Checksum: {}", checksum);
            data
        }
        "json" => {
            let serializable = custodia_core::SerializableLedger::from(&ledger);
            serde_json::to_vec_pretty(&serializable)
                .map_err(|e| GovernanceError::SerializationError(e.to_string()))?
        }
        _ => {
            return Err(GovernanceError::SerializationError(format!(
                "Unknown format: {}. Use: canonical, json",
                format
            )));
        }
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| GovernanceError::SerializationError(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {:?}", data.len(), validated_output);

    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Import a ledger.
pub fn cmd_import(
    db_path: &PathBuf,
    backend: &str,
    input: &Path,
) -> Result<(), GovernanceError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_IMPORT_FILE_SIZE)?;

    let data = std::fs::read(&validated_path)
        .map_err(|e| GovernanceError::SerializationError(format!("Read file: {}", e)))?;

    let ledger = import_canonical(&data)?;
    let session = Session::with_ledger(ledger);

    if backend == "redb" {
        return Err(GovernanceError::SerializationError(
            "Import to redb not yet supported. Use file backend.".to_string(),
        ));
    }

    save_session(&session, db_path)?;

    let metrics = session.metrics()?;
    println!(
        "Imported ledger: {} modules, {} audit events",
        metrics.module_count, metrics.event_count
    );

    Ok(())
}

// =============================================================================
// HASH COMMAND
// =============================================================================

/// Compute the BLAKE3 cryptographic hash of the ledger.
pub fn cmd_hash(db_path: &PathBuf, backend: &str, json_mode: bool) -> Result<(), GovernanceError> {
    let session = load_or_create_session(db_path, backend)?;
    let ledger = session.export_snapshot()?;
    let hash = custodia_core::export::canonical_crypto_hash(&ledger);

    if json_mode {
        let output = serde_json::json!({ "hash": hash });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else {
        println!("BLAKE3: {}", hash);
    }
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Load or create a session from a database path with specified backend.
pub fn load_or_create_session(
    db_path: &PathBuf,
    backend: &str,
) -> Result<Session, GovernanceError> {
    match backend {
        "redb" => Session::with_redb(db_path),
        _ => {
            if db_path.exists() {
                let data = std::fs::read(db_path)
                    .map_err(|e| GovernanceError::SerializationError(format!("Read db: {}", e)))?;

                // Try the snapshot format first
                if let Ok(ledger) = ledger_from_bytes(&data) {
                    return Ok(Session::with_ledger(ledger));
                }

                // Fall back to a canonical export
                if let Ok(ledger) = import_canonical(&data) {
                    return Ok(Session::with_ledger(ledger));
                }

                Err(GovernanceError::SerializationError(
                    "Could not parse database file".to_string(),
                ))
            } else {
                Ok(Session::new())
            }
        }
    }
}

/// Save a session to a database path.
pub fn save_session(session: &Session, db_path: &PathBuf) -> Result<(), GovernanceError> {
    if session.is_persistent() {
        // Redb backend - already persisted, nothing to do
        Ok(())
    } else {
        let ledger = session.export_snapshot()?;
        let data = ledger_to_bytes(&ledger)?;
        std::fs::write(db_path, &data)
            .map_err(|e| GovernanceError::SerializationError(format!("Write db: {}", e)))?;
        Ok(())
    }
}
