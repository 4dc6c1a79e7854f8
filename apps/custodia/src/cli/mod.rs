//! # Custodia CLI Module
//!
//! This module implements the CLI interface for Custodia.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show ledger status
//! - `init` - Initialize a new database
//! - `deploy` - Run a deployment plan from an environment config
//! - `grant` / `revoke` / `check` - Role administration and queries
//! - `pause` / `unpause` - Circuit breaker
//! - `transfer` - Ownership handoff for ownable modules
//! - `propose` / `execute` - Upgrade coordination (with optional
//!   post-execute artifact verification)
//! - `audit` - Page through the audit log
//! - `export` / `import` - Canonical ledger snapshots
//! - `hash` - BLAKE3 cryptographic hash of the ledger

mod commands;

use clap::{Parser, Subcommand};
use custodia_core::GovernanceError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Custodia - Governance Simulator
///
/// An off-chain reference implementation of the role/pause/ownership/
/// upgrade state machine behind a suite of governed modules, with
/// resumable deployment orchestration.
#[derive(Parser, Debug)]
#[command(name = "custodia")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the ledger database
    #[arg(short = 'D', long, global = true, default_value = "custodia.db")]
    pub database: PathBuf,

    /// Storage backend: "file" (canonical snapshot) or "redb" (ACID database)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show ledger status
    Status,

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Deploy a module: create, grant roles to governance, revoke the
    /// deployer, optionally wire a timelock
    Deploy {
        /// Path to the environment config (TOML address book)
        #[arg(short, long)]
        config: PathBuf,

        /// Module kind (token, collectible, treasury, faucet,
        /// storefront, registry, vesting-pool, timelock)
        #[arg(short, long)]
        kind: String,

        /// Human-readable module label
        #[arg(short, long)]
        label: String,

        /// Proxy identity for the new module
        #[arg(long)]
        proxy: u64,

        /// Initial implementation identity
        #[arg(long)]
        implementation: u64,

        /// Proxy identity for an optional timelock wired to this module
        #[arg(long)]
        timelock_proxy: Option<u64>,

        /// Implementation identity for the optional timelock
        #[arg(long)]
        timelock_implementation: Option<u64>,

        /// Resume an aborted run from this confirmed step count
        #[arg(long)]
        resume: Option<usize>,
    },

    /// Grant a role on a module
    Grant {
        /// Proxy identity of the module
        #[arg(long)]
        proxy: u64,

        /// Subject issuing the call (must hold the admin role)
        #[arg(long)]
        caller: u64,

        /// Role name (e.g. OPERATOR, PAUSER, UPGRADER)
        #[arg(short, long)]
        role: String,

        /// Subject receiving the role
        #[arg(short, long)]
        subject: u64,
    },

    /// Revoke a role on a module
    Revoke {
        /// Proxy identity of the module
        #[arg(long)]
        proxy: u64,

        /// Subject issuing the call (must hold the admin role)
        #[arg(long)]
        caller: u64,

        /// Role name
        #[arg(short, long)]
        role: String,

        /// Subject losing the role
        #[arg(short, long)]
        subject: u64,
    },

    /// Check whether a subject holds a role
    Check {
        /// Proxy identity of the module
        #[arg(long)]
        proxy: u64,

        /// Role name
        #[arg(short, long)]
        role: String,

        /// Subject to check
        #[arg(short, long)]
        subject: u64,
    },

    /// Pause a module
    Pause {
        /// Proxy identity of the module
        #[arg(long)]
        proxy: u64,

        /// Subject issuing the call (must hold PAUSER)
        #[arg(long)]
        caller: u64,
    },

    /// Unpause a module
    Unpause {
        /// Proxy identity of the module
        #[arg(long)]
        proxy: u64,

        /// Subject issuing the call (must hold PAUSER)
        #[arg(long)]
        caller: u64,
    },

    /// Transfer ownership of an ownable module
    Transfer {
        /// Proxy identity of the module
        #[arg(long)]
        proxy: u64,

        /// Current owner
        #[arg(long)]
        caller: u64,

        /// New owner
        #[arg(long)]
        new_owner: u64,
    },

    /// Propose an upgrade candidate
    Propose {
        /// Proxy identity of the module
        #[arg(long)]
        proxy: u64,

        /// Subject issuing the call (must hold UPGRADER / be owner)
        #[arg(long)]
        caller: u64,

        /// Candidate implementation identity
        #[arg(long)]
        implementation: u64,
    },

    /// Execute the pending upgrade
    Execute {
        /// Proxy identity of the module
        #[arg(long)]
        proxy: u64,

        /// Subject issuing the call (must hold UPGRADER / be owner)
        #[arg(long)]
        caller: u64,

        /// Optional TOML file of known artifacts for post-execute
        /// verification (failure is reported, never rolled back)
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },

    /// Show audit events
    Audit {
        /// Return events with sequence number greater than this
        #[arg(long, default_value = "0")]
        since: u64,

        /// Maximum number of events
        #[arg(long, default_value = "100")]
        limit: usize,
    },

    /// Export the ledger in canonical format
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (canonical, json)
        #[arg(short = 't', long, default_value = "canonical")]
        format: String,
    },

    /// Import a ledger from canonical format (file backend only)
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Compute BLAKE3 cryptographic hash of the ledger
    Hash,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), GovernanceError> {
    let backend = cli.backend.as_str();
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            cmd_server(&cli.database, backend, &host, port).await
        }
        Some(Commands::Status) => cmd_status(&cli.database, backend, json_mode),
        Some(Commands::Init { force }) => cmd_init(&cli.database, backend, force),
        Some(Commands::Deploy {
            config,
            kind,
            label,
            proxy,
            implementation,
            timelock_proxy,
            timelock_implementation,
            resume,
        }) => cmd_deploy(
            &cli.database,
            backend,
            json_mode,
            &config,
            &kind,
            &label,
            proxy,
            implementation,
            timelock_proxy,
            timelock_implementation,
            resume,
        ),
        Some(Commands::Grant {
            proxy,
            caller,
            role,
            subject,
        }) => cmd_grant(&cli.database, backend, proxy, caller, &role, subject),
        Some(Commands::Revoke {
            proxy,
            caller,
            role,
            subject,
        }) => cmd_revoke(&cli.database, backend, proxy, caller, &role, subject),
        Some(Commands::Check {
            proxy,
            role,
            subject,
        }) => cmd_check(&cli.database, backend, json_mode, proxy, &role, subject),
        Some(Commands::Pause { proxy, caller }) => {
            cmd_pause(&cli.database, backend, proxy, caller)
        }
        Some(Commands::Unpause { proxy, caller }) => {
            cmd_unpause(&cli.database, backend, proxy, caller)
        }
        Some(Commands::Transfer {
            proxy,
            caller,
            new_owner,
        }) => cmd_transfer(&cli.database, backend, proxy, caller, new_owner),
        Some(Commands::Propose {
            proxy,
            caller,
            implementation,
        }) => cmd_propose(&cli.database, backend, proxy, caller, implementation),
        Some(Commands::Execute {
            proxy,
            caller,
            artifacts,
        }) => cmd_execute(&cli.database, backend, proxy, caller, artifacts.as_deref()),
        Some(Commands::Audit { since, limit }) => {
            cmd_audit(&cli.database, backend, json_mode, since, limit)
        }
        Some(Commands::Export { output, format }) => {
            cmd_export(&cli.database, backend, &output, &format)
        }
        Some(Commands::Import { input }) => cmd_import(&cli.database, backend, &input),
        Some(Commands::Hash) => cmd_hash(&cli.database, backend, json_mode),
        None => {
            // No subcommand - show status by default
            cmd_status(&cli.database, backend, json_mode)
        }
    }
}
