//! # Custodia - Governance Simulator
//!
//! The main binary for the Custodia governance engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for governance and deployment operations
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                apps/custodia (THE BINARY)            │
//! │                                                      │
//! │   ┌─────────────┐          ┌─────────────┐           │
//! │   │   CLI       │          │   HTTP API  │           │
//! │   │  (clap)     │          │   (axum)    │           │
//! │   └──────┬──────┘          └──────┬──────┘           │
//! │          │                        │                  │
//! │          └───────────┬────────────┘                  │
//! │                      ▼                               │
//! │             ┌─────────────────┐                      │
//! │             │  custodia-core  │                      │
//! │             │   (THE LOGIC)   │                      │
//! │             └─────────────────┘                      │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! custodia server --host 0.0.0.0 --port 8080
//!
//! # Deploy a module and hand control to governance
//! custodia deploy --config dev.toml --kind treasury --label main-treasury \
//!     --proxy 100 --implementation 1
//!
//! # Queries
//! custodia status
//! custodia check --proxy 100 --role ADMIN --subject 2
//! ```

use clap::Parser;
use custodia::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing — CUSTODIA_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("CUSTODIA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "custodia=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Display startup banner
    if !cli.quiet {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Custodia startup banner.
fn print_banner() {
    println!(
        r#"
   ██████╗██╗   ██╗███████╗████████╗ ██████╗ ██████╗ ██╗ █████╗
  ██╔════╝██║   ██║██╔════╝╚══██╔══╝██╔═══██╗██╔══██╗██║██╔══██╗
  ██║     ██║   ██║███████╗   ██║   ██║   ██║██║  ██║██║███████║
  ██║     ██║   ██║╚════██║   ██║   ██║   ██║██║  ██║██║██╔══██║
  ╚██████╗╚██████╔╝███████║   ██║   ╚██████╔╝██████╔╝██║██║  ██║
   ╚═════╝ ╚═════╝ ╚══════╝   ╚═╝    ╚═════╝ ╚═════╝ ╚═╝╚═╝  ╚═╝

  Governance Simulator v{}

  Deterministic • Auditable • Resumable
"#,
        env!("CARGO_PKG_VERSION")
    );
}
