//! No Waste CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (schema + session table)
//! nowaste migrate
//!
//! # Create an administrator (password from NOWASTE_ADMIN_PASSWORD)
//! nowaste admin create -e admin@example.org -n "Admin Name"
//!
//! # Write the request ledger to a file
//! nowaste ledger export -o ledger.json
//!
//! # Load a snapshot or a legacy browser `foodRequests` array
//! nowaste ledger import ledger.json
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "nowaste")]
#[command(author, version, about = "No Waste Food Network CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage administrator accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Export or import the pickup request ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new administrator account
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum LedgerAction {
    /// Write a snapshot of every request
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Insert requests from a snapshot, skipping ids already present
    Import {
        /// Snapshot file
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create { email, name } => {
                commands::admin::create_user(&email, &name).await?;
            }
        },
        Commands::Ledger { action } => match action {
            LedgerAction::Export { output } => {
                commands::ledger::export(output.as_deref()).await?;
            }
            LedgerAction::Import { input } => commands::ledger::import(&input).await?,
        },
    }
    Ok(())
}
