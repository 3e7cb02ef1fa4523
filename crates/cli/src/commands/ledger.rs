//! Ledger snapshot export and import.
//!
//! Snapshots are the versioned JSON form of the request ledger. Import also
//! accepts the bare `foodRequests` array kept by the old browser client.

use std::path::Path;

use nowaste_core::{LedgerSnapshot, SnapshotError};
use nowaste_server::db::{LedgerStore, PgLedgerStore, RepositoryError};
use thiserror::Error;

use super::{DatabaseError, connect};

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerCommandError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Ledger store error: {0}")]
    Store(#[from] RepositoryError),

    #[error("Invalid snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Could not serialize snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write every request to `output`, or to stdout.
pub async fn export(output: Option<&Path>) -> Result<(), LedgerCommandError> {
    let store = PgLedgerStore::new(connect().await?);
    let snapshot = LedgerSnapshot::new(store.list_all().await?);
    let json = serde_json::to_string_pretty(&snapshot)?;

    match output {
        Some(path) => {
            tokio::fs::write(path, json).await?;
            tracing::info!(
                "Exported {} requests to {}",
                snapshot.requests.len(),
                path.display()
            );
        }
        #[allow(clippy::print_stdout)]
        None => println!("{json}"),
    }
    Ok(())
}

/// Read a snapshot file and insert the requests not yet present.
pub async fn import(input: &Path) -> Result<(), LedgerCommandError> {
    let snapshot = read_snapshot(input).await?;
    let total = snapshot.requests.len();

    let store = PgLedgerStore::new(connect().await?);
    let inserted = store.import(&snapshot).await?;

    tracing::info!(
        "Imported {} of {} requests ({} already present)",
        inserted,
        total,
        total - inserted
    );
    Ok(())
}

async fn read_snapshot(path: &Path) -> Result<LedgerSnapshot, LedgerCommandError> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(LedgerSnapshot::from_json(&raw)?)
}
