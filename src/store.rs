use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ledger::LedgerBook;
use crate::optimizer::OptimizerState;
use crate::strategy::StrategyState;

/// Persistent state of all three engines, saved as JSON between runs.
/// Venue adapters are not persisted and must be re-attached after a restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unix timestamp the snapshot was taken at.
    pub saved_at: u64,
    pub ledger: LedgerBook,
    pub optimizer: OptimizerState,
    pub strategies: StrategyState,
}

impl Snapshot {
    /// Load a snapshot, or `None` if the file doesn't exist yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading state file {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&contents).context("parsing state file")?;
        tracing::info!(
            path = %path.display(),
            saved_at = snapshot.saved_at,
            sources = snapshot.ledger.sources.len(),
            strategies = snapshot.strategies.books.len(),
            "state loaded"
        );
        Ok(Some(snapshot))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing state file {}", path.display()))?;
        Ok(())
    }
}
