use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Persisted session record. Survives restarts so the bot can resume the
/// most recent watch without a new command.
///
/// Every field defaults so the file stays readable as the schema gains
/// fields across versions; a file written by an older build simply leaves
/// the new fields at their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionState {
    /// Identifier of the most recently acknowledged trade; `None` means the
    /// next poll cycle bootstraps.
    pub cursor: Option<String>,
    /// Smart wallet currently being watched.
    pub watched_wallet: Option<String>,
    /// Chat that started the watch and receives its notifications.
    pub chat_id: Option<String>,
}

impl SessionState {
    /// Load the session state, treating any read or parse error as "no prior
    /// state". Never fatal.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to read {}: {e}", path.display());
                }
                return Self::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(e) => {
                warn!("Discarding unparseable {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Persist the state atomically: write a sibling temp file, then rename
    /// over the target so a crash mid-write never leaves a torn record.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("failed to serialize state")?;
        write_atomic(path, &contents)
    }
}

/// Write `contents` to `path` via temp-file-and-rename.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
