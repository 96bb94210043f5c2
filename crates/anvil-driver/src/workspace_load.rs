//! Loads the parsed-workspace JSON shape external parsers are expected to
//! emit (§6) from disk.

use anvil_types::workspace::WorkspaceConfig;
use std::path::Path;

/// Read and deserialize a [`WorkspaceConfig`] from `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not deserialize to
/// the expected shape.
pub fn load(path: &Path) -> anyhow::Result<WorkspaceConfig> {
    let bytes = std::fs::read(path)
        .map_err(|err| anyhow::anyhow!("reading workspace config {}: {err}", path.display()))?;
    let config: WorkspaceConfig = serde_json::from_slice(&bytes)
        .map_err(|err| anyhow::anyhow!("parsing workspace config {}: {err}", path.display()))?;
    Ok(config)
}
