//! Derives the local cache's signing key from workspace identity, per
//! §4.2: "derived from workspace path + machine identifier for local
//! caches, or provided externally for shared caches."

use anvil_crypto::hash;
use std::path::Path;

/// Derive a 32-byte signing key from a workspace root path and a machine
/// identifier. Two anvil installs on different machines (or pointed at
/// different workspace roots) never share a key, so a cache directory
/// copied between machines fails signature verification rather than being
/// silently trusted.
#[must_use]
pub fn derive_local_key(workspace_root: &Path, machine_id: &str) -> [u8; 32] {
    let mut input = Vec::new();
    input.extend_from_slice(workspace_root.to_string_lossy().as_bytes());
    input.push(0);
    input.extend_from_slice(machine_id.as_bytes());
    hash(&input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn same_inputs_derive_the_same_key() {
        let root = PathBuf::from("/workspace");
        assert_eq!(
            derive_local_key(&root, "machine-a"),
            derive_local_key(&root, "machine-a")
        );
    }

    #[test]
    fn different_machines_derive_different_keys() {
        let root = PathBuf::from("/workspace");
        assert_ne!(
            derive_local_key(&root, "machine-a"),
            derive_local_key(&root, "machine-b")
        );
    }

    #[test]
    fn different_workspace_roots_derive_different_keys() {
        assert_ne!(
            derive_local_key(&PathBuf::from("/workspace-a"), "machine-a"),
            derive_local_key(&PathBuf::from("/workspace-b"), "machine-a")
        );
    }
}
