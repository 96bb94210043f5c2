//! Periodic checkpoints so an interrupted run can resume without
//! redispatching completed actions, per §4.3's "a run persists a
//! checkpoint after each wave of completions; on restart, a checkpoint
//! whose graph root fingerprint still matches resumes from the recorded
//! completed set."

use anvil_codec::envelope::{decode_versioned, encode_versioned, CodecError, SchemaVersion};
use anvil_types::action::ActionId;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

const MAGIC: u32 = 0xA17_5CED;
const VERSION: SchemaVersion = SchemaVersion { major: 1, minor: 0 };

/// A snapshot of run progress, serializable to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Fingerprint of the graph root this checkpoint was taken against.
    /// A resume is only valid if the current run's root fingerprint
    /// matches; otherwise the graph has changed and the checkpoint is
    /// discarded wholesale rather than applied partially.
    pub graph_root_fingerprint: [u8; 32],
    /// Actions that had reached a terminal `Success` outcome when this
    /// checkpoint was taken.
    pub completed: Vec<ActionId>,
}

/// Error loading or saving a [`Checkpoint`].
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Underlying filesystem failure.
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] io::Error),
    /// The on-disk envelope didn't decode, or decoded to an unsupported
    /// schema major version.
    #[error("checkpoint codec error: {0}")]
    Codec(#[from] CodecError),
}

impl Checkpoint {
    /// An empty checkpoint for a fresh run against `graph_root_fingerprint`.
    #[must_use]
    pub fn fresh(graph_root_fingerprint: [u8; 32]) -> Self {
        Self {
            graph_root_fingerprint,
            completed: Vec::new(),
        }
    }

    /// Persist this checkpoint to `path`, replacing any prior contents.
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        let bytes = encode_versioned(MAGIC, VERSION, self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Load a checkpoint from `path`. Returns `Ok(None)` if the file
    /// doesn't exist (a fresh run, not an error); a decode failure (bad
    /// magic, unsupported major, truncated file) is also treated as "no
    /// usable checkpoint" per §4.1's rule for persisted caches, not
    /// surfaced as a hard error, since a stale or foreign checkpoint file
    /// should never block a build.
    #[must_use]
    pub fn load(path: &Path) -> Option<Self> {
        let bytes = std::fs::read(path).ok()?;
        decode_versioned::<Checkpoint>(&bytes, MAGIC, VERSION.major)
            .ok()
            .map(|(checkpoint, _minor)| checkpoint)
    }

    /// Whether this checkpoint may be applied to a run whose graph root is
    /// `current_root_fingerprint`.
    #[must_use]
    pub fn is_resumable_for(&self, current_root_fingerprint: [u8; 32]) -> bool {
        self.graph_root_fingerprint == current_root_fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_a_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.bin");
        let mut checkpoint = Checkpoint::fresh([1; 32]);
        checkpoint.completed.push(ActionId([2; 32]));
        checkpoint.save(&path).unwrap();

        let loaded = Checkpoint::load(&path).unwrap();
        assert_eq!(loaded, checkpoint);
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("does-not-exist.bin");
        assert!(Checkpoint::load(&path).is_none());
    }

    #[test]
    fn mismatched_root_is_not_resumable() {
        let checkpoint = Checkpoint::fresh([1; 32]);
        assert!(!checkpoint.is_resumable_for([2; 32]));
        assert!(checkpoint.is_resumable_for([1; 32]));
    }

    #[test]
    fn corrupted_file_loads_as_none_rather_than_panicking() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, b"not a checkpoint").unwrap();
        assert!(Checkpoint::load(&path).is_none());
    }
}
