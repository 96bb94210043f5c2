//! Sharded on-disk content-addressed object store. Object identity is
//! content-only (`BLAKE3(bytes)`, no domain prefix) — two outputs with
//! identical bytes are the same object regardless of which action produced
//! them. Absence is not an error: [`ContentStore::get`] returns `None` for
//! blobs that were never stored, evicted, or not yet fetched.

use anvil_crypto::{hash, Digest};
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A content object's bytes didn't hash to the digest the caller claimed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("object hash mismatch: expected {expected}, computed {computed}")]
pub struct HashMismatch {
    expected: String,
    computed: String,
}

/// Content-addressed blob store, persisted as `objects/<2-hex>/<62-hex>`
/// beneath a root directory — the sharding keeps any single directory from
/// accumulating more entries than common filesystems handle comfortably.
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// Open (creating if absent) a content store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("objects"))?;
        Ok(Self { root })
    }

    fn object_path(&self, digest: &Digest) -> PathBuf {
        let hex = hex_encode(digest);
        self.root.join("objects").join(&hex[..2]).join(&hex[2..])
    }

    /// Hash `bytes` and store them if not already present. Returns the
    /// content hash. Idempotent: storing the same bytes twice is a no-op
    /// on the second call.
    pub fn put(&self, bytes: &[u8]) -> io::Result<Digest> {
        let digest = hash(bytes);
        if !self.has(&digest) {
            self.write_atomic(&digest, bytes)?;
        }
        Ok(digest)
    }

    /// Store `bytes`, rejecting them if they don't hash to `expected`. Used
    /// when a caller (e.g. a remote cache client) already claims to know
    /// the hash and the store must verify before trusting it.
    pub fn put_verified(&self, expected: Digest, bytes: &[u8]) -> io::Result<()> {
        let computed = hash(bytes);
        if computed != expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                HashMismatch {
                    expected: hex_encode(&expected),
                    computed: hex_encode(&computed),
                },
            ));
        }
        if !self.has(&computed) {
            self.write_atomic(&computed, bytes)?;
        }
        Ok(())
    }

    /// Retrieve an object's bytes. `None` if not stored.
    pub fn get(&self, digest: &Digest) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.object_path(digest)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Check existence without reading the full object.
    #[must_use]
    pub fn has(&self, digest: &Digest) -> bool {
        self.object_path(digest).is_file()
    }

    /// Remove an object outright. Used by eviction; callers are
    /// responsible for ensuring nothing still references it.
    pub fn remove(&self, digest: &Digest) -> io::Result<()> {
        match fs::remove_file(self.object_path(digest)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Total bytes of a stored object, or `None` if absent.
    pub fn object_size(&self, digest: &Digest) -> io::Result<Option<u64>> {
        match fs::metadata(self.object_path(digest)) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn write_atomic(&self, digest: &Digest, bytes: &[u8]) -> io::Result<()> {
        let dest = self.object_path(digest);
        let dir = dest.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "object path has no parent directory")
        })?;
        fs::create_dir_all(dir)?;
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        fs::write(tmp.path(), bytes)?;
        tmp.persist(&dest)
            .map_err(tempfile::PersistError::into_error)?;
        Ok(())
    }
}

fn hex_encode(digest: &Digest) -> String {
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
