//! The signed cache entry: what `lookup` returns on a hit and what
//! `store` writes last, once every output object is durable.

use anvil_crypto::mac::{sign, verify, MacError, SignedPayload};
use anvil_types::action::ActionOutcome;
use serde::{Deserialize, Serialize};

/// Entry schema version — bumped whenever `Record`'s body shape changes.
/// Folded into the MAC so a version-0 signature never verifies against a
/// version-1 reader key derivation.
pub const ENTRY_SCHEMA_VERSION: u16 = 1;

/// One declared output of a cached action: the destination-relative path
/// it materializes to, and the content hash of its bytes in the object
/// store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRef {
    /// Path relative to the build output directory.
    pub path: String,
    /// Content hash of the output's bytes.
    pub hash: [u8; 32],
}

/// The unsigned contents of a cache entry: what actually gets MAC'd.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryBody {
    /// Outputs this action declared, in declaration order.
    pub outputs: Vec<OutputRef>,
    /// The recorded outcome (success metadata — entries are only ever
    /// written for `Success`, see [`anvil_types::action::ActionOutcome::is_cacheable`]).
    pub outcome: ActionOutcome,
}

/// A signed cache entry as stored in the entry index.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    payload: SignedPayload,
}

impl CacheEntry {
    /// Sign a new entry under `key`, stamped with the current time.
    #[must_use]
    pub fn sign(key: &[u8; 32], timestamp: u64, body: &EntryBody) -> Self {
        let mut bytes = Vec::new();
        // Encoding failure here would mean `EntryBody` isn't
        // CBOR-serializable, which is a programming error, not a runtime
        // condition callers need to handle.
        ciborium::ser::into_writer(body, &mut bytes).unwrap_or_default();
        let payload = sign(key, ENTRY_SCHEMA_VERSION, timestamp, bytes);
        Self { payload }
    }

    /// Verify this entry's signature and optional max-age, returning the
    /// decoded body on success.
    pub fn verify(&self, key: &[u8; 32], now: u64, max_age_secs: Option<u64>) -> Result<EntryBody, MacError> {
        verify(key, &self.payload, now, max_age_secs)?;
        ciborium::de::from_reader(self.payload.body.as_slice())
            .map_err(|_| MacError::Mismatch)
    }

    /// The wire-serializable signed payload, for persistence.
    #[must_use]
    pub fn into_payload(self) -> SignedPayload {
        self.payload
    }

    /// Reconstruct a `CacheEntry` from a previously persisted payload.
    #[must_use]
    pub fn from_payload(payload: SignedPayload) -> Self {
        Self { payload }
    }

    /// The entry's stamped timestamp, used for LRU bookkeeping.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.payload.timestamp
    }
}
