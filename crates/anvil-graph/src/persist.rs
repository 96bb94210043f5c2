//! Persists fingerprints and the dependency index through `anvil-codec`'s
//! versioned envelope (§4.8). A schema version mismatch on load is treated
//! as "no cache" — the caller rebuilds — never as a hard error.

use anvil_codec::{decode_versioned, encode_versioned, CodecError, SchemaVersion};
use anvil_types::target::TargetId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MAGIC: u32 = 0x414E_5647; // "ANVG"
const SUPPORTED_MAJOR: u16 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedFingerprints {
    entries: Vec<(TargetId, [u8; 32])>,
}

/// Serialize a fingerprint table for on-disk storage.
pub fn encode_fingerprints(
    fingerprints: &BTreeMap<TargetId, [u8; 32]>,
) -> Result<Vec<u8>, CodecError> {
    let payload = PersistedFingerprints {
        entries: fingerprints.iter().map(|(k, v)| (k.clone(), *v)).collect(),
    };
    encode_versioned(
        MAGIC,
        SchemaVersion {
            major: SUPPORTED_MAJOR,
            minor: 0,
        },
        &payload,
    )
}

/// Deserialize a fingerprint table. Returns `Ok(None)` on a major version
/// mismatch or magic mismatch (treated as a cold cache), and `Err` only
/// for genuine corruption (truncated or undecodeable body).
pub fn decode_fingerprints(
    bytes: &[u8],
) -> Result<Option<BTreeMap<TargetId, [u8; 32]>>, CodecError> {
    match decode_versioned::<PersistedFingerprints>(bytes, MAGIC, SUPPORTED_MAJOR) {
        Ok((payload, _minor)) => Ok(Some(payload.entries.into_iter().collect())),
        Err(CodecError::UnsupportedMajor { .. } | CodecError::MagicMismatch { .. }) => Ok(None),
        Err(other) => Err(other),
    }
}
