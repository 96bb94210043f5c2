//! Magic + major/minor schema-versioned envelope around a CBOR payload.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// A schema version: major changes are backward-incompatible, minor
/// changes only add optional fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaVersion {
    /// Breaking-change version.
    pub major: u16,
    /// Additive-change version.
    pub minor: u16,
}

/// Errors from decoding a versioned envelope.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The leading magic number didn't match what the caller expected —
    /// this isn't this type of record at all.
    #[error("magic mismatch: expected {expected:#010x}, found {found:#010x}")]
    MagicMismatch {
        /// The magic the caller expected.
        expected: u32,
        /// The magic actually found.
        found: u32,
    },
    /// The stored major version is not the one this reader supports.
    /// Per §4.1, callers that persist caches/indexes should treat this as
    /// "no cache" and rebuild rather than surfacing a hard error; callers
    /// on the wire protocol should surface it as a protocol error.
    #[error("unsupported schema major version: found {found}, supports {supported}")]
    UnsupportedMajor {
        /// The major version found in the envelope.
        found: u16,
        /// The major version this reader supports.
        supported: u16,
    },
    /// The input was too short to contain a full envelope header.
    #[error("envelope truncated: need at least 8 bytes, got {0}")]
    Truncated(usize),
    /// The CBOR body failed to decode.
    #[error("cbor decode error: {0}")]
    Decode(String),
    /// The CBOR body failed to encode.
    #[error("cbor encode error: {0}")]
    Encode(String),
}

const HEADER_LEN: usize = 4 + 2 + 2;

/// Encode `value` as `magic(u32 BE) ∥ major(u16 BE) ∥ minor(u16 BE) ∥
/// cbor(value)`.
pub fn encode_versioned<T: Serialize>(
    magic: u32,
    version: SchemaVersion,
    value: &T,
) -> Result<Vec<u8>, CodecError> {
    let mut body = Vec::new();
    ciborium::ser::into_writer(value, &mut body).map_err(|e| CodecError::Encode(e.to_string()))?;

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&magic.to_be_bytes());
    out.extend_from_slice(&version.major.to_be_bytes());
    out.extend_from_slice(&version.minor.to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode an envelope produced by [`encode_versioned`], checking `magic`
/// and rejecting any major version other than `supported_major`. Returns
/// the decoded value and the minor version actually present (so callers
/// can log when they're reading a newer-minor record than they write).
pub fn decode_versioned<T: DeserializeOwned>(
    bytes: &[u8],
    magic: u32,
    supported_major: u16,
) -> Result<(T, u16), CodecError> {
    if bytes.len() < HEADER_LEN {
        return Err(CodecError::Truncated(bytes.len()));
    }
    let found_magic = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if found_magic != magic {
        return Err(CodecError::MagicMismatch {
            expected: magic,
            found: found_magic,
        });
    }
    let major = u16::from_be_bytes([bytes[4], bytes[5]]);
    let minor = u16::from_be_bytes([bytes[6], bytes[7]]);
    if major != supported_major {
        return Err(CodecError::UnsupportedMajor {
            found: major,
            supported: supported_major,
        });
    }
    let value: T = ciborium::de::from_reader(&bytes[HEADER_LEN..])
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    Ok((value, minor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Thing {
        a: u32,
        b: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct ThingV2 {
        a: u32,
        b: String,
        #[serde(default)]
        c: Option<u32>,
    }

    const MAGIC: u32 = 0xA17_0001;

    #[test]
    fn round_trips_at_current_version() {
        let v = SchemaVersion { major: 1, minor: 0 };
        let thing = Thing {
            a: 7,
            b: "hi".into(),
        };
        let bytes = encode_versioned(MAGIC, v, &thing).unwrap();
        let (decoded, minor): (Thing, u16) = decode_versioned(&bytes, MAGIC, 1).unwrap();
        assert_eq!(decoded, thing);
        assert_eq!(minor, 0);
    }

    #[test]
    fn newer_minor_decodes_with_defaults_for_older_reader_shape() {
        // Writer is on schema minor=1 (adds optional field `c`); reader's
        // type doesn't know about `c` and should still decode fine.
        let v = SchemaVersion { major: 1, minor: 1 };
        let thing = ThingV2 {
            a: 7,
            b: "hi".into(),
            c: Some(9),
        };
        let bytes = encode_versioned(MAGIC, v, &thing).unwrap();
        let (decoded, minor): (Thing, u16) = decode_versioned(&bytes, MAGIC, 1).unwrap();
        assert_eq!(decoded, Thing { a: 7, b: "hi".into() });
        assert_eq!(minor, 1);
    }

    #[test]
    fn older_major_is_rejected() {
        let v = SchemaVersion { major: 0, minor: 0 };
        let thing = Thing {
            a: 1,
            b: "x".into(),
        };
        let bytes = encode_versioned(MAGIC, v, &thing).unwrap();
        let result: Result<(Thing, u16), _> = decode_versioned(&bytes, MAGIC, 1);
        assert!(matches!(result, Err(CodecError::UnsupportedMajor { .. })));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let v = SchemaVersion { major: 1, minor: 0 };
        let thing = Thing {
            a: 1,
            b: "x".into(),
        };
        let bytes = encode_versioned(MAGIC, v, &thing).unwrap();
        let result: Result<(Thing, u16), _> = decode_versioned(&bytes, 0xDEAD_BEEF, 1);
        assert!(matches!(result, Err(CodecError::MagicMismatch { .. })));
    }
}
