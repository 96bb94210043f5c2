//! Keyed-MAC integrity layer: `sign(data) = keyedBlake3(key, data)`,
//! verified in constant time.

use crate::dispatch::keyed_hash;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// A payload signed with a schema version and a monotonic timestamp mixed
/// into the MAC input, per §4.2's "signed payload includes a schema
/// version and a monotonic timestamp".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    /// Schema version of `body`'s encoding, not of this wrapper.
    pub schema_version: u16,
    /// Monotonic timestamp (seconds since epoch); freshness is the
    /// caller's responsibility per spec.
    pub timestamp: u64,
    /// The signed bytes.
    pub body: Vec<u8>,
    /// `keyedBlake3(key, schema_version ∥ timestamp ∥ body)`.
    pub signature: [u8; 32],
}

/// Errors from MAC verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MacError {
    /// The signature did not match.
    #[error("signature mismatch")]
    Mismatch,
    /// The payload's timestamp is older than the caller's configured max
    /// age.
    #[error("payload timestamp {timestamp} is older than max age (now {now}, max_age_secs {max_age_secs})")]
    Stale {
        /// The payload's timestamp.
        timestamp: u64,
        /// The time it was checked against.
        now: u64,
        /// The configured maximum age, in seconds.
        max_age_secs: u64,
    },
}

fn mac_input(schema_version: u16, timestamp: u64, body: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(2 + 8 + body.len());
    input.extend_from_slice(&schema_version.to_be_bytes());
    input.extend_from_slice(&timestamp.to_be_bytes());
    input.extend_from_slice(body);
    input
}

/// Sign `body` under `key`, stamping it with `schema_version` and
/// `timestamp`.
#[must_use]
pub fn sign(key: &[u8; 32], schema_version: u16, timestamp: u64, body: Vec<u8>) -> SignedPayload {
    let signature = keyed_hash(key, &mac_input(schema_version, timestamp, &body));
    SignedPayload {
        schema_version,
        timestamp,
        body,
        signature,
    }
}

/// Verify `payload` under `key` in constant time, optionally rejecting
/// payloads older than `max_age_secs` (when `Some`) as measured against
/// `now`.
pub fn verify(
    key: &[u8; 32],
    payload: &SignedPayload,
    now: u64,
    max_age_secs: Option<u64>,
) -> Result<(), MacError> {
    let expected = keyed_hash(
        key,
        &mac_input(payload.schema_version, payload.timestamp, &payload.body),
    );
    // Constant-time comparison: never branch on which byte differs.
    if expected.ct_eq(&payload.signature).unwrap_u8() != 1 {
        return Err(MacError::Mismatch);
    }
    if let Some(max_age_secs) = max_age_secs {
        let age = now.saturating_sub(payload.timestamp);
        if age > max_age_secs {
            return Err(MacError::Stale {
                timestamp: payload.timestamp,
                now,
                max_age_secs,
            });
        }
    }
    Ok(())
}
