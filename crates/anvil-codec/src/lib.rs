//! Versioned binary codec shared by the action cache, the dependency
//! index, the coordinator/worker wire protocol, and checkpoint files (§4.8).
//!
//! Two layers:
//! - [`envelope`] wraps any CBOR-serializable payload with a magic number
//!   and a major/minor schema version, so a reader can tell "no cache"
//!   (version mismatch) apart from "corrupted".
//! - [`frame`] provides length-prefixed framing for streaming one envelope
//!   at a time over a socket — the same `len(u32 BE) ∥ body` shape the
//!   teacher's session hub uses for its CBOR packets, generalized here to
//!   frame versioned envelopes instead of raw messages.
//! - [`record`] provides an explicit-field-id record type for schemas that
//!   need stable field identity independent of struct field order.
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod envelope;
pub mod frame;
pub mod record;

pub use envelope::{decode_versioned, encode_versioned, CodecError, SchemaVersion};
pub use frame::Frame;
pub use record::Record;
