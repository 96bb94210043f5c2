//! Cryptographic primitives for anvil: a single hash function (BLAKE3), a
//! keyed-MAC integrity layer built on it, and a content-defined chunker for
//! large-file deduplication.
//!
//! # Hash domain policy
//!
//! Like the content-addressed blob store this crate backs, plain [`hash`]
//! is content-only — no domain prefix. Domain separation for signed
//! metadata happens explicitly in [`sign`]/[`verify`] by mixing a version
//! and timestamp into the MAC input, not by varying the hash itself.
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod chunk;
pub mod dispatch;
pub mod mac;

pub use dispatch::{current_dispatch, hash, keyed_hash, Dispatch};
pub use mac::{sign, verify, MacError, SignedPayload};

/// A 32-byte BLAKE3 digest, used uniformly across the workspace for content
/// hashes, fingerprints, and signatures.
pub type Digest = [u8; 32];
