//! Content-addressed object store, signed action cache entries, and
//! single-flight execution (§4.2).
//!
//! [`store::ContentStore`] is a sharded on-disk blob store keyed by BLAKE3
//! hash, following `echo-cas`'s `BlobStore` trait shape but persisted
//! rather than in-memory. [`entry`] defines the signed [`entry::CacheEntry`]
//! wire format. [`cache::ActionCache`] ties the object store and the entry
//! index together with LRU eviction. [`singleflight`] guarantees at most
//! one concurrent execution per `ActionId`.
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod cache;
pub mod entry;
pub mod key;
pub mod singleflight;
pub mod store;

pub use cache::{ActionCache, LookupResult};
pub use entry::CacheEntry;
pub use key::derive_local_key;
pub use singleflight::InFlight;
pub use store::ContentStore;
