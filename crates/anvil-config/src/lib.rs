//! Config storage port and a filesystem-backed implementation, used for
//! coordinator/worker daemon settings and per-user driver preferences
//! (§4's ambient config layer — not part of the build graph itself).
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod fs_store;
pub mod service;

pub use fs_store::FsConfigStore;
pub use service::{ConfigError, ConfigService, ConfigStore};
