//! Distributed coordinator (§4.4): worker registry, capability- and
//! load-based scheduling, health tracking, the pending-request queue, the
//! two-phase Steal/Ack work-stealing handshake, and the framed wire
//! protocol workers speak to reach it.
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod coordinator;
pub mod message;
pub mod pending;
pub mod registry;
pub mod transport;

#[cfg(feature = "remote-cache-http")]
pub mod http_cache;

pub use coordinator::CoordinatorState;
pub use message::{ActionRequest, MessageBody, WireMessage};
pub use pending::PendingQueue;
pub use registry::WorkerRegistry;
pub use transport::{serve, Connections};

#[cfg(feature = "remote-cache-http")]
pub use http_cache::{router, BlobStore};
