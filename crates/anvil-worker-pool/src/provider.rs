//! The pluggable machine-creation abstraction the provisioner delegates
//! to (§4.5): `provision(spec) -> WorkerId`, `decommission(WorkerId)`. A
//! real `AwsEc2Provider`/`GcpComputeProvider`/`KubernetesPodProvider` is as
//! much an external collaborator as a language handler (§1) — it talks to
//! a cloud SDK this workspace has no business vendoring. What's specified
//! here is the trait every provider implements and a [`MockProvider`] test
//! double, following `echo-registry-api::RegistryProvider`'s shape: a
//! narrow, `Send + Sync` trait implemented by pluggable providers, no
//! inheritance.

use anvil_types::worker::WorkerId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

/// What kind of machine to provision: instance size, image/toolchain
/// preset, and any cloud-specific tags. Kept as an opaque tag map, same
/// rationale as `Target::language_config` — new cloud shapes never need a
/// core release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionSpec {
    /// Instance/machine size tag (e.g. `"large"`, `"c5.4xlarge"`).
    pub size: String,
    /// Free-form provider-specific tags.
    pub tags: BTreeMap<String, String>,
}

/// Errors from provisioning or decommissioning a machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    /// The cloud provider rejected the request (quota, invalid spec,
    /// transient API failure already exhausted its own retries).
    #[error("provisioning failed: {0}")]
    Failed(String),
    /// `decommission` was called with an id the provider never provisioned
    /// (or has already decommissioned).
    #[error("unknown worker id: {0}")]
    UnknownWorker(WorkerId),
}

/// Hides cloud specifics behind two operations. Implementations for real
/// clouds (AWS EC2, GCP Compute, Kubernetes Pods) are out of scope for
/// this workspace per §1/§4.5 — they are plug-ins behind this same trait,
/// exactly like a language handler is a plug-in behind
/// `anvil_handler::LanguageHandler`. Azure is documented in spec as a
/// future provider, not yet specified.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Provision a new machine matching `spec`, returning the id assigned
    /// to it.
    async fn provision(&self, spec: &ProvisionSpec) -> Result<WorkerId, ProvisionError>;

    /// Tear down the machine behind `id`.
    async fn decommission(&self, id: WorkerId) -> Result<(), ProvisionError>;
}

/// An in-memory provider for tests and for the driver binary's `worker`
/// subcommand demo loop: "provisioning" just allocates a new id and
/// records it as live; "decommissioning" removes it.
#[derive(Default)]
pub struct MockProvider {
    next_id: AtomicU64,
    live: Mutex<Vec<WorkerId>>,
}

impl MockProvider {
    /// A fresh provider with no live workers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids currently considered live (provisioned, not yet decommissioned).
    pub fn live_workers(&self) -> Vec<WorkerId> {
        self.live
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CloudProvider for MockProvider {
    async fn provision(&self, _spec: &ProvisionSpec) -> Result<WorkerId, ProvisionError> {
        let id = WorkerId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.live
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(id);
        Ok(id)
    }

    async fn decommission(&self, id: WorkerId) -> Result<(), ProvisionError> {
        let mut live = self
            .live
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = live.len();
        live.retain(|w| *w != id);
        if live.len() == before {
            return Err(ProvisionError::UnknownWorker(id));
        }
        Ok(())
    }
}
