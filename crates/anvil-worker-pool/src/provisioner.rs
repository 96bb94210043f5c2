//! Single-responsibility wrapper around a [`CloudProvider`]: all the
//! worker pool knows about machine creation is `provision`/`decommission`
//! (§4.5).

use crate::provider::{CloudProvider, ProvisionError, ProvisionSpec};
use anvil_types::worker::WorkerId;

/// Delegates actual machine creation to a pluggable [`CloudProvider`].
pub struct WorkerProvisioner<P> {
    provider: P,
}

impl<P: CloudProvider> WorkerProvisioner<P> {
    /// Wrap `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Provision a new worker matching `spec`.
    pub async fn provision(&self, spec: &ProvisionSpec) -> Result<WorkerId, ProvisionError> {
        self.provider.provision(spec).await
    }

    /// Decommission a previously provisioned worker.
    pub async fn decommission(&self, id: WorkerId) -> Result<(), ProvisionError> {
        self.provider.decommission(id).await
    }
}
