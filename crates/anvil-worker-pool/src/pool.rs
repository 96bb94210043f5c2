//! The worker pool: sits between the coordinator's scheduling decisions
//! and actual compute resources (§4.5). Tracks which provisioned workers
//! are idle/busy, exposes [`PoolStats`], and — when enabled — runs an
//! autoscaling loop that provisions/decommissions through a
//! [`WorkerProvisioner`].

use crate::autoscale::{AutoscaleConfig, AutoscalePolicy, ScaleDecision};
use crate::provider::{CloudProvider, ProvisionError, ProvisionSpec};
use crate::provisioner::WorkerProvisioner;
use crate::stats::PoolStats;
use anvil_types::worker::WorkerId;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy)]
struct Slot {
    busy: bool,
    idle_since: Instant,
}

/// Pool of provisioned workers plus the policy/provisioner needed to scale
/// it.
pub struct WorkerPool<P> {
    provisioner: WorkerProvisioner<P>,
    slots: RwLock<BTreeMap<WorkerId, Slot>>,
    spec: ProvisionSpec,
}

impl<P: CloudProvider> WorkerPool<P> {
    /// Build an empty pool backed by `provider`; new machines are
    /// provisioned to match `spec`.
    pub fn new(provider: P, spec: ProvisionSpec) -> Self {
        Self {
            provisioner: WorkerProvisioner::new(provider),
            slots: RwLock::new(BTreeMap::new()),
            spec,
        }
    }

    /// Bring the pool up to `count` workers, provisioning fresh ones
    /// through the configured provider.
    pub async fn provision_initial(&self, count: usize) -> Result<(), ProvisionError> {
        for _ in 0..count {
            self.provision_one().await?;
        }
        Ok(())
    }

    async fn provision_one(&self) -> Result<WorkerId, ProvisionError> {
        let id = self.provisioner.provision(&self.spec).await?;
        self.slots.write().insert(
            id,
            Slot {
                busy: false,
                idle_since: Instant::now(),
            },
        );
        Ok(id)
    }

    async fn decommission_one(&self, id: WorkerId) -> Result<(), ProvisionError> {
        self.provisioner.decommission(id).await?;
        self.slots.write().remove(&id);
        Ok(())
    }

    /// Mark `id` as busy (an assignment was handed to it).
    pub fn mark_busy(&self, id: WorkerId) {
        if let Some(slot) = self.slots.write().get_mut(&id) {
            slot.busy = true;
        }
    }

    /// Mark `id` as idle again (its assignment completed).
    pub fn mark_idle(&self, id: WorkerId) {
        if let Some(slot) = self.slots.write().get_mut(&id) {
            slot.busy = false;
            slot.idle_since = Instant::now();
        }
    }

    /// Current occupancy snapshot.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let slots = self.slots.read();
        let busy = slots.values().filter(|s| s.busy).count();
        PoolStats::from_counts(slots.len(), busy)
    }

    /// Idle worker ids, most-recently-idle first — the order
    /// [`WorkerPool::scale_down`] decommissions in, per §4.5.
    fn idle_workers_newest_first(&self) -> Vec<WorkerId> {
        let slots = self.slots.read();
        let mut idle: Vec<(WorkerId, Instant)> = slots
            .iter()
            .filter(|(_, slot)| !slot.busy)
            .map(|(id, slot)| (*id, slot.idle_since))
            .collect();
        idle.sort_by(|a, b| b.1.cmp(&a.1));
        idle.into_iter().map(|(id, _)| id).collect()
    }

    /// Provision `by` additional workers.
    pub async fn scale_up(&self, by: usize) -> Result<Vec<WorkerId>, ProvisionError> {
        let mut provisioned = Vec::with_capacity(by);
        for _ in 0..by {
            provisioned.push(self.provision_one().await?);
        }
        Ok(provisioned)
    }

    /// Decommission up to `by` idle workers, most-recently-idle first.
    pub async fn scale_down(&self, by: usize) -> Result<Vec<WorkerId>, ProvisionError> {
        let candidates = self.idle_workers_newest_first();
        let mut removed = Vec::new();
        for id in candidates.into_iter().take(by) {
            self.decommission_one(id).await?;
            removed.push(id);
        }
        Ok(removed)
    }

    /// Run the autoscaling loop forever, ticking every `tick_interval` and
    /// applying [`AutoscalePolicy`] decisions. Intended to be spawned as a
    /// background task by the driver binary; cancel by dropping the task
    /// handle.
    #[instrument(skip(self, policy))]
    pub async fn run_autoscale_loop(&self, mut policy: AutoscalePolicy, tick_interval: Duration) {
        let mut interval = tokio::time::interval(tick_interval);
        loop {
            interval.tick().await;
            let stats = self.stats();
            match policy.decide(Instant::now(), stats) {
                ScaleDecision::ScaleUp { by } => {
                    info!(by, "autoscaling up");
                    if let Err(err) = self.scale_up(by).await {
                        warn!(%err, "autoscale scale-up failed");
                    }
                }
                ScaleDecision::ScaleDown { by } => {
                    info!(by, "autoscaling down");
                    if let Err(err) = self.scale_down(by).await {
                        warn!(%err, "autoscale scale-down failed");
                    }
                }
                ScaleDecision::Hold => {}
            }
        }
    }
}

/// Convenience constructor bundling a pool with a default
/// [`AutoscaleConfig`], for the driver binary's `worker` subcommand.
#[must_use]
pub fn default_autoscale_policy() -> AutoscalePolicy {
    AutoscalePolicy::new(AutoscaleConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;

    #[tokio::test]
    async fn provision_initial_populates_the_pool() {
        let pool = WorkerPool::new(MockProvider::new(), ProvisionSpec::default());
        pool.provision_initial(3).await.unwrap();
        assert_eq!(pool.stats().total, 3);
        assert_eq!(pool.stats().idle, 3);
    }

    #[tokio::test]
    async fn mark_busy_and_idle_update_stats() {
        let pool = WorkerPool::new(MockProvider::new(), ProvisionSpec::default());
        pool.provision_initial(2).await.unwrap();
        let id = pool.idle_workers_newest_first()[0];
        pool.mark_busy(id);
        assert_eq!(pool.stats().busy, 1);
        pool.mark_idle(id);
        assert_eq!(pool.stats().busy, 0);
    }

    #[tokio::test]
    async fn scale_down_prefers_the_most_recently_idle_worker() {
        let pool = WorkerPool::new(MockProvider::new(), ProvisionSpec::default());
        pool.provision_initial(2).await.unwrap();
        let ids = pool.idle_workers_newest_first();
        let (older, newer) = (ids[0], ids[1]);
        // Touch `newer` last so it becomes the most-recently-idle one.
        pool.mark_busy(newer);
        pool.mark_idle(newer);

        let removed = pool.scale_down(1).await.unwrap();
        assert_eq!(removed, vec![newer]);
        assert_eq!(pool.stats().total, 1);
        let remaining = pool.idle_workers_newest_first();
        assert_eq!(remaining, vec![older]);
    }

    #[tokio::test]
    async fn scale_up_adds_the_requested_count() {
        let pool = WorkerPool::new(MockProvider::new(), ProvisionSpec::default());
        let added = pool.scale_up(3).await.unwrap();
        assert_eq!(added.len(), 3);
        assert_eq!(pool.stats().total, 3);
    }
}
