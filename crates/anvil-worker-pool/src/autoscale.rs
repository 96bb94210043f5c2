//! Autoscaling policy (§4.5): provision when sustained utilization stays
//! above the target band's upper bound for a configured window, decommission
//! idle workers (most-recently-idle first) when sustained utilization stays
//! below the lower bound, damped by a cool-down window to avoid flapping.

use crate::stats::PoolStats;
use std::time::{Duration, Instant};

/// Tunables for [`AutoscalePolicy`].
#[derive(Debug, Clone, Copy)]
pub struct AutoscaleConfig {
    /// Never scale below this many workers.
    pub min_workers: usize,
    /// Never scale above this many workers.
    pub max_workers: usize,
    /// Scale up once utilization has stayed at or above this fraction for
    /// `sustained_window`.
    pub target_utilization_high: f64,
    /// Scale down once utilization has stayed at or below this fraction
    /// for `sustained_window`.
    pub target_utilization_low: f64,
    /// How long utilization must stay outside the band before it's
    /// considered "sustained" rather than a transient blip.
    pub sustained_window: Duration,
    /// Minimum time between two scale decisions, regardless of
    /// utilization, to avoid flapping.
    pub cooldown: Duration,
}

impl Default for AutoscaleConfig {
    fn default() -> Self {
        Self {
            min_workers: 0,
            max_workers: num_cpus::get().max(1),
            target_utilization_high: 0.8,
            target_utilization_low: 0.2,
            sustained_window: Duration::from_secs(30),
            cooldown: Duration::from_secs(60),
        }
    }
}

/// What the policy recommends the pool do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Provision `by` additional workers.
    ScaleUp {
        /// How many workers to add.
        by: usize,
    },
    /// Decommission `by` idle workers, starting with the most recently
    /// idle.
    ScaleDown {
        /// How many workers to remove.
        by: usize,
    },
    /// No change this tick (within the band, in cooldown, or already at a
    /// min/max bound).
    Hold,
}

/// Tracks a rolling window of utilization samples and the last scale
/// action's time, so [`AutoscalePolicy::decide`] can tell a sustained
/// trend apart from a momentary spike.
pub struct AutoscalePolicy {
    config: AutoscaleConfig,
    samples: Vec<(Instant, f64)>,
    last_scale: Option<Instant>,
}

impl AutoscalePolicy {
    /// Build a policy with `config`.
    #[must_use]
    pub fn new(config: AutoscaleConfig) -> Self {
        Self {
            config,
            samples: Vec::new(),
            last_scale: None,
        }
    }

    /// Feed one fresh stats observation and decide whether to scale.
    pub fn decide(&mut self, now: Instant, stats: PoolStats) -> ScaleDecision {
        self.samples.push((now, stats.avg_utilization));
        self.samples
            .retain(|(t, _)| now.duration_since(*t) <= self.config.sustained_window);

        if let Some(last) = self.last_scale {
            if now.duration_since(last) < self.config.cooldown {
                return ScaleDecision::Hold;
            }
        }

        if self.samples.is_empty() {
            return ScaleDecision::Hold;
        }
        let window_covered = now.duration_since(self.samples[0].0) >= self.config.sustained_window
            || self.samples.len() == 1 && self.config.sustained_window.is_zero();

        let all_above_high = self
            .samples
            .iter()
            .all(|(_, u)| *u >= self.config.target_utilization_high);
        let all_below_low = self
            .samples
            .iter()
            .all(|(_, u)| *u <= self.config.target_utilization_low);

        if window_covered && all_above_high && stats.total < self.config.max_workers {
            self.last_scale = Some(now);
            let by = (self.config.max_workers - stats.total).min(stats.total.max(1));
            return ScaleDecision::ScaleUp { by };
        }

        if window_covered && all_below_low && stats.total > self.config.min_workers && stats.idle > 0 {
            self.last_scale = Some(now);
            let by = stats.idle.min(stats.total - self.config.min_workers);
            return ScaleDecision::ScaleDown { by };
        }

        ScaleDecision::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> AutoscaleConfig {
        AutoscaleConfig {
            min_workers: 1,
            max_workers: 8,
            target_utilization_high: 0.8,
            target_utilization_low: 0.2,
            sustained_window: Duration::from_millis(0),
            cooldown: Duration::from_millis(0),
        }
    }

    #[test]
    fn sustained_high_utilization_scales_up() {
        let mut policy = AutoscalePolicy::new(config());
        let now = Instant::now();
        let decision = policy.decide(now, PoolStats::from_counts(4, 4));
        assert_eq!(decision, ScaleDecision::ScaleUp { by: 4 });
    }

    #[test]
    fn sustained_low_utilization_scales_down_idle_first() {
        let mut policy = AutoscalePolicy::new(config());
        let now = Instant::now();
        let decision = policy.decide(now, PoolStats::from_counts(4, 0));
        assert_eq!(decision, ScaleDecision::ScaleDown { by: 3 });
    }

    #[test]
    fn within_band_holds() {
        let mut policy = AutoscalePolicy::new(config());
        let now = Instant::now();
        let decision = policy.decide(now, PoolStats::from_counts(4, 2));
        assert_eq!(decision, ScaleDecision::Hold);
    }

    #[test]
    fn cooldown_suppresses_a_second_scale_too_soon() {
        let mut cfg = config();
        cfg.cooldown = Duration::from_secs(60);
        let mut policy = AutoscalePolicy::new(cfg);
        let now = Instant::now();
        assert_ne!(policy.decide(now, PoolStats::from_counts(4, 4)), ScaleDecision::Hold);
        assert_eq!(policy.decide(now, PoolStats::from_counts(4, 4)), ScaleDecision::Hold);
    }

    #[test]
    fn never_scales_below_min_workers() {
        let mut policy = AutoscalePolicy::new(config());
        let now = Instant::now();
        assert_eq!(policy.decide(now, PoolStats::from_counts(1, 0)), ScaleDecision::Hold);
    }
}
