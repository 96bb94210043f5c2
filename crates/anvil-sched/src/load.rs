//! Per-worker load scoring, used to decide when idle workers should steal
//! rather than wait, and (by the coordinator, via [`LoadSample`]) which
//! remote worker is least loaded.

use serde::{Deserialize, Serialize};

/// A point-in-time load reading for one worker (local thread or remote
/// machine).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadSample {
    /// Actions currently queued locally, not yet started.
    pub queue_depth: usize,
    /// Actions currently executing.
    pub in_flight: usize,
    /// Fraction of recent steal attempts against this worker that
    /// succeeded, in `[0.0, 1.0]`. A worker other workers keep failing to
    /// steal from is not actually idle even if its reported queue depth
    /// briefly reads zero.
    pub steal_success_rate: f64,
}

impl LoadSample {
    /// A single scalar combining queue depth and in-flight count; lower is
    /// less loaded. Steal success rate breaks ties between otherwise equal
    /// scores, favoring the worker whose queue has proven easier to steal
    /// from.
    #[must_use]
    pub fn score(&self) -> f64 {
        (self.queue_depth + self.in_flight) as f64
    }

    /// Whether `self` is less loaded than `other`, breaking ties in favor
    /// of the higher steal-success-rate worker.
    #[must_use]
    pub fn less_loaded_than(&self, other: &Self) -> bool {
        match self.score().partial_cmp(&other.score()) {
            Some(std::cmp::Ordering::Less) => true,
            Some(std::cmp::Ordering::Equal) => self.steal_success_rate > other.steal_success_rate,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_score_wins() {
        let light = LoadSample {
            queue_depth: 1,
            in_flight: 0,
            steal_success_rate: 0.0,
        };
        let heavy = LoadSample {
            queue_depth: 5,
            in_flight: 2,
            steal_success_rate: 1.0,
        };
        assert!(light.less_loaded_than(&heavy));
        assert!(!heavy.less_loaded_than(&light));
    }

    #[test]
    fn ties_break_on_steal_success_rate() {
        let a = LoadSample {
            queue_depth: 2,
            in_flight: 0,
            steal_success_rate: 0.9,
        };
        let b = LoadSample {
            queue_depth: 1,
            in_flight: 1,
            steal_success_rate: 0.1,
        };
        assert!(a.less_loaded_than(&b));
        assert!(!b.less_loaded_than(&a));
    }
}
