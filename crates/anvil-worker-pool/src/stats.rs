//! Pool-wide statistics (§4.5): total/idle/busy counts and average
//! utilization, exposed for the autoscaling loop and for driver reporting.

use serde::{Deserialize, Serialize};

/// A point-in-time snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Total workers currently provisioned.
    pub total: usize,
    /// Workers with no assignment.
    pub idle: usize,
    /// Workers currently executing an assignment.
    pub busy: usize,
    /// `busy / total`, or `0.0` for an empty pool.
    pub avg_utilization: f64,
}

impl PoolStats {
    /// Compute stats from raw counts.
    #[must_use]
    pub fn from_counts(total: usize, busy: usize) -> Self {
        let idle = total.saturating_sub(busy);
        #[allow(clippy::cast_precision_loss)]
        let avg_utilization = if total == 0 {
            0.0
        } else {
            busy as f64 / total as f64
        };
        Self {
            total,
            idle,
            busy,
            avg_utilization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilization_is_the_busy_fraction() {
        let stats = PoolStats::from_counts(4, 1);
        assert_eq!(stats.idle, 3);
        assert!((stats.avg_utilization - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_pool_has_zero_utilization() {
        let stats = PoolStats::from_counts(0, 0);
        assert_eq!(stats.avg_utilization, 0.0);
    }
}
