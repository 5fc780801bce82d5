//! Future memory reservation after removing one host
//!
//! Assumes the cluster's reserved memory spreads evenly over the remaining
//! hosts. It gates scale-in, it does not forecast it.

use serde::{Deserialize, Serialize};

/// Projected memory reservation (%) with one fewer host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FutureReservation {
    /// Reservation redistributed over `n - 1` hosts
    Projected(f64),
    /// Removing the last host cannot be modeled; above every threshold
    Unsafe,
}

impl FutureReservation {
    /// Project reservation `current_pct` of `active_count` hosts onto `active_count - 1`
    pub fn project(current_pct: f64, active_count: usize) -> Self {
        if active_count > 1 {
            let n = active_count as f64;
            Self::Projected(current_pct * n / (n - 1.0))
        } else {
            Self::Unsafe
        }
    }

    /// Whether the projection is strictly below a threshold
    pub fn is_below(&self, threshold: f64) -> bool {
        match self {
            Self::Projected(pct) => *pct < threshold,
            Self::Unsafe => false,
        }
    }

    /// Projected value, `None` when unsafe
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Projected(pct) => Some(*pct),
            Self::Unsafe => None,
        }
    }
}

impl std::fmt::Display for FutureReservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Projected(pct) => write!(f, "{:.1}%", pct),
            Self::Unsafe => write!(f, "unsafe"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_host_is_unsafe() {
        for m in [0.0, 10.0, 59.9, 100.0] {
            assert_eq!(FutureReservation::project(m, 1), FutureReservation::Unsafe);
        }
        assert_eq!(FutureReservation::project(10.0, 0), FutureReservation::Unsafe);
        assert!(!FutureReservation::Unsafe.is_below(f64::MAX));
    }

    #[test]
    fn test_projection_redistributes_over_remaining_hosts() {
        assert_eq!(FutureReservation::project(60.0, 5), FutureReservation::Projected(75.0));
        assert_eq!(FutureReservation::project(40.0, 5).value(), Some(50.0));
        assert_eq!(FutureReservation::project(30.0, 2).value(), Some(60.0));
    }

    #[test]
    fn test_is_below_is_strict() {
        let f = FutureReservation::project(35.0, 2);
        assert!(!f.is_below(70.0));
        assert!(f.is_below(70.1));
    }

    #[test]
    fn test_web_scenario_projection_blocks_scale_in() {
        let f = FutureReservation::project(55.0, 4);
        let value = f.value().unwrap();
        assert!((value - 73.333).abs() < 0.01);
        assert!(!f.is_below(70.0));
    }
}
