//! Error types for ecscale

use crate::types::LifecycleState;
use thiserror::Error;

/// Result type for scale-in operations
pub type Result<T> = std::result::Result<T, ScaleError>;

/// Errors raised while evaluating or acting on a cluster.
///
/// All of them are recovered within a single cluster's evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScaleError {
    /// Metric fetch failed or returned no datapoints
    #[error("Metric {metric} unavailable for {target}: {reason}")]
    MetricUnavailable {
        metric: String,
        target: String,
        reason: String,
    },

    /// No Auto Scaling group is tagged for the cluster
    #[error("Auto Scaling group for cluster {0} not found")]
    GroupNotFound(String),

    /// Drain call failed
    #[error("Draining {instance} failed: {reason}")]
    DrainFailure { instance: String, reason: String },

    /// Terminate-and-decrement call failed
    #[error("Termination of {instance} failed: {reason}")]
    TerminationFailure { instance: String, reason: String },

    /// Cluster has no active container instances
    #[error("No active instances in cluster {0}")]
    NoActiveInstances(String),

    /// Cluster or container instance listing failed
    #[error("Inventory error: {0}")]
    Inventory(String),

    /// Action does not apply to the host's current lifecycle state
    #[error("Invalid transition for {instance}: {from} does not accept {action}")]
    InvalidTransition {
        instance: String,
        from: LifecycleState,
        action: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScaleError {
    /// Create an unavailable-metric error
    pub fn metric_unavailable(
        metric: impl Into<String>,
        target: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::MetricUnavailable {
            metric: metric.into(),
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a drain failure
    pub fn drain(instance: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::DrainFailure {
            instance: instance.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a termination failure
    pub fn termination(instance: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::TerminationFailure {
            instance: instance.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an inventory error from any AWS SDK error
    pub fn inventory<E>(err: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::Inventory(err.to_string())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Short machine-friendly kind, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MetricUnavailable { .. } => "metric_unavailable",
            Self::GroupNotFound(_) => "group_not_found",
            Self::DrainFailure { .. } => "drain_failure",
            Self::TerminationFailure { .. } => "termination_failure",
            Self::NoActiveInstances(_) => "no_active_instances",
            Self::Inventory(_) => "inventory",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ScaleError::metric_unavailable("MemoryReservation", "web", "no datapoints");
        assert_eq!(
            err.to_string(),
            "Metric MemoryReservation unavailable for web: no datapoints"
        );
        assert_eq!(err.kind(), "metric_unavailable");

        let err = ScaleError::InvalidTransition {
            instance: "i-1".to_string(),
            from: LifecycleState::Removed,
            action: "Drain".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition for i-1: REMOVED does not accept Drain"
        );
    }
}
