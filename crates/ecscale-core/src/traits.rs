//! Collaborator interfaces
//!
//! The decision engine only ever talks to the cloud through these traits.
//! AWS implementations live in the orchestrator crate; tests use in-memory fakes.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::types::{AutoScalingGroupState, ClusterId, InstanceInfo};

/// Trailing window used for metric averages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricWindow {
    /// How far back the window reaches
    pub window: Duration,
    /// Statistic period
    pub period: Duration,
}

impl Default for MetricWindow {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(120),
            period: Duration::from_secs(60),
        }
    }
}

/// Enumerates managed clusters
#[async_trait]
pub trait ClusterLister: Send + Sync {
    /// Clusters to evaluate, with excluded names already filtered out
    async fn list(&self) -> Result<Vec<ClusterId>>;
}

/// Container instance inventory of a cluster
#[async_trait]
pub trait ContainerInventory: Send + Sync {
    /// Lifecycle refs of ACTIVE container instances
    async fn list_active(&self, cluster: &ClusterId) -> Result<Vec<String>>;

    /// Lifecycle refs of DRAINING container instances
    async fn list_draining(&self, cluster: &ClusterId) -> Result<Vec<String>>;

    /// Describe container instances by lifecycle ref
    async fn describe(&self, cluster: &ClusterId, refs: &[String]) -> Result<Vec<InstanceInfo>>;
}

/// Metric averages over a trailing window
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Average memory reservation (%) of a cluster
    async fn avg_memory_reservation(&self, cluster: &ClusterId, window: MetricWindow) -> Result<f64>;

    /// Average CPU utilization (%) of an Auto Scaling group
    async fn avg_cpu_utilization(&self, group: &str, window: MetricWindow) -> Result<f64>;
}

/// Auto Scaling group introspection
#[async_trait]
pub trait AutoScalingInventory: Send + Sync {
    /// All groups with their size limits and `Name` tag
    async fn describe_groups(&self) -> Result<Vec<AutoScalingGroupState>>;
}

/// Mutating lifecycle calls
#[async_trait]
pub trait LifecycleMutator: Send + Sync {
    /// Put a container instance into DRAINING
    async fn drain(&self, lifecycle_ref: &str, cluster: &ClusterId) -> Result<()>;

    /// Terminate a host and decrement its group's desired capacity
    async fn terminate_and_decrement(&self, host_id: &str) -> Result<()>;
}
