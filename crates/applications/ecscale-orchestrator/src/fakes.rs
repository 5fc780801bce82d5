//! In-memory collaborators for tests

use async_trait::async_trait;
use ecscale_core::{
    AutoScalingGroupState, AutoScalingInventory, ClusterId, ClusterLister, ContainerInventory,
    InstanceInfo, LifecycleMutator, MetricWindow, MetricsProvider, Result, ScaleError,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Mutating call recorded by [`FakeCloud`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutatorCall {
    Drain { lifecycle_ref: String, cluster: String },
    Terminate { host_id: String },
}

/// One cluster's inventory and metric
#[derive(Debug, Clone, Default)]
pub struct FakeCluster {
    pub name: String,
    pub memory: Option<f64>,
    pub active: Vec<InstanceInfo>,
    pub draining: Vec<InstanceInfo>,
    pub unresolved_active: Vec<String>,
}

impl FakeCluster {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_memory(mut self, pct: f64) -> Self {
        self.memory = Some(pct);
        self
    }

    pub fn with_active(mut self, instance: InstanceInfo) -> Self {
        self.active.push(instance);
        self
    }

    /// Listed as active but missing from every describe response
    pub fn with_unresolved_active(mut self, lifecycle_ref: &str) -> Self {
        self.unresolved_active.push(lifecycle_ref.to_string());
        self
    }

    pub fn with_draining(mut self, instance: InstanceInfo) -> Self {
        self.draining.push(instance);
        self
    }
}

/// Every collaborator trait backed by in-memory state
#[derive(Default)]
pub struct FakeCloud {
    clusters: Vec<FakeCluster>,
    groups: Vec<AutoScalingGroupState>,
    cpu: HashMap<String, f64>,
    broken_inventory: HashSet<String>,
    failing_hosts: HashSet<String>,
    groups_unavailable: bool,
    calls: Mutex<Vec<MutatorCall>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster(mut self, cluster: FakeCluster) -> Self {
        self.clusters.push(cluster);
        self
    }

    pub fn with_group(mut self, name: &str, tag: &str, min: i32, desired: i32) -> Self {
        self.groups.push(AutoScalingGroupState {
            name: name.to_string(),
            min_size: min,
            desired_capacity: desired,
            name_tag: Some(tag.to_string()),
        });
        self
    }

    pub fn with_cpu(mut self, group: &str, pct: f64) -> Self {
        self.cpu.insert(group.to_string(), pct);
        self
    }

    /// Listing container instances of this cluster fails
    pub fn with_broken_inventory(mut self, cluster: &str) -> Self {
        self.broken_inventory.insert(cluster.to_string());
        self
    }

    /// Mutating calls against this host (by host id or lifecycle ref) fail
    pub fn with_failing_host(mut self, id: &str) -> Self {
        self.failing_hosts.insert(id.to_string());
        self
    }

    pub fn with_groups_unavailable(mut self) -> Self {
        self.groups_unavailable = true;
        self
    }

    pub fn groups(&self) -> Vec<AutoScalingGroupState> {
        self.groups.clone()
    }

    pub fn calls(&self) -> Vec<MutatorCall> {
        self.calls.lock().unwrap().clone()
    }

    fn cluster(&self, id: &ClusterId) -> Result<&FakeCluster> {
        if self.broken_inventory.contains(&id.name) {
            return Err(ScaleError::Inventory(format!("listing {} failed", id.name)));
        }
        self.clusters
            .iter()
            .find(|c| c.name == id.name)
            .ok_or_else(|| ScaleError::Inventory(format!("cluster {} not found", id.name)))
    }
}

#[async_trait]
impl ClusterLister for FakeCloud {
    async fn list(&self) -> Result<Vec<ClusterId>> {
        Ok(self
            .clusters
            .iter()
            .map(|c| ClusterId::from_arn(format!("arn:aws:ecs:us-east-1:1:cluster/{}", c.name)))
            .collect())
    }
}

#[async_trait]
impl ContainerInventory for FakeCloud {
    async fn list_active(&self, cluster: &ClusterId) -> Result<Vec<String>> {
        let c = self.cluster(cluster)?;
        Ok(c.active
            .iter()
            .map(|i| i.lifecycle_ref.clone())
            .chain(c.unresolved_active.iter().cloned())
            .collect())
    }

    async fn list_draining(&self, cluster: &ClusterId) -> Result<Vec<String>> {
        Ok(self.cluster(cluster)?.draining.iter().map(|i| i.lifecycle_ref.clone()).collect())
    }

    async fn describe(&self, cluster: &ClusterId, refs: &[String]) -> Result<Vec<InstanceInfo>> {
        let c = self.cluster(cluster)?;
        Ok(c.active
            .iter()
            .chain(c.draining.iter())
            .filter(|i| refs.contains(&i.lifecycle_ref))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MetricsProvider for FakeCloud {
    async fn avg_memory_reservation(&self, cluster: &ClusterId, _window: MetricWindow) -> Result<f64> {
        self.cluster(cluster)?
            .memory
            .ok_or_else(|| ScaleError::metric_unavailable("MemoryReservation", &cluster.name, "no datapoints"))
    }

    async fn avg_cpu_utilization(&self, group: &str, _window: MetricWindow) -> Result<f64> {
        self.cpu
            .get(group)
            .copied()
            .ok_or_else(|| ScaleError::metric_unavailable("CPUUtilization", group, "no datapoints"))
    }
}

#[async_trait]
impl AutoScalingInventory for FakeCloud {
    async fn describe_groups(&self) -> Result<Vec<AutoScalingGroupState>> {
        if self.groups_unavailable {
            return Err(ScaleError::Inventory("describe_auto_scaling_groups failed".to_string()));
        }
        Ok(self.groups.clone())
    }
}

#[async_trait]
impl LifecycleMutator for FakeCloud {
    async fn drain(&self, lifecycle_ref: &str, cluster: &ClusterId) -> Result<()> {
        self.calls.lock().unwrap().push(MutatorCall::Drain {
            lifecycle_ref: lifecycle_ref.to_string(),
            cluster: cluster.name.clone(),
        });
        if self.failing_hosts.contains(lifecycle_ref) {
            return Err(ScaleError::drain(lifecycle_ref, "injected failure"));
        }
        Ok(())
    }

    async fn terminate_and_decrement(&self, host_id: &str) -> Result<()> {
        self.calls.lock().unwrap().push(MutatorCall::Terminate {
            host_id: host_id.to_string(),
        });
        if self.failing_hosts.contains(host_id) {
            return Err(ScaleError::termination(host_id, "injected failure"));
        }
        Ok(())
    }
}
