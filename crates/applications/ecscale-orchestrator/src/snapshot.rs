//! Per-cluster snapshot assembly
//!
//! Gathers active and draining hosts, the memory reservation metric and the
//! bound Auto Scaling group into one [`ClusterSnapshot`] for a single pass.

use chrono::Utc;
use ecscale_core::{
    AutoScalingGroupState, ClusterId, ClusterSnapshot, ContainerInventory, MetricWindow,
    MetricsProvider, Result, ScaleError,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Find the group whose `Name` tag binds it to the cluster
pub fn find_group<'a>(
    cluster: &ClusterId,
    groups: &'a [AutoScalingGroupState],
) -> Result<&'a AutoScalingGroupState> {
    groups
        .iter()
        .find(|g| g.belongs_to(&cluster.name))
        .ok_or_else(|| ScaleError::GroupNotFound(cluster.name.clone()))
}

/// Builds cluster snapshots from the inventory and metrics collaborators
pub struct SnapshotBuilder {
    inventory: Arc<dyn ContainerInventory>,
    metrics: Arc<dyn MetricsProvider>,
    window: MetricWindow,
}

impl SnapshotBuilder {
    /// Create a new snapshot builder
    pub fn new(
        inventory: Arc<dyn ContainerInventory>,
        metrics: Arc<dyn MetricsProvider>,
        window: MetricWindow,
    ) -> Self {
        Self {
            inventory,
            metrics,
            window,
        }
    }

    /// Build the snapshot of one cluster
    ///
    /// Returns `NoActiveInstances` when the cluster has nothing to evaluate.
    /// A failed memory metric leaves `mem_reservation_pct` empty instead of failing.
    pub async fn build(
        &self,
        cluster: &ClusterId,
        groups: &[AutoScalingGroupState],
    ) -> Result<ClusterSnapshot> {
        let active_refs = self.inventory.list_active(cluster).await?;
        if active_refs.is_empty() {
            info!(cluster = %cluster, "No active instances in cluster");
            return Err(ScaleError::NoActiveInstances(cluster.name.clone()));
        }

        let active_instances = self.inventory.describe(cluster, &active_refs).await?;
        if active_instances.is_empty() {
            warn!(
                cluster = %cluster,
                listed = active_refs.len(),
                "No active instance could be described"
            );
            return Err(ScaleError::NoActiveInstances(cluster.name.clone()));
        }

        let draining_refs = self.inventory.list_draining(cluster).await?;
        let draining_instances = if draining_refs.is_empty() {
            Vec::new()
        } else {
            self.inventory.describe(cluster, &draining_refs).await?
        };

        let mem_reservation_pct = match self
            .metrics
            .avg_memory_reservation(cluster, self.window)
            .await
        {
            Ok(pct) => Some(pct),
            Err(e) => {
                warn!(cluster = %cluster, error = %e, "Could not retrieve memory reservation");
                None
            }
        };

        let scaling_group = match find_group(cluster, groups) {
            Ok(group) => Some(group.clone()),
            Err(e) => {
                debug!(cluster = %cluster, error = %e, "Building snapshot without a group");
                None
            }
        };

        debug!(
            cluster = %cluster,
            active = active_instances.len(),
            draining = draining_instances.len(),
            mem_reservation = ?mem_reservation_pct,
            "Snapshot built"
        );

        Ok(ClusterSnapshot {
            cluster: cluster.clone(),
            mem_reservation_pct,
            active_instances,
            draining_instances,
            scaling_group,
            captured_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeCloud, FakeCluster};
    use ecscale_core::InstanceInfo;

    fn builder(cloud: &Arc<FakeCloud>) -> SnapshotBuilder {
        SnapshotBuilder::new(cloud.clone(), cloud.clone(), MetricWindow::default())
    }

    #[tokio::test]
    async fn test_build_collects_hosts_metric_and_group() {
        let cloud = Arc::new(
            FakeCloud::new()
                .with_cluster(
                    FakeCluster::new("web")
                        .with_memory(42.0)
                        .with_active(InstanceInfo::new("i-a", "ci-a").with_running(1))
                        .with_draining(InstanceInfo::new("i-d", "ci-d")),
                )
                .with_group("asg-web", "web ecs", 1, 3),
        );
        let groups = cloud.groups();
        let cluster = ClusterId::from_arn("arn:aws:ecs:us-east-1:1:cluster/web");

        let snapshot = builder(&cloud).build(&cluster, &groups).await.unwrap();

        assert_eq!(snapshot.mem_reservation_pct, Some(42.0));
        assert_eq!(snapshot.active_instances.len(), 1);
        assert_eq!(snapshot.draining_instances[0].host_id, "i-d");
        assert_eq!(snapshot.scaling_group.unwrap().name, "asg-web");
    }

    #[tokio::test]
    async fn test_no_active_instances_skips_cluster() {
        let cloud = Arc::new(
            FakeCloud::new().with_cluster(
                FakeCluster::new("empty").with_draining(InstanceInfo::new("i-d", "ci-d")),
            ),
        );
        let cluster = ClusterId::from_arn("cluster/empty");

        let err = builder(&cloud).build(&cluster, &[]).await.unwrap_err();
        assert_eq!(err, ScaleError::NoActiveInstances("empty".to_string()));
    }

    #[tokio::test]
    async fn test_undescribable_active_hosts_skip_cluster() {
        let cloud = Arc::new(FakeCloud::new().with_cluster(
            FakeCluster::new("ghost")
                .with_memory(30.0)
                .with_unresolved_active("ci-gone-1")
                .with_unresolved_active("ci-gone-2"),
        ));

        let err = builder(&cloud)
            .build(&ClusterId::from_arn("cluster/ghost"), &[])
            .await
            .unwrap_err();
        assert_eq!(err, ScaleError::NoActiveInstances("ghost".to_string()));
    }

    #[tokio::test]
    async fn test_metric_failure_leaves_reservation_absent() {
        let cloud = Arc::new(FakeCloud::new().with_cluster(
            FakeCluster::new("web").with_active(InstanceInfo::new("i-a", "ci-a")),
        ));
        let cluster = ClusterId::from_arn("cluster/web");

        let snapshot = builder(&cloud).build(&cluster, &[]).await.unwrap();
        assert!(snapshot.mem_reservation_pct.is_none());
        assert!(snapshot.scaling_group.is_none());
    }

    #[tokio::test]
    async fn test_inventory_failure_propagates() {
        let cloud = Arc::new(FakeCloud::new());
        let cluster = ClusterId::from_arn("cluster/missing");

        let err = builder(&cloud).build(&cluster, &[]).await.unwrap_err();
        assert!(matches!(err, ScaleError::Inventory(_)));
    }

    #[test]
    fn test_find_group_by_name_tag() {
        let groups = vec![
            AutoScalingGroupState {
                name: "asg-batch".to_string(),
                min_size: 0,
                desired_capacity: 2,
                name_tag: Some("batch workers".to_string()),
            },
            AutoScalingGroupState {
                name: "asg-web".to_string(),
                min_size: 1,
                desired_capacity: 2,
                name_tag: Some("web".to_string()),
            },
        ];

        let web = ClusterId::from_arn("cluster/web");
        assert_eq!(find_group(&web, &groups).unwrap().name, "asg-web");
        assert_eq!(
            find_group(&ClusterId::from_arn("cluster/api"), &groups).unwrap_err(),
            ScaleError::GroupNotFound("api".to_string())
        );
    }
}
