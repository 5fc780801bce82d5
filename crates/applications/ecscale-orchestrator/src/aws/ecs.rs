//! ECS cluster and container instance inventory

use async_trait::async_trait;
use aws_sdk_ecs::types::{ContainerInstance, ContainerInstanceStatus};
use aws_sdk_ecs::Client as EcsClient;
use ecscale_core::{ClusterId, ClusterLister, ContainerInventory, InstanceInfo, Result, ScaleError};
use tracing::{debug, warn};

/// Maximum container instances per `DescribeContainerInstances` call
const DESCRIBE_BATCH_SIZE: usize = 100;

/// Resource name carrying remaining memory
const MEMORY_RESOURCE: &str = "MEMORY";

/// Keep clusters whose ARN does not contain `exclude`
pub fn filter_clusters(arns: &[String], exclude: &str) -> Vec<ClusterId> {
    arns.iter()
        .filter(|arn| exclude.is_empty() || !arn.contains(exclude))
        .map(|arn| ClusterId::from_arn(arn.as_str()))
        .collect()
}

/// Convert a described container instance, `None` if it has no EC2 id or ARN
pub fn instance_from_container(container: &ContainerInstance) -> Option<InstanceInfo> {
    let host_id = container.ec2_instance_id()?;
    let lifecycle_ref = container.container_instance_arn()?;

    let free_memory_mb = container
        .remaining_resources()
        .iter()
        .find(|r| r.name() == Some(MEMORY_RESOURCE))
        .map(|r| r.integer_value().max(0) as u64)
        .unwrap_or(0);

    Some(InstanceInfo {
        host_id: host_id.to_string(),
        lifecycle_ref: lifecycle_ref.to_string(),
        running_tasks: container.running_tasks_count().max(0) as u32,
        pending_tasks: container.pending_tasks_count().max(0) as u32,
        free_memory_mb,
    })
}

/// ECS-backed cluster lister and container inventory
pub struct EcsInventory {
    client: EcsClient,
    exclude_substring: String,
}

impl EcsInventory {
    /// Create a new inventory
    pub fn new(client: EcsClient, exclude_substring: impl Into<String>) -> Self {
        Self {
            client,
            exclude_substring: exclude_substring.into(),
        }
    }

    async fn list_with_status(
        &self,
        cluster: &ClusterId,
        status: ContainerInstanceStatus,
    ) -> Result<Vec<String>> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_container_instances()
                .cluster(&cluster.arn)
                .status(status.clone())
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(ScaleError::inventory)?;

            arns.extend(response.container_instance_arns().iter().cloned());

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        debug!(cluster = %cluster, status = ?status, count = arns.len(), "Listed container instances");
        Ok(arns)
    }
}

#[async_trait]
impl ClusterLister for EcsInventory {
    async fn list(&self) -> Result<Vec<ClusterId>> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_clusters()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(ScaleError::inventory)?;

            arns.extend(response.cluster_arns().iter().cloned());

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        let clusters = filter_clusters(&arns, &self.exclude_substring);
        debug!(
            total = arns.len(),
            managed = clusters.len(),
            "Listed ECS clusters"
        );
        Ok(clusters)
    }
}

#[async_trait]
impl ContainerInventory for EcsInventory {
    async fn list_active(&self, cluster: &ClusterId) -> Result<Vec<String>> {
        self.list_with_status(cluster, ContainerInstanceStatus::Active).await
    }

    async fn list_draining(&self, cluster: &ClusterId) -> Result<Vec<String>> {
        self.list_with_status(cluster, ContainerInstanceStatus::Draining).await
    }

    async fn describe(&self, cluster: &ClusterId, refs: &[String]) -> Result<Vec<InstanceInfo>> {
        let mut instances = Vec::with_capacity(refs.len());

        for batch in refs.chunks(DESCRIBE_BATCH_SIZE) {
            let response = self
                .client
                .describe_container_instances()
                .cluster(&cluster.arn)
                .set_container_instances(Some(batch.to_vec()))
                .send()
                .await
                .map_err(ScaleError::inventory)?;

            for failure in response.failures() {
                warn!(
                    cluster = %cluster,
                    arn = ?failure.arn(),
                    reason = ?failure.reason(),
                    "Container instance could not be described"
                );
            }

            instances.extend(
                response
                    .container_instances()
                    .iter()
                    .filter_map(instance_from_container),
            );
        }

        Ok(instances)
    }
}
