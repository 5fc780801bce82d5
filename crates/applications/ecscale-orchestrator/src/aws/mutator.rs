//! Drain (ECS) and terminate-with-decrement (Auto Scaling) calls

use async_trait::async_trait;
use aws_sdk_autoscaling::Client as AsgClient;
use aws_sdk_ecs::types::ContainerInstanceStatus;
use aws_sdk_ecs::Client as EcsClient;
use ecscale_core::{ClusterId, LifecycleMutator, Result, ScaleError};
use tracing::info;

/// Mutator backed by ECS and Auto Scaling
pub struct AwsLifecycleMutator {
    ecs: EcsClient,
    autoscaling: AsgClient,
}

impl AwsLifecycleMutator {
    /// Create a new mutator
    pub fn new(ecs: EcsClient, autoscaling: AsgClient) -> Self {
        Self { ecs, autoscaling }
    }
}

#[async_trait]
impl LifecycleMutator for AwsLifecycleMutator {
    async fn drain(&self, lifecycle_ref: &str, cluster: &ClusterId) -> Result<()> {
        let response = self
            .ecs
            .update_container_instances_state()
            .cluster(&cluster.arn)
            .container_instances(lifecycle_ref)
            .status(ContainerInstanceStatus::Draining)
            .send()
            .await
            .map_err(|e| ScaleError::drain(lifecycle_ref, e))?;

        if let Some(failure) = response.failures().first() {
            return Err(ScaleError::drain(
                lifecycle_ref,
                failure.reason().unwrap_or("unknown failure"),
            ));
        }

        info!(cluster = %cluster, lifecycle_ref = %lifecycle_ref, "Container instance set to DRAINING");
        Ok(())
    }

    async fn terminate_and_decrement(&self, host_id: &str) -> Result<()> {
        let response = self
            .autoscaling
            .terminate_instance_in_auto_scaling_group()
            .instance_id(host_id)
            .should_decrement_desired_capacity(true)
            .send()
            .await
            .map_err(|e| ScaleError::termination(host_id, e))?;

        info!(host_id = %host_id, activity = ?response.activity(), "Termination requested");
        Ok(())
    }
}
