//! Auto Scaling group inventory

use async_trait::async_trait;
use aws_sdk_autoscaling::types::AutoScalingGroup;
use aws_sdk_autoscaling::Client as AsgClient;
use ecscale_core::{AutoScalingGroupState, AutoScalingInventory, Result, ScaleError};
use tracing::debug;

/// Tag binding a group to a cluster
const NAME_TAG: &str = "Name";

/// Convert an SDK group, `None` if it has no name
pub fn group_from_sdk(group: &AutoScalingGroup) -> Option<AutoScalingGroupState> {
    let name = group.auto_scaling_group_name()?;

    let name_tag = group
        .tags()
        .iter()
        .find(|t| t.key() == Some(NAME_TAG))
        .and_then(|t| t.value())
        .map(str::to_string);

    Some(AutoScalingGroupState {
        name: name.to_string(),
        min_size: group.min_size().unwrap_or(0),
        desired_capacity: group.desired_capacity().unwrap_or(0),
        name_tag,
    })
}

/// Auto Scaling backed group inventory
pub struct AutoScalingGroups {
    client: AsgClient,
}

impl AutoScalingGroups {
    /// Create a new group inventory
    pub fn new(client: AsgClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AutoScalingInventory for AutoScalingGroups {
    async fn describe_groups(&self) -> Result<Vec<AutoScalingGroupState>> {
        let mut groups = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .describe_auto_scaling_groups()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(ScaleError::inventory)?;

            groups.extend(response.auto_scaling_groups().iter().filter_map(group_from_sdk));

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        debug!(count = groups.len(), "Described Auto Scaling groups");
        Ok(groups)
    }
}
