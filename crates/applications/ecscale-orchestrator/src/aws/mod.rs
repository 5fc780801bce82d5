//! AWS implementations of the collaborator traits
//!
//! | Trait                  | Service     | Type                  |
//! |------------------------|-------------|-----------------------|
//! | `ClusterLister`        | ECS         | [`EcsInventory`]      |
//! | `ContainerInventory`   | ECS         | [`EcsInventory`]      |
//! | `MetricsProvider`      | CloudWatch  | [`CloudWatchMetrics`] |
//! | `AutoScalingInventory` | Auto Scaling| [`AutoScalingGroups`] |
//! | `LifecycleMutator`     | ECS + ASG   | [`AwsLifecycleMutator`] |

pub mod autoscaling;
pub mod cloudwatch;
pub mod ecs;
pub mod mutator;

pub use autoscaling::AutoScalingGroups;
pub use cloudwatch::CloudWatchMetrics;
pub use ecs::EcsInventory;
pub use mutator::AwsLifecycleMutator;

use crate::sweep::Collaborators;
use aws_config::BehaviorVersion;
use aws_types::region::Region;
use std::sync::Arc;
use tracing::debug;

/// Load shared AWS config from the environment
///
/// Without an explicit region the SDK's provider chain (env, profile, IMDS) decides.
pub async fn load_config(region: Option<String>) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    match region {
        Some(region) => {
            debug!("Loading AWS config for region: {}", region);
            loader = loader.region(Region::new(region));
        }
        None => debug!("Loading AWS config, region from provider chain"),
    }

    let config = loader.load().await;
    debug!(region = ?config.region(), "AWS config loaded");
    config
}

/// Build every collaborator from one AWS config
pub fn collaborators(config: &aws_config::SdkConfig, exclude_substring: &str) -> Collaborators {
    let ecs = aws_sdk_ecs::Client::new(config);
    let autoscaling = aws_sdk_autoscaling::Client::new(config);

    let inventory = Arc::new(EcsInventory::new(ecs.clone(), exclude_substring));

    Collaborators {
        lister: inventory.clone(),
        inventory,
        metrics: Arc::new(CloudWatchMetrics::from_config(config)),
        groups: Arc::new(AutoScalingGroups::new(autoscaling.clone())),
        mutator: Arc::new(AwsLifecycleMutator::new(ecs, autoscaling)),
    }
}
