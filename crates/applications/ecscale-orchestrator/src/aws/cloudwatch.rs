//! CloudWatch metric averages
//!
//! Both metrics are `Average` statistics over a trailing window:
//!
//! ```text
//! AWS/ECS  MemoryReservation  ClusterName=<cluster>
//! AWS/EC2  CPUUtilization     AutoScalingGroupName=<group>
//! ```

use async_trait::async_trait;
use aws_sdk_cloudwatch::primitives::DateTime;
use aws_sdk_cloudwatch::types::{Datapoint, Dimension, Statistic};
use aws_sdk_cloudwatch::Client as CloudWatchClient;
use chrono::Utc;
use ecscale_core::{ClusterId, MetricWindow, MetricsProvider, Result, ScaleError};
use tracing::debug;

/// Most recent datapoint's average, `None` if no datapoint carries one
pub fn latest_average(datapoints: &[Datapoint]) -> Option<f64> {
    datapoints
        .iter()
        .filter(|dp| dp.average().is_some())
        .max_by_key(|dp| dp.timestamp().map(|t| t.secs()).unwrap_or(i64::MIN))
        .and_then(|dp| dp.average())
}

/// CloudWatch-backed metrics provider
pub struct CloudWatchMetrics {
    client: CloudWatchClient,
}

impl CloudWatchMetrics {
    /// Create a new metrics provider
    pub fn new(client: CloudWatchClient) -> Self {
        Self { client }
    }

    /// Create from AWS config
    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(CloudWatchClient::new(config))
    }

    async fn average(
        &self,
        namespace: &str,
        metric: &str,
        dimension: &str,
        value: &str,
        window: MetricWindow,
    ) -> Result<f64> {
        let end = Utc::now().timestamp();
        let start = end - window.window.as_secs() as i64;

        let response = self
            .client
            .get_metric_statistics()
            .namespace(namespace)
            .metric_name(metric)
            .dimensions(Dimension::builder().name(dimension).value(value).build())
            .start_time(DateTime::from_secs(start))
            .end_time(DateTime::from_secs(end))
            .period(window.period.as_secs() as i32)
            .statistics(Statistic::Average)
            .send()
            .await
            .map_err(|e| ScaleError::metric_unavailable(metric, value, e))?;

        let average = latest_average(response.datapoints())
            .ok_or_else(|| ScaleError::metric_unavailable(metric, value, "no datapoints in window"))?;

        debug!(metric = %metric, target = %value, average = average, "Fetched metric");
        Ok(average)
    }
}

#[async_trait]
impl MetricsProvider for CloudWatchMetrics {
    async fn avg_memory_reservation(&self, cluster: &ClusterId, window: MetricWindow) -> Result<f64> {
        self.average("AWS/ECS", "MemoryReservation", "ClusterName", &cluster.name, window)
            .await
    }

    async fn avg_cpu_utilization(&self, group: &str, window: MetricWindow) -> Result<f64> {
        self.average("AWS/EC2", "CPUUtilization", "AutoScalingGroupName", group, window)
            .await
    }
}
