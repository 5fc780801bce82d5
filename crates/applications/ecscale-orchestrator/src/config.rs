//! Scale-in thresholds and metric window

use ecscale_core::{MetricWindow, Result, ScaleError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Average group CPU (%) below which a memory-pressure scale-in may happen
pub const DEFAULT_SCALE_IN_CPU_TH: f64 = 30.0;

/// Cluster memory reservation (%) below which a memory-pressure scale-in may happen
pub const DEFAULT_SCALE_IN_MEM_TH: f64 = 60.0;

/// Ceiling for both current and projected memory reservation (%)
pub const DEFAULT_FUTURE_MEM_TH: f64 = 70.0;

/// Clusters whose ARN contains this are never touched (Elastic Beanstalk managed)
pub const DEFAULT_EXCLUDE_SUBSTRING: &str = "awseb";

/// Trailing metric window (seconds)
pub const DEFAULT_METRIC_WINDOW_SECS: u64 = 120;

/// Metric statistic period (seconds)
pub const DEFAULT_METRIC_PERIOD_SECS: u64 = 60;

/// Configuration for the scale-in engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerConfig {
    /// CPU threshold (%) for memory-pressure scale-in
    pub scale_in_cpu_th: f64,

    /// Memory reservation threshold (%) for memory-pressure scale-in
    pub scale_in_mem_th: f64,

    /// Current and projected memory reservation ceiling (%)
    pub future_mem_th: f64,

    /// Cluster exclusion substring
    pub exclude_substring: String,

    /// Trailing metric window
    pub metric_window: Duration,

    /// Metric statistic period
    pub metric_period: Duration,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            scale_in_cpu_th: DEFAULT_SCALE_IN_CPU_TH,
            scale_in_mem_th: DEFAULT_SCALE_IN_MEM_TH,
            future_mem_th: DEFAULT_FUTURE_MEM_TH,
            exclude_substring: DEFAULT_EXCLUDE_SUBSTRING.to_string(),
            metric_window: Duration::from_secs(DEFAULT_METRIC_WINDOW_SECS),
            metric_period: Duration::from_secs(DEFAULT_METRIC_PERIOD_SECS),
        }
    }
}

impl ScalerConfig {
    /// Set CPU threshold
    pub fn with_cpu_threshold(mut self, pct: f64) -> Self {
        self.scale_in_cpu_th = pct;
        self
    }

    /// Set memory reservation threshold
    pub fn with_mem_threshold(mut self, pct: f64) -> Self {
        self.scale_in_mem_th = pct;
        self
    }

    /// Set future reservation ceiling
    pub fn with_future_threshold(mut self, pct: f64) -> Self {
        self.future_mem_th = pct;
        self
    }

    /// Set cluster exclusion substring
    pub fn with_exclude_substring(mut self, s: impl Into<String>) -> Self {
        self.exclude_substring = s.into();
        self
    }

    /// Set metric window and period
    pub fn with_metric_window(mut self, window: Duration, period: Duration) -> Self {
        self.metric_window = window;
        self.metric_period = period;
        self
    }

    /// Window handed to the metrics provider
    pub fn window(&self) -> MetricWindow {
        MetricWindow {
            window: self.metric_window,
            period: self.metric_period,
        }
    }

    /// Check thresholds are percentages and the metric window is usable
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("scale_in_cpu_th", self.scale_in_cpu_th),
            ("scale_in_mem_th", self.scale_in_mem_th),
            ("future_mem_th", self.future_mem_th),
        ] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(ScaleError::config(format!(
                    "{} must be a percentage between 0 and 100, got {}",
                    name, value
                )));
            }
        }

        if self.metric_period.is_zero() {
            return Err(ScaleError::config("metric_period must be non-zero"));
        }

        if self.metric_window < self.metric_period {
            return Err(ScaleError::config(format!(
                "metric_window ({:?}) must cover at least one period ({:?})",
                self.metric_window, self.metric_period
            )));
        }

        Ok(())
    }
}
