//! Scale-in decision rules
//!
//! Evaluated per cluster, per pass, in this order:
//!
//! ```text
//! 1. Idle drain          every active host with no tasks      → Drain
//! 2. Eligibility gate    M < FUTURE_TH and F < FUTURE_TH      (needs M)
//! 3. Memory pressure     M < MEM_TH, group scaleable,
//!                        CPU < CPU_TH                         → Drain(least utilized)
//! 4. Termination sweep   every draining host with no tasks    → TerminateAndDecrement
//! ```
//!
//! Rules 1 and 4 run whatever the metrics say. Rules 2-3 produce at most one
//! drain and record why they stopped in a [`ScaleInVerdict`].

use crate::config::ScalerConfig;
use crate::projection::FutureReservation;
use crate::select::least_utilized;
use ecscale_core::{ClusterId, ClusterSnapshot, DrainReason, MetricsProvider, ScaleAction};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Outcome of the memory-pressure scale-in rules for one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict")]
pub enum ScaleInVerdict {
    /// Memory reservation metric missing, scale-in not gated safely
    MetricUnavailable,

    /// Current or projected reservation at or above the ceiling
    ReservationTooHigh {
        /// Current reservation (%)
        current: f64,
        /// Projected reservation with one host fewer
        future: FutureReservation,
    },

    /// Reservation not low enough to need scale-in
    MemoryNotLow {
        /// Current reservation (%)
        current: f64,
    },

    /// No Auto Scaling group tagged for the cluster
    GroupNotFound,

    /// Desired capacity below the group minimum
    GroupNotScaleable {
        /// Group minimum
        min_size: i32,
        /// Group desired capacity
        desired_capacity: i32,
    },

    /// Group CPU metric missing
    CpuUnavailable,

    /// Group CPU at or above threshold
    CpuTooHigh {
        /// Group CPU (%)
        cpu: f64,
    },

    /// No active host to pick from
    NoCandidate,

    /// Least-utilized host is idle and already drained by rule 1
    CandidateAlreadyDraining {
        /// Selected host
        host_id: String,
    },

    /// Least-utilized host drained
    CandidateDrained {
        /// Selected host
        host_id: String,
        /// Group CPU (%) that allowed it
        cpu: f64,
    },
}

/// Everything the engine decided for one cluster in one pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterDecision {
    /// Cluster evaluated
    pub cluster: ClusterId,

    /// Memory reservation used for gating
    pub mem_reservation_pct: Option<f64>,

    /// Projection used for gating (absent when the metric was)
    pub future_reservation: Option<FutureReservation>,

    /// Why memory-pressure scale-in did or did not happen
    pub verdict: ScaleInVerdict,

    /// Actions to execute, idle drains first, terminations last
    pub actions: Vec<ScaleAction>,

    /// Draining hosts left for a later pass because tasks remain
    pub deferred: Vec<String>,
}

impl ClusterDecision {
    /// Number of drain actions
    pub fn drain_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, ScaleAction::Drain { .. }))
            .count()
    }

    /// Number of terminate actions
    pub fn terminate_count(&self) -> usize {
        self.actions.len() - self.drain_count()
    }
}

/// Rule 1: drain every idle active host
pub fn idle_drains(snapshot: &ClusterSnapshot) -> Vec<ScaleAction> {
    snapshot
        .idle_instances()
        .map(|instance| {
            info!(
                cluster = %snapshot.cluster,
                host_id = %instance.host_id,
                "Idle instance, draining"
            );
            ScaleAction::Drain {
                instance: instance.clone(),
                reason: DrainReason::Idle,
            }
        })
        .collect()
}

/// Rule 4: terminate draining hosts that finished their tasks
///
/// Returns the actions and the host ids deferred to a later pass.
pub fn termination_sweep(snapshot: &ClusterSnapshot) -> (Vec<ScaleAction>, Vec<String>) {
    let mut actions = Vec::new();
    let mut deferred = Vec::new();

    for instance in &snapshot.draining_instances {
        if instance.total_tasks() == 0 {
            if let Some(group) = snapshot.scaling_group.as_ref().filter(|g| g.at_floor()) {
                // Decrement below the floor is left to the group to reject.
                warn!(
                    cluster = %snapshot.cluster,
                    host_id = %instance.host_id,
                    group = %group.name,
                    min_size = group.min_size,
                    desired_capacity = group.desired_capacity,
                    "Terminating drained instance while group is at its minimum"
                );
            }
            info!(
                cluster = %snapshot.cluster,
                host_id = %instance.host_id,
                "Draining instance has no tasks, terminating"
            );
            actions.push(ScaleAction::TerminateAndDecrement {
                instance: instance.clone(),
            });
        } else {
            info!(
                cluster = %snapshot.cluster,
                host_id = %instance.host_id,
                tasks = instance.total_tasks(),
                "Draining instance not empty"
            );
            deferred.push(instance.host_id.clone());
        }
    }

    (actions, deferred)
}

/// Applies the scale-in rules to cluster snapshots
pub struct DecisionEngine {
    config: ScalerConfig,
}

impl DecisionEngine {
    /// Create an engine with the given thresholds
    pub fn new(config: ScalerConfig) -> Self {
        Self { config }
    }

    /// Evaluate all rules for one snapshot
    ///
    /// Group CPU is only fetched when the memory rules reach the CPU gate.
    pub async fn evaluate(
        &self,
        snapshot: &ClusterSnapshot,
        metrics: &dyn MetricsProvider,
    ) -> ClusterDecision {
        let mut actions = idle_drains(snapshot);

        let future_reservation = snapshot
            .mem_reservation_pct
            .map(|m| FutureReservation::project(m, snapshot.active_instances.len()));

        let verdict = self.scale_in(snapshot, future_reservation, metrics).await;

        match &verdict {
            ScaleInVerdict::CandidateDrained { host_id, .. } => {
                if let Some(candidate) = snapshot
                    .active_instances
                    .iter()
                    .find(|i| &i.host_id == host_id)
                {
                    actions.push(ScaleAction::Drain {
                        instance: candidate.clone(),
                        reason: DrainReason::LeastUtilized,
                    });
                }
            }
            ScaleInVerdict::CpuTooHigh { cpu } => {
                info!(
                    cluster = %snapshot.cluster,
                    cpu = cpu,
                    threshold = self.config.scale_in_cpu_th,
                    "CPU higher than threshold, cannot scale"
                );
            }
            other => {
                info!(cluster = %snapshot.cluster, verdict = ?other, "No scale-in");
            }
        }

        let (terminations, deferred) = termination_sweep(snapshot);
        actions.extend(terminations);

        ClusterDecision {
            cluster: snapshot.cluster.clone(),
            mem_reservation_pct: snapshot.mem_reservation_pct,
            future_reservation,
            verdict,
            actions,
            deferred,
        }
    }

    /// Rules 2 and 3
    async fn scale_in(
        &self,
        snapshot: &ClusterSnapshot,
        future: Option<FutureReservation>,
        metrics: &dyn MetricsProvider,
    ) -> ScaleInVerdict {
        let (Some(current), Some(future)) = (snapshot.mem_reservation_pct, future) else {
            return ScaleInVerdict::MetricUnavailable;
        };

        info!(
            cluster = %snapshot.cluster,
            current = current,
            future = %future,
            "Memory reservation"
        );

        let th = &self.config;
        if !(current < th.future_mem_th && future.is_below(th.future_mem_th)) {
            return ScaleInVerdict::ReservationTooHigh { current, future };
        }

        if current >= th.scale_in_mem_th {
            return ScaleInVerdict::MemoryNotLow { current };
        }

        let Some(group) = snapshot.scaling_group.as_ref() else {
            warn!(cluster = %snapshot.cluster, "Auto Scaling group not found, scale-in not permitted");
            return ScaleInVerdict::GroupNotFound;
        };

        if !group.is_scaleable() {
            warn!(
                cluster = %snapshot.cluster,
                group = %group.name,
                min_size = group.min_size,
                desired_capacity = group.desired_capacity,
                "Auto Scaling group below its minimum, scale-in not permitted"
            );
            return ScaleInVerdict::GroupNotScaleable {
                min_size: group.min_size,
                desired_capacity: group.desired_capacity,
            };
        }

        let cpu = match metrics.avg_cpu_utilization(&group.name, th.window()).await {
            Ok(cpu) => cpu,
            Err(e) => {
                warn!(cluster = %snapshot.cluster, group = %group.name, error = %e, "Could not retrieve CPU utilization");
                return ScaleInVerdict::CpuUnavailable;
            }
        };

        if cpu >= th.scale_in_cpu_th {
            return ScaleInVerdict::CpuTooHigh { cpu };
        }

        let Some(candidate) = least_utilized(&snapshot.active_instances) else {
            return ScaleInVerdict::NoCandidate;
        };

        info!(
            cluster = %snapshot.cluster,
            host_id = %candidate.host_id,
            free_memory_mb = candidate.free_memory_mb,
            "Scale candidate"
        );

        if candidate.is_idle() {
            ScaleInVerdict::CandidateAlreadyDraining {
                host_id: candidate.host_id.clone(),
            }
        } else {
            ScaleInVerdict::CandidateDrained {
                host_id: candidate.host_id.clone(),
                cpu,
            }
        }
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(ScalerConfig::default())
    }
}
