//! One scale-in pass over every managed cluster
//!
//! Clusters are evaluated one after another. Any error inside a cluster is
//! recorded in its [`ClusterReport`] and the sweep moves on to the next one.

use crate::config::ScalerConfig;
use crate::engine::{ClusterDecision, DecisionEngine};
use crate::lifecycle::{ActionOutcome, ActionRecord, LifecycleExecutor};
use crate::snapshot::SnapshotBuilder;
use chrono::{DateTime, Utc};
use ecscale_core::{
    AutoScalingInventory, ClusterId, ClusterLister, ContainerInventory, LifecycleMutator,
    MetricsProvider, RunMode, ScaleAction, ScaleError,
};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Collaborators used by a sweep, constructed once per process
#[derive(Clone)]
pub struct Collaborators {
    /// Cluster enumeration
    pub lister: Arc<dyn ClusterLister>,
    /// Container instance listing and description
    pub inventory: Arc<dyn ContainerInventory>,
    /// Memory reservation and CPU averages
    pub metrics: Arc<dyn MetricsProvider>,
    /// Auto Scaling group state
    pub groups: Arc<dyn AutoScalingInventory>,
    /// Drain and terminate calls
    pub mutator: Arc<dyn LifecycleMutator>,
}

impl Collaborators {
    /// Use one object for every collaborator role
    pub fn from_single<T>(backend: Arc<T>) -> Self
    where
        T: ClusterLister
            + ContainerInventory
            + MetricsProvider
            + AutoScalingInventory
            + LifecycleMutator
            + 'static,
    {
        Self {
            lister: backend.clone(),
            inventory: backend.clone(),
            metrics: backend.clone(),
            groups: backend.clone(),
            mutator: backend,
        }
    }
}

/// Result of evaluating one cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ClusterOutcome {
    /// Rules evaluated and actions executed (or logged)
    Evaluated {
        /// Decided actions and verdict
        decision: ClusterDecision,
        /// Outcome of each action
        records: Vec<ActionRecord>,
    },
    /// Cluster skipped for this pass
    Skipped {
        /// Error kind
        kind: String,
        /// Error message
        reason: String,
    },
}

/// Per-cluster entry of a sweep report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterReport {
    /// Cluster evaluated
    pub cluster: ClusterId,
    /// What happened to it
    pub outcome: ClusterOutcome,
}

impl ClusterReport {
    fn skipped(cluster: ClusterId, err: &ScaleError) -> Self {
        Self {
            cluster,
            outcome: ClusterOutcome::Skipped {
                kind: err.kind().to_string(),
                reason: err.to_string(),
            },
        }
    }
}

/// Everything that happened in one pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    /// Correlates log lines of one pass
    pub pass_id: Uuid,
    /// Run mode of the pass
    pub mode: RunMode,
    /// Pass start time
    pub started_at: DateTime<Utc>,
    /// One entry per listed cluster, in listing order
    pub clusters: Vec<ClusterReport>,
    /// Cluster listing failed; nothing was evaluated
    pub listing_error: Option<String>,
}

impl SweepReport {
    /// All actions decided in this pass, in execution order
    pub fn actions(&self) -> impl Iterator<Item = &ScaleAction> {
        self.clusters
            .iter()
            .filter_map(|c| match &c.outcome {
                ClusterOutcome::Evaluated { decision, .. } => Some(decision.actions.iter()),
                ClusterOutcome::Skipped { .. } => None,
            })
            .flatten()
    }

    /// Outcome records of all executed actions
    pub fn records(&self) -> impl Iterator<Item = &ActionRecord> {
        self.clusters
            .iter()
            .filter_map(|c| match &c.outcome {
                ClusterOutcome::Evaluated { records, .. } => Some(records.iter()),
                ClusterOutcome::Skipped { .. } => None,
            })
            .flatten()
    }

    /// Short human-readable summary, one line per cluster
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "pass {} ({} mode)", self.pass_id, self.mode);

        if let Some(err) = &self.listing_error {
            let _ = writeln!(out, "  cluster listing failed: {}", err);
        }

        for report in &self.clusters {
            match &report.outcome {
                ClusterOutcome::Evaluated { decision, records } => {
                    let failed = records
                        .iter()
                        .filter(|r| matches!(r.outcome, ActionOutcome::Failed { .. }))
                        .count();
                    let _ = writeln!(
                        out,
                        "  {}: {} drain, {} terminate, {} deferred, {} failed ({:?})",
                        report.cluster,
                        decision.drain_count(),
                        decision.terminate_count(),
                        decision.deferred.len(),
                        failed,
                        decision.verdict
                    );
                }
                ClusterOutcome::Skipped { reason, .. } => {
                    let _ = writeln!(out, "  {}: skipped ({})", report.cluster, reason);
                }
            }
        }

        out
    }
}

/// Runs scale-in passes
pub struct Sweeper {
    collaborators: Collaborators,
    snapshots: SnapshotBuilder,
    engine: DecisionEngine,
}

impl Sweeper {
    /// Create a sweeper
    pub fn new(collaborators: Collaborators, config: ScalerConfig) -> Self {
        let snapshots = SnapshotBuilder::new(
            collaborators.inventory.clone(),
            collaborators.metrics.clone(),
            config.window(),
        );
        Self {
            collaborators,
            snapshots,
            engine: DecisionEngine::new(config),
        }
    }

    /// Run one pass over every cluster
    pub async fn run(&self, mode: RunMode) -> SweepReport {
        let pass_id = Uuid::new_v4();
        let span = info_span!("sweep", pass_id = %pass_id, mode = %mode);
        self.run_pass(pass_id, mode).instrument(span).await
    }

    async fn run_pass(&self, pass_id: Uuid, mode: RunMode) -> SweepReport {
        let mut report = SweepReport {
            pass_id,
            mode,
            started_at: Utc::now(),
            clusters: Vec::new(),
            listing_error: None,
        };

        let clusters = match self.collaborators.lister.list().await {
            Ok(clusters) => clusters,
            Err(e) => {
                warn!(error = %e, "Could not list clusters");
                report.listing_error = Some(e.to_string());
                return report;
            }
        };

        if clusters.is_empty() {
            info!("No ECS cluster found");
            return report;
        }

        let groups = match self.collaborators.groups.describe_groups().await {
            Ok(groups) => groups,
            Err(e) => {
                warn!(error = %e, "Could not describe Auto Scaling groups, scale-in disabled this pass");
                Vec::new()
            }
        };

        let executor = LifecycleExecutor::new(self.collaborators.mutator.clone(), mode);

        for cluster in clusters {
            let span = info_span!("cluster", cluster = %cluster.name);
            let entry = async {
                let snapshot = match self.snapshots.build(&cluster, &groups).await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        if !matches!(e, ScaleError::NoActiveInstances(_)) {
                            warn!(error = %e, "Skipping cluster");
                        }
                        return ClusterReport::skipped(cluster.clone(), &e);
                    }
                };

                let decision = self
                    .engine
                    .evaluate(&snapshot, self.collaborators.metrics.as_ref())
                    .await;
                let records = executor.execute(&snapshot, &decision.actions).await;

                ClusterReport {
                    cluster: cluster.clone(),
                    outcome: ClusterOutcome::Evaluated { decision, records },
                }
            }
            .instrument(span)
            .await;

            report.clusters.push(entry);
        }

        info!(
            clusters = report.clusters.len(),
            actions = report.actions().count(),
            "Sweep complete"
        );

        report
    }
}
