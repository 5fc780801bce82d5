//! Host lifecycle transitions and action execution
//!
//! ```text
//! ACTIVE ──Drain──▶ DRAINING ──TerminateAndDecrement──▶ REMOVED
//! ```
//!
//! Every decided action is checked against the host's state in the snapshot
//! before it is logged (dry run) or sent to the [`LifecycleMutator`].
//! Failures are recorded per action; the next pass retries from fresh state.

use ecscale_core::{
    ClusterSnapshot, LifecycleMutator, LifecycleState, Result, RunMode, ScaleAction, ScaleError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Next state of a host after an action, or `InvalidTransition`
pub fn transition(host_id: &str, from: LifecycleState, action: &ScaleAction) -> Result<LifecycleState> {
    if from != action.from_state() {
        return Err(ScaleError::InvalidTransition {
            instance: host_id.to_string(),
            from,
            action: action_name(action).to_string(),
        });
    }

    Ok(match action {
        ScaleAction::Drain { .. } => LifecycleState::Draining,
        ScaleAction::TerminateAndDecrement { .. } => LifecycleState::Removed,
    })
}

fn action_name(action: &ScaleAction) -> &'static str {
    match action {
        ScaleAction::Drain { .. } => "Drain",
        ScaleAction::TerminateAndDecrement { .. } => "TerminateAndDecrement",
    }
}

/// What happened to one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome")]
pub enum ActionOutcome {
    /// Mutator call succeeded
    Applied,
    /// Dry run, nothing sent
    DryRun,
    /// Refused by the state machine
    Refused {
        /// Why the state machine refused it
        reason: String,
    },
    /// Mutator call failed
    Failed {
        /// Error kind
        kind: String,
        /// Error message
        reason: String,
    },
}

/// An action together with its outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Decided action
    pub action: ScaleAction,
    /// What happened when executing it
    pub outcome: ActionOutcome,
}

/// Executes decided actions against the mutator, or logs them in dry-run mode
pub struct LifecycleExecutor {
    mutator: Arc<dyn LifecycleMutator>,
    mode: RunMode,
}

impl LifecycleExecutor {
    /// Create an executor
    pub fn new(mutator: Arc<dyn LifecycleMutator>, mode: RunMode) -> Self {
        Self { mutator, mode }
    }

    /// Execute actions in order for one cluster
    pub async fn execute(&self, snapshot: &ClusterSnapshot, actions: &[ScaleAction]) -> Vec<ActionRecord> {
        let mut states: HashMap<&str, LifecycleState> = HashMap::new();
        let mut records = Vec::with_capacity(actions.len());

        for action in actions {
            let host_id = action.instance().host_id.as_str();

            let current = match states.get(host_id).copied().or_else(|| snapshot.state_of(host_id)) {
                Some(state) => state,
                None => {
                    warn!(cluster = %snapshot.cluster, host_id = %host_id, "Host not in snapshot, skipping");
                    records.push(ActionRecord {
                        action: action.clone(),
                        outcome: ActionOutcome::Refused {
                            reason: format!("{} not in snapshot", host_id),
                        },
                    });
                    continue;
                }
            };

            let next = match transition(host_id, current, action) {
                Ok(next) => next,
                Err(e) => {
                    warn!(cluster = %snapshot.cluster, error = %e, "Refusing action");
                    records.push(ActionRecord {
                        action: action.clone(),
                        outcome: ActionOutcome::Refused {
                            reason: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            let outcome = if self.mode.is_dry() {
                self.log_dry(snapshot, action);
                ActionOutcome::DryRun
            } else {
                match self.apply(snapshot, action).await {
                    Ok(()) => ActionOutcome::Applied,
                    Err(e) => {
                        warn!(cluster = %snapshot.cluster, host_id = %host_id, error = %e, "Action failed, will retry next pass");
                        ActionOutcome::Failed {
                            kind: e.kind().to_string(),
                            reason: e.to_string(),
                        }
                    }
                }
            };

            // Failed calls leave the host where it was.
            if !matches!(outcome, ActionOutcome::Failed { .. }) {
                states.insert(host_id, next);
            }

            records.push(ActionRecord {
                action: action.clone(),
                outcome,
            });
        }

        records
    }

    fn log_dry(&self, snapshot: &ClusterSnapshot, action: &ScaleAction) {
        match action {
            ScaleAction::Drain { instance, reason } => info!(
                cluster = %snapshot.cluster,
                host_id = %instance.host_id,
                reason = ?reason,
                "Would have drained {}",
                instance.host_id
            ),
            ScaleAction::TerminateAndDecrement { instance } => info!(
                cluster = %snapshot.cluster,
                host_id = %instance.host_id,
                "Would have terminated {}",
                instance.host_id
            ),
        }
    }

    async fn apply(&self, snapshot: &ClusterSnapshot, action: &ScaleAction) -> Result<()> {
        match action {
            ScaleAction::Drain { instance, reason } => {
                info!(
                    cluster = %snapshot.cluster,
                    host_id = %instance.host_id,
                    reason = ?reason,
                    "Draining {}",
                    instance.host_id
                );
                self.mutator.drain(&instance.lifecycle_ref, &snapshot.cluster).await
            }
            ScaleAction::TerminateAndDecrement { instance } => {
                info!(
                    cluster = %snapshot.cluster,
                    host_id = %instance.host_id,
                    "Terminating draining instance with no containers {}",
                    instance.host_id
                );
                self.mutator.terminate_and_decrement(&instance.host_id).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeCloud, MutatorCall};
    use ecscale_core::{ClusterId, DrainReason, InstanceInfo};

    fn drain(id: &str) -> ScaleAction {
        ScaleAction::Drain {
            instance: InstanceInfo::new(id, format!("ci-{}", id)),
            reason: DrainReason::Idle,
        }
    }

    fn terminate(id: &str) -> ScaleAction {
        ScaleAction::TerminateAndDecrement {
            instance: InstanceInfo::new(id, format!("ci-{}", id)),
        }
    }

    fn snapshot() -> ClusterSnapshot {
        ClusterSnapshot::new(ClusterId::from_arn("cluster/web"))
            .with_active(vec![
                InstanceInfo::new("i-a", "ci-i-a"),
                InstanceInfo::new("i-b", "ci-i-b"),
            ])
            .with_draining(vec![InstanceInfo::new("i-d", "ci-i-d")])
    }

    #[test]
    fn test_transitions() {
        assert_eq!(
            transition("i", LifecycleState::Active, &drain("i")).unwrap(),
            LifecycleState::Draining
        );
        assert_eq!(
            transition("i", LifecycleState::Draining, &terminate("i")).unwrap(),
            LifecycleState::Removed
        );
        assert!(transition("i", LifecycleState::Active, &terminate("i")).is_err());
        assert!(transition("i", LifecycleState::Draining, &drain("i")).is_err());
        assert!(transition("i", LifecycleState::Removed, &drain("i")).is_err());
        assert!(transition("i", LifecycleState::Removed, &terminate("i")).is_err());
    }

    #[tokio::test]
    async fn test_normal_mode_calls_mutator() {
        let cloud = Arc::new(FakeCloud::new());
        let executor = LifecycleExecutor::new(cloud.clone(), RunMode::Normal);

        let records = executor
            .execute(&snapshot(), &[drain("i-a"), terminate("i-d")])
            .await;

        assert!(records.iter().all(|r| r.outcome == ActionOutcome::Applied));
        assert_eq!(
            cloud.calls(),
            vec![
                MutatorCall::Drain {
                    lifecycle_ref: "ci-i-a".to_string(),
                    cluster: "web".to_string()
                },
                MutatorCall::Terminate {
                    host_id: "i-d".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_dry_mode_issues_no_calls() {
        let cloud = Arc::new(FakeCloud::new());
        let executor = LifecycleExecutor::new(cloud.clone(), RunMode::Dry);

        let records = executor
            .execute(&snapshot(), &[drain("i-a"), drain("i-b"), terminate("i-d")])
            .await;

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.outcome == ActionOutcome::DryRun));
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_transitions_refused() {
        let cloud = Arc::new(FakeCloud::new());
        let executor = LifecycleExecutor::new(cloud.clone(), RunMode::Normal);

        let records = executor
            .execute(
                &snapshot(),
                &[drain("i-a"), drain("i-a"), terminate("i-b"), drain("i-d"), drain("i-zz")],
            )
            .await;

        assert_eq!(records[0].outcome, ActionOutcome::Applied);
        for record in &records[1..] {
            assert!(matches!(record.outcome, ActionOutcome::Refused { .. }));
        }
        assert_eq!(cloud.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_recorded_and_execution_continues() {
        let cloud = Arc::new(FakeCloud::new().with_failing_host("ci-i-a"));
        let executor = LifecycleExecutor::new(cloud.clone(), RunMode::Normal);

        let records = executor
            .execute(&snapshot(), &[drain("i-a"), drain("i-b")])
            .await;

        assert!(matches!(
            &records[0].outcome,
            ActionOutcome::Failed { kind, .. } if kind == "drain_failure"
        ));
        assert_eq!(records[1].outcome, ActionOutcome::Applied);
        assert_eq!(cloud.calls().len(), 2);
    }
}
