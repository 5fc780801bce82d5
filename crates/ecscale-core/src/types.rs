//! Core types shared by the snapshot builder, decision engine and executor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An ECS cluster, addressed by ARN in API calls and by short name in metrics and tags
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterId {
    /// Full cluster ARN (`arn:aws:ecs:<region>:<account>:cluster/<name>`)
    pub arn: String,
    /// Short cluster name
    pub name: String,
}

impl ClusterId {
    /// Build a cluster id from an ARN.
    ///
    /// The short name is the segment after the first `/`. A bare name (no `/`)
    /// is used as both ARN and name.
    pub fn from_arn(arn: impl Into<String>) -> Self {
        let arn = arn.into();
        let name = match arn.split_once('/') {
            Some((_, rest)) => rest.split('/').next().unwrap_or(rest).to_string(),
            None => arn.clone(),
        };
        Self { arn, name }
    }
}

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Container host (container instance) as seen in one evaluation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    /// EC2 instance id of the host
    pub host_id: String,

    /// Container instance ARN, used to address the host in drain calls
    pub lifecycle_ref: String,

    /// Tasks currently running on the host
    pub running_tasks: u32,

    /// Tasks placed but not yet running
    pub pending_tasks: u32,

    /// Unreserved memory on the host (MB)
    pub free_memory_mb: u64,
}

impl InstanceInfo {
    /// Create a host record with no tasks and no free memory
    pub fn new(host_id: impl Into<String>, lifecycle_ref: impl Into<String>) -> Self {
        Self {
            host_id: host_id.into(),
            lifecycle_ref: lifecycle_ref.into(),
            running_tasks: 0,
            pending_tasks: 0,
            free_memory_mb: 0,
        }
    }

    /// Set running task count
    pub fn with_running(mut self, running: u32) -> Self {
        self.running_tasks = running;
        self
    }

    /// Set pending task count
    pub fn with_pending(mut self, pending: u32) -> Self {
        self.pending_tasks = pending;
        self
    }

    /// Set free memory (MB)
    pub fn with_free_memory(mut self, free_memory_mb: u64) -> Self {
        self.free_memory_mb = free_memory_mb;
        self
    }

    /// Running plus pending tasks
    pub fn total_tasks(&self) -> u32 {
        self.running_tasks + self.pending_tasks
    }

    /// No running and no pending tasks
    pub fn is_idle(&self) -> bool {
        self.running_tasks == 0 && self.pending_tasks == 0
    }
}

/// Auto Scaling group backing a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoScalingGroupState {
    /// Auto Scaling group name
    pub name: String,

    /// Minimum group size
    pub min_size: i32,

    /// Desired capacity
    pub desired_capacity: i32,

    /// Value of the group's `Name` tag, if tagged
    pub name_tag: Option<String>,
}

impl AutoScalingGroupState {
    /// Whether the group's `Name` tag binds it to the given cluster short name.
    ///
    /// The first whitespace-delimited token of the tag must equal the cluster name.
    pub fn belongs_to(&self, cluster_name: &str) -> bool {
        self.name_tag
            .as_deref()
            .and_then(|tag| tag.split_whitespace().next())
            .is_some_and(|token| token == cluster_name)
    }

    /// Whether the group is in a consistent state for scale-in (`desired >= min`)
    pub fn is_scaleable(&self) -> bool {
        self.desired_capacity >= self.min_size
    }

    /// Whether desired capacity already sits on the group minimum
    pub fn at_floor(&self) -> bool {
        self.desired_capacity <= self.min_size
    }
}

/// Point-in-time view of one cluster, rebuilt every pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    /// Cluster identity
    pub cluster: ClusterId,

    /// Average memory reservation (%) over the metric window, `None` if unavailable
    pub mem_reservation_pct: Option<f64>,

    /// Hosts in ACTIVE state
    pub active_instances: Vec<InstanceInfo>,

    /// Hosts in DRAINING state
    pub draining_instances: Vec<InstanceInfo>,

    /// Auto Scaling group bound to this cluster, if one was found
    pub scaling_group: Option<AutoScalingGroupState>,

    /// When the snapshot was assembled
    pub captured_at: DateTime<Utc>,
}

impl ClusterSnapshot {
    /// Create an empty snapshot for a cluster
    pub fn new(cluster: ClusterId) -> Self {
        Self {
            cluster,
            mem_reservation_pct: None,
            active_instances: Vec::new(),
            draining_instances: Vec::new(),
            scaling_group: None,
            captured_at: Utc::now(),
        }
    }

    /// Set memory reservation
    pub fn with_mem_reservation(mut self, pct: f64) -> Self {
        self.mem_reservation_pct = Some(pct);
        self
    }

    /// Set active hosts
    pub fn with_active(mut self, instances: Vec<InstanceInfo>) -> Self {
        self.active_instances = instances;
        self
    }

    /// Set draining hosts
    pub fn with_draining(mut self, instances: Vec<InstanceInfo>) -> Self {
        self.draining_instances = instances;
        self
    }

    /// Set the bound Auto Scaling group
    pub fn with_scaling_group(mut self, group: AutoScalingGroupState) -> Self {
        self.scaling_group = Some(group);
        self
    }

    /// Active hosts with no running or pending tasks
    pub fn idle_instances(&self) -> impl Iterator<Item = &InstanceInfo> {
        self.active_instances.iter().filter(|i| i.is_idle())
    }

    /// Lifecycle state of a host in this snapshot, `None` if the host is absent
    pub fn state_of(&self, host_id: &str) -> Option<LifecycleState> {
        if self.active_instances.iter().any(|i| i.host_id == host_id) {
            Some(LifecycleState::Active)
        } else if self.draining_instances.iter().any(|i| i.host_id == host_id) {
            Some(LifecycleState::Draining)
        } else {
            None
        }
    }
}

/// Host lifecycle: ACTIVE → DRAINING → REMOVED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Accepting and running tasks
    Active,
    /// No new tasks, existing ones finishing
    Draining,
    /// Terminated (terminal)
    Removed,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Active => write!(f, "ACTIVE"),
            LifecycleState::Draining => write!(f, "DRAINING"),
            LifecycleState::Removed => write!(f, "REMOVED"),
        }
    }
}

/// Why a drain was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrainReason {
    /// Host has no running or pending tasks
    Idle,
    /// Host picked as least utilized under low memory and CPU pressure
    LeastUtilized,
}

/// Lifecycle action decided for a single host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ScaleAction {
    /// Move an active host to DRAINING
    Drain {
        /// Target host
        instance: InstanceInfo,
        /// Why it is drained
        reason: DrainReason,
    },
    /// Terminate a drained host and decrement its group's desired capacity
    TerminateAndDecrement {
        /// Target host
        instance: InstanceInfo,
    },
}

impl ScaleAction {
    /// Host the action targets
    pub fn instance(&self) -> &InstanceInfo {
        match self {
            ScaleAction::Drain { instance, .. } => instance,
            ScaleAction::TerminateAndDecrement { instance } => instance,
        }
    }

    /// State the host must be in for the action to apply
    pub fn from_state(&self) -> LifecycleState {
        match self {
            ScaleAction::Drain { .. } => LifecycleState::Active,
            ScaleAction::TerminateAndDecrement { .. } => LifecycleState::Draining,
        }
    }
}

/// Run mode of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Execute decided actions
    #[default]
    Normal,
    /// Log decided actions, mutate nothing
    Dry,
}

impl RunMode {
    /// Whether mutations are suppressed
    pub fn is_dry(&self) -> bool {
        matches!(self, RunMode::Dry)
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Normal => write!(f, "normal"),
            RunMode::Dry => write!(f, "dry"),
        }
    }
}
