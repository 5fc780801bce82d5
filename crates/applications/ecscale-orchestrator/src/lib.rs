//! # ecscale
//!
//! Periodic scale-in for ECS clusters running on EC2 Auto Scaling groups.
//!
//! ## Architecture
//!
//! ```text
//! Sweeper (one pass)
//! ├── ClusterLister         list managed clusters
//! └── per cluster
//!     ├── SnapshotBuilder   hosts + memory reservation + bound group
//!     ├── DecisionEngine    idle drain / scale-in gates / termination sweep
//!     └── LifecycleExecutor dry-run log or drain / terminate-and-decrement
//! ```
//!
//! Every pass re-fetches all state, so a missed or failed action is simply
//! decided again on the next pass.
//!
//! ## Scale-in gates
//!
//! A least-utilized host is drained only when the cluster's memory reservation
//! is low, stays below the ceiling after removing one host, the group is above
//! its minimum and the group's CPU is low. Idle hosts are always drained and
//! drained hosts are terminated once their tasks are gone.
//!
//! See [`engine`] for the rules and [`select`] for candidate selection.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aws;
pub mod config;
pub mod engine;
pub mod lifecycle;
pub mod projection;
pub mod select;
pub mod snapshot;
pub mod sweep;

#[cfg(test)]
mod fakes;

// ============================================================================
// Public exports
// ============================================================================

// Configuration
pub use config::{
    ScalerConfig, DEFAULT_EXCLUDE_SUBSTRING, DEFAULT_FUTURE_MEM_TH, DEFAULT_SCALE_IN_CPU_TH,
    DEFAULT_SCALE_IN_MEM_TH,
};

// Decision rules
pub use engine::{ClusterDecision, DecisionEngine, ScaleInVerdict};
pub use projection::FutureReservation;
pub use select::least_utilized;

// Execution
pub use lifecycle::{ActionOutcome, ActionRecord, LifecycleExecutor};
pub use snapshot::SnapshotBuilder;
pub use sweep::{ClusterOutcome, ClusterReport, Collaborators, SweepReport, Sweeper};

// Core model
pub use ecscale_core::{
    ClusterId, ClusterSnapshot, InstanceInfo, RunMode, ScaleAction, ScaleError,
};
