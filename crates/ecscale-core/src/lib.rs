//! ecscale Core - Shared types and traits
//!
//! This crate defines the abstractions used by the scale-in engine:
//! - Snapshot model (`ClusterSnapshot`, `InstanceInfo`, `AutoScalingGroupState`)
//! - Lifecycle actions and states
//! - Collaborator traits (inventory, metrics, Auto Scaling, mutator)
//! - Error types

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
