//! Least-utilized host selection
//!
//! Picks the single best drain candidate among active hosts in one pass:
//!
//! 1. Most free memory wins
//! 2. On equal free memory, fewest running tasks wins
//! 3. On a full tie, the lexicographically smallest host id wins
//!
//! The third rule makes the result independent of listing order.

use ecscale_core::InstanceInfo;
use std::cmp::Ordering;
use tracing::debug;

/// Whether `candidate` should replace `best`
fn beats(candidate: &InstanceInfo, best: &InstanceInfo) -> bool {
    match candidate.free_memory_mb.cmp(&best.free_memory_mb) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => match candidate.running_tasks.cmp(&best.running_tasks) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => candidate.host_id < best.host_id,
        },
    }
}

/// Select the least-utilized host, `None` for an empty list
pub fn least_utilized(instances: &[InstanceInfo]) -> Option<&InstanceInfo> {
    let mut iter = instances.iter();
    let mut best = iter.next()?;

    for candidate in iter {
        if beats(candidate, best) {
            best = candidate;
        }
    }

    debug!(
        host_id = %best.host_id,
        free_memory_mb = best.free_memory_mb,
        running_tasks = best.running_tasks,
        "Scale candidate selected"
    );

    Some(best)
}
