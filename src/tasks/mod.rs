//! Per-account ordered task lists.

pub mod store;

pub use store::TaskStore;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A task as stored and as sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub text: String,
    pub completed: bool,
    /// Rank within the owning account's list; lower is earlier.
    pub position: i64,
}

/// What a reorder did with its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReorderSummary {
    /// Owned ids placed in the requested order.
    pub applied: usize,
    /// Owned tasks the input left out, appended after the requested ones.
    pub appended: usize,
    /// Input entries ignored (foreign, unknown or repeated ids).
    pub skipped: usize,
}

/// Merge a requested ordering into the current one.
///
/// Ids from `requested` that appear in `current` come first, in the requested
/// order, each at most once. Entries of `current` not mentioned follow in
/// their existing order. Returns the final order and how many requested ids
/// were used.
pub fn merge_order(current: &[i64], requested: &[i64]) -> (Vec<i64>, usize) {
    let owned: HashSet<i64> = current.iter().copied().collect();
    let mut placed = HashSet::with_capacity(current.len());
    let mut order = Vec::with_capacity(current.len());

    for id in requested {
        if owned.contains(id) && placed.insert(*id) {
            order.push(*id);
        }
    }
    let applied = order.len();
    for id in current {
        if placed.insert(*id) {
            order.push(*id);
        }
    }
    (order, applied)
}
