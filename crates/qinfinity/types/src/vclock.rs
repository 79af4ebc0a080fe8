//! Per-node vector clocks — causal partial order across nodes without a
//! global clock. Stored as a `BTreeMap` so the serialized form is stable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::NodeId;

/// Outcome of comparing two vector clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOrder {
    Equal,
    /// self happened-before other.
    Before,
    /// other happened-before self.
    After,
    Concurrent,
}

/// Mapping node-id → monotonically increasing counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock {
    counters: BTreeMap<NodeId, u64>,
}

impl VectorClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, node: &NodeId) -> u64 {
        self.counters.get(node).copied().unwrap_or(0)
    }

    /// Increment the owning node's counter before emitting an event.
    pub fn increment(&mut self, node: &NodeId) -> u64 {
        let counter = self.counters.entry(node.clone()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Merge-on-receive: take the per-key max, then increment the owner.
    pub fn merge_from(&mut self, other: &VectorClock, owner: &NodeId) -> u64 {
        for (node, counter) in &other.counters {
            let entry = self.counters.entry(node.clone()).or_insert(0);
            if *counter > *entry {
                *entry = *counter;
            }
        }
        self.increment(owner)
    }

    pub fn compare(&self, other: &VectorClock) -> ClockOrder {
        let mut less = false;
        let mut greater = false;

        let keys = self.counters.keys().chain(other.counters.keys());
        for node in keys {
            let a = self.counter(node);
            let b = other.counter(node);
            if a < b {
                less = true;
            }
            if a > b {
                greater = true;
            }
        }

        match (less, greater) {
            (false, false) => ClockOrder::Equal,
            (true, false) => ClockOrder::Before,
            (false, true) => ClockOrder::After,
            (true, true) => ClockOrder::Concurrent,
        }
    }

    /// True when this clock causally dominates (or equals) `other` — every
    /// counter is at least as large.
    pub fn dominates(&self, other: &VectorClock) -> bool {
        matches!(self.compare(other), ClockOrder::Equal | ClockOrder::After)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, u64)> {
        self.counters.iter().map(|(node, counter)| (node, *counter))
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}
