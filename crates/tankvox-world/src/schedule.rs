//! Deferred world work: debounced support re-checks and debris fades.
//!
//! Tasks sit in a min-heap keyed by `(due, sequence)`. The world drains due
//! tasks at the start of each update and runs each one to completion before
//! popping the next, so a re-evaluation never interleaves with another.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tankvox_core::types::VoxelCoord;

use crate::debris::DebrisId;

#[derive(Clone, Debug, PartialEq)]
pub enum TaskKind {
    /// Re-evaluate support in a cube around `center`.
    SupportCheck { center: VoxelCoord, near_chain: bool },
    /// Start fading a debris piece. No-op if it already despawned.
    FadeDebris { id: DebrisId },
}

#[derive(Clone, Debug)]
pub struct ScheduledTask {
    /// World time in seconds at which the task becomes runnable.
    pub due: f64,
    /// Tiebreaker for tasks due at the same instant; lower runs first.
    pub sequence: u64,
    pub kind: TaskKind,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap pops the earliest task.
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Clone, Debug, Default)]
pub struct DelayQueue {
    heap: BinaryHeap<ScheduledTask>,
    next_sequence: u64,
}

impl DelayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: f64, kind: TaskKind) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(ScheduledTask {
            due,
            sequence,
            kind,
        });
    }

    /// Whether a support check centred on `center` is still waiting.
    pub fn has_pending_support_check(&self, center: VoxelCoord) -> bool {
        self.heap.iter().any(|t| {
            matches!(t.kind, TaskKind::SupportCheck { center: c, .. } if c == center)
        })
    }

    pub fn peek_due(&self) -> Option<f64> {
        self.heap.peek().map(|t| t.due)
    }

    /// Pop the next task if it is due at or before `now`.
    pub fn pop_if_ready(&mut self, now: f64) -> Option<ScheduledTask> {
        if self.heap.peek().is_some_and(|t| t.due <= now) {
            self.heap.pop()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
