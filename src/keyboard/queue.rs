//! Bounded event queue

use std::collections::VecDeque;

/// Result of pushing into an [`EventQueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Stored without loss
    Accepted,
    /// Stored after evicting the oldest entry
    EvictedOldest {
        /// True only for the first eviction of an overflow episode
        episode_start: bool,
    },
}

/// FIFO with a hard capacity that never blocks the producer
///
/// When full, the oldest entry is evicted to make room. An overflow episode
/// lasts from the first eviction until the queue has room again.
#[derive(Debug, Clone)]
pub struct EventQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
    overflowing: bool,
}

impl<T> EventQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            overflowing: false,
        }
    }

    pub fn push(&mut self, item: T) -> PushOutcome {
        if self.items.len() < self.capacity {
            self.items.push_back(item);
            self.overflowing = false;
            return PushOutcome::Accepted;
        }

        self.items.pop_front();
        self.items.push_back(item);
        let episode_start = !self.overflowing;
        self.overflowing = true;
        PushOutcome::EvictedOldest { episode_start }
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Free slots before the next push evicts
    pub fn remaining(&self) -> usize {
        self.capacity - self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}
