//! Fixed-capacity rolling window of readings for one sensor category

use crate::stats::{compute_stats, WindowStats};
use std::collections::VecDeque;

/// Values reported back to the caller right after a reading is folded in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadingSnapshot {
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
    pub window_len: usize,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorWindow {
    category: String,
    capacity: usize,
    values: VecDeque<f64>,
    stats: WindowStats,
    count: u64,
}

impl SensorWindow {
    /// `capacity` is clamped to at least one slot
    pub fn new(category: String, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            category,
            capacity,
            values: VecDeque::with_capacity(capacity),
            stats: WindowStats::default(),
            count: 0,
        }
    }

    /// Append a reading, evicting the oldest at capacity, then recompute
    pub fn push(&mut self, value: f64) -> ReadingSnapshot {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
        self.count += 1;
        self.recalculate();

        ReadingSnapshot {
            mean: self.stats.mean,
            stdev: self.stats.stdev,
            window_len: self.values.len(),
            count: self.count,
        }
    }

    fn recalculate(&mut self) {
        self.stats = compute_stats(self.values.iter().copied());
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first
    pub fn values(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> Option<f64> {
        self.stats.mean
    }

    pub fn stdev(&self) -> Option<f64> {
        self.stats.stdev
    }

    /// Total readings ever folded in, not bounded by capacity
    pub fn count(&self) -> u64 {
        self.count
    }
}
