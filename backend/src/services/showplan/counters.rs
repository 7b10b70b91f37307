//! Run-time counter aggregation
//!
//! Actual-execution plans report one `RunTimeCountersPerThread` element per
//! worker thread (and, on scale-out engines, per brick). Each metric is folded
//! into a [`RunTimeCounters`] value that keeps the samples plus running total
//! and maximum.

use serde::{Serialize, Serializer};
use std::fmt;

/// One reported sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counter {
    pub thread: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brick_id: Option<u32>,
    pub value: u64,
}

/// How the aggregated value is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterDisplay {
    /// Sum across threads (rows, reads, executions)
    Total,
    /// Maximum across threads (elapsed time, since threads overlap)
    Max,
    /// Sum that drops thread 0 when other threads reported too
    MemoryGrant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunTimeCounters {
    counters: Vec<Counter>,
    total: u64,
    max: u64,
    display: CounterDisplay,
}

impl Default for RunTimeCounters {
    fn default() -> Self {
        Self::new(CounterDisplay::Total)
    }
}

impl RunTimeCounters {
    pub fn new(display: CounterDisplay) -> Self {
        Self { counters: Vec::new(), total: 0, max: 0, display }
    }

    pub fn total() -> Self {
        Self::new(CounterDisplay::Total)
    }

    pub fn max() -> Self {
        Self::new(CounterDisplay::Max)
    }

    pub fn memory_grant() -> Self {
        Self::new(CounterDisplay::MemoryGrant)
    }

    pub fn add_counter(&mut self, thread: u32, value: u64) {
        self.push(Counter { thread, brick_id: None, value });
    }

    pub fn add_brick_counter(&mut self, thread: u32, brick_id: u32, value: u64) {
        self.push(Counter { thread, brick_id: Some(brick_id), value });
    }

    fn push(&mut self, counter: Counter) {
        self.total = self.total.saturating_add(counter.value);
        self.max = self.max.max(counter.value);
        self.counters.push(counter);
    }

    pub fn total_counters(&self) -> u64 {
        self.total
    }

    pub fn max_counter(&self) -> u64 {
        self.max
    }

    pub fn num_of_counters(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn counters(&self) -> &[Counter] {
        &self.counters
    }

    /// The number shown to the user
    pub fn display_value(&self) -> u64 {
        match self.display {
            CounterDisplay::Total => self.total,
            CounterDisplay::Max => self.max,
            CounterDisplay::MemoryGrant => {
                if self.counters.len() > 1 {
                    self.counters
                        .iter()
                        .filter(|c| c.thread != 0)
                        .fold(0u64, |acc, c| acc.saturating_add(c.value))
                } else {
                    self.total
                }
            }
        }
    }
}

impl fmt::Display for RunTimeCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_value())
    }
}

impl Serialize for RunTimeCounters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("RunTimeCounters", 4)?;
        state.serialize_field("value", &self.display_value())?;
        state.serialize_field("total", &self.total)?;
        state.serialize_field("max", &self.max)?;
        state.serialize_field("threads", &self.counters)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_and_max() {
        let mut rows = RunTimeCounters::total();
        rows.add_counter(1, 10);
        rows.add_counter(2, 30);
        rows.add_counter(3, 5);

        assert_eq!(rows.total_counters(), 45);
        assert_eq!(rows.max_counter(), 30);
        assert_eq!(rows.num_of_counters(), 3);
        assert_eq!(rows.to_string(), "45");
    }

    #[test]
    fn test_elapsed_time_displays_max() {
        let mut elapsed = RunTimeCounters::max();
        elapsed.add_counter(0, 12);
        elapsed.add_counter(1, 90);
        assert_eq!(elapsed.display_value(), 90);
    }

    #[test]
    fn test_memory_grant_excludes_thread_zero_when_parallel() {
        let mut grant = RunTimeCounters::memory_grant();
        grant.add_counter(0, 100);
        grant.add_counter(1, 40);
        grant.add_counter(2, 60);
        assert_eq!(grant.display_value(), 100);
        assert_eq!(grant.total_counters(), 200);
    }

    #[test]
    fn test_memory_grant_keeps_sole_thread_zero() {
        let mut grant = RunTimeCounters::memory_grant();
        grant.add_counter(0, 100);
        assert_eq!(grant.display_value(), 100);
    }

    #[test]
    fn test_brick_counters() {
        let mut reads = RunTimeCounters::total();
        reads.add_brick_counter(0, 7, 3);
        reads.add_brick_counter(0, 8, 4);
        assert_eq!(reads.counters()[1].brick_id, Some(8));
        assert_eq!(reads.display_value(), 7);
    }
}
