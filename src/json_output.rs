//! JSON shapes for the monitor's read-only views
//!
//! Ids and timestamps are serialized as strings so that 64-bit values survive
//! JSON consumers that only have double-precision numbers.

use crate::monitor::LockEvent;
use crate::stack_capture::StackId;
use crate::stats::CategoryStats;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::UNIX_EPOCH;

/// One currently recorded long lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedEntry {
    /// Stack id (decimal u64)
    pub id: String,
    pub category: String,
    /// Wait in whole milliseconds
    pub wait_ms: u64,
    /// Acquisition time in nanoseconds since the Unix epoch (decimal)
    pub timestamp: String,
}

/// Cumulative statistics for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStatsEntry {
    pub category: String,
    pub count: u64,
    /// Average wait in whole milliseconds
    pub average_wait_ms: f64,
    /// Total wait in whole milliseconds
    pub total_wait_ms: u64,
}

impl BlockedEntry {
    pub fn new(id: StackId, event: &LockEvent) -> Self {
        let nanos = event
            .timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Self {
            id: id.to_string(),
            category: event.category.clone(),
            wait_ms: millis(event.wait),
            timestamp: nanos.to_string(),
        }
    }
}

impl CategoryStatsEntry {
    pub fn new(category: &str, stats: &CategoryStats) -> Self {
        Self {
            category: category.to_string(),
            count: stats.count,
            average_wait_ms: millis(stats.average_wait) as f64,
            total_wait_ms: millis(stats.total_wait),
        }
    }
}

fn millis(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Convert a snapshot into entries, most recent first
pub fn blocked_entries(snapshot: &HashMap<StackId, LockEvent>) -> Vec<BlockedEntry> {
    let mut sorted: Vec<_> = snapshot.iter().collect();
    sorted.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp).then_with(|| a.0.cmp(b.0)));
    sorted
        .into_iter()
        .map(|(id, event)| BlockedEntry::new(*id, event))
        .collect()
}

/// Convert category statistics into entries sorted by category name
pub fn category_entries(stats: &HashMap<String, CategoryStats>) -> Vec<CategoryStatsEntry> {
    let mut entries: Vec<_> = stats
        .iter()
        .map(|(category, s)| CategoryStatsEntry::new(category, s))
        .collect();
    entries.sort_by(|a, b| a.category.cmp(&b.category));
    entries
}
