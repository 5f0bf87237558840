//! Registry of long lock acquisitions
//!
//! A [`Monitor`] holds three maps behind a single exclusive lock:
//!
//! - `records`: the latest [`LockEvent`] per stack identity (current state,
//!   evicted when the lock is released unless records are kept)
//! - `stack_cache`: the stack text per identity, inserted and evicted together
//!   with the record
//! - `category_stats`: cumulative [`CategoryStats`] per category, never reduced
//!
//! Every read returns an independent copy taken under the lock.
//!
//! Records are keyed by call stack, not by mutex: two mutexes locked from
//! textually identical stacks share one record while both still count in the
//! category statistics.

use crate::config::{MonitorConfig, DEFAULT_CATEGORY};
use crate::stack_capture::{self, hash_stack, StackId};
use crate::stats::CategoryStats;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// One long lock acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockEvent {
    /// When the lock was acquired
    pub timestamp: SystemTime,
    /// How long the caller waited for the lock
    pub wait: Duration,
    /// Call stack of the acquiring thread
    pub stack: String,
    /// Label grouping related locks
    pub category: String,
}

#[derive(Debug, Default)]
struct MonitorState {
    records: HashMap<StackId, LockEvent>,
    stack_cache: HashMap<StackId, String>,
    category_stats: HashMap<String, CategoryStats>,
}

/// Shared registry of long locks and per-category statistics
///
/// Share it between locks with `Arc<Monitor>`.
///
/// # Example
/// ```
/// use lockmon::config::MonitorConfig;
/// use lockmon::monitor::{LockEvent, Monitor};
/// use lockmon::stack_capture::hash_stack;
/// use std::time::{Duration, SystemTime};
///
/// let monitor = Monitor::new(&MonitorConfig::default());
/// monitor.add(
///     "worker\n".to_string(),
///     LockEvent {
///         timestamp: SystemTime::now(),
///         wait: Duration::from_millis(75),
///         stack: String::new(),
///         category: "io".to_string(),
///     },
/// );
///
/// assert_eq!(monitor.get_stack(hash_stack("worker\n")).as_deref(), Some("worker\n"));
/// assert_eq!(monitor.get_category_stats()["io"].count, 1);
/// ```
#[derive(Debug)]
pub struct Monitor {
    state: Mutex<MonitorState>,
    keep_records: bool,
    default_category: String,
}

impl Monitor {
    /// Create an empty monitor
    ///
    /// Only `keep_records` and `default_category` are read from the config;
    /// the HTTP settings belong to `HttpServer`. An empty default category
    /// falls back to [`DEFAULT_CATEGORY`].
    ///
    /// Also warms up the stack symbolizer, so the first long lock does not pay
    /// for loading debug info while it holds the lock.
    pub fn new(config: &MonitorConfig) -> Self {
        stack_capture::warm_up();
        let default_category = if config.default_category.is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            config.default_category.clone()
        };
        Self {
            state: Mutex::new(MonitorState::default()),
            keep_records: config.keep_records,
            default_category,
        }
    }

    /// Whether records survive the release of their lock
    pub fn keep_records(&self) -> bool {
        self.keep_records
    }

    /// Category given to locks that have none
    pub fn default_category(&self) -> &str {
        &self.default_category
    }

    /// Record a long lock, replacing any previous record with the same stack
    ///
    /// `event.stack` is overwritten with `stack`.
    pub fn add(&self, stack: String, mut event: LockEvent) {
        let id = hash_stack(&stack);
        event.stack.clone_from(&stack);

        let mut state = self.state.lock();
        let stats = state
            .category_stats
            .entry(event.category.clone())
            .or_default();
        stats.record(event.wait);
        tracing::debug!(
            stack_id = id,
            category = %event.category,
            wait_ms = event.wait.as_millis() as u64,
            count = stats.count,
            "long lock recorded"
        );

        state.records.insert(id, event);
        state.stack_cache.insert(id, stack);
    }

    /// Evict the record and cached stack for `stack`
    ///
    /// Category statistics are left untouched. Unknown stacks are ignored.
    pub fn remove_by_stack(&self, stack: &str) {
        let id = hash_stack(stack);
        let mut state = self.state.lock();
        let removed = state.records.remove(&id).is_some();
        state.stack_cache.remove(&id);
        if removed {
            tracing::debug!(stack_id = id, "long lock record evicted");
        }
    }

    /// Copy of all current records keyed by stack id
    pub fn snapshot(&self) -> HashMap<StackId, LockEvent> {
        self.state.lock().records.clone()
    }

    /// Cached stack text for `id`
    pub fn get_stack(&self, id: StackId) -> Option<String> {
        self.state.lock().stack_cache.get(&id).cloned()
    }

    /// Copy of the whole stack cache
    pub fn get_stack_cache(&self) -> HashMap<StackId, String> {
        self.state.lock().stack_cache.clone()
    }

    /// Copy of the cumulative statistics per category
    pub fn get_category_stats(&self) -> HashMap<String, CategoryStats> {
        self.state.lock().category_stats.clone()
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(&MonitorConfig::default())
    }
}
