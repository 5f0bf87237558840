//! Mutex wrapper that reports long waits to a [`Monitor`]
//!
//! [`InstrumentedMutex::lock`] measures how long the caller waited for the
//! underlying lock. When the wait exceeds the threshold, the caller's stack is
//! captured and reported to the monitor before the guard is returned. The
//! reported stack id travels with the guard; when the guard is released and the
//! monitor does not keep records, the record is evicted before the underlying
//! lock is unlocked.
//!
//! The mutex is not reentrant: locking it twice from one thread deadlocks,
//! exactly like the wrapped `parking_lot::Mutex`.

use crate::config::DEFAULT_CATEGORY;
use crate::monitor::{LockEvent, Monitor};
use crate::stack_capture::{self, StackId};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// A mutex that records acquisitions waiting longer than a threshold
///
/// # Example
/// ```
/// use lockmon::config::MonitorConfig;
/// use lockmon::instrumented_mutex::InstrumentedMutex;
/// use lockmon::monitor::Monitor;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let monitor = Arc::new(Monitor::new(&MonitorConfig::default()));
/// let mut counter = InstrumentedMutex::new(0u64, Arc::clone(&monitor), Duration::from_millis(50));
/// counter.set_category("counters");
///
/// *counter.lock() += 1;
/// assert_eq!(*counter.lock(), 1);
/// // Uncontended locks never wait long enough to be recorded
/// assert!(monitor.snapshot().is_empty());
/// ```
pub struct InstrumentedMutex<T: ?Sized> {
    threshold: Duration,
    monitor: Option<Arc<Monitor>>,
    category: String,
    inner: Mutex<T>,
}

impl<T> InstrumentedMutex<T> {
    /// Create a mutex reporting to `monitor` when a wait exceeds `threshold`
    ///
    /// The category starts as the monitor's default category.
    pub fn new(value: T, monitor: Arc<Monitor>, threshold: Duration) -> Self {
        Self {
            threshold,
            category: monitor.default_category().to_string(),
            monitor: Some(monitor),
            inner: Mutex::new(value),
        }
    }

    /// Create a mutex that measures nothing and reports nowhere
    pub fn unmonitored(value: T) -> Self {
        Self {
            threshold: Duration::MAX,
            monitor: None,
            category: DEFAULT_CATEGORY.to_string(),
            inner: Mutex::new(value),
        }
    }

    /// Consume the mutex and return the protected value
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: ?Sized> InstrumentedMutex<T> {
    /// Set the category reported for this mutex's long locks
    ///
    /// An empty label restores the default category. Requires `&mut self`, so
    /// the category is fixed before the mutex is shared.
    pub fn set_category(&mut self, category: impl Into<String>) {
        let category = category.into();
        self.category = if category.is_empty() {
            self.default_category().to_string()
        } else {
            category
        };
    }

    /// Current category label
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Wait threshold above which an acquisition is recorded
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Monitor receiving this mutex's long locks, if any
    pub fn monitor(&self) -> Option<&Arc<Monitor>> {
        self.monitor.as_ref()
    }

    /// Acquire the lock, blocking until it is available
    ///
    /// If the wait exceeded the threshold, the acquisition has been reported to
    /// the monitor by the time this returns.
    pub fn lock(&self) -> InstrumentedMutexGuard<'_, T> {
        let start = Instant::now();
        let guard = self.inner.lock();
        let wait = start.elapsed();

        let reported = match &self.monitor {
            Some(monitor) if wait > self.threshold => Some(self.report(monitor, wait)),
            _ => {
                tracing::trace!(
                    category = %self.category,
                    wait_us = wait.as_micros() as u64,
                    "lock acquired under threshold"
                );
                None
            }
        };

        InstrumentedMutexGuard {
            mutex: self,
            reported,
            guard,
        }
    }

    /// Mutable access without locking, available while the mutex is not shared
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    fn report(&self, monitor: &Monitor, wait: Duration) -> StackId {
        let stack = stack_capture::capture();
        let id = stack_capture::hash_stack(&stack);
        monitor.add(
            stack,
            LockEvent {
                timestamp: SystemTime::now(),
                wait,
                stack: String::new(),
                category: self.category.clone(),
            },
        );
        id
    }

    /// Evict the record reported under `id` unless the monitor keeps records
    fn release_record(&self, id: StackId) {
        let Some(monitor) = &self.monitor else {
            return;
        };
        if monitor.keep_records() {
            return;
        }
        if let Some(stack) = monitor.get_stack(id) {
            monitor.remove_by_stack(&stack);
        }
    }

    fn default_category(&self) -> &str {
        self.monitor
            .as_deref()
            .map_or(DEFAULT_CATEGORY, Monitor::default_category)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for InstrumentedMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedMutex")
            .field("threshold", &self.threshold)
            .field("category", &self.category)
            .field("monitored", &self.monitor.is_some())
            .field("inner", &&self.inner)
            .finish()
    }
}

/// Guard returned by [`InstrumentedMutex::lock`]
///
/// Holds the id of the long lock it reported, if any. Dropping the guard
/// evicts that record (when the monitor does not keep records) and then
/// unlocks the mutex.
#[must_use = "if unused the mutex will immediately unlock"]
pub struct InstrumentedMutexGuard<'a, T: ?Sized> {
    mutex: &'a InstrumentedMutex<T>,
    reported: Option<StackId>,
    // Declared last: the primitive lock is released after `Drop::drop` runs.
    guard: MutexGuard<'a, T>,
}

impl<T: ?Sized> InstrumentedMutexGuard<'_, T> {
    /// Stack id reported by this acquisition, if it was a long lock
    pub fn reported_stack_id(&self) -> Option<StackId> {
        self.reported
    }

    /// Release the lock explicitly
    pub fn unlock(guard: Self) {
        drop(guard);
    }
}

impl<T: ?Sized> Deref for InstrumentedMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T: ?Sized> DerefMut for InstrumentedMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T: ?Sized> Drop for InstrumentedMutexGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(id) = self.reported.take() {
            self.mutex.release_record(id);
        }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for InstrumentedMutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedMutexGuard")
            .field("reported", &self.reported)
            .field("value", &&*self.guard)
            .finish()
    }
}
