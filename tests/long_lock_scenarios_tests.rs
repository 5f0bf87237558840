//! End-to-end long lock scenarios with real thread contention
//!
//! Each scenario holds an instrumented mutex on a helper thread for a fixed
//! time while the test thread waits for it, then checks what the monitor saw.

use lockmon::config::MonitorConfig;
use lockmon::instrumented_mutex::{InstrumentedMutex, InstrumentedMutexGuard};
use lockmon::monitor::Monitor;
use lockmon::stack_capture::StackId;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const THRESHOLD: Duration = Duration::from_millis(50);

fn monitor(keep_records: bool) -> Arc<Monitor> {
    Arc::new(Monitor::new(&MonitorConfig {
        keep_records,
        ..Default::default()
    }))
}

fn mutex(monitor: &Arc<Monitor>, category: &str) -> Arc<InstrumentedMutex<()>> {
    let mut mutex = InstrumentedMutex::new((), Arc::clone(monitor), THRESHOLD);
    mutex.set_category(category);
    Arc::new(mutex)
}

/// Start a thread that holds `mutex` for `hold`; returns once it holds it
fn spawn_holder(mutex: &Arc<InstrumentedMutex<()>>, hold: Duration) -> thread::JoinHandle<()> {
    let (locked_tx, locked_rx) = mpsc::channel();
    let holder = Arc::clone(mutex);
    let handle = thread::spawn(move || {
        let guard = holder.lock();
        locked_tx.send(()).unwrap();
        thread::sleep(hold);
        drop(guard);
    });
    locked_rx.recv().unwrap();
    handle
}

/// One contended lock/unlock cycle; every call locks from the same call site
fn contend_once(mutex: &Arc<InstrumentedMutex<()>>, hold: Duration) -> Option<StackId> {
    let holder = spawn_holder(mutex, hold);
    let guard = mutex.lock();
    let reported = guard.reported_stack_id();
    drop(guard);
    holder.join().unwrap();
    reported
}

/// Lock `mutex` after a holder thread has kept it for `hold`
fn lock_after_hold(
    mutex: &Arc<InstrumentedMutex<()>>,
    hold: Duration,
) -> InstrumentedMutexGuard<'_, ()> {
    let holder = spawn_holder(mutex, hold);
    let guard = mutex.lock();
    holder.join().unwrap();
    guard
}

#[test]
fn test_short_wait_creates_no_record() {
    let monitor = monitor(false);
    let mutex = mutex(&monitor, "X");

    let holder = spawn_holder(&mutex, Duration::from_millis(10));
    let guard = mutex.lock();
    assert_eq!(guard.reported_stack_id(), None);
    assert!(monitor.snapshot().is_empty());
    drop(guard);
    holder.join().unwrap();

    assert!(monitor.snapshot().is_empty());
    assert!(monitor.get_category_stats().is_empty());
    assert!(monitor.get_stack_cache().is_empty());
}

#[test]
fn test_long_wait_recorded_until_unlock() {
    let monitor = monitor(false);
    let mutex = mutex(&monitor, "X");

    let holder = spawn_holder(&mutex, Duration::from_millis(80));
    let guard = mutex.lock();

    // Reported before lock() returned
    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.len(), 1);
    let (id, event) = snapshot.iter().next().unwrap();
    assert_eq!(Some(*id), guard.reported_stack_id());
    assert_eq!(event.category, "X");
    assert!(event.wait > THRESHOLD, "wait was {:?}", event.wait);
    assert!(event.wait < Duration::from_secs(5), "wait was {:?}", event.wait);
    assert_eq!(monitor.get_stack(*id).as_deref(), Some(event.stack.as_str()));

    let stats = monitor.get_category_stats();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats["X"].count, 1);
    assert_eq!(stats["X"].total_wait, event.wait);
    assert_eq!(stats["X"].average_wait, event.wait);

    drop(guard);
    holder.join().unwrap();

    assert!(monitor.snapshot().is_empty());
    assert_eq!(monitor.get_stack(*id), None);
    assert_eq!(monitor.get_category_stats(), stats);
}

#[test]
fn test_keep_records_same_call_site_latest_wins() {
    let monitor = monitor(true);
    let mutex = mutex(&monitor, "X");

    let mut ids = Vec::new();
    for _ in 0..2 {
        ids.push(contend_once(&mutex, Duration::from_millis(80)));
    }

    assert!(ids[0].is_some());
    assert_eq!(ids[0], ids[1]);

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.contains_key(&ids[0].unwrap()));

    let stats = monitor.get_category_stats();
    assert_eq!(stats["X"].count, 2);
    assert_eq!(
        stats["X"].average_wait,
        stats["X"].total_wait / 2,
    );
}

#[test]
fn test_distinct_mutexes_alias_by_call_site() {
    let monitor = monitor(true);
    let first = mutex(&monitor, "A");
    let second = mutex(&monitor, "B");

    let mut ids = Vec::new();
    for m in [&first, &second] {
        ids.push(contend_once(m, Duration::from_millis(70)));
    }

    // Same stack, so both mutexes share one record; the later one wins
    assert!(ids[0].is_some());
    assert_eq!(ids[0], ids[1]);
    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[&ids[0].unwrap()].category, "B");

    // Both still counted in their own category
    let stats = monitor.get_category_stats();
    assert_eq!(stats["A"].count, 1);
    assert_eq!(stats["B"].count, 1);
}

#[test]
fn test_aliased_record_evicted_by_first_release() {
    let monitor = monitor(false);
    let first = mutex(&monitor, "A");
    let second = mutex(&monitor, "B");

    // Both guards live at once, taken from the same call site
    let mut guards = Vec::new();
    for m in [&first, &second] {
        guards.push(lock_after_hold(m, Duration::from_millis(70)));
    }
    let second_guard = guards.pop().unwrap();
    let first_guard = guards.pop().unwrap();

    let id = first_guard.reported_stack_id().expect("first lock should be reported");
    assert_eq!(second_guard.reported_stack_id(), Some(id));
    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[&id].category, "B");

    drop(first_guard);
    assert!(monitor.snapshot().is_empty());
    assert_eq!(monitor.get_stack(id), None);

    // The shared record is already gone; releasing still unlocks
    drop(second_guard);
    assert!(monitor.snapshot().is_empty());
    assert!(monitor.get_stack_cache().is_empty());
    assert_eq!(first.lock().reported_stack_id(), None);
    assert_eq!(second.lock().reported_stack_id(), None);

    let stats = monitor.get_category_stats();
    assert_eq!(stats["A"].count, 1);
    assert_eq!(stats["B"].count, 1);
}

#[test]
fn test_different_call_sites_get_different_records() {
    let monitor = monitor(true);
    let mutex = mutex(&monitor, "X");

    let first = contend_once(&mutex, Duration::from_millis(70));
    let second = contend_once(&mutex, Duration::from_millis(70));

    assert!(first.is_some() && second.is_some());
    assert_ne!(first, second);
    assert_eq!(monitor.snapshot().len(), 2);
    assert_eq!(monitor.get_category_stats()["X"].count, 2);
}

#[test]
fn test_default_category_from_monitor() {
    let monitor = Arc::new(Monitor::new(&MonitorConfig {
        default_category: "fallback".to_string(),
        ..Default::default()
    }));
    let mutex = mutex(&monitor, "");

    contend_once(&mutex, Duration::from_millis(70));

    let stats = monitor.get_category_stats();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats["fallback"].count, 1);
}

#[test]
fn test_unmonitored_mutex_reports_nothing() {
    let mutex = Arc::new(InstrumentedMutex::unmonitored(()));
    let reported = contend_once(&mutex, Duration::from_millis(70));
    assert_eq!(reported, None);
}

#[test]
fn test_protected_value_is_shared() {
    let monitor = monitor(false);
    let counter = Arc::new(InstrumentedMutex::new(0u64, Arc::clone(&monitor), THRESHOLD));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..1000 {
                    *counter.lock() += 1;
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(*counter.lock(), 4000);
    // Whatever was reported has been evicted again
    assert!(monitor.snapshot().is_empty());
}
