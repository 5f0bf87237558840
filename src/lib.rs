//! lockmon - long lock detection for mutexes
//!
//! This library wraps mutexes so that acquisitions waiting longer than a
//! threshold are recorded with their call stack and category in a shared
//! [`Monitor`](monitor::Monitor), which also keeps cumulative per-category
//! wait statistics. With the `http` feature the monitor can be served as
//! JSON and plain-text endpoints.

pub mod cli;
pub mod config;
#[cfg(feature = "http")]
pub mod http_server;
pub mod instrumented_mutex;
pub mod json_output;
pub mod monitor;
pub mod stack_capture;
pub mod stats;
pub mod workload;

pub use config::MonitorConfig;
pub use instrumented_mutex::{InstrumentedMutex, InstrumentedMutexGuard};
pub use monitor::{LockEvent, Monitor};
