//! Cumulative per-category long-lock statistics
//!
//! Statistics are historical: they count every long lock ever reported and are
//! never reduced when a record is evicted from the monitor.

use std::collections::HashMap;
use std::fmt::Write;
use std::time::Duration;

/// Aggregated wait statistics for one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryStats {
    /// Number of long locks reported under this category
    pub count: u64,
    /// Sum of all reported waits
    pub total_wait: Duration,
    /// `total_wait / count`, truncated to whole nanoseconds
    pub average_wait: Duration,
}

impl CategoryStats {
    /// Account for one more long lock
    pub fn record(&mut self, wait: Duration) {
        self.count += 1;
        self.total_wait += wait;
        self.average_wait = average(self.total_wait, self.count);
    }
}

fn average(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    let nanos = total.as_nanos() / u128::from(count);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Render a category table sorted by total wait (descending)
pub fn render_summary(stats: &HashMap<String, CategoryStats>) -> String {
    let mut out = String::new();
    if stats.is_empty() {
        out.push_str("No long locks recorded.\n");
        return out;
    }

    let mut sorted: Vec<_> = stats.iter().collect();
    sorted.sort_by(|a, b| {
        b.1.total_wait
            .cmp(&a.1.total_wait)
            .then_with(|| a.0.cmp(b.0))
    });

    let _ = writeln!(
        out,
        "{:<32} {:>10} {:>14} {:>14}",
        "Category", "Count", "Total Wait", "Avg Wait"
    );
    let _ = writeln!(out, "{}", "─".repeat(73));
    for (category, s) in sorted {
        let _ = writeln!(
            out,
            "{:<32} {:>10} {:>13.3}s {:>13.3}s",
            category,
            s.count,
            s.total_wait.as_secs_f64(),
            s.average_wait.as_secs_f64()
        );
    }
    let _ = writeln!(out, "{}", "─".repeat(73));
    out
}

/// Print the category table to stderr
pub fn print_summary(stats: &HashMap<String, CategoryStats>) {
    eprintln!("\nLong lock summary (sorted by total wait)");
    eprint!("{}", render_summary(stats));
}
