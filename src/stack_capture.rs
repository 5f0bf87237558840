//! Call-stack capture and stack identity hashing
//!
//! A long lock is identified by the call stack that acquired it. This module
//! renders the current thread's stack into text and hashes that text into a
//! 64-bit [`StackId`].
//!
//! Rendering goes through a bounded buffer: it starts at [`BASE_BUFFER_SIZE`]
//! bytes and doubles until the stack fits, up to [`MAX_BUFFER_SIZE`]. A stack
//! that still does not fit is replaced by [`STACK_TOO_DEEP`], so capture never
//! fails.

use backtrace::Backtrace;
use std::fmt::{self, Write};
use std::hash::Hasher;
use std::sync::Once;

/// 64-bit identity of a captured stack
pub type StackId = u64;

/// Initial size of the render buffer in bytes
pub const BASE_BUFFER_SIZE: usize = 1024;

/// Largest render buffer tried before giving up (64x the base size)
pub const MAX_BUFFER_SIZE: usize = 64 * BASE_BUFFER_SIZE;

/// Returned instead of the stack when it does not fit in [`MAX_BUFFER_SIZE`]
pub const STACK_TOO_DEEP: &str = "stack trace too deep";

/// Capture the current call stack as text
///
/// Equivalent to `capture_with_limits(BASE_BUFFER_SIZE, MAX_BUFFER_SIZE)`.
pub fn capture() -> String {
    capture_with_limits(BASE_BUFFER_SIZE, MAX_BUFFER_SIZE)
}

/// Capture the current call stack, rendering into a buffer that starts at
/// `base` bytes and doubles up to `max` bytes
///
/// Returns [`STACK_TOO_DEEP`] if the rendered stack exceeds `max`.
pub fn capture_with_limits(base: usize, max: usize) -> String {
    let backtrace = Backtrace::new();
    render_with_limits(&backtrace, base, max)
}

/// Load symbol information ahead of the first capture
///
/// The first capture in a process reads debug info and can take hundreds of
/// milliseconds; later captures are cheap. Runs at most once per process.
pub fn warm_up() {
    static WARM_UP: Once = Once::new();
    WARM_UP.call_once(|| {
        let stack = capture();
        tracing::debug!(bytes = stack.len(), "stack symbolizer warmed up");
    });
}

/// Compute the identity of a stack text using FNV-1a
///
/// # Example
/// ```
/// use lockmon::stack_capture::hash_stack;
///
/// let id = hash_stack("main\n    at src/main.rs:10\n");
/// assert_eq!(id, hash_stack("main\n    at src/main.rs:10\n"));
/// ```
///
/// Different texts may collide; collisions are not detected.
pub fn hash_stack(stack: &str) -> StackId {
    let mut hasher = fnv::FnvHasher::default();
    hasher.write(stack.as_bytes());
    hasher.finish()
}

fn render_with_limits(backtrace: &Backtrace, base: usize, max: usize) -> String {
    let mut size = base.max(1);
    while size <= max {
        let mut buf = BoundedBuf::with_limit(size);
        if write_frames(backtrace, &mut buf).is_ok() {
            return buf.text;
        }
        size = size.saturating_mul(2);
    }
    STACK_TOO_DEEP.to_string()
}

/// Writes one entry per resolved symbol, falling back to the instruction
/// pointer when a frame has no symbol information.
fn write_frames(backtrace: &Backtrace, out: &mut impl Write) -> fmt::Result {
    let mut index = 0usize;
    for frame in backtrace.frames() {
        let symbols = frame.symbols();
        if symbols.is_empty() {
            writeln!(out, "{index:>4}: {:?}", frame.ip())?;
            index += 1;
            continue;
        }
        for symbol in symbols {
            match symbol.name() {
                Some(name) => writeln!(out, "{index:>4}: {name:#}")?,
                None => writeln!(out, "{index:>4}: <unknown>")?,
            }
            if let (Some(file), Some(line)) = (symbol.filename(), symbol.lineno()) {
                writeln!(out, "             at {}:{line}", file.display())?;
            }
            index += 1;
        }
    }
    Ok(())
}

/// String writer that refuses to grow past a byte limit
struct BoundedBuf {
    text: String,
    limit: usize,
}

impl BoundedBuf {
    fn with_limit(limit: usize) -> Self {
        Self {
            text: String::with_capacity(limit),
            limit,
        }
    }
}

impl Write for BoundedBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.text.len() + s.len() > self.limit {
            return Err(fmt::Error);
        }
        self.text.push_str(s);
        Ok(())
    }
}
