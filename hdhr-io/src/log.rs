//! Injected log sink
//!
//! Library components never log through a global. Each one is handed a
//! [`Logger`] at construction; the default forwards to `tracing`, and hosts
//! may plug in their own [`LogSink`].

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::Level;

/// Destination for formatted log lines
pub trait LogSink: Send + Sync {
    fn write_line(&self, level: Level, line: &str);
}

/// Forwards lines as `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write_line(&self, level: Level, line: &str) {
        match level {
            Level::ERROR => tracing::error!("{}", line),
            Level::WARN => tracing::warn!("{}", line),
            Level::INFO => tracing::info!("{}", line),
            Level::DEBUG => tracing::debug!("{}", line),
            _ => tracing::trace!("{}", line),
        }
    }
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines written so far
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().clone()
    }

    /// True if any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|(_, line)| line.contains(needle))
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, level: Level, line: &str) {
        self.lines.lock().push((level, line.to_string()));
    }
}

/// Cloneable handle to a sink, with a component prefix
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    prefix: Arc<str>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::tracing()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("prefix", &self.prefix).finish()
    }
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Logger {
            sink,
            prefix: Arc::from(""),
        }
    }

    /// Logger that forwards to `tracing`
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }

    /// Same sink, lines prefixed with `prefix: `
    pub fn with_prefix(&self, prefix: &str) -> Self {
        Logger {
            sink: Arc::clone(&self.sink),
            prefix: Arc::from(prefix),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        if self.prefix.is_empty() {
            self.sink.write_line(level, &args.to_string());
        } else {
            self.sink
                .write_line(level, &format!("{}: {}", self.prefix, args));
        }
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::ERROR, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::WARN, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::INFO, args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::DEBUG, args);
    }
}
