//! Utilities: logging setup (stderr only, level from -v/-q) and a bounded
//! line tail for captured process output.
//!
//! Key items:
//!   init_logging / derive_level
//!   LineTail

use std::collections::VecDeque;

/// Logging helpers.
pub mod logging {
    use tracing_subscriber::EnvFilter;

    #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
    pub enum LogLevel {
        Error = 0,
        Warn = 1,
        Info = 2,
        Debug = 3,
    }

    impl LogLevel {
        pub fn as_str(&self) -> &'static str {
            match self {
                LogLevel::Error => "error",
                LogLevel::Warn => "warn",
                LogLevel::Info => "info",
                LogLevel::Debug => "debug",
            }
        }
    }

    pub fn derive_level(verbose: u8, quiet: bool) -> LogLevel {
        if quiet {
            return LogLevel::Error;
        }
        match verbose {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }

    /// Install the global subscriber. Output goes to stderr: stdout carries
    /// the MCP stream. `RUST_LOG` wins over the derived level.
    pub fn init_logging(level: LogLevel) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    }
}

pub use logging::{derive_level, init_logging};

/// Fixed-capacity ring of the most recent lines.
#[derive(Debug, Clone)]
pub struct LineTail {
    lines: VecDeque<String>,
    capacity: usize,
    seen: usize,
}

impl LineTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            seen: 0,
        }
    }

    pub fn push(&mut self, line: String) {
        self.seen += 1;
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Total lines pushed, including dropped ones.
    pub fn seen(&self) -> usize {
        self.seen
    }

    pub fn dropped(&self) -> usize {
        self.seen - self.lines.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn join(&self) -> String {
        self.iter().collect::<Vec<_>>().join("\n")
    }
}
