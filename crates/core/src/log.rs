//! Leveled logging sink
//!
//! Every operation that logs takes an explicit `Arc<dyn Logger>` instead of
//! reaching for a process-wide logger. [`ConsoleLogger`] is what the CLI uses,
//! [`NoopLogger`] and [`MemoryLogger`] are meant for tests and embedding.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use colored::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Verbose,
    Info,
    Warn,
    Error,
    /// Only valid as a threshold; nothing is logged at this level
    Silent,
}

impl LogLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Verbose => "verb",
            Self::Info => "info",
            Self::Warn => "WARN",
            Self::Error => "ERR!",
            Self::Silent => "",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Verbose => "verbose",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Silent => "silent",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "verbose" => Ok(Self::Verbose),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "silent" => Ok(Self::Silent),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// A leveled log sink taking a tag, a message and optional structured metadata
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, tag: &str, message: &str, meta: Option<&Value>);

    fn verbose(&self, tag: &str, message: &str, meta: Option<&Value>) {
        self.log(LogLevel::Verbose, tag, message, meta);
    }

    fn info(&self, tag: &str, message: &str, meta: Option<&Value>) {
        self.log(LogLevel::Info, tag, message, meta);
    }

    fn warn(&self, tag: &str, message: &str, meta: Option<&Value>) {
        self.log(LogLevel::Warn, tag, message, meta);
    }

    fn error(&self, tag: &str, message: &str, meta: Option<&Value>) {
        self.log(LogLevel::Error, tag, message, meta);
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: LogLevel, _tag: &str, _message: &str, _meta: Option<&Value>) {}
}

/// Writes colored lines to stderr, e.g. `monoscript WARN runNpmScript script not found {...}`
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    heading: String,
    level: LogLevel,
}

impl ConsoleLogger {
    pub fn new(heading: impl Into<String>, level: LogLevel) -> Self {
        Self {
            heading: heading.into(),
            level,
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::Silent && level >= self.level
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new("monoscript", LogLevel::Info)
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, level: LogLevel, tag: &str, message: &str, meta: Option<&Value>) {
        if !self.enabled(level) {
            return;
        }

        let label = match level {
            LogLevel::Verbose => level.label().blue(),
            LogLevel::Info => level.label().green(),
            LogLevel::Warn => level.label().black().on_yellow(),
            LogLevel::Error => level.label().red().bold(),
            LogLevel::Silent => return,
        };

        let mut line = format!("{} {} {} {}", self.heading, label, tag.magenta(), message);
        if let Some(meta) = meta {
            line.push(' ');
            line.push_str(&meta.to_string().dimmed().to_string());
        }
        eprintln!("{}", line);
    }
}

/// A log call captured by [`MemoryLogger`]
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub tag: String,
    pub message: String,
    pub meta: Option<Value>,
}

/// Keeps every entry in memory
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.entries().iter().filter(|e| e.level == level).count()
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: LogLevel, tag: &str, message: &str, meta: Option<&Value>) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(LogEntry {
                level,
                tag: tag.to_string(),
                message: message.to_string(),
                meta: meta.cloned(),
            });
    }
}
