//! Console appender implementation

use super::writer::WriterState;
use crate::core::layout::render;
use crate::core::{Appender, AppenderCore, Layout, LogLevel, LoggerError, LoggingEvent, Result};
use colored::Colorize;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Standard stream a [`ConsoleAppender`] writes to
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleTarget {
    #[default]
    Stdout,
    Stderr,
}

impl ConsoleTarget {
    fn writer(self) -> Box<dyn Write + Send> {
        match self {
            ConsoleTarget::Stdout => Box::new(io::stdout()),
            ConsoleTarget::Stderr => Box::new(io::stderr()),
        }
    }
}

/// Writes rendered events to stdout or stderr, text lines colored by level
pub struct ConsoleAppender {
    core: AppenderCore,
    target: RwLock<ConsoleTarget>,
    use_colors: AtomicBool,
    state: Mutex<WriterState>,
}

impl ConsoleAppender {
    pub fn new() -> Self {
        Self {
            core: AppenderCore::new("console"),
            target: RwLock::new(ConsoleTarget::default()),
            use_colors: AtomicBool::new(true),
            state: Mutex::new(WriterState::default()),
        }
    }

    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.core.set_name(name);
        self
    }

    #[must_use]
    pub fn with_layout(self, layout: impl Layout + 'static) -> Self {
        self.core.set_layout(Arc::new(layout));
        self
    }

    #[must_use]
    pub fn with_target(self, target: ConsoleTarget) -> Self {
        self.set_target(target);
        self
    }

    #[must_use]
    pub fn with_colors(self, use_colors: bool) -> Self {
        self.set_use_colors(use_colors);
        self
    }

    /// Takes effect at the next activation
    pub fn set_target(&self, target: ConsoleTarget) {
        *self.target.write() = target;
    }

    pub fn target(&self) -> ConsoleTarget {
        *self.target.read()
    }

    pub fn set_use_colors(&self, use_colors: bool) {
        self.use_colors.store(use_colors, Ordering::Relaxed);
    }

    pub fn use_colors(&self) -> bool {
        self.use_colors.load(Ordering::Relaxed)
    }
}

impl Default for ConsoleAppender {
    fn default() -> Self {
        Self::new()
    }
}

/// Color the line body, leaving trailing newlines uncolored
fn colorize(bytes: &[u8], level: LogLevel) -> Vec<u8> {
    let text = String::from_utf8_lossy(bytes);
    let body = text.trim_end_matches(['\r', '\n']);
    let newline = &text[body.len()..];
    format!("{}{}", body.color(level.color_code()), newline).into_bytes()
}

impl Appender for ConsoleAppender {
    fn core(&self) -> &AppenderCore {
        &self.core
    }

    fn open(&self) -> Result<()> {
        let layout = self.core.layout();
        self.state
            .lock()
            .open(self.target().writer(), 0, layout.as_deref())
            .map_err(|e| LoggerError::io_operation("writing header", self.core.name(), e))
    }

    fn release(&self) -> Result<()> {
        let layout = self.core.layout();
        let (_, result) = self.state.lock().close(layout.as_deref());
        result.map_err(|e| LoggerError::io_operation("closing console", self.core.name(), e))
    }

    fn write(&self, event: &LoggingEvent) -> Result<()> {
        let layout = self.core.layout();
        let mut bytes = render(layout.as_deref(), event);

        let text_line = layout.as_ref().is_some_and(|l| l.as_binary().is_none());
        if self.use_colors() && text_line && !event.is_binary() {
            bytes = colorize(&bytes, event.level());
        }

        self.state
            .lock()
            .write_bytes(&bytes, true)
            .map_err(|e| LoggerError::io_operation("writing event", self.core.name(), e))
    }

    fn flush(&self) -> Result<()> {
        self.state
            .lock()
            .flush()
            .map_err(|e| LoggerError::io_operation("flushing console", self.core.name(), e))
    }
}

impl Drop for ConsoleAppender {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
