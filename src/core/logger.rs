//! Minimal logger: a named level threshold in front of an appender registry
//!
//! Hierarchy and level inheritance are left to the host; this type provides the
//! two entry points appenders rely on, `event_enabled` and `call_appenders`.

use super::appender::Appender;
use super::attachable::{AppenderAttachable, Attachable};
use super::log_level::LogLevel;
use super::logging_event::LoggingEvent;
use parking_lot::RwLock;
use std::fmt;

pub struct Logger {
    name: String,
    level: RwLock<LogLevel>,
    appenders: AppenderAttachable,
}

impl Logger {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: RwLock::new(LogLevel::Trace),
            appenders: AppenderAttachable::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> LogLevel {
        *self.level.read()
    }

    pub fn set_level(&self, level: LogLevel) {
        *self.level.write() = level;
    }

    #[inline]
    pub fn event_enabled(&self, level: LogLevel) -> bool {
        level >= *self.level.read()
    }

    /// Fan `event` out to the attached appenders on the caller's stack
    pub fn call_appenders(&self, event: &LoggingEvent) -> usize {
        self.appenders.call_appenders(event)
    }

    /// Deliver a prepared event if its level is enabled
    pub fn log_event(&self, event: &LoggingEvent) -> usize {
        if !self.event_enabled(event.level()) {
            return 0;
        }
        self.call_appenders(event)
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if !self.event_enabled(level) {
            return;
        }

        let event = LoggingEvent::new(level, self.name.as_str(), message);
        self.call_appenders(&event);
    }

    pub fn log_binary(&self, level: LogLevel, payload: impl Into<Vec<u8>>) {
        if !self.event_enabled(level) {
            return;
        }

        let event = LoggingEvent::binary(level, self.name.as_str(), payload);
        self.call_appenders(&event);
    }

    #[inline]
    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    #[inline]
    pub fn fatal(&self, message: impl Into<String>) {
        self.log(LogLevel::Fatal, message);
    }

    /// Close every attached appender and detach them
    ///
    /// Appenders shared with other owners are closed as well; errors are
    /// reported through each appender's own channel.
    pub fn shutdown(&self) {
        for appender in self.appenders.appenders() {
            let _ = appender.close();
        }
        self.appenders.remove_all_appenders();
    }
}

impl Attachable for Logger {
    fn attachable(&self) -> &AppenderAttachable {
        &self.appenders
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("appenders", &self.appenders)
            .finish()
    }
}
