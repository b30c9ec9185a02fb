//! Internal error channel
//!
//! Appenders never raise into producer code. Every failure is routed to an
//! [`ErrorHandler`] instead, the same way the logger reports appender failures
//! on stderr.

use super::error::{ErrorKind, LoggerError};
use parking_lot::{Mutex, RwLock};
use std::cell::Cell;
use std::sync::{Arc, OnceLock};

thread_local! {
    static REPORTING: Cell<bool> = const { Cell::new(false) };
}

/// Receiver of internal logger errors
pub trait ErrorHandler: Send + Sync {
    /// Handle an error raised by `source` (usually an appender name)
    fn handle(&self, source: &str, error: &LoggerError);
}

/// Prints errors to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrErrorHandler;

impl ErrorHandler for StderrErrorHandler {
    fn handle(&self, source: &str, error: &LoggerError) {
        let tag = match error.kind() {
            ErrorKind::Consistency => "[LOGGER WARNING]",
            _ => "[LOGGER ERROR]",
        };

        let mut line = format!("{} {}: {}", tag, source, error);
        let mut cause = std::error::Error::source(error);
        while let Some(err) = cause {
            line.push_str(&format!("\n    caused by: {}", err));
            cause = err.source();
        }
        eprintln!("{}", line);
    }
}

/// A single error captured by [`RecordingErrorHandler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedError {
    pub source: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Keeps reported errors in memory
///
/// # Example
///
/// ```
/// use rust_logger_dispatch::core::{ErrorHandler, LoggerError, RecordingErrorHandler};
///
/// let handler = RecordingErrorHandler::new();
/// handler.handle("file", &LoggerError::not_activated("file"));
/// assert_eq!(handler.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct RecordingErrorHandler {
    errors: Mutex<Vec<ReportedError>>,
}

impl RecordingErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<ReportedError> {
        self.errors.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    pub fn count_kind(&self, kind: ErrorKind) -> usize {
        self.errors.lock().iter().filter(|e| e.kind == kind).count()
    }

    pub fn clear(&self) {
        self.errors.lock().clear();
    }
}

impl ErrorHandler for RecordingErrorHandler {
    fn handle(&self, source: &str, error: &LoggerError) {
        self.errors.lock().push(ReportedError {
            source: source.to_string(),
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}

fn default_slot() -> &'static RwLock<Arc<dyn ErrorHandler>> {
    static DEFAULT: OnceLock<RwLock<Arc<dyn ErrorHandler>>> = OnceLock::new();
    DEFAULT.get_or_init(|| RwLock::new(Arc::new(StderrErrorHandler)))
}

/// Process-wide handler used by appenders without their own handler
pub fn default_error_handler() -> Arc<dyn ErrorHandler> {
    Arc::clone(&default_slot().read())
}

/// Replace the process-wide default handler
pub fn set_default_error_handler(handler: Arc<dyn ErrorHandler>) {
    *default_slot().write() = handler;
}

/// Deliver `error` to `handler`
///
/// Errors raised on this thread while a report is already in progress are
/// dropped, so a handler that logs through the facility cannot recurse.
pub fn report(handler: &dyn ErrorHandler, source: &str, error: &LoggerError) {
    let entered = REPORTING.with(|flag| !flag.replace(true));
    if !entered {
        return;
    }

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        handler.handle(source, error)
    }));
    REPORTING.with(|flag| flag.set(false));

    if outcome.is_err() {
        eprintln!("[LOGGER CRITICAL] Error handler panicked while reporting: {}", error);
    }
}

/// Deliver `error` to the process-wide default handler
pub fn report_default(source: &str, error: &LoggerError) {
    let handler = default_error_handler();
    report(handler.as_ref(), source, error);
}
