//! Appender trait for log output destinations
//!
//! Every appender embeds an [`AppenderCore`] holding the state all sinks share
//! (name, threshold, layout, filter chain, lifecycle, error handler). The
//! provided methods of [`Appender`] implement the common delivery skeleton;
//! concrete sinks only supply `open`, `release` and `write`.

use super::error::{LoggerError, Result};
use super::error_handler::{self, ErrorHandler};
use super::filter::{Decision, Filter, FilterChain};
use super::layout::Layout;
use super::log_level::LogLevel;
use super::logging_event::LoggingEvent;
use super::metrics::AppenderMetrics;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// `Created -> Active -> Closed`; `Closed` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Active,
    Closed,
}

/// State shared by every appender implementation
pub struct AppenderCore {
    name: RwLock<String>,
    threshold: RwLock<LogLevel>,
    layout: RwLock<Option<Arc<dyn Layout>>>,
    filters: RwLock<FilterChain>,
    /// Shared by every `append`, exclusive for `activate` and `close`
    lifecycle: RwLock<Lifecycle>,
    /// Errors raised while the lifecycle lock was held
    deferred: Mutex<Vec<LoggerError>>,
    error_handler: RwLock<Option<Arc<dyn ErrorHandler>>>,
    configuration_collector: AtomicBool,
    metrics: AppenderMetrics,
}

impl AppenderCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: RwLock::new(name.into()),
            threshold: RwLock::new(LogLevel::Trace),
            layout: RwLock::new(None),
            filters: RwLock::new(FilterChain::new()),
            lifecycle: RwLock::new(Lifecycle::Created),
            deferred: Mutex::new(Vec::new()),
            error_handler: RwLock::new(None),
            configuration_collector: AtomicBool::new(false),
            metrics: AppenderMetrics::new(),
        }
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = name.into();
    }

    pub fn threshold(&self) -> LogLevel {
        *self.threshold.read()
    }

    /// Events below `level` are skipped
    pub fn set_threshold(&self, level: LogLevel) {
        *self.threshold.write() = level;
    }

    pub fn layout(&self) -> Option<Arc<dyn Layout>> {
        self.layout.read().clone()
    }

    pub fn set_layout(&self, layout: Arc<dyn Layout>) {
        *self.layout.write() = Some(layout);
    }

    pub fn clear_layout(&self) {
        *self.layout.write() = None;
    }

    pub fn add_filter(&self, filter: Arc<dyn Filter>) {
        self.filters.write().push(filter);
    }

    pub fn clear_filters(&self) {
        self.filters.write().clear();
    }

    pub fn filters(&self) -> FilterChain {
        self.filters.read().clone()
    }

    pub fn decide(&self, event: &LoggingEvent) -> Decision {
        self.filters.read().decide(event)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.read_recursive()
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle() == Lifecycle::Active
    }

    pub fn is_closed(&self) -> bool {
        self.lifecycle() == Lifecycle::Closed
    }

    /// Recursive so a handler that logs back into this appender on the same
    /// thread cannot block on a write still in progress
    pub(crate) fn read_lifecycle(&self) -> RwLockReadGuard<'_, Lifecycle> {
        self.lifecycle.read_recursive()
    }

    pub(crate) fn write_lifecycle(&self) -> RwLockWriteGuard<'_, Lifecycle> {
        self.lifecycle.write()
    }

    pub fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        *self.error_handler.write() = Some(handler);
    }

    /// This appender's handler, or the process-wide default
    pub fn error_handler(&self) -> Arc<dyn ErrorHandler> {
        self.error_handler
            .read()
            .clone()
            .unwrap_or_else(error_handler::default_error_handler)
    }

    /// Report an error through this appender's error channel
    ///
    /// Must not be called while the lifecycle lock is held; sinks failing
    /// inside `open`, `write` or `release` use [`defer_report`](Self::defer_report).
    pub fn report(&self, error: &LoggerError) {
        let handler = self.error_handler();
        error_handler::report(handler.as_ref(), &self.name(), error);
    }

    /// Queue an error raised inside a sink callback
    ///
    /// Queued errors are reported by `activate`, `close` and `append` once they
    /// have released the lifecycle lock.
    pub fn defer_report(&self, error: LoggerError) {
        self.deferred.lock().push(error);
    }

    pub(crate) fn report_deferred(&self) {
        let pending = std::mem::take(&mut *self.deferred.lock());
        for err in &pending {
            self.report(err);
        }
    }

    pub fn is_configuration_collector(&self) -> bool {
        self.configuration_collector.load(Ordering::Relaxed)
    }

    /// Collectors survive `remove_all_appenders`
    pub fn set_configuration_collector(&self, collector: bool) {
        self.configuration_collector.store(collector, Ordering::Relaxed);
    }

    pub fn metrics(&self) -> &AppenderMetrics {
        &self.metrics
    }
}

impl fmt::Debug for AppenderCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppenderCore")
            .field("name", &*self.name.read())
            .field("threshold", &self.threshold())
            .field("layout", &*self.layout.read())
            .field("filters", &self.filters.read().len())
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

pub trait Appender: Send + Sync {
    fn core(&self) -> &AppenderCore;

    /// Acquire resources; runs under the lifecycle lock during `activate`
    fn open(&self) -> Result<()> {
        Ok(())
    }

    /// Release resources; must tolerate being called when `open` never succeeded
    ///
    /// Runs outside the lifecycle lock during `close` and under it during
    /// re-activation.
    fn release(&self) -> Result<()> {
        Ok(())
    }

    /// Deliver one accepted event
    fn write(&self, event: &LoggingEvent) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn requires_layout(&self) -> bool {
        false
    }

    /// Precondition checked before every write
    fn check_entry_conditions(&self) -> Result<()> {
        let core = self.core();
        if self.requires_layout() && core.layout().is_none() {
            return Err(LoggerError::missing_layout(core.name()));
        }
        Ok(())
    }

    fn name(&self) -> String {
        self.core().name()
    }

    /// Apply the configured properties and start serving
    ///
    /// Activating an active appender releases and re-opens its resources, which
    /// is how property changes are applied. A closed appender cannot be
    /// re-activated.
    fn activate(&self) -> Result<()> {
        let core = self.core();
        let mut state = core.write_lifecycle();

        let result = match *state {
            Lifecycle::Closed => Err(LoggerError::closed(core.name())),
            current => {
                if current == Lifecycle::Active {
                    if let Err(err) = self.release() {
                        core.defer_report(err);
                    }
                    *state = Lifecycle::Created;
                }
                self.open().map(|()| *state = Lifecycle::Active)
            }
        };
        drop(state);

        core.report_deferred();
        if let Err(ref err) = result {
            core.report(err);
        }
        result
    }

    /// Release everything and refuse further writes; closing twice is a no-op
    ///
    /// The state flips to `Closed` under the exclusive lock, so no write is in
    /// progress and none is accepted afterwards. Resources are released after
    /// the lock is dropped, which lets a draining worker or a failing nested
    /// sink call back into this appender without blocking.
    fn close(&self) -> Result<()> {
        let core = self.core();
        {
            let mut state = core.write_lifecycle();
            if *state == Lifecycle::Closed {
                return Ok(());
            }
            *state = Lifecycle::Closed;
        }

        let result = self.release();
        core.report_deferred();
        if let Err(ref err) = result {
            core.report(err);
        }
        result
    }

    /// Run the delivery skeleton for one event
    ///
    /// Failures are reported through the appender's error channel and returned;
    /// they never panic into the caller. Events skipped by the threshold or the
    /// filter chain return `Ok`. Reporting happens after the lifecycle lock is
    /// released.
    fn append(&self, event: &LoggingEvent) -> Result<()> {
        let core = self.core();
        let state = core.read_lifecycle();

        let result = match *state {
            Lifecycle::Active => {
                if event.level() < core.threshold() || core.decide(event) == Decision::Deny {
                    core.metrics().record_filtered();
                    return Ok(());
                }
                self.check_entry_conditions().and_then(|()| self.write(event))
            }
            Lifecycle::Closed => Err(LoggerError::closed(core.name())),
            Lifecycle::Created => Err(LoggerError::not_activated(core.name())),
        };
        drop(state);

        core.report_deferred();
        match result {
            Ok(()) => {
                core.metrics().record_written();
                Ok(())
            }
            Err(err) => {
                core.metrics().record_failed();
                core.report(&err);
                Err(err)
            }
        }
    }
}

/// Identity comparison of two appender handles
pub fn same_appender(a: &Arc<dyn Appender>, b: &Arc<dyn Appender>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}
