//! Worker-thread dispatch
//!
//! An [`AsyncAppender`] owns one dedicated thread. Producers only clone the
//! event onto an unbounded channel; the worker drains it in FIFO order and
//! fans each event out to the nested appenders.

use crate::core::attachable::panic_message;
use crate::core::{
    Appender, AppenderAttachable, AppenderCore, Attachable, LoggerError, LoggingEvent, Result,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

enum Task {
    Deliver(LoggingEvent),
    Flush,
}

/// Router run by the worker thread; owns nothing but the shared registry
struct Dispatcher {
    receiver: Receiver<Task>,
    appenders: Arc<AppenderAttachable>,
}

impl Dispatcher {
    fn run(self) {
        let Self {
            receiver,
            appenders,
        } = self;

        // ends once every sender is gone and the queue is empty
        while let Ok(task) = receiver.recv() {
            match task {
                Task::Deliver(event) => {
                    appenders.call_appenders(&event);
                }
                Task::Flush => {
                    for appender in appenders.appenders() {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| appender.flush()));
                        let err = match outcome {
                            Ok(Ok(())) => continue,
                            Ok(Err(err)) => err,
                            Err(payload) => LoggerError::other(format!(
                                "appender panicked while flushing: {}",
                                panic_message(payload.as_ref())
                            )),
                        };
                        appender.core().report(&err);
                    }
                }
            }
        }
    }
}

struct Worker {
    sender: Sender<Task>,
    handle: JoinHandle<()>,
}

/// Appender that hands events to a background thread
///
/// Closing the appender stops intake, lets the worker drain everything
/// already queued and joins it. Nested appenders are left open since they
/// may be attached elsewhere.
///
/// # Example
///
/// ```
/// use rust_logger_dispatch::appenders::{AsyncAppender, ListAppender};
/// use rust_logger_dispatch::core::{Appender, Attachable, LogLevel, LoggingEvent};
/// use std::sync::Arc;
///
/// let list = Arc::new(ListAppender::new("list"));
/// list.activate().unwrap();
///
/// let async_appender = AsyncAppender::new("async");
/// async_appender.add_appender(list.clone());
/// async_appender.activate().unwrap();
///
/// async_appender.append(&LoggingEvent::new(LogLevel::Info, "app", "queued")).unwrap();
/// async_appender.close().unwrap();
///
/// assert_eq!(list.messages(), vec!["queued"]);
/// ```
pub struct AsyncAppender {
    core: AppenderCore,
    appenders: Arc<AppenderAttachable>,
    worker: Mutex<Option<Worker>>,
}

impl AsyncAppender {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: AppenderCore::new(name),
            appenders: Arc::new(AppenderAttachable::new()),
            worker: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_appender(self, appender: Arc<dyn Appender>) -> Self {
        self.appenders.add_appender(appender);
        self
    }

    /// Events posted but not yet picked up by the worker
    pub fn pending(&self) -> usize {
        self.worker
            .lock()
            .as_ref()
            .map_or(0, |worker| worker.sender.len())
    }

    pub fn is_worker_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    fn post(&self, task: Task) -> Result<()> {
        let worker = self.worker.lock();
        let worker = worker
            .as_ref()
            .ok_or_else(|| LoggerError::worker_not_running(self.core.name()))?;
        worker
            .sender
            .send(task)
            .map_err(|_| LoggerError::ChannelSendError)
    }
}

impl Attachable for AsyncAppender {
    fn attachable(&self) -> &AppenderAttachable {
        &self.appenders
    }
}

impl Appender for AsyncAppender {
    fn core(&self) -> &AppenderCore {
        &self.core
    }

    fn open(&self) -> Result<()> {
        let name = self.core.name();
        let (sender, receiver) = unbounded();
        let dispatcher = Dispatcher {
            receiver,
            appenders: Arc::clone(&self.appenders),
        };

        let handle = thread::Builder::new()
            .name(format!("async-appender-{}", name))
            .spawn(move || dispatcher.run())
            .map_err(|e| LoggerError::io_operation("spawning dispatch worker", name, e))?;

        *self.worker.lock() = Some(Worker { sender, handle });
        Ok(())
    }

    fn release(&self) -> Result<()> {
        let Some(Worker { sender, handle }) = self.worker.lock().take() else {
            return Ok(());
        };

        // without a sender the worker exits after the last queued task
        drop(sender);
        handle.join().map_err(|_| {
            LoggerError::other(format!(
                "dispatch worker of '{}' panicked",
                self.core.name()
            ))
        })
    }

    fn check_entry_conditions(&self) -> Result<()> {
        if self.is_worker_running() {
            Ok(())
        } else {
            Err(LoggerError::worker_not_running(self.core.name()))
        }
    }

    fn write(&self, event: &LoggingEvent) -> Result<()> {
        self.post(Task::Deliver(event.clone()))
    }

    /// Queue a flush of the nested appenders behind the events already posted
    fn flush(&self) -> Result<()> {
        if self.worker.lock().is_none() {
            return Ok(());
        }
        self.post(Task::Flush)
    }
}

impl Drop for AsyncAppender {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
