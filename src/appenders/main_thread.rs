//! Main-thread marshaling
//!
//! Events logged on the designated thread are delivered inline; events from
//! any other thread are posted to that thread's [`MainLoop`] and delivered
//! when the host pumps it.
//!
//! [`MainLoop`]: crate::core::MainLoop

use crate::core::{
    Appender, AppenderAttachable, AppenderCore, Attachable, LoggingEvent, MainLoopHandle, Result,
};
use std::sync::Arc;

/// Appender delivering on the host's designated thread
///
/// # Example
///
/// ```
/// use rust_logger_dispatch::appenders::{ListAppender, MainThreadAppender};
/// use rust_logger_dispatch::core::{Appender, Attachable, LogLevel, LoggingEvent, MainLoop};
/// use std::sync::Arc;
///
/// let main_loop = MainLoop::new();
/// let list = Arc::new(ListAppender::new("ui"));
/// list.activate().unwrap();
///
/// let appender = Arc::new(MainThreadAppender::new("main", main_loop.handle()));
/// appender.add_appender(list.clone());
/// appender.activate().unwrap();
///
/// let worker = Arc::clone(&appender);
/// std::thread::spawn(move || {
///     worker.append(&LoggingEvent::new(LogLevel::Info, "bg", "from worker")).unwrap();
/// })
/// .join()
/// .unwrap();
///
/// assert!(list.is_empty());
/// main_loop.run_pending();
/// assert_eq!(list.messages(), vec!["from worker"]);
/// ```
pub struct MainThreadAppender {
    core: AppenderCore,
    appenders: Arc<AppenderAttachable>,
    main_loop: MainLoopHandle,
}

impl MainThreadAppender {
    pub fn new(name: impl Into<String>, main_loop: MainLoopHandle) -> Self {
        Self {
            core: AppenderCore::new(name),
            appenders: Arc::new(AppenderAttachable::new()),
            main_loop,
        }
    }

    #[must_use]
    pub fn with_appender(self, appender: Arc<dyn Appender>) -> Self {
        self.appenders.add_appender(appender);
        self
    }

    pub fn main_loop(&self) -> &MainLoopHandle {
        &self.main_loop
    }
}

impl Attachable for MainThreadAppender {
    fn attachable(&self) -> &AppenderAttachable {
        &self.appenders
    }
}

impl Appender for MainThreadAppender {
    fn core(&self) -> &AppenderCore {
        &self.core
    }

    fn write(&self, event: &LoggingEvent) -> Result<()> {
        if self.main_loop.is_current() {
            self.appenders.call_appenders(event);
            return Ok(());
        }

        let appenders = Arc::clone(&self.appenders);
        let event = event.clone();
        self.main_loop.post(move || {
            appenders.call_appenders(&event);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appenders::ListAppender;
    use crate::core::{LogLevel, LoggerError, MainLoop, RecordingErrorHandler};
    use std::thread;
    use std::time::Duration;

    fn setup(main_loop: &MainLoop) -> (Arc<MainThreadAppender>, Arc<ListAppender>) {
        let list = Arc::new(ListAppender::new("list"));
        list.activate().unwrap();
        let appender = Arc::new(
            MainThreadAppender::new("main", main_loop.handle()).with_appender(list.clone()),
        );
        appender.activate().unwrap();
        (appender, list)
    }

    fn event(msg: &str) -> LoggingEvent {
        LoggingEvent::new(LogLevel::Info, "t", msg)
    }

    #[test]
    fn test_inline_on_designated_thread() {
        let main_loop = MainLoop::new();
        let (appender, list) = setup(&main_loop);

        appender.append(&event("inline")).unwrap();

        assert_eq!(list.messages(), vec!["inline"]);
        assert_eq!(main_loop.pending(), 0);
    }

    #[test]
    fn test_other_threads_wait_for_pump() {
        let main_loop = MainLoop::new();
        let (appender, list) = setup(&main_loop);

        let handles: Vec<_> = (0..3)
            .map(|i| {
                let appender = Arc::clone(&appender);
                thread::spawn(move || {
                    appender.append(&event(&format!("bg-{}", i))).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(list.is_empty());
        assert_eq!(main_loop.pending(), 3);
        assert_eq!(main_loop.run_pending(), 3);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_run_for_delivers_late_posts() {
        let main_loop = MainLoop::new();
        let (appender, list) = setup(&main_loop);

        let poster = {
            let appender = Arc::clone(&appender);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                appender.append(&event("late")).unwrap();
            })
        };

        let mut delivered = 0;
        for _ in 0..50 {
            delivered += main_loop.run_for(Duration::from_millis(20));
            if delivered > 0 {
                break;
            }
        }
        poster.join().unwrap();

        assert_eq!(list.messages(), vec!["late"]);
    }

    #[test]
    fn test_post_to_dropped_loop_is_reported() {
        let handler = Arc::new(RecordingErrorHandler::new());
        let handle = MainLoop::new().handle();
        let appender = Arc::new(MainThreadAppender::new("orphan", handle));
        appender.core().set_error_handler(handler.clone());
        appender.activate().unwrap();

        let worker = Arc::clone(&appender);
        let result = thread::spawn(move || worker.append(&event("lost")))
            .join()
            .unwrap();

        assert!(matches!(result, Err(LoggerError::ChannelSendError)));
        assert_eq!(handler.len(), 1);
    }
}
