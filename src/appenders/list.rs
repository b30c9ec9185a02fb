//! In-memory appender collecting events, mostly for tests and configuration
//! collectors

use crate::core::{Appender, AppenderCore, LoggingEvent, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Keeps delivered events in memory
///
/// With a `max_count` the oldest events are evicted first.
pub struct ListAppender {
    core: AppenderCore,
    events: Mutex<VecDeque<LoggingEvent>>,
    /// 0 means unbounded
    max_count: AtomicUsize,
}

impl ListAppender {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: AppenderCore::new(name),
            events: Mutex::new(VecDeque::new()),
            max_count: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_max_count(self, max_count: usize) -> Self {
        self.set_max_count(max_count);
        self
    }

    /// Mark as a collector that survives `remove_all_appenders`
    #[must_use]
    pub fn as_configuration_collector(self) -> Self {
        self.core.set_configuration_collector(true);
        self
    }

    pub fn set_max_count(&self, max_count: usize) {
        self.max_count.store(max_count, Ordering::Relaxed);
        let mut events = self.events.lock();
        Self::evict(&mut events, max_count);
    }

    pub fn max_count(&self) -> Option<usize> {
        match self.max_count.load(Ordering::Relaxed) {
            0 => None,
            n => Some(n),
        }
    }

    pub fn events(&self) -> Vec<LoggingEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Rendered messages of the collected events, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|event| event.message().into_owned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn evict(events: &mut VecDeque<LoggingEvent>, max_count: usize) {
        if max_count == 0 {
            return;
        }
        while events.len() > max_count {
            events.pop_front();
        }
    }
}

impl Appender for ListAppender {
    fn core(&self) -> &AppenderCore {
        &self.core
    }

    fn write(&self, event: &LoggingEvent) -> Result<()> {
        let mut events = self.events.lock();
        events.push_back(event.clone());
        Self::evict(&mut events, self.max_count.load(Ordering::Relaxed));
        Ok(())
    }
}
