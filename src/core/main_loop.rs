//! Designated-thread task loop
//!
//! A [`MainLoop`] is created on the thread the host nominates as its primary
//! thread and stays there. Other threads post work through a cloned
//! [`MainLoopHandle`]; the host pumps the loop from its own event loop.

use super::error::{LoggerError, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::marker::PhantomData;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// FIFO task queue bound to the thread that created it
///
/// # Example
///
/// ```
/// use rust_logger_dispatch::core::MainLoop;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let main_loop = MainLoop::new();
/// let handle = main_loop.handle();
/// let hits = Arc::new(AtomicUsize::new(0));
///
/// let counter = Arc::clone(&hits);
/// std::thread::spawn(move || {
///     handle.post(move || { counter.fetch_add(1, Ordering::SeqCst); }).unwrap();
/// })
/// .join()
/// .unwrap();
///
/// assert_eq!(main_loop.run_pending(), 1);
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
pub struct MainLoop {
    thread: ThreadId,
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    // pinned to the creating thread
    _not_send: PhantomData<*const ()>,
}

impl MainLoop {
    /// Designate the current thread
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            thread: thread::current().id(),
            sender,
            receiver,
            _not_send: PhantomData,
        }
    }

    pub fn handle(&self) -> MainLoopHandle {
        MainLoopHandle {
            thread: self.thread,
            sender: self.sender.clone(),
        }
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }

    /// Number of tasks waiting to run
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Run every task queued so far without blocking
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Run tasks as they arrive until `timeout` elapses
    pub fn run_for(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut ran = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        ran
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable, thread-safe way to reach a [`MainLoop`]
#[derive(Clone, Debug)]
pub struct MainLoopHandle {
    thread: ThreadId,
    sender: Sender<Task>,
}

impl MainLoopHandle {
    /// Whether the caller already runs on the designated thread
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }

    /// Queue `task` and return immediately
    ///
    /// Fails once the loop has been dropped.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> Result<()> {
        self.sender
            .send(Box::new(task))
            .map_err(|_| LoggerError::ChannelSendError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_handle_knows_designated_thread() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        assert!(handle.is_current());

        let remote = handle.clone();
        let on_other = thread::spawn(move || remote.is_current()).join().unwrap();
        assert!(!on_other);
    }

    #[test]
    fn test_tasks_run_in_post_order() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let seen = Arc::clone(&seen);
            handle.post(move || seen.lock().push(i)).unwrap();
        }

        assert_eq!(main_loop.pending(), 5);
        assert_eq!(main_loop.run_pending(), 5);
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_post_after_drop_fails() {
        let handle = MainLoop::new().handle();
        assert!(matches!(handle.post(|| {}), Err(LoggerError::ChannelSendError)));
    }

    #[test]
    fn test_run_for_picks_up_late_tasks() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();

        let poster = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.post(|| {}).unwrap();
        });

        let ran = main_loop.run_for(Duration::from_millis(500));
        poster.join().unwrap();
        assert_eq!(ran, 1);
    }
}
