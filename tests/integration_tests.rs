//! Integration tests for the dispatch core
//!
//! These tests verify:
//! - End-to-end delivery through synchronous, worker-thread and main-thread paths
//! - Failure isolation between appenders
//! - Appenders shared between several owners
//! - File sinks with layouts, headers and footers

use rust_logger_dispatch::appenders::{
    AsyncAppender, FileAppender, ListAppender, MainThreadAppender, RollingFileAppender,
    RollingPolicy, SharedBuffer, WriterAppender,
};
use rust_logger_dispatch::core::{
    Appender, AppenderCore, Attachable, ErrorHandler, ErrorKind, FramedBinaryLayout, JsonLayout, LogLevel,
    Logger, LoggerError, LoggingEvent, MainLoop, RecordingErrorHandler, Result, SimpleLayout,
};
use rust_logger_dispatch::info;
use std::fs;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Appender whose every write fails
struct FailingAppender {
    core: AppenderCore,
}

impl FailingAppender {
    fn new(handler: Arc<RecordingErrorHandler>) -> Arc<Self> {
        let appender = Arc::new(Self {
            core: AppenderCore::new("failing"),
        });
        appender.core.set_error_handler(handler);
        appender.activate().expect("Failed to activate");
        appender
    }
}

impl Appender for FailingAppender {
    fn core(&self) -> &AppenderCore {
        &self.core
    }

    fn write(&self, _event: &LoggingEvent) -> Result<()> {
        Err(LoggerError::writer("disk on fire"))
    }
}

/// Appender that panics on write
struct PanickingAppender {
    core: AppenderCore,
}

impl Appender for PanickingAppender {
    fn core(&self) -> &AppenderCore {
        &self.core
    }

    fn write(&self, _event: &LoggingEvent) -> Result<()> {
        panic!("sink exploded");
    }
}

/// Writer that rejects every write
struct RejectingWriter;

impl Write for RejectingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "device gone"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Logs every reported error back through `logger`
struct LogBackHandler {
    logger: Arc<Logger>,
    seen: RecordingErrorHandler,
}

impl ErrorHandler for LogBackHandler {
    fn handle(&self, source: &str, error: &LoggerError) {
        self.seen.handle(source, error);
        self.logger.error(format!("{} failed: {}", source, error));
    }
}

fn active_list(name: &str) -> Arc<ListAppender> {
    let list = Arc::new(ListAppender::new(name));
    list.activate().expect("Failed to activate");
    list
}

#[test]
fn test_failing_appender_does_not_block_others() {
    let handler = Arc::new(RecordingErrorHandler::new());
    let logger = Logger::new("isolation");
    let list = active_list("good");

    logger.add_appender(FailingAppender::new(handler.clone()));
    logger.add_appender(list.clone());

    let event = LoggingEvent::new(LogLevel::Error, "isolation", "keep going");
    assert_eq!(logger.call_appenders(&event), 1);

    assert_eq!(list.messages(), vec!["keep going"]);
    assert_eq!(handler.count_kind(ErrorKind::Io), 1);
}

#[test]
fn test_panicking_appender_is_contained() {
    let handler = Arc::new(RecordingErrorHandler::new());
    let panicking = Arc::new(PanickingAppender {
        core: AppenderCore::new("panicking"),
    });
    panicking.core.set_error_handler(handler.clone());
    panicking.activate().expect("Failed to activate");

    let logger = Logger::new("panics");
    let list = active_list("survivor");
    logger.add_appender(panicking);
    logger.add_appender(list.clone());

    logger.warn("still here");

    assert_eq!(list.messages(), vec!["still here"]);
    assert!(handler.errors()[0].message.contains("sink exploded"));
}

#[test]
fn test_shared_appender_between_sync_and_async_owners() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("shared.log");

    let file: Arc<dyn Appender> = Arc::new(
        FileAppender::new(log_file.to_str().unwrap())
            .with_name("shared-file")
            .with_layout(SimpleLayout::new()),
    );
    file.activate().expect("Failed to activate file appender");

    let async_appender = Arc::new(AsyncAppender::new("async"));
    async_appender.add_appender(Arc::clone(&file));
    async_appender.activate().expect("Failed to activate async appender");

    let logger = Logger::new("shared");
    logger.add_appender(Arc::clone(&file));
    logger.add_appender(async_appender.clone());

    logger.info("one event");
    async_appender.close().expect("Failed to close async appender");

    // closing the async owner left the shared sink open
    assert!(file.core().is_active());
    logger.info("after async close");
    file.close().expect("Failed to close file appender");

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines.iter().filter(|l| **l == "INFO - one event").count(), 2);
    assert_eq!(lines[2], "INFO - after async close");
}

#[test]
fn test_async_delivery_to_file_survives_close() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("async.log");

    let file = Arc::new(
        FileAppender::new(log_file.to_str().unwrap())
            .with_immediate_flush(false)
            .with_layout(JsonLayout::new()),
    );
    file.activate().expect("Failed to activate");

    let async_appender = AsyncAppender::new("async").with_appender(file.clone());
    async_appender.activate().expect("Failed to activate");

    for i in 0..200 {
        async_appender
            .append(&LoggingEvent::new(LogLevel::Info, "async", format!("message {}", i)))
            .expect("Failed to post");
    }
    async_appender.close().expect("Failed to close");
    file.close().expect("Failed to close file");

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let messages: Vec<String> = content
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).expect("invalid JSON line");
            value["payload"]["text"].as_str().unwrap_or_default().to_string()
        })
        .collect();
    let expected: Vec<String> = (0..200).map(|i| format!("message {}", i)).collect();
    assert_eq!(messages, expected);
}

#[test]
fn test_main_thread_marshal_from_workers() {
    let main_loop = MainLoop::new();
    let list = active_list("ui");
    let appender = Arc::new(
        MainThreadAppender::new("main", main_loop.handle()).with_appender(list.clone()),
    );
    appender.activate().expect("Failed to activate");

    let logger = Arc::new(Logger::new("marshal"));
    logger.add_appender(appender.clone());

    logger.info("on main");
    assert_eq!(list.len(), 1);

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for j in 0..10 {
                    info!(logger, "worker {} message {}", i, j);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker panicked");
    }

    assert_eq!(list.len(), 1);
    assert_eq!(main_loop.run_pending(), 40);
    assert_eq!(list.len(), 41);
    assert_eq!(appender.main_loop().thread_id(), thread::current().id());
}

#[test]
fn test_binary_events_through_writer() {
    let buffer = SharedBuffer::new();
    let appender = WriterAppender::new("frames", buffer.clone()).with_layout(
        FramedBinaryLayout::new()
            .with_header(b"HDR".to_vec())
            .with_footer(b"END".to_vec()),
    );
    appender.activate().expect("Failed to activate");

    let logger = Logger::new("bin");
    let appender: Arc<dyn Appender> = Arc::new(appender);
    logger.add_appender(Arc::clone(&appender));
    logger.log_binary(LogLevel::Info, vec![0xde, 0xad]);
    logger.info("hi");
    appender.close().expect("Failed to close");

    let mut expected = b"HDR".to_vec();
    expected.extend_from_slice(&2u32.to_le_bytes());
    expected.extend_from_slice(&[0xde, 0xad]);
    expected.extend_from_slice(&2u32.to_le_bytes());
    expected.extend_from_slice(b"hi");
    expected.extend_from_slice(b"END");
    assert_eq!(buffer.contents(), expected);
}

#[test]
fn test_rolling_file_end_to_end() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("rolling.log");

    let appender = Arc::new(
        RollingFileAppender::new(log_file.to_str().unwrap())
            .with_layout(SimpleLayout::new())
            .with_policy(RollingPolicy::new().with_max_size(64).with_max_backup_index(3)),
    );
    appender.activate().expect("Failed to activate");

    let logger = Logger::new("rolling");
    logger.add_appender(appender.clone());
    for i in 0..40 {
        logger.info(format!("rolling message {:02}", i));
    }
    appender.close().expect("Failed to close");

    let backups: Vec<_> = fs::read_dir(temp_dir.path())
        .expect("Failed to list dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(backups.len(), 4, "live file plus three backups: {:?}", backups);

    let live = fs::read_to_string(&log_file).expect("Failed to read live file");
    assert!(live.len() <= 64);
    assert!(live.ends_with("INFO - rolling message 39\n"));
}

#[test]
fn test_logger_shutdown_closes_everything() {
    let logger = Logger::new("shutdown");
    let list = active_list("list");
    let async_appender = Arc::new(AsyncAppender::new("async").with_appender(list.clone()));
    async_appender.activate().expect("Failed to activate");
    logger.add_appender(async_appender.clone());

    logger.info("before");
    logger.shutdown();
    logger.info("after");

    assert_eq!(list.messages(), vec!["before"]);
    assert!(async_appender.core().is_closed());
    assert!(!async_appender.is_worker_running());
}

#[test]
fn test_handler_logging_into_failing_appender_returns() {
    let logger = Arc::new(Logger::new("loopback"));
    let handler = Arc::new(LogBackHandler {
        logger: Arc::clone(&logger),
        seen: RecordingErrorHandler::new(),
    });
    let appender = Arc::new(
        WriterAppender::new("rejecting", RejectingWriter).with_layout(SimpleLayout::new()),
    );
    appender.core().set_error_handler(handler.clone());
    appender.activate().expect("Failed to activate");
    logger.add_appender(appender.clone());

    let (done_tx, done_rx) = crossbeam_channel::unbounded();
    let producer = {
        let logger = Arc::clone(&logger);
        thread::spawn(move || {
            logger.info("hello");
            let _ = done_tx.send(());
        })
    };

    assert!(
        done_rx.recv_timeout(Duration::from_secs(5)).is_ok(),
        "producer stuck inside error reporting"
    );
    producer.join().expect("producer panicked");

    // the failure raised by the handler's own line is swallowed
    assert_eq!(handler.seen.len(), 1);
    assert_eq!(appender.core().metrics().failed_count(), 2);
    assert!(appender.core().is_active());
}

#[test]
fn test_inline_main_thread_loopback_returns() {
    let main_loop = MainLoop::new();
    let logger = Arc::new(Logger::new("inline"));
    let handler = Arc::new(LogBackHandler {
        logger: Arc::clone(&logger),
        seen: RecordingErrorHandler::new(),
    });
    let failing = FailingAppender::new(Arc::new(RecordingErrorHandler::new()));
    failing.core().set_error_handler(handler.clone());

    let main = Arc::new(
        MainThreadAppender::new("main", main_loop.handle()).with_appender(failing.clone()),
    );
    main.activate().expect("Failed to activate");
    logger.add_appender(main);

    // delivered inline; the handler re-enters the main-thread appender on the same stack
    logger.info("inline");

    assert_eq!(handler.seen.len(), 1);
    assert_eq!(failing.core().metrics().failed_count(), 2);
}
