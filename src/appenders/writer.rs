//! Writer-based appender and the stream bookkeeping shared by file appenders
//!
//! A stream gets the layout header when it is opened, one rendered record per
//! event, and the layout footer when it is closed.

use crate::core::layout::{footer_bytes, header_bytes, render};
use crate::core::{Appender, AppenderCore, Layout, LoggerError, LoggingEvent, Result};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An open byte stream plus the number of bytes written to it
#[derive(Default)]
pub(crate) struct WriterState {
    writer: Option<Box<dyn Write + Send>>,
    bytes_written: u64,
    header_len: u64,
}

impl WriterState {
    pub(crate) fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Install `writer` and write the header; `existing` is the size already on disk
    pub(crate) fn open(
        &mut self,
        mut writer: Box<dyn Write + Send>,
        existing: u64,
        layout: Option<&dyn Layout>,
    ) -> io::Result<()> {
        let header = header_bytes(layout);
        let result = writer.write_all(&header);
        self.writer = Some(writer);
        self.bytes_written = existing;
        self.header_len = header.len() as u64;
        result?;
        self.bytes_written += self.header_len;
        Ok(())
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8], flush: bool) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "stream is not open"))?;

        writer.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        if flush {
            writer.flush()?;
        }
        Ok(())
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    /// Write the footer, flush and hand the writer back
    ///
    /// The flush is attempted even when the footer fails; the first error wins.
    pub(crate) fn close(
        &mut self,
        layout: Option<&dyn Layout>,
    ) -> (Option<Box<dyn Write + Send>>, io::Result<()>) {
        let Some(mut writer) = self.writer.take() else {
            return (None, Ok(()));
        };

        let footer = footer_bytes(layout);
        let written = writer.write_all(&footer);
        let flushed = writer.flush();
        self.bytes_written = 0;
        self.header_len = 0;
        (Some(writer), written.and(flushed))
    }

    pub(crate) fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Whether anything beyond the header went into the stream
    pub(crate) fn has_content(&self) -> bool {
        self.bytes_written > self.header_len
    }
}

/// In-memory `Write` target that can be inspected while an appender owns it
///
/// # Example
///
/// ```
/// use rust_logger_dispatch::appenders::SharedBuffer;
/// use std::io::Write;
///
/// let buffer = SharedBuffer::new();
/// let mut writer = buffer.clone();
/// writer.write_all(b"abc").unwrap();
/// assert_eq!(buffer.contents(), b"abc");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().clone()
    }

    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Appender writing to any `Write + Send` target
///
/// # Example
///
/// ```
/// use rust_logger_dispatch::appenders::{SharedBuffer, WriterAppender};
/// use rust_logger_dispatch::core::{Appender, LoggingEvent, LogLevel, SimpleLayout};
///
/// let buffer = SharedBuffer::new();
/// let appender = WriterAppender::new("memory", buffer.clone()).with_layout(SimpleLayout::new());
/// appender.activate().unwrap();
/// appender.append(&LoggingEvent::new(LogLevel::Info, "app", "ready")).unwrap();
/// assert_eq!(buffer.contents_lossy(), "INFO - ready\n");
/// ```
pub struct WriterAppender {
    core: AppenderCore,
    /// Target waiting for the next activation
    target: Mutex<Option<Box<dyn Write + Send>>>,
    state: Mutex<WriterState>,
    immediate_flush: AtomicBool,
}

impl WriterAppender {
    pub fn new(name: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        Self {
            core: AppenderCore::new(name),
            target: Mutex::new(Some(Box::new(writer))),
            state: Mutex::new(WriterState::default()),
            immediate_flush: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_layout(self, layout: impl Layout + 'static) -> Self {
        self.core.set_layout(Arc::new(layout));
        self
    }

    #[must_use]
    pub fn with_immediate_flush(self, enabled: bool) -> Self {
        self.set_immediate_flush(enabled);
        self
    }

    /// Replace the target; takes effect at the next activation
    pub fn set_writer(&self, writer: impl Write + Send + 'static) {
        *self.target.lock() = Some(Box::new(writer));
    }

    pub fn set_immediate_flush(&self, enabled: bool) {
        self.immediate_flush.store(enabled, Ordering::Relaxed);
    }

    pub fn immediate_flush(&self) -> bool {
        self.immediate_flush.load(Ordering::Relaxed)
    }
}

impl Appender for WriterAppender {
    fn core(&self) -> &AppenderCore {
        &self.core
    }

    fn open(&self) -> Result<()> {
        let writer = self
            .target
            .lock()
            .take()
            .ok_or_else(|| LoggerError::config(self.core.name(), "no writer set"))?;

        let layout = self.core.layout();
        self.state
            .lock()
            .open(writer, 0, layout.as_deref())
            .map_err(|e| LoggerError::io_operation("writing header", self.core.name(), e))
    }

    fn release(&self) -> Result<()> {
        let layout = self.core.layout();
        let (writer, result) = self.state.lock().close(layout.as_deref());
        if let Some(writer) = writer {
            let mut target = self.target.lock();
            if target.is_none() {
                *target = Some(writer);
            }
        }
        result.map_err(|e| LoggerError::io_operation("closing writer", self.core.name(), e))
    }

    fn write(&self, event: &LoggingEvent) -> Result<()> {
        let layout = self.core.layout();
        let bytes = render(layout.as_deref(), event);
        self.state
            .lock()
            .write_bytes(&bytes, self.immediate_flush())
            .map_err(|e| LoggerError::io_operation("writing event", self.core.name(), e))
    }

    fn flush(&self) -> Result<()> {
        self.state
            .lock()
            .flush()
            .map_err(|e| LoggerError::io_operation("flushing writer", self.core.name(), e))
    }
}

impl Drop for WriterAppender {
    fn drop(&mut self) {
        // Write the footer if the owner never closed us
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FramedBinaryLayout, LogLevel, RecordingErrorHandler, SimpleLayout};

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "device gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_header_payloads_footer() {
        let buffer = SharedBuffer::new();
        let layout = FramedBinaryLayout::new()
            .with_header(b"H".to_vec())
            .with_footer(b"F".to_vec());
        let appender = WriterAppender::new("bin", buffer.clone()).with_layout(layout.clone());
        appender.activate().unwrap();

        let first = LoggingEvent::binary(LogLevel::Info, "b", b"P1".to_vec());
        let second = LoggingEvent::binary(LogLevel::Info, "b", b"P2".to_vec());
        appender.append(&first).unwrap();
        appender.append(&second).unwrap();
        appender.close().unwrap();

        use crate::core::BinaryLayout;
        let mut expected = b"H".to_vec();
        expected.extend(layout.binary_format(&first));
        expected.extend(layout.binary_format(&second));
        expected.extend(b"F");
        assert_eq!(buffer.contents(), expected);
    }

    #[test]
    fn test_text_header_and_footer() {
        let buffer = SharedBuffer::new();
        let appender = WriterAppender::new("text", buffer.clone())
            .with_layout(SimpleLayout::new().with_header("begin\n").with_footer("end\n"));
        appender.activate().unwrap();
        appender.append(&LoggingEvent::new(LogLevel::Warn, "t", "one")).unwrap();
        appender.close().unwrap();
        appender.close().unwrap();

        assert_eq!(buffer.contents_lossy(), "begin\nWARN - one\nend\n");
    }

    #[test]
    fn test_without_layout_writes_raw_payload() {
        let buffer = SharedBuffer::new();
        let appender = WriterAppender::new("raw", buffer.clone());
        appender.activate().unwrap();
        appender.append(&LoggingEvent::new(LogLevel::Info, "t", "abc")).unwrap();
        appender.append(&LoggingEvent::binary(LogLevel::Info, "t", vec![0, 1])).unwrap();

        assert_eq!(buffer.contents(), vec![b'a', b'b', b'c', 0, 1]);
    }

    #[test]
    fn test_write_failure_is_reported_not_raised() {
        let handler = Arc::new(RecordingErrorHandler::new());
        let appender = WriterAppender::new("broken", BrokenWriter);
        appender.core().set_error_handler(handler.clone());
        appender.activate().unwrap();

        let result = appender.append(&LoggingEvent::new(LogLevel::Info, "t", "x"));

        assert!(result.is_err());
        assert_eq!(handler.len(), 1);
        assert!(handler.errors()[0].message.contains("writing event"));
        assert_eq!(appender.core().metrics().failed_count(), 1);
    }

    #[test]
    fn test_reactivation_reuses_writer() {
        let buffer = SharedBuffer::new();
        let appender = WriterAppender::new("again", buffer.clone());
        appender.activate().unwrap();
        appender.append(&LoggingEvent::new(LogLevel::Info, "t", "a")).unwrap();
        appender.activate().unwrap();
        appender.append(&LoggingEvent::new(LogLevel::Info, "t", "b")).unwrap();

        assert_eq!(buffer.contents_lossy(), "ab");
    }
}
