//! File appender implementation

use super::writer::WriterState;
use crate::core::layout::render;
use crate::core::{Appender, AppenderCore, Layout, LoggerError, LoggingEvent, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Properties of a file-backed appender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Target path; `$VAR`, `${VAR}` and `~` are expanded at activation
    pub file: String,
    /// Append to an existing file instead of truncating it
    pub append: bool,
    /// Wrap the file in a `BufWriter`
    pub buffered: bool,
    /// Flush after every event
    pub immediate_flush: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            file: String::new(),
            append: true,
            buffered: true,
            immediate_flush: true,
        }
    }
}

impl FileConfig {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }
}

/// Expand environment variables and `~` in a configured path
pub(crate) fn expand_path(raw: &str) -> Result<PathBuf> {
    if raw.trim().is_empty() {
        return Err(LoggerError::config("file", "property 'file' is not set"));
    }

    let expanded = shellexpand::full(raw)
        .map_err(|e| LoggerError::config("file", format!("cannot expand '{}': {}", raw, e)))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Open `path`, creating missing parent directories
///
/// Returns the writer and the number of bytes already in the file.
pub(crate) fn open_file(
    path: &Path,
    append: bool,
    buffered: bool,
) -> Result<(Box<dyn Write + Send>, u64)> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            LoggerError::io_operation(
                "create log directory",
                format!("Failed to create directory '{}'", parent.display()),
                e,
            )
        })?;
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .map_err(|e| LoggerError::file_appender(path.display().to_string(), "Failed to open", e))?;

    let existing = if append {
        file.metadata()
            .map_err(|e| {
                LoggerError::file_appender(
                    path.display().to_string(),
                    "Cannot access file metadata",
                    e,
                )
            })?
            .len()
    } else {
        0
    };

    let writer: Box<dyn Write + Send> = if buffered {
        Box::new(BufWriter::new(file))
    } else {
        Box::new(file)
    };
    Ok((writer, existing))
}

/// Open `path` into `state`, writing the layout header
pub(crate) fn open_stream(
    state: &mut WriterState,
    path: &Path,
    config: &FileConfig,
    append: bool,
    layout: Option<&dyn Layout>,
) -> Result<()> {
    let (writer, existing) = open_file(path, append, config.buffered)?;
    state
        .open(writer, existing, layout)
        .map_err(|e| LoggerError::file_appender(path.display().to_string(), "Failed to write header", e))
}

struct FileState {
    stream: WriterState,
    path: Option<PathBuf>,
}

/// Appender writing to a single file
///
/// # Example
///
/// ```no_run
/// use rust_logger_dispatch::appenders::FileAppender;
/// use rust_logger_dispatch::core::{Appender, SimpleLayout};
///
/// let appender = FileAppender::new("$HOME/logs/app.log")
///     .with_append(false)
///     .with_layout(SimpleLayout::new());
/// appender.activate().unwrap();
/// ```
pub struct FileAppender {
    core: AppenderCore,
    config: RwLock<FileConfig>,
    state: Mutex<FileState>,
}

impl FileAppender {
    pub fn new(file: impl Into<String>) -> Self {
        Self::from_config("file", FileConfig::new(file))
    }

    pub fn from_config(name: impl Into<String>, config: FileConfig) -> Self {
        Self {
            core: AppenderCore::new(name),
            config: RwLock::new(config),
            state: Mutex::new(FileState {
                stream: WriterState::default(),
                path: None,
            }),
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
    pub fn with_append(self, append: bool) -> Self {
        self.set_append(append);
        self
    }

    #[must_use]
    pub fn with_buffered(self, buffered: bool) -> Self {
        self.set_buffered(buffered);
        self
    }

    #[must_use]
    pub fn with_immediate_flush(self, immediate_flush: bool) -> Self {
        self.set_immediate_flush(immediate_flush);
        self
    }

    pub fn set_file(&self, file: impl Into<String>) {
        self.config.write().file = file.into();
    }

    pub fn set_append(&self, append: bool) {
        self.config.write().append = append;
    }

    pub fn set_buffered(&self, buffered: bool) {
        self.config.write().buffered = buffered;
    }

    pub fn set_immediate_flush(&self, immediate_flush: bool) {
        self.config.write().immediate_flush = immediate_flush;
    }

    pub fn config(&self) -> FileConfig {
        self.config.read().clone()
    }

    /// Expanded path of the open file
    pub fn path(&self) -> Option<PathBuf> {
        self.state.lock().path.clone()
    }
}

impl Appender for FileAppender {
    fn core(&self) -> &AppenderCore {
        &self.core
    }

    fn open(&self) -> Result<()> {
        let config = self.config();
        let path = expand_path(&config.file)?;
        let layout = self.core.layout();

        let mut state = self.state.lock();
        open_stream(&mut state.stream, &path, &config, config.append, layout.as_deref())?;
        state.path = Some(path);
        Ok(())
    }

    fn release(&self) -> Result<()> {
        let layout = self.core.layout();
        let mut state = self.state.lock();
        let (_, result) = state.stream.close(layout.as_deref());
        let path = state.path.take();
        result.map_err(|e| {
            LoggerError::file_appender(
                path.map(|p| p.display().to_string()).unwrap_or_default(),
                "Failed to close",
                e,
            )
        })
    }

    fn write(&self, event: &LoggingEvent) -> Result<()> {
        let layout = self.core.layout();
        let bytes = render(layout.as_deref(), event);
        let immediate_flush = self.config.read().immediate_flush;

        let mut state = self.state.lock();
        let FileState { stream, path } = &mut *state;
        stream.write_bytes(&bytes, immediate_flush).map_err(|e| {
            LoggerError::file_appender(
                path.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
                "Failed to write log entry",
                e,
            )
        })
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        let FileState { stream, path } = &mut *state;
        stream.flush().map_err(|e| {
            LoggerError::file_appender(
                path.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
                "Failed to flush",
                e,
            )
        })
    }
}

impl Drop for FileAppender {
    fn drop(&mut self) {
        // Ensure the footer is written and buffered data reaches the disk
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogLevel, RecordingErrorHandler, SimpleLayout};
    use tempfile::tempdir;

    fn event(msg: &str) -> LoggingEvent {
        LoggingEvent::new(LogLevel::Info, "file", msg)
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/app.log");

        let appender = FileAppender::new(path.to_str().unwrap()).with_layout(SimpleLayout::new());
        appender.activate().unwrap();
        appender.append(&event("hello")).unwrap();
        appender.close().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "INFO - hello\n");
    }

    #[test]
    fn test_truncate_and_append_modes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("modes.log");
        fs::write(&path, "old\n").unwrap();

        let appender = FileAppender::new(path.to_str().unwrap());
        appender.activate().unwrap();
        appender.append(&event("new\n")).unwrap();
        appender.close().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\nnew\n");

        let appender = FileAppender::new(path.to_str().unwrap()).with_append(false);
        appender.activate().unwrap();
        appender.append(&event("only\n")).unwrap();
        appender.close().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "only\n");
    }

    #[test]
    fn test_expands_environment_variables() {
        let dir = tempdir().unwrap();
        std::env::set_var("RLD_FILE_TEST_DIR", dir.path());

        let appender = FileAppender::new("$RLD_FILE_TEST_DIR/expanded.log").with_buffered(false);
        appender.activate().unwrap();
        appender.append(&event("x")).unwrap();

        let expected = dir.path().join("expanded.log");
        assert_eq!(appender.path(), Some(expected.clone()));
        assert_eq!(fs::read_to_string(expected).unwrap(), "x");
    }

    #[test]
    fn test_missing_path_fails_activation() {
        let handler = Arc::new(RecordingErrorHandler::new());
        let appender = FileAppender::new("");
        appender.core().set_error_handler(handler.clone());

        assert!(appender.activate().is_err());
        assert!(!appender.core().is_active());
        assert!(appender.append(&event("dropped")).is_err());
        assert_eq!(handler.len(), 2);
    }

    #[test]
    fn test_unopenable_path_reports_os_error() {
        let dir = tempdir().unwrap();
        // a directory cannot be opened as a log file
        let appender = FileAppender::new(dir.path().to_str().unwrap());
        appender.core().set_error_handler(Arc::new(RecordingErrorHandler::new()));

        let err = appender.activate().unwrap_err();
        assert!(matches!(err, LoggerError::FileAppenderError { source: Some(_), .. }));
    }

    #[test]
    fn test_config_round_trip_through_serde() {
        let config: FileConfig =
            serde_json::from_str(r#"{"file":"app.log","append":false}"#).unwrap();
        assert_eq!(config.file, "app.log");
        assert!(!config.append);
        assert!(config.buffered);
    }
}
