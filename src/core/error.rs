//! Error types for the logger system

pub type Result<T> = std::result::Result<T, LoggerError>;

/// Broad classification of a [`LoggerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid property detected at activation or entry check
    Configuration,
    /// Use before activation, after close, or without a running worker
    EntryCondition,
    /// Open, write, rename or remove failure
    Io,
    /// Null or duplicate attach attempts
    Consistency,
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Appender needs a layout but none is set
    #[error("Appender '{appender}' requires a layout")]
    MissingLayout { appender: String },

    /// Append attempted before `activate()`
    #[error("Appender '{appender}' has not been activated")]
    NotActivated { appender: String },

    /// Append attempted after `close()`
    #[error("Attempted to append to closed appender '{appender}'")]
    AppenderClosed { appender: String },

    /// Async appender without a live dispatch worker
    #[error("Dispatch worker of appender '{appender}' is not running")]
    WorkerNotRunning { appender: String },

    /// File appender error with path
    #[error("File appender error for '{path}': {message}")]
    FileAppenderError {
        path: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError {
        path: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Network listener or peer error
    #[error("Network error on {address}: {message}")]
    Network {
        address: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Same appender attached twice to one owner
    #[error("Appender '{name}' is already attached")]
    DuplicateAppender { name: String },

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Channel send error
    #[error("Failed to post logging event to dispatch queue")]
    ChannelSendError,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn missing_layout(appender: impl Into<String>) -> Self {
        LoggerError::MissingLayout {
            appender: appender.into(),
        }
    }

    pub fn not_activated(appender: impl Into<String>) -> Self {
        LoggerError::NotActivated {
            appender: appender.into(),
        }
    }

    pub fn closed(appender: impl Into<String>) -> Self {
        LoggerError::AppenderClosed {
            appender: appender.into(),
        }
    }

    pub fn worker_not_running(appender: impl Into<String>) -> Self {
        LoggerError::WorkerNotRunning {
            appender: appender.into(),
        }
    }

    /// Create a file appender error carrying the OS error
    pub fn file_appender(
        path: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::FileAppenderError {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(
        path: impl Into<String>,
        message: impl Into<String>,
        source: Option<std::io::Error>,
    ) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    pub fn network(
        address: impl Into<String>,
        message: impl Into<String>,
        source: Option<std::io::Error>,
    ) -> Self {
        LoggerError::Network {
            address: address.into(),
            message: message.into(),
            source,
        }
    }

    pub fn duplicate(name: impl Into<String>) -> Self {
        LoggerError::DuplicateAppender { name: name.into() }
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoggerError::InvalidConfiguration { .. } | LoggerError::MissingLayout { .. } => {
                ErrorKind::Configuration
            }
            LoggerError::NotActivated { .. }
            | LoggerError::AppenderClosed { .. }
            | LoggerError::WorkerNotRunning { .. } => ErrorKind::EntryCondition,
            LoggerError::IoOperation { .. }
            | LoggerError::IoError(_)
            | LoggerError::FileAppenderError { .. }
            | LoggerError::FileRotationError { .. }
            | LoggerError::Network { .. }
            | LoggerError::WriterError(_) => ErrorKind::Io,
            LoggerError::DuplicateAppender { .. } => ErrorKind::Consistency,
            LoggerError::JsonError(_) | LoggerError::ChannelSendError | LoggerError::Other(_) => {
                ErrorKind::Other
            }
        }
    }
}
