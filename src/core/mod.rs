//! Core logger types and traits

pub mod appender;
pub mod attachable;
pub mod error;
pub mod error_handler;
pub mod filter;
pub mod layout;
pub mod log_level;
pub mod logger;
pub mod logging_event;
pub mod main_loop;
pub mod metrics;

pub use appender::{same_appender, Appender, AppenderCore, Lifecycle};
pub use attachable::{AppenderAttachable, Attachable};
pub use error::{ErrorKind, LoggerError, Result};
pub use error_handler::{
    default_error_handler, set_default_error_handler, ErrorHandler, RecordingErrorHandler,
    ReportedError, StderrErrorHandler,
};
pub use filter::{
    Decision, DenyAllFilter, Filter, FilterChain, LevelMatchFilter, LevelRangeFilter,
    SamplingFilter, StringMatchFilter,
};
pub use layout::{BinaryLayout, ByteOrder, FramedBinaryLayout, JsonLayout, Layout, SimpleLayout};
pub use log_level::LogLevel;
pub use logger::Logger;
pub use logging_event::{LoggingEvent, Payload, SourceLocation};
pub use main_loop::{MainLoop, MainLoopHandle};
pub use metrics::AppenderMetrics;
