//! # Rust Logger Dispatch
//!
//! Thread-safe delivery of logging events from any producer thread to a set of
//! appenders.
//!
//! ## Features
//!
//! - **Shared appenders**: `Arc<dyn Appender>` handles attached to any number
//!   of owners through a reader-writer registry
//! - **Three dispatch strategies**: direct fan-out, a dedicated worker thread
//!   per [`AsyncAppender`], and marshaling onto a designated host thread with
//!   [`MainThreadAppender`]
//! - **Sinks**: writer, file, rolling file (size and date rollover) and a
//!   telnet-style network broadcaster
//! - **Failure isolation**: appender errors go to an error channel, never into
//!   producer code

pub mod appenders;
pub mod core;
pub mod macros;

pub mod prelude {
    pub use crate::appenders::{
        AsyncAppender, FileAppender, ListAppender, MainThreadAppender, NetworkAppender,
        RollingFileAppender, RollingPolicy, RotationStrategy, WriterAppender,
    };
    pub use crate::core::{
        Appender, AppenderAttachable, Attachable, Decision, ErrorHandler, Filter, Layout,
        LogLevel, Logger, LoggerError, LoggingEvent, MainLoop, Result, SimpleLayout,
    };
}

pub use crate::appenders::{
    AsyncAppender, FileAppender, ListAppender, MainThreadAppender, NetworkAppender,
    RollingFileAppender, WriterAppender,
};
pub use crate::core::{
    Appender, AppenderAttachable, Attachable, Decision, ErrorHandler, Filter, Layout, LogLevel,
    Logger, LoggerError, LoggingEvent, MainLoop, Result,
};
