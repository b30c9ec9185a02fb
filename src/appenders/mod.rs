//! Appender implementations

pub mod async_appender;
#[cfg(feature = "console")]
pub mod console;
pub mod file;
pub mod list;
pub mod main_thread;
pub mod network;
pub mod rolling_file;
pub mod writer;

pub use async_appender::AsyncAppender;
#[cfg(feature = "console")]
pub use console::{ConsoleAppender, ConsoleTarget};
pub use file::{FileAppender, FileConfig};
pub use list::ListAppender;
pub use main_thread::MainThreadAppender;
pub use network::{NetworkAppender, NetworkConfig, MAX_PENDING_BYTES};
pub use rolling_file::{DatePattern, RollingFileAppender, RollingPolicy, RotationStrategy};
pub use writer::{SharedBuffer, WriterAppender};

// Re-export the trait so `appenders::*` is enough to drive a sink
pub use crate::core::Appender;
