//! Async logging example
//!
//! Demonstrates worker-thread delivery through an AsyncAppender and
//! marshaling onto the main thread with a MainThreadAppender.
//!
//! Run with: cargo run --example async_logging

use rust_logger_dispatch::appenders::ConsoleAppender;
use rust_logger_dispatch::info;
use rust_logger_dispatch::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Logger Dispatch - Async Logging Example ===\n");

    let console: Arc<dyn Appender> = Arc::new(ConsoleAppender::new().with_layout(SimpleLayout::new()));
    console.activate()?;

    // Worker thread owns delivery to the console
    let async_appender = Arc::new(AsyncAppender::new("async-console").with_appender(console.clone()));
    async_appender.activate()?;

    let logger = Arc::new(Logger::new("app"));
    logger.add_appender(async_appender.clone());

    println!("1. Logging from several producer threads:");
    let producers: Vec<_> = (0..4)
        .map(|id| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..5 {
                    info!(logger, "producer {} step {}", id, i);
                }
            })
        })
        .collect();
    for producer in producers {
        let _ = producer.join();
    }

    // Closing drains everything still queued
    async_appender.close()?;
    println!("   pending after close: {}", async_appender.pending());

    println!("\n2. Marshaling onto the main thread:");
    let main_loop = MainLoop::new();
    let marshal = Arc::new(MainThreadAppender::new("ui", main_loop.handle()).with_appender(console));
    marshal.activate()?;
    logger.remove_all_appenders();
    logger.add_appender(marshal.clone());

    let background = {
        let logger = Arc::clone(&logger);
        thread::spawn(move || {
            for i in 0..3 {
                logger.warn(format!("background task {} finished", i));
            }
        })
    };
    let _ = background.join();

    logger.info("logged inline on the main thread");
    let delivered = main_loop.run_for(Duration::from_millis(100));
    println!("   delivered {} marshaled events", delivered);

    logger.shutdown();

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
