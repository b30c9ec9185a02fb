//! File logging example
//!
//! Demonstrates a plain file appender and a rolling file appender sharing one
//! logger.
//!
//! Run with: cargo run --example file_logging

use rust_logger_dispatch::core::JsonLayout;
use rust_logger_dispatch::prelude::*;
use std::sync::Arc;

fn main() -> Result<()> {
    println!("=== Rust Logger Dispatch - File Logging Example ===\n");

    let file = Arc::new(
        FileAppender::new("application.log")
            .with_append(false)
            .with_layout(SimpleLayout::new().with_header("=== session start ===\n")),
    );
    file.activate()?;

    let rolling = Arc::new(
        RollingFileAppender::new("application.jsonl")
            .with_layout(JsonLayout::new())
            .with_policy(
                RollingPolicy::new()
                    .with_max_size(4 * 1024)
                    .with_max_backup_index(3)
                    .with_compression(true),
            ),
    );
    rolling.activate()?;

    let logger = Logger::new("app");
    logger.add_appender(file.clone());
    logger.add_appender(rolling.clone());

    println!("1. Logging to both files:");
    logger.info("Application started");
    logger.debug("Loading configuration...");
    logger.warn("Using default settings for some options");
    logger.error("Failed to load optional plugin");

    println!("\n2. Filling the rolling file:");
    for i in 1..=200 {
        logger.info(format!("Processing item {}/200", i));
    }
    println!("   live file holds {} bytes", rolling.current_size());

    logger.shutdown();

    println!("\n=== Example completed successfully! ===");
    println!("Check 'application.log' and 'application.jsonl*' for the output");

    Ok(())
}
