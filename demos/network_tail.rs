//! Network tail example
//!
//! Serves log lines to telnet clients. Connect with `telnet 127.0.0.1 9023`
//! while the example runs.
//!
//! Run with: cargo run --example network_tail

use rust_logger_dispatch::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Logger Dispatch - Network Tail Example ===\n");

    let network = Arc::new(
        NetworkAppender::new()
            .with_address("127.0.0.1")
            .with_port(9023)
            .with_welcome_message("connected to network_tail\r\n")
            .with_layout(SimpleLayout::new()),
    );
    network.activate()?;

    let logger = Logger::new("tail");
    logger.add_appender(network.clone());

    if let Some(addr) = network.local_addr() {
        println!("Listening on {}", addr);
    }

    for tick in 1..=30 {
        network.poll_connections();
        logger.info(format!("tick {} ({} clients)", tick, network.connection_count()));
        thread::sleep(Duration::from_secs(1));
    }

    logger.shutdown();

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
