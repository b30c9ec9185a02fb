//! Network appender for remote log tailing
//!
//! Listens on a TCP port and broadcasts every formatted event to all
//! connected clients, telnet style. The sink never spawns a thread: pending
//! connections are accepted on each write and whenever the host calls
//! [`NetworkAppender::poll_connections`].

use crate::core::layout::render;
use crate::core::{Appender, AppenderCore, Layout, LoggerError, LoggingEvent, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;

/// A peer whose unsent output grows beyond this is dropped
pub const MAX_PENDING_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Bind address
    pub address: String,
    pub port: u16,
    /// Sent to every client right after it connects; empty sends nothing
    pub welcome_message: String,
    /// Disable Nagle's algorithm on client sockets
    pub immediate_flush: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 23,
            welcome_message: String::new(),
            immediate_flush: true,
        }
    }
}

impl NetworkConfig {
    fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

struct Peer {
    stream: TcpStream,
    addr: SocketAddr,
    pending: Vec<u8>,
}

impl Peer {
    /// Drain whatever the client sent; `false` once it hung up
    fn is_alive(&mut self) -> bool {
        let mut scratch = [0u8; 512];
        loop {
            match self.stream.read(&mut scratch) {
                Ok(0) => return false,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return true,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return false,
            }
        }
    }

    /// Queue `bytes` and push as much as the socket takes without blocking
    fn send(&mut self, bytes: &[u8], flush: bool) -> io::Result<()> {
        self.pending.extend_from_slice(bytes);

        while !self.pending.is_empty() {
            match self.stream.write(&self.pending) {
                Ok(0) => return Err(io::Error::new(io::ErrorKind::WriteZero, "peer closed")),
                Ok(n) => {
                    self.pending.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if flush && self.pending.is_empty() {
            self.stream.flush()?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct NetworkState {
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
    peers: Vec<Peer>,
    /// Snapshot taken at activation
    config: NetworkConfig,
}

impl NetworkState {
    /// Accept every pending connection; returns how many were added
    fn accept_pending(&mut self, errors: &mut Vec<LoggerError>) -> usize {
        let Some(listener) = self.listener.as_ref() else {
            return 0;
        };

        let mut accepted = 0;
        loop {
            match listener.accept() {
                Ok((stream, addr)) => {
                    let setup = stream
                        .set_nonblocking(true)
                        .and_then(|()| stream.set_nodelay(self.config.immediate_flush));
                    if let Err(e) = setup {
                        errors.push(LoggerError::network(
                            addr.to_string(),
                            "Failed to set up client socket",
                            Some(e),
                        ));
                        continue;
                    }

                    let mut peer = Peer {
                        stream,
                        addr,
                        pending: Vec::new(),
                    };
                    let welcome = self.config.welcome_message.as_bytes();
                    if !welcome.is_empty() {
                        if let Err(e) = peer.send(welcome, true) {
                            errors.push(LoggerError::network(
                                addr.to_string(),
                                "Failed to greet client",
                                Some(e),
                            ));
                            continue;
                        }
                    }
                    self.peers.push(peer);
                    accepted += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    errors.push(LoggerError::network(
                        self.config.endpoint(),
                        "Failed to accept connection",
                        Some(e),
                    ));
                    break;
                }
            }
        }
        accepted
    }

    fn reap_disconnected(&mut self) {
        self.peers.retain_mut(Peer::is_alive);
    }

    fn broadcast(&mut self, bytes: &[u8], errors: &mut Vec<LoggerError>) {
        let flush = self.config.immediate_flush;
        self.peers.retain_mut(|peer| match peer.send(bytes, flush) {
            Ok(()) if peer.pending.len() > MAX_PENDING_BYTES => {
                errors.push(LoggerError::network(
                    peer.addr.to_string(),
                    format!("Dropping slow client with {} bytes unsent", peer.pending.len()),
                    None,
                ));
                let _ = peer.stream.shutdown(Shutdown::Both);
                false
            }
            Ok(()) => true,
            // the client went away between the reap and the write
            Err(_) => false,
        });
    }

    fn shutdown(&mut self) {
        for peer in self.peers.drain(..) {
            let _ = peer.stream.shutdown(Shutdown::Both);
        }
        self.listener = None;
        self.local_addr = None;
    }
}

/// Appender broadcasting formatted events to connected TCP clients
///
/// # Example
///
/// ```no_run
/// use rust_logger_dispatch::appenders::NetworkAppender;
/// use rust_logger_dispatch::core::{Appender, SimpleLayout};
///
/// let appender = NetworkAppender::new()
///     .with_port(4560)
///     .with_welcome_message("connected to app log\r\n")
///     .with_layout(SimpleLayout::new());
/// appender.activate().unwrap();
/// // `telnet localhost 4560` now tails the log
/// ```
pub struct NetworkAppender {
    core: AppenderCore,
    config: RwLock<NetworkConfig>,
    state: Mutex<NetworkState>,
}

impl NetworkAppender {
    pub fn new() -> Self {
        Self::from_config("network", NetworkConfig::default())
    }

    pub fn from_config(name: impl Into<String>, config: NetworkConfig) -> Self {
        Self {
            core: AppenderCore::new(name),
            config: RwLock::new(config),
            state: Mutex::new(NetworkState::default()),
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
    pub fn with_address(self, address: impl Into<String>) -> Self {
        self.set_address(address);
        self
    }

    #[must_use]
    pub fn with_port(self, port: u16) -> Self {
        self.set_port(port);
        self
    }

    #[must_use]
    pub fn with_welcome_message(self, message: impl Into<String>) -> Self {
        self.set_welcome_message(message);
        self
    }

    #[must_use]
    pub fn with_immediate_flush(self, enabled: bool) -> Self {
        self.set_immediate_flush(enabled);
        self
    }

    pub fn set_address(&self, address: impl Into<String>) {
        self.config.write().address = address.into();
    }

    pub fn set_port(&self, port: u16) {
        self.config.write().port = port;
    }

    pub fn set_welcome_message(&self, message: impl Into<String>) {
        self.config.write().welcome_message = message.into();
    }

    pub fn set_immediate_flush(&self, enabled: bool) {
        self.config.write().immediate_flush = enabled;
    }

    pub fn config(&self) -> NetworkConfig {
        self.config.read().clone()
    }

    /// Address the listener is bound to while active
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.lock().local_addr
    }

    pub fn connection_count(&self) -> usize {
        self.state.lock().peers.len()
    }

    /// Accept pending connections without writing anything
    ///
    /// Hosts with long quiet periods call this from their own loop so new
    /// clients get the welcome message promptly.
    pub fn poll_connections(&self) -> usize {
        let mut errors = Vec::new();
        let accepted = self.state.lock().accept_pending(&mut errors);
        for err in &errors {
            self.core.report(err);
        }
        accepted
    }
}

impl Default for NetworkAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for NetworkAppender {
    fn core(&self) -> &AppenderCore {
        &self.core
    }

    fn requires_layout(&self) -> bool {
        true
    }

    fn open(&self) -> Result<()> {
        let config = self.config();
        let endpoint = config.endpoint();

        let listener = TcpListener::bind((config.address.as_str(), config.port))
            .and_then(|listener| listener.set_nonblocking(true).map(|()| listener))
            .map_err(|e| LoggerError::network(endpoint.clone(), "Failed to listen", Some(e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| LoggerError::network(endpoint, "Failed to read bound address", Some(e)))?;

        let mut state = self.state.lock();
        state.shutdown();
        state.listener = Some(listener);
        state.local_addr = Some(local_addr);
        state.config = config;
        Ok(())
    }

    fn release(&self) -> Result<()> {
        self.state.lock().shutdown();
        Ok(())
    }

    fn write(&self, event: &LoggingEvent) -> Result<()> {
        let layout = self.core.layout();
        let bytes = render(layout.as_deref(), event);

        let mut errors = Vec::new();
        {
            let mut state = self.state.lock();
            state.accept_pending(&mut errors);
            state.reap_disconnected();
            state.broadcast(&bytes, &mut errors);
        }
        for err in errors {
            self.core.defer_report(err);
        }
        Ok(())
    }
}

impl Drop for NetworkAppender {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
