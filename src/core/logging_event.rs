//! Logging event structure

use super::error::Result;
use super::log_level::LogLevel;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

// Thread-local cache for the thread name to avoid repeated allocations
thread_local! {
    static THREAD_NAME_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Get cached thread name, computing and caching it on first access
fn current_thread_name() -> String {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| {
                let thread = std::thread::current();
                match thread.name() {
                    Some(name) => name.to_string(),
                    None => format!("{:?}", thread.id()),
                }
            })
            .clone()
    })
}

/// Where in the source the event was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub module_path: String,
}

/// Event body: text for ordinary log calls, bytes for binary logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

/// Immutable snapshot of one log call
///
/// Fields are set through the consuming `with_*` builders before the event is
/// handed to any appender; after that it is only read.
///
/// # Example
///
/// ```
/// use rust_logger_dispatch::core::{LoggingEvent, LogLevel};
///
/// let event = LoggingEvent::new(LogLevel::Info, "app.net", "connected")
///     .with_property("peer", "10.0.0.7")
///     .with_ndc("session-42");
///
/// assert_eq!(event.message(), "connected");
/// assert_eq!(event.property("peer"), Some("10.0.0.7"));
/// ```
///
/// Events serialize but never deserialize; sequence numbers only come from construction:
///
/// ```compile_fail
/// use rust_logger_dispatch::core::LoggingEvent;
///
/// let forged: LoggingEvent = serde_json::from_str(r#"{"sequence_number":0}"#).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingEvent {
    level: LogLevel,
    timestamp: DateTime<Utc>,
    thread_name: String,
    ndc: String,
    properties: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<SourceLocation>,
    logger_name: String,
    payload: Payload,
    sequence_number: u64,
}

impl LoggingEvent {
    pub fn new(level: LogLevel, logger_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_payload(level, logger_name.into(), Payload::Text(message.into()))
    }

    /// Create an event carrying an opaque byte payload
    pub fn binary(level: LogLevel, logger_name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::with_payload(level, logger_name.into(), Payload::Binary(payload.into()))
    }

    fn with_payload(level: LogLevel, logger_name: String, payload: Payload) -> Self {
        Self {
            level,
            timestamp: Utc::now().trunc_subsecs(3),
            thread_name: current_thread_name(),
            ndc: String::new(),
            properties: HashMap::new(),
            location: None,
            logger_name,
            payload,
            sequence_number: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    #[must_use]
    pub fn with_location(mut self, file: &str, line: u32, module_path: &str) -> Self {
        self.location = Some(SourceLocation {
            file: file.to_string(),
            line,
            module_path: module_path.to_string(),
        });
        self
    }

    #[must_use]
    pub fn with_ndc(mut self, ndc: impl Into<String>) -> Self {
        self.ndc = ndc.into();
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.properties.extend(properties);
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp.trunc_subsecs(3);
        self
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn ndc(&self) -> &str {
        &self.ndc
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.payload, Payload::Binary(_))
    }

    /// Text of the event; binary payloads are decoded lossily
    pub fn message(&self) -> Cow<'_, str> {
        match &self.payload {
            Payload::Text(text) => Cow::Borrowed(text),
            Payload::Binary(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    /// Raw bytes of the event: the payload, or the UTF-8 of the message
    pub fn payload_bytes(&self) -> &[u8] {
        match &self.payload {
            Payload::Text(text) => text.as_bytes(),
            Payload::Binary(bytes) => bytes,
        }
    }

    /// Process-wide creation order; only meaningful as a tie-break
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_numbers_increase() {
        let first = LoggingEvent::new(LogLevel::Info, "a", "one");
        let second = LoggingEvent::new(LogLevel::Info, "a", "two");
        assert!(second.sequence_number() > first.sequence_number());
    }

    #[test]
    fn test_timestamp_has_millisecond_precision() {
        let event = LoggingEvent::new(LogLevel::Info, "a", "x");
        assert_eq!(event.timestamp().timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_binary_payload() {
        let event = LoggingEvent::binary(LogLevel::Debug, "bin", vec![0xde, 0xad]);
        assert!(event.is_binary());
        assert_eq!(event.payload_bytes(), &[0xde, 0xad]);

        let text = LoggingEvent::new(LogLevel::Debug, "txt", "hi");
        assert!(!text.is_binary());
        assert_eq!(text.payload_bytes(), b"hi");
    }

    #[test]
    fn test_clone_is_equal_and_thread_name_is_captured() {
        let event = LoggingEvent::new(LogLevel::Warn, "a", "x")
            .with_location("main.rs", 7, "app")
            .with_property("k", "v");
        let copy = event.clone();
        assert_eq!(event, copy);
        assert!(!event.thread_name().is_empty());
        assert_eq!(copy.location().map(|l| l.line), Some(7));
    }

    #[test]
    fn test_to_json() {
        let event = LoggingEvent::new(LogLevel::Error, "db", "down");
        let json = event.to_json().unwrap();
        assert!(json.contains("\"logger_name\":\"db\""));
        assert!(json.contains("\"text\":\"down\""));
    }
}
