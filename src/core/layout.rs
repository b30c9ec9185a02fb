//! Layout contract consumed by appenders
//!
//! A [`Layout`] turns an event into text. Layouts that can also produce bytes
//! expose a [`BinaryLayout`] through [`Layout::as_binary`]; appenders then
//! write the binary header once per stream, one binary record per event and
//! the binary footer at close.

use super::logging_event::LoggingEvent;
use serde::{Deserialize, Serialize};
use std::fmt;

pub trait Layout: Send + Sync + fmt::Debug {
    fn format(&self, event: &LoggingEvent) -> String;

    fn content_type(&self) -> &str {
        "text/plain"
    }

    /// Text written once when a stream is opened
    fn header(&self) -> Option<&str> {
        None
    }

    /// Text written once when a stream is closed
    fn footer(&self) -> Option<&str> {
        None
    }

    fn as_binary(&self) -> Option<&dyn BinaryLayout> {
        None
    }
}

pub trait BinaryLayout: Send + Sync {
    fn binary_format(&self, event: &LoggingEvent) -> Vec<u8>;

    fn binary_header(&self) -> &[u8] {
        &[]
    }

    fn binary_footer(&self) -> &[u8] {
        &[]
    }
}

/// Render an event the way every byte-oriented appender writes it
///
/// * binary-aware layout: its binary record (text events contribute their
///   message bytes)
/// * text layout: the formatted text, except binary events which degrade to
///   their raw payload
/// * no layout: the raw payload or message bytes
pub fn render(layout: Option<&dyn Layout>, event: &LoggingEvent) -> Vec<u8> {
    match layout {
        Some(layout) => match layout.as_binary() {
            Some(binary) => binary.binary_format(event),
            None if event.is_binary() => event.payload_bytes().to_vec(),
            None => layout.format(event).into_bytes(),
        },
        None => event.payload_bytes().to_vec(),
    }
}

/// Bytes written when a stream opens
pub fn header_bytes(layout: Option<&dyn Layout>) -> Vec<u8> {
    match layout {
        Some(layout) => match layout.as_binary() {
            Some(binary) => binary.binary_header().to_vec(),
            None => layout.header().map(|h| h.as_bytes().to_vec()).unwrap_or_default(),
        },
        None => Vec::new(),
    }
}

/// Bytes written when a stream closes
pub fn footer_bytes(layout: Option<&dyn Layout>) -> Vec<u8> {
    match layout {
        Some(layout) => match layout.as_binary() {
            Some(binary) => binary.binary_footer().to_vec(),
            None => layout.footer().map(|f| f.as_bytes().to_vec()).unwrap_or_default(),
        },
        None => Vec::new(),
    }
}

/// `LEVEL - message` per line
#[derive(Debug, Default, Clone)]
pub struct SimpleLayout {
    header: Option<String>,
    footer: Option<String>,
}

impl SimpleLayout {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    #[must_use]
    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }
}

impl Layout for SimpleLayout {
    fn format(&self, event: &LoggingEvent) -> String {
        format!("{} - {}\n", event.level(), event.message())
    }

    fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    fn footer(&self) -> Option<&str> {
        self.footer.as_deref()
    }
}

/// One JSON object per line
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLayout;

impl JsonLayout {
    pub fn new() -> Self {
        Self
    }
}

impl Layout for JsonLayout {
    fn format(&self, event: &LoggingEvent) -> String {
        match event.to_json() {
            Ok(mut json) => {
                json.push('\n');
                json
            }
            // serializing plain strings and maps does not fail; keep the line anyway
            Err(e) => format!("{{\"error\":\"{}\"}}\n", e),
        }
    }

    fn content_type(&self) -> &str {
        "application/json"
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

/// Length-prefixed binary records framed by a fixed header and footer
///
/// Stream layout: `[header]([u32 length][payload])*[footer]`.
///
/// # Example
///
/// ```
/// use rust_logger_dispatch::core::{BinaryLayout, FramedBinaryLayout, LoggingEvent, LogLevel};
///
/// let layout = FramedBinaryLayout::new();
/// let event = LoggingEvent::binary(LogLevel::Info, "bin", vec![1, 2, 3]);
/// assert_eq!(layout.binary_format(&event), vec![3, 0, 0, 0, 1, 2, 3]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct FramedBinaryLayout {
    header: Vec<u8>,
    footer: Vec<u8>,
    byte_order: ByteOrder,
}

impl FramedBinaryLayout {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_header(mut self, header: impl Into<Vec<u8>>) -> Self {
        self.header = header.into();
        self
    }

    #[must_use]
    pub fn with_footer(mut self, footer: impl Into<Vec<u8>>) -> Self {
        self.footer = footer.into();
        self
    }

    #[must_use]
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }
}

impl Layout for FramedBinaryLayout {
    fn format(&self, event: &LoggingEvent) -> String {
        event.message().into_owned()
    }

    fn content_type(&self) -> &str {
        "application/octet-stream"
    }

    fn as_binary(&self) -> Option<&dyn BinaryLayout> {
        Some(self)
    }
}

impl BinaryLayout for FramedBinaryLayout {
    fn binary_format(&self, event: &LoggingEvent) -> Vec<u8> {
        let payload = event.payload_bytes();
        // payloads beyond u32::MAX are truncated to keep the frame readable
        let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        let prefix = match self.byte_order {
            ByteOrder::LittleEndian => len.to_le_bytes(),
            ByteOrder::BigEndian => len.to_be_bytes(),
        };

        let mut record = Vec::with_capacity(4 + len as usize);
        record.extend_from_slice(&prefix);
        record.extend_from_slice(&payload[..len as usize]);
        record
    }

    fn binary_header(&self) -> &[u8] {
        &self.header
    }

    fn binary_footer(&self) -> &[u8] {
        &self.footer
    }
}
