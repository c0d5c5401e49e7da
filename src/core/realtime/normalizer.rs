//! Inbound event normalization.
//!
//! The monitor endpoint interleaves JSON status events, free-form text and
//! binary audio frames on the same stream. [`EventNormalizer`] classifies
//! each message by content instead of by a fixed header and produces a
//! [`NormalizedMessage`] the log can render uniformly.
//!
//! # Classification
//!
//! | Input | Rule |
//! |-------|------|
//! | Text | JSON parse, otherwise raw text |
//! | Blob | leading slice looks like JSON → parse whole, otherwise binary |
//! | Buffer | >60% printable in first 512 bytes → text rules, otherwise binary |
//! | Structured | already JSON |
//! | Other | best-effort string |

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use super::base::{MessageKind, MessagePayload};
use super::log::FrameStore;

/// Number of bytes sampled when sniffing a raw buffer.
pub const SNIFF_SAMPLE_LEN: usize = 512;

/// Printable fraction above which a buffer is treated as text.
pub const PRINTABLE_THRESHOLD: f64 = 0.6;

/// Leading slice decoded when probing a blob for JSON.
pub const BLOB_PROBE_LEN: usize = 32;

/// A realtime message of unknown shape.
#[derive(Debug, Clone)]
pub enum InboundPayload {
    /// Text frame
    Text(String),
    /// Opaque binary chunk
    Blob(Bytes),
    /// Raw fixed-length byte buffer
    Buffer(Bytes),
    /// Already-parsed structure
    Structured(Value),
    /// Anything else, stringified by the producer
    Other(String),
}

/// Canonical form of an inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMessage {
    /// Parsed document; a JSON string for plain text, `null` for binary
    pub parsed: Value,
    pub is_json: bool,
    /// Original text, when the message was textual
    pub raw: Option<String>,
    pub is_binary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<usize>,
}

impl NormalizedMessage {
    fn json(parsed: Value, raw: Option<String>) -> Self {
        Self {
            parsed,
            is_json: true,
            raw,
            is_binary: false,
            locator_url: None,
            size_bytes: None,
        }
    }

    fn text(raw: String) -> Self {
        Self {
            parsed: Value::String(raw.clone()),
            is_json: false,
            raw: Some(raw),
            is_binary: false,
            locator_url: None,
            size_bytes: None,
        }
    }

    fn binary(locator: String, size: usize) -> Self {
        Self {
            parsed: Value::Null,
            is_json: false,
            raw: None,
            is_binary: true,
            locator_url: Some(locator),
            size_bytes: Some(size),
        }
    }

    /// Log classification of this message.
    pub fn kind(&self) -> MessageKind {
        if self.is_json {
            MessageKind::Message
        } else {
            MessageKind::Raw
        }
    }

    /// Convert into a log payload.
    pub fn into_payload(self) -> MessagePayload {
        if self.is_binary {
            return MessagePayload::Binary {
                locator: self.locator_url.unwrap_or_default(),
                size_bytes: self.size_bytes.unwrap_or_default(),
            };
        }
        if self.is_json {
            return MessagePayload::Json(self.parsed);
        }
        MessagePayload::Text(self.raw.unwrap_or_default())
    }

    /// The `type` discriminator of a JSON event.
    pub fn event_type(&self) -> Option<&str> {
        if !self.is_json {
            return None;
        }
        self.parsed.get("type").and_then(Value::as_str)
    }
}

/// Turns inbound messages into [`NormalizedMessage`]s, keeping binary
/// payloads in a [`FrameStore`] for later download.
#[derive(Clone, Default)]
pub struct EventNormalizer {
    frames: FrameStore,
}

impl EventNormalizer {
    pub fn new(frames: FrameStore) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &FrameStore {
        &self.frames
    }

    pub fn normalize(&self, payload: InboundPayload) -> NormalizedMessage {
        match payload {
            InboundPayload::Text(text) => normalize_text(text),
            InboundPayload::Blob(data) => self.normalize_blob(data),
            InboundPayload::Buffer(data) => self.normalize_buffer(data),
            InboundPayload::Structured(value) => NormalizedMessage::json(value, None),
            InboundPayload::Other(text) => NormalizedMessage::text(text),
        }
    }

    fn normalize_blob(&self, data: Bytes) -> NormalizedMessage {
        let probe_len = data.len().min(BLOB_PROBE_LEN);
        let probe = String::from_utf8_lossy(&data[..probe_len]);
        let probe = probe.trim_start();

        if (probe.starts_with('{') || probe.starts_with('['))
            && let Ok(text) = std::str::from_utf8(&data)
            && let Ok(parsed) = serde_json::from_str::<Value>(text)
        {
            return NormalizedMessage::json(parsed, Some(text.to_string()));
        }

        self.store_binary(data)
    }

    fn normalize_buffer(&self, data: Bytes) -> NormalizedMessage {
        if printable_ratio(&data) > PRINTABLE_THRESHOLD {
            let text = String::from_utf8_lossy(&data).into_owned();
            return normalize_text(text);
        }
        self.store_binary(data)
    }

    fn store_binary(&self, data: Bytes) -> NormalizedMessage {
        let size = data.len();
        let locator = self.frames.insert(data);
        NormalizedMessage::binary(locator, size)
    }
}

fn normalize_text(text: String) -> NormalizedMessage {
    match serde_json::from_str::<Value>(&text) {
        Ok(parsed) => NormalizedMessage::json(parsed, Some(text)),
        Err(_) => NormalizedMessage::text(text),
    }
}

/// Fraction of the first [`SNIFF_SAMPLE_LEN`] bytes that are printable ASCII
/// or common whitespace. Empty input yields 0.
pub fn printable_ratio(data: &[u8]) -> f64 {
    let sample = &data[..data.len().min(SNIFF_SAMPLE_LEN)];
    if sample.is_empty() {
        return 0.0;
    }
    let printable = sample
        .iter()
        .filter(|&&b| (0x20..=0x7e).contains(&b) || matches!(b, b'\t' | b'\n' | b'\r'))
        .count();
    printable as f64 / sample.len() as f64
}
