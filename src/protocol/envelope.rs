//! Message envelope decoding.
//!
//! Incoming frames are optionally decoded into an [`Envelope`]: the parsed
//! payload plus the value of its discriminator field, which routes the
//! payload to type-specific handlers.
//!
//! # Format
//!
//! With the default discriminator key `"type"`:
//!
//! ```json
//! { "type": "ping", "value": 1 }
//! ```
//!
//! decodes to `Envelope { kind: "ping", payload: <the whole object> }`.
//!
//! Decoding never fails loudly. Malformed frames and payloads without a
//! discriminator decode to `None`; the frame is still recorded by the
//! session.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, trace, warn};

use crate::error::{Error, Result};

use super::Frame;

// ============================================================================
// Constants
// ============================================================================

/// Default discriminator key.
pub const DEFAULT_DISCRIMINATOR: &str = "type";

// ============================================================================
// Types
// ============================================================================

/// Consumer-supplied synchronous decode function.
pub type DecodeFn = Arc<dyn Fn(&Frame) -> Result<Value> + Send + Sync>;

/// Consumer-supplied asynchronous decoder.
///
/// Each frame is decoded on its own task, so a slow decode never holds up
/// the frames behind it.
#[async_trait]
pub trait AsyncDecoder: Send + Sync + 'static {
    /// Decodes one frame into a structured value.
    async fn decode(&self, frame: Frame) -> Result<Value>;
}

// ============================================================================
// Envelope
// ============================================================================

/// A decoded frame routed by its discriminator.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Discriminator value.
    pub kind: String,
    /// The full decoded payload.
    pub payload: Value,
}

impl Envelope {
    /// Builds an envelope from a decoded value.
    ///
    /// Returns `None` when the value is not an object or its discriminator
    /// is missing or not a scalar.
    #[must_use]
    pub fn from_value(payload: Value, key: &str) -> Option<Self> {
        let kind = match payload.get(key)? {
            Value::String(kind) => kind.clone(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            _ => return None,
        };
        Some(Self { kind, payload })
    }
}

// ============================================================================
// DecodeMode
// ============================================================================

/// How incoming frames are decoded.
#[derive(Clone, Default)]
pub enum DecodeMode {
    /// Frames are recorded but never decoded.
    #[default]
    Disabled,
    /// Frames are parsed as JSON.
    Json,
    /// Frames are decoded by a consumer function.
    Custom(DecodeFn),
    /// Frames are decoded by a consumer future.
    Async(Arc<dyn AsyncDecoder>),
}

impl DecodeMode {
    /// Creates a custom synchronous mode.
    pub fn custom<F>(decode: F) -> Self
    where
        F: Fn(&Frame) -> Result<Value> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(decode))
    }

    /// Creates a custom asynchronous mode.
    pub fn asynchronous(decoder: impl AsyncDecoder) -> Self {
        Self::Async(Arc::new(decoder))
    }

    /// Returns `true` unless decoding is disabled.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Returns `true` for asynchronous decoders.
    #[inline]
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl From<bool> for DecodeMode {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Json } else { Self::Disabled }
    }
}

impl fmt::Debug for DecodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disabled => "Disabled",
            Self::Json => "Json",
            Self::Custom(_) => "Custom",
            Self::Async(_) => "Async",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Frame decoder: a [`DecodeMode`] plus the discriminator key.
#[derive(Debug, Clone)]
pub struct Decoder {
    mode: DecodeMode,
    key: String,
}

impl Decoder {
    /// Creates a decoder.
    #[must_use]
    pub fn new(mode: DecodeMode, key: impl Into<String>) -> Self {
        Self {
            mode,
            key: key.into(),
        }
    }

    /// Returns the decode mode.
    #[inline]
    #[must_use]
    pub fn mode(&self) -> &DecodeMode {
        &self.mode
    }

    /// Returns the discriminator key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Decodes a frame synchronously.
    ///
    /// Asynchronous modes resolve through [`decode_async`](Self::decode_async)
    /// and yield `None` here. A panicking custom decoder yields `None`.
    #[must_use]
    pub fn decode(&self, frame: &Frame) -> Option<Envelope> {
        let decoded = match &self.mode {
            DecodeMode::Disabled | DecodeMode::Async(_) => return None,
            DecodeMode::Json => parse_json(frame),
            DecodeMode::Custom(decode) => match catch_unwind(AssertUnwindSafe(|| decode(frame))) {
                Ok(decoded) => decoded,
                Err(_) => {
                    error!(len = frame.len(), "Custom decoder panicked");
                    return None;
                }
            },
        };
        self.route(decoded)
    }

    /// Decodes a frame, awaiting asynchronous decoders.
    pub async fn decode_async(&self, frame: Frame) -> Option<Envelope> {
        match &self.mode {
            DecodeMode::Async(decoder) => {
                let decoded = decoder.decode(frame).await;
                self.route(decoded)
            }
            _ => self.decode(&frame),
        }
    }

    fn route(&self, decoded: Result<Value>) -> Option<Envelope> {
        let value = match decoded {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to decode frame");
                return None;
            }
        };

        let envelope = Envelope::from_value(value, &self.key);
        if envelope.is_none() {
            trace!(key = %self.key, "Decoded frame has no discriminator");
        }
        envelope
    }
}

/// Parses a frame's text content as JSON.
///
/// # Errors
///
/// - [`Error::Decode`] if the frame is binary and not UTF-8
/// - [`Error::Json`] if the text is not valid JSON
pub fn parse_json(frame: &Frame) -> Result<Value> {
    let text = frame
        .as_text()
        .ok_or_else(|| Error::decode("binary frame is not UTF-8"))?;
    Ok(serde_json::from_str(text)?)
}

// ============================================================================
// Tests
// ============================================================================
