//! Frame and envelope types.
//!
//! This module defines what travels over a link and how incoming frames
//! are decoded for dispatch.
//!
//! # Protocol Overview
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | `Frame` | Both | Raw text, binary or server-sent event |
//! | `CloseInfo` | Remote → Local | Close handshake details |
//! | `Envelope` | Local | Decoded payload routed by discriminator |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Decode modes and the envelope decoder |
//! | `frame` | Frame, event and close types |

// ============================================================================
// Submodules
// ============================================================================

/// Message envelope decoding.
pub mod envelope;

/// Frame types.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{
    AsyncDecoder, DEFAULT_DISCRIMINATOR, DecodeFn, DecodeMode, Decoder, Envelope, parse_json,
};
pub use frame::{CloseInfo, Frame, ServerEvent};
