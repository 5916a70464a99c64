//! `psmevents` Core Library
//!
//! Shared functionality for the `psmevents` tool:
//! - Peeking decoder for whitespace-separated JSON value streams
//! - Event filter subscription handshake over a live connection
//! - Unified diffs for `object.updated` events
//! - Configuration resolution and hierarchy
//! - Common error types

pub mod config;
pub mod decoder;
pub mod diff;
pub mod error;
pub mod subscribe;
pub mod tracing_init;

pub use config::Settings;
pub use decoder::PeekingDecoder;
pub use diff::{NotDiffable, render_diff};
pub use error::{Error, Result};
pub use subscribe::{Category, HandshakeError, OBJECT_EVENTS, subscribe};
