//! psmevents CLI Library
//!
//! Reads PSM object events from a capture file, stdin, or a live JSON-RPC
//! connection and prints them, diffing `object.updated` events.

pub mod connection;
pub mod render;
