//! Trellis Dispatch - wire messages and address-based dispatch
//!
//! The wire message is transport-agnostic; HTTP, MQTT, and WebSocket
//! adapters all carry the same shape. The dispatcher resolves a message's
//! address against a tree, invokes the target service, and folds every
//! failure mode into a well-typed response:
//! - `handle_request` never returns an error and never panics
//! - `handle_event` has no response channel and rethrows instead

pub mod dispatcher;
pub mod message;

pub use dispatcher::*;
pub use message::*;
