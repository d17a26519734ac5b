//! Trellis Core - shared vocabulary for the device model
//!
//! This crate defines the types used throughout trellis:
//! - Element handles and type tags (ElementId, ElementType, ServiceKind)
//! - The tagged payload value (Variant) and format descriptors
//! - Wire message codes
//! - Address path helpers
//! - Error types

pub mod address;
pub mod code;
pub mod error;
pub mod format;
pub mod id;
pub mod kind;
pub mod variant;

pub use code::*;
pub use error::*;
pub use format::*;
pub use id::*;
pub use kind::*;
pub use variant::*;
