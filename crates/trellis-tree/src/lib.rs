//! Trellis Tree - the element graph engine
//!
//! A tree of typed elements with two superimposed edge kinds:
//! - Child edges are owning; they define canonical addresses and lifetime
//! - Link edges are non-owning; they make elements reachable under
//!   additional addresses
//!
//! One global reader/writer lock guards the arena together with the address
//! and profile indexes, so a reader can never observe an index entry without
//! its live edge. Kind-specific element state (data caches, service
//! delegates, subscriber lists) lives behind shared handles with their own
//! locks; delegates and observers never run while the tree lock is held.
//!
//! Lock order: the tree lock comes strictly before any per-element lock.

mod arena;
pub mod data;
pub mod device;
pub mod element;
pub mod event;
pub mod reference;
pub mod service;
pub mod tree;

pub use data::*;
pub use device::*;
pub use element::*;
pub use event::*;
pub use reference::*;
pub use service::*;
pub use tree::*;
