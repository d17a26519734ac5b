//! Trellis Node - device node runtime
//!
//! Bundles the pieces a running device needs: a tree seeded with the
//! standard device services, a dispatcher bound to it, and an outbound
//! queue for event deliveries a transport can drain. The node also
//! subscribes itself to tree changes so structural edits surface as
//! `treechanged` events without the application doing anything.

pub mod config;
pub mod node;

pub use config::*;
pub use node::*;

use tracing_subscriber::EnvFilter;

/// Install the process-wide tracing subscriber, filtered by `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
