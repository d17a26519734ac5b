//! Device node runtime

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info};
use trellis_core::{DispatchResult, ElementId, TreeResult};
use trellis_dispatch::{Dispatcher, Message};
use trellis_tree::{
    install_device_profile, DeviceIdentity, EventDelivery, Tree, TreeChange,
};

use crate::config::NodeConfig;

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    events: AtomicU64,
    errors: AtomicU64,
    deliveries: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of node activity counters
#[derive(Clone, Debug, Default)]
pub struct NodeStats {
    pub requests: u64,
    pub events: u64,
    pub errors: u64,
    pub deliveries: u64,
    pub dropped: u64,
}

/// A running device: tree, dispatcher, and outbound delivery queue.
///
/// The node observes its own tree; whenever a structural operation is
/// raised as a change, the device's `treechanged` event fires and the
/// resulting deliveries land in the outbox for the transport to drain.
pub struct DeviceNode {
    config: NodeConfig,
    tree: Arc<Tree>,
    dispatcher: Dispatcher,
    outbox: Arc<Mutex<VecDeque<EventDelivery>>>,
    counters: Arc<Counters>,
    treechanged: ElementId,
}

impl DeviceNode {
    pub fn new(config: NodeConfig) -> TreeResult<DeviceNode> {
        let tree = Tree::new(&config.identifier)?;
        if let Some(uid) = &config.uid {
            tree.set_uid(tree.root(), Some(uid.clone()))?;
        }
        let mut identity = DeviceIdentity::new(&config.identifier);
        if let Some(vendor) = &config.vendor {
            identity = identity.with_vendor(vendor.clone());
        }
        if let Some(model) = &config.model {
            identity = identity.with_model(model.clone());
        }
        if let Some(version) = &config.version {
            identity = identity.with_version(version.clone());
        }
        let treechanged = install_device_profile(&tree, tree.root(), identity)?;

        let dispatcher = Dispatcher::new(tree.clone());
        let outbox = Arc::new(Mutex::new(VecDeque::new()));
        let counters = Arc::new(Counters::default());

        // The observer must not keep the tree alive; it lives inside it.
        let weak: Weak<Tree> = Arc::downgrade(&tree);
        let observer_outbox = outbox.clone();
        let observer_counters = counters.clone();
        let limit = config.outbox_limit;
        tree.add_observer(move |change| {
            if let TreeChange::Changed { .. } = change {
                let tree = match weak.upgrade() {
                    Some(tree) => tree,
                    None => return,
                };
                match tree.raise_event(treechanged) {
                    Ok(deliveries) => {
                        for delivery in deliveries {
                            push_delivery(&observer_outbox, &observer_counters, limit, delivery);
                        }
                    }
                    Err(err) => {
                        debug!(error = %err, "treechanged raise failed");
                    }
                }
            }
        });

        info!(identifier = %config.identifier, "device node ready");
        Ok(DeviceNode {
            config,
            tree,
            dispatcher,
            outbox,
            counters,
            treechanged,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The device-level `treechanged` event element.
    pub fn tree_changed_event(&self) -> ElementId {
        self.treechanged
    }

    /// Handle an inbound request message, always producing a response.
    pub fn handle_request(&self, request: &Message) -> Message {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        let response = self.dispatcher.handle_request(request);
        if response.code.is_error() {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
        }
        response
    }

    /// Handle an inbound event message; failures propagate to the caller.
    pub fn handle_event(&self, message: &Message) -> DispatchResult<()> {
        self.counters.events.fetch_add(1, Ordering::Relaxed);
        let result = self.dispatcher.handle_event(message);
        if result.is_err() {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Fire an event element and queue the resulting deliveries.
    /// Returns how many were queued.
    pub fn raise_event(&self, event: ElementId) -> TreeResult<usize> {
        let deliveries = self.tree.raise_event(event)?;
        Ok(self.enqueue(deliveries))
    }

    /// Invalidate a data element's cache, fire its `datachanged` event, and
    /// queue the resulting deliveries. Returns how many were queued.
    pub fn raise_data_changed(&self, data: ElementId) -> TreeResult<usize> {
        let deliveries = self.tree.raise_data_changed(data)?;
        Ok(self.enqueue(deliveries))
    }

    pub fn pop_delivery(&self) -> Option<EventDelivery> {
        self.outbox.lock().pop_front()
    }

    pub fn drain_deliveries(&self) -> Vec<EventDelivery> {
        self.outbox.lock().drain(..).collect()
    }

    pub fn pending_deliveries(&self) -> usize {
        self.outbox.lock().len()
    }

    pub fn stats(&self) -> NodeStats {
        NodeStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            events: self.counters.events.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            deliveries: self.counters.deliveries.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    fn enqueue(&self, deliveries: Vec<EventDelivery>) -> usize {
        let count = deliveries.len();
        for delivery in deliveries {
            push_delivery(
                &self.outbox,
                &self.counters,
                self.config.outbox_limit,
                delivery,
            );
        }
        count
    }
}

fn push_delivery(
    outbox: &Mutex<VecDeque<EventDelivery>>,
    counters: &Counters,
    limit: usize,
    delivery: EventDelivery,
) {
    let mut queue = outbox.lock();
    if queue.len() >= limit {
        queue.pop_front();
        counters.dropped.fetch_add(1, Ordering::Relaxed);
    }
    queue.push_back(delivery);
    counters.deliveries.fetch_add(1, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{MessageCode, Variant};
    use trellis_tree::DataSpec;

    fn subscribe(node: &DeviceNode, adr: &str, callback: &str) {
        let request = Message::request(1, adr)
            .with_data(Variant::map([("callback", Variant::Str(callback.into()))]));
        let response = node.handle_request(&request);
        assert_eq!(response.code, MessageCode::Success);
    }

    #[test]
    fn test_node_serves_standard_requests() {
        let node = DeviceNode::new(
            NodeConfig::new("dev")
                .with_uid("dev-42")
                .with_vendor("acme"),
        )
        .unwrap();
        let response = node.handle_request(&Message::request(1, "/dev/getidentity"));
        assert_eq!(response.code, MessageCode::Success);
        let body = response.data.unwrap();
        assert_eq!(body.get("name").and_then(|v| v.as_str()), Some("dev"));
        assert_eq!(body.get("vendor").and_then(|v| v.as_str()), Some("acme"));
        assert_eq!(body.get("uid").and_then(|v| v.as_str()), Some("dev-42"));
        assert_eq!(node.stats().requests, 1);
        assert_eq!(node.stats().errors, 0);
    }

    #[test]
    fn test_structural_change_queues_treechanged() {
        let node = DeviceNode::new(NodeConfig::new("dev")).unwrap();
        subscribe(&node, "/dev/treechanged/subscribe", "/peer/inbox");

        let tree = node.tree();
        let s = tree.create_structure("sensors").unwrap();
        tree.add_child(tree.root(), s, true).unwrap();

        let delivery = node.pop_delivery().unwrap();
        assert_eq!(delivery.notification.event, "treechanged");
        assert_eq!(delivery.subscription.callback, "/peer/inbox");
        assert_eq!(node.pending_deliveries(), 0);
        assert_eq!(node.stats().deliveries, 1);
    }

    #[test]
    fn test_silent_change_queues_nothing() {
        let node = DeviceNode::new(NodeConfig::new("dev")).unwrap();
        subscribe(&node, "/dev/treechanged/subscribe", "/peer/inbox");

        let tree = node.tree();
        let s = tree.create_structure("sensors").unwrap();
        tree.add_child(tree.root(), s, false).unwrap();
        assert_eq!(node.pending_deliveries(), 0);
    }

    #[test]
    fn test_outbox_drops_oldest_when_full() {
        let node = DeviceNode::new(NodeConfig::new("dev").with_outbox_limit(2)).unwrap();
        subscribe(&node, "/dev/treechanged/subscribe", "/peer/inbox");

        let tree = node.tree();
        for identifier in ["a", "b", "c"] {
            let s = tree.create_structure(identifier).unwrap();
            tree.add_child(tree.root(), s, true).unwrap();
        }
        assert_eq!(node.pending_deliveries(), 2);
        let stats = node.stats();
        assert_eq!(stats.deliveries, 3);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn test_raise_data_changed_queues_delivery() {
        let node = DeviceNode::new(NodeConfig::new("dev")).unwrap();
        let tree = node.tree();
        let d = tree
            .create_data("temp", DataSpec::new().with_read(|| Ok(Variant::F64(21.5))))
            .unwrap();
        tree.add_child(tree.root(), d, false).unwrap();
        subscribe(&node, "/dev/temp/datachanged/subscribe", "/peer/inbox");

        let queued = node.raise_data_changed(d).unwrap();
        assert_eq!(queued, 1);
        let delivery = node.pop_delivery().unwrap();
        assert_eq!(delivery.notification.source, "/temp");
        assert_eq!(delivery.notification.event, "datachanged");
    }

    #[test]
    fn test_event_failures_are_counted() {
        let node = DeviceNode::new(NodeConfig::new("dev")).unwrap();
        // No device prefix, so event resolution refuses it.
        let result = node.handle_event(&Message::event(1, "/temp/setdata"));
        assert!(result.is_err());
        let stats = node.stats();
        assert_eq!(stats.events, 1);
        assert_eq!(stats.errors, 1);
    }

    #[test]
    fn test_no_subscribers_means_no_deliveries() {
        let node = DeviceNode::new(NodeConfig::new("dev")).unwrap();
        let tree = node.tree();
        let s = tree.create_structure("sensors").unwrap();
        tree.add_child(tree.root(), s, true).unwrap();
        assert_eq!(node.pending_deliveries(), 0);
        assert_eq!(node.stats().deliveries, 0);
    }
}
