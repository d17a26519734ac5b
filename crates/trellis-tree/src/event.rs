//! Event element state
//!
//! An event element keeps its subscriber list behind its own mutex, so
//! subscription management never touches the tree lock. Raising an event is
//! the tree's job; see `Tree::raise_event`.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use trellis_core::{ElementId, MessageCode, ServiceError, ServiceKind, TreeResult, Variant};

use crate::{device, Tree};

/// In-process handler invoked directly when the event fires
pub type EventHandlerFn = Arc<dyn Fn(&EventNotification) + Send + Sync>;

/// One subscriber of an event element
#[derive(Clone)]
pub struct Subscription {
    /// Caller-chosen id, defaults to the callback address
    pub id: String,
    /// Address the notification message should be sent to
    pub callback: String,
    /// Optional in-process handler consuming the notification directly
    pub handler: Option<EventHandlerFn>,
    /// Data element addresses whose values ride along with the notification
    pub data_to_send: Vec<String>,
    /// Survives reboots when the owning node persists its subscriber lists
    pub persist: bool,
}

impl Subscription {
    pub fn new(id: impl Into<String>, callback: impl Into<String>) -> Self {
        Subscription {
            id: id.into(),
            callback: callback.into(),
            handler: None,
            data_to_send: Vec::new(),
            persist: false,
        }
    }

    pub fn with_handler(mut self, handler: impl Fn(&EventNotification) + Send + Sync + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn with_data_to_send(mut self, addresses: Vec<String>) -> Self {
        self.data_to_send = addresses;
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("callback", &self.callback)
            .field("handler", &self.handler.is_some())
            .field("data_to_send", &self.data_to_send)
            .field("persist", &self.persist)
            .finish()
    }
}

/// What happened, handed to handlers and queued for remote subscribers
#[derive(Clone, Debug, PartialEq)]
pub struct EventNotification {
    /// Canonical address of the event's parent element
    pub source: String,
    /// Identifier of the event element itself
    pub event: String,
    /// Resolved `data_to_send` values, address paired with value
    pub values: Vec<(String, Variant)>,
}

/// A notification bound to one subscriber, ready for transport
#[derive(Clone, Debug)]
pub struct EventDelivery {
    pub subscription: Subscription,
    pub notification: EventNotification,
}

/// Shared state of an event element
#[derive(Clone, Default)]
pub struct EventPoint {
    subscribers: Arc<Mutex<Vec<Subscription>>>,
}

impl EventPoint {
    pub fn new() -> Self {
        EventPoint::default()
    }

    /// Add a subscriber; a second subscribe with the same callback replaces
    /// the earlier entry.
    pub fn subscribe(&self, subscription: Subscription) {
        let mut subs = self.subscribers.lock();
        match subs.iter_mut().find(|s| s.callback == subscription.callback) {
            Some(slot) => *slot = subscription,
            None => subs.push(subscription),
        }
    }

    /// Remove the subscriber with the given callback, reporting whether one
    /// was present.
    pub fn unsubscribe(&self, callback: &str) -> bool {
        let mut subs = self.subscribers.lock();
        match subs.iter().position(|s| s.callback == callback) {
            Some(i) => {
                subs.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn has_subscription(&self, callback: &str) -> bool {
        self.subscribers.lock().iter().any(|s| s.callback == callback)
    }

    /// Snapshot of the current subscriber list
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.subscribers.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }
}

/// Attach the standard children of an event element: the `subscribe` and
/// `unsubscribe` services.
pub(crate) fn install_event_children(
    tree: &Tree,
    event: ElementId,
    point: &EventPoint,
) -> TreeResult<()> {
    let p = point.clone();
    let subscribe = tree.create_service(device::SUBSCRIBE, ServiceKind::Action, move |req| {
        let payload = req.payload.unwrap_or(Variant::Null);
        let callback = match payload.get("callback").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => {
                return Err(ServiceError::failure(
                    MessageCode::BadRequest,
                    "subscribe requires a callback",
                ))
            }
        };
        let id = payload
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or(&callback)
            .to_string();
        let data_to_send = payload
            .get("datatosend")
            .and_then(|v| v.as_seq())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let persist = payload
            .get("persist")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        p.subscribe(
            Subscription::new(id, callback)
                .with_data_to_send(data_to_send)
                .with_persist(persist),
        );
        Ok(Variant::Null)
    })?;
    tree.add_child(event, subscribe, false)?;

    let p = point.clone();
    let unsubscribe = tree.create_service(device::UNSUBSCRIBE, ServiceKind::Action, move |req| {
        let payload = req.payload.unwrap_or(Variant::Null);
        let callback = match payload.get("callback").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => {
                return Err(ServiceError::failure(
                    MessageCode::BadRequest,
                    "unsubscribe requires a callback",
                ))
            }
        };
        if p.unsubscribe(&callback) {
            Ok(Variant::Null)
        } else {
            Err(ServiceError::failure(
                MessageCode::NotFound,
                "no subscription for callback",
            ))
        }
    })?;
    tree.add_child(event, unsubscribe, false)?;
    Ok(())
}
