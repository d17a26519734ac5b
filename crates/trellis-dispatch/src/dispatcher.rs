//! Address-based dispatch
//!
//! One pass per message, terminal in this layer: resolve the address,
//! require a service element, invoke it, classify the outcome. Requests
//! always come back as a response message; a panicking delegate is caught
//! and folded into an internal error, so a misbehaving service can never
//! take the dispatcher down. Events have no response channel and propagate
//! failures to the transport instead.
//!
//! Request addresses may carry the device identifier as their leading
//! segment; when the prefixed form does not resolve the path is taken
//! literally. Event addresses must carry the prefix.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;
use trellis_core::{
    address, DispatchError, DispatchResult, ElementId, MessageCode, ServiceError,
};
use trellis_tree::{ServiceRequest, Tree};

use crate::message::Message;

/// Pre-dispatch hook: may answer a request before resolution
pub type PreDispatchFn = Arc<dyn Fn(&Message) -> Option<Message> + Send + Sync>;

/// Post-dispatch hook: observes a handled message and its response, if any
pub type PostDispatchFn = Arc<dyn Fn(&Message, Option<&Message>) + Send + Sync>;

/// Resolves wire messages against a tree and invokes the target service
pub struct Dispatcher {
    tree: Arc<Tree>,
    pre: RwLock<Vec<PreDispatchFn>>,
    post: RwLock<Vec<PostDispatchFn>>,
}

impl Dispatcher {
    pub fn new(tree: Arc<Tree>) -> Self {
        Dispatcher {
            tree,
            pre: RwLock::new(Vec::new()),
            post: RwLock::new(Vec::new()),
        }
    }

    pub fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    pub fn add_pre_dispatch(
        &self,
        hook: impl Fn(&Message) -> Option<Message> + Send + Sync + 'static,
    ) {
        self.pre.write().push(Arc::new(hook));
    }

    pub fn add_post_dispatch(
        &self,
        hook: impl Fn(&Message, Option<&Message>) + Send + Sync + 'static,
    ) {
        self.post.write().push(Arc::new(hook));
    }

    /// Handle a request message.
    ///
    /// Every path produces a response: resolution misses become `NotFound`,
    /// a non-service target becomes `BadRequest`, classified failures keep
    /// their code, and anything else, panics included, becomes an internal
    /// error.
    pub fn handle_request(&self, request: &Message) -> Message {
        if request.adr.is_empty() {
            return request.error(MessageCode::BadRequest, "empty address", None);
        }
        let hooks: Vec<PreDispatchFn> = self.pre.read().clone();
        for hook in hooks {
            if let Some(response) = hook(request) {
                self.notify_post(request, Some(&response));
                return response;
            }
        }
        let target = match self.resolve(&request.adr) {
            Some(id) => id,
            None => {
                let response = request.error(MessageCode::NotFound, "no element at address", None);
                self.notify_post(request, Some(&response));
                return response;
            }
        };
        let point = match self.tree.service(target) {
            Ok(point) => point,
            Err(_) => {
                let response =
                    request.error(MessageCode::BadRequest, "element is not a service", None);
                self.notify_post(request, Some(&response));
                return response;
            }
        };
        let service_request = ServiceRequest::new(request.data.clone(), request.cid);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| point.invoke(service_request)));
        let response = match outcome {
            Ok(Ok(value)) => request.success(Some(value)),
            Ok(Err(err)) => {
                if matches!(err, ServiceError::Fault(_)) {
                    warn!(adr = %request.adr, error = %err, "service invocation faulted");
                }
                request.service_error(&err)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(adr = %request.adr, panic = %message, "service delegate panicked");
                request.service_error(&ServiceError::fault(message))
            }
        };
        self.notify_post(request, Some(&response));
        response
    }

    /// Handle an event message.
    ///
    /// Stricter than requests: the address must be prefixed with the device
    /// identifier, and an invocation failure propagates to the caller after
    /// post-dispatch hooks have seen the undelivered message. The transport
    /// is expected to catch and log.
    pub fn handle_event(&self, message: &Message) -> DispatchResult<()> {
        let (first, rest) = match address::split_first(&message.adr) {
            Some(parts) => parts,
            None => return Err(DispatchError::InvalidMessage("empty address".into())),
        };
        if !first.eq_ignore_ascii_case(&self.tree.root_identifier()) {
            return Err(DispatchError::NotFound(message.adr.clone()));
        }
        let target = match self.tree.element_by_address(&rooted(rest)) {
            Some(id) => id,
            None => return Err(DispatchError::NotFound(message.adr.clone())),
        };
        let point = match self.tree.service(target) {
            Ok(point) => point,
            Err(_) => return Err(DispatchError::NotAService(message.adr.clone())),
        };
        let service_request = ServiceRequest::new(message.data.clone(), message.cid);
        match point.invoke(service_request) {
            Ok(_) => Ok(()),
            Err(err) => {
                self.notify_post(message, None);
                Err(DispatchError::Service(err))
            }
        }
    }

    /// Resolve a request address: the device-prefixed reading wins, the
    /// literal path is the fallback.
    fn resolve(&self, adr: &str) -> Option<ElementId> {
        if let Some((first, rest)) = address::split_first(adr) {
            if first.eq_ignore_ascii_case(&self.tree.root_identifier()) {
                if let Some(id) = self.tree.element_by_address(&rooted(rest)) {
                    return Some(id);
                }
            }
        }
        self.tree.element_by_address(&rooted(adr))
    }

    fn notify_post(&self, request: &Message, response: Option<&Message>) {
        let hooks: Vec<PostDispatchFn> = self.post.read().clone();
        for hook in hooks {
            hook(request, response);
        }
    }
}

fn rooted(path: &str) -> String {
    if path.starts_with(address::SEPARATOR) {
        path.to_string()
    } else {
        format!("{}{}", address::SEPARATOR, path)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "service delegate panicked".to_string()
    }
}
