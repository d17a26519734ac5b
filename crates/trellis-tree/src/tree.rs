//! The element tree
//!
//! `Tree` owns the arena of elements and the address and profile indexes
//! behind one reader/writer lock. Structural operations update the indexes
//! in the same critical section as the edge mutation, so a reader can never
//! observe an index entry without its live edge.
//!
//! Observers are notified after the lock is released; an observer may call
//! back into the tree.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use trellis_core::{
    address, ElementId, ElementType, Format, ServiceKind, ServiceResult, TreeError, TreeResult,
    Variant,
};

use crate::arena::Arena;
use crate::data::{install_data_children, DataPoint, DataSpec};
use crate::device;
use crate::element::{ElementKind, ElementNode};
use crate::event::{install_event_children, EventDelivery, EventNotification, EventPoint};
use crate::reference::{RefDirection, RefKind, Reference};
use crate::service::{ServicePoint, ServiceRequest};

/// Handle returned by `Tree::add_observer`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// A structural or data change reported to observers
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeChange {
    ElementAdded {
        parent: ElementId,
        element: ElementId,
    },
    ElementRemoved {
        parent: ElementId,
        element: ElementId,
    },
    LinkAdded {
        source: ElementId,
        target: ElementId,
        identifier: String,
    },
    LinkRemoved {
        source: ElementId,
        target: ElementId,
        identifier: String,
    },
    /// Aggregate shape change at or below an element; `None` means the
    /// whole tree
    Changed { element: Option<ElementId> },
    DataChanged { element: ElementId },
}

/// Observer callback signature
pub type ChangeObserver = Arc<dyn Fn(&TreeChange) + Send + Sync>;

struct TreeState {
    arena: Arena,
    by_address: HashMap<String, ElementId>,
    by_profile: HashMap<String, Vec<ElementId>>,
}

/// The element tree: arena, indexes, root, and observer list
pub struct Tree {
    state: RwLock<TreeState>,
    observers: RwLock<Vec<(u64, ChangeObserver)>>,
    observer_seq: AtomicU64,
    root: ElementId,
}

impl Tree {
    /// Create a tree whose root is a device element addressed at `/`.
    pub fn new(root_identifier: &str) -> TreeResult<Arc<Tree>> {
        let mut root_node = ElementNode::new(root_identifier, ElementKind::Device)?;
        root_node.set_address(Some(address::ROOT.to_string()));
        let mut arena = Arena::new();
        let root = arena.insert(root_node);
        let mut by_address = HashMap::new();
        by_address.insert(address::ROOT.to_string(), root);
        Ok(Arc::new(Tree {
            state: RwLock::new(TreeState {
                arena,
                by_address,
                by_profile: HashMap::new(),
            }),
            observers: RwLock::new(Vec::new()),
            observer_seq: AtomicU64::new(1),
            root,
        }))
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn root_identifier(&self) -> String {
        let state = self.state.read();
        match state.arena.get(self.root) {
            Some(node) => node.identifier().to_string(),
            None => String::new(),
        }
    }

    /// Number of live elements, including detached ones
    pub fn len(&self) -> usize {
        self.state.read().arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.state.read().arena.contains(id)
    }

    // ===== ELEMENT CREATION =====

    /// Create a detached structure element.
    pub fn create_structure(&self, identifier: &str) -> TreeResult<ElementId> {
        let node = ElementNode::new(identifier, ElementKind::Structure)?;
        Ok(self.state.write().arena.insert(node))
    }

    /// Create a detached device element.
    pub fn create_device(&self, identifier: &str) -> TreeResult<ElementId> {
        let node = ElementNode::new(identifier, ElementKind::Device)?;
        Ok(self.state.write().arena.insert(node))
    }

    /// Create a detached service element bound to a delegate.
    pub fn create_service(
        &self,
        identifier: &str,
        kind: ServiceKind,
        delegate: impl Fn(ServiceRequest) -> ServiceResult<Variant> + Send + Sync + 'static,
    ) -> TreeResult<ElementId> {
        let point = ServicePoint::new(kind, delegate);
        let node = ElementNode::new(identifier, ElementKind::Service(point))?;
        Ok(self.state.write().arena.insert(node))
    }

    /// Create a detached data element with its standard children: `getdata`
    /// when readable, `setdata` when writable, and `datachanged`.
    pub fn create_data(&self, identifier: &str, spec: DataSpec) -> TreeResult<ElementId> {
        let point = spec.build();
        let mut node = ElementNode::new(identifier, ElementKind::Data(point.clone()))?;
        node.set_format(point.format().cloned());
        let id = self.state.write().arena.insert(node);
        install_data_children(self, id, &point)?;
        Ok(id)
    }

    /// Create a detached event element with its standard `subscribe` and
    /// `unsubscribe` children.
    pub fn create_event(&self, identifier: &str) -> TreeResult<ElementId> {
        let point = EventPoint::new();
        let node = ElementNode::new(identifier, ElementKind::Event(point.clone()))?;
        let id = self.state.write().arena.insert(node);
        install_event_children(self, id, &point)?;
        Ok(id)
    }

    // ===== STRUCTURAL OPERATIONS =====

    /// Attach `child` under `parent` with an owning edge.
    ///
    /// Assigns canonical addresses to `child` and its whole subtree when
    /// `parent` is itself attached. With `raise_changed` the observers get a
    /// `Changed` notification in addition to `ElementAdded`. Hands the child
    /// id back for chained construction.
    pub fn add_child(
        &self,
        parent: ElementId,
        child: ElementId,
        raise_changed: bool,
    ) -> TreeResult<ElementId> {
        {
            let mut state = self.state.write();
            let child_node = state.node(child)?;
            let child_ident = child_node.identifier().to_string();
            let has_parent = child_node.parent().is_some();
            state.node(parent)?;
            if child == self.root || has_parent {
                return Err(TreeError::AlreadyHasParent);
            }
            if parent == child {
                return Err(TreeError::SelfReference);
            }
            if state.is_ancestor(child, parent) {
                return Err(TreeError::CircularReference);
            }
            state
                .node_mut(parent)?
                .refs
                .add_forward(parent, child, &child_ident, RefKind::Child)?;
            state
                .node_mut(child)?
                .refs
                .add_inverse(parent, child, &child_ident, RefKind::Child);
            let parent_address = state.node(parent)?.address().map(str::to_string);
            if let Some(parent_address) = parent_address {
                state.assign_addresses(child, &parent_address);
            }
            debug!(parent = %parent, child = %child, identifier = %child_ident, "child attached");
        }
        self.notify(&TreeChange::ElementAdded {
            parent,
            element: child,
        });
        if raise_changed {
            self.notify(&TreeChange::Changed {
                element: Some(parent),
            });
        }
        Ok(child)
    }

    /// Detach the owning edge from `parent` to `child`.
    ///
    /// The subtree under `child` loses its addresses but keeps its own
    /// structure; link edges into it survive and resolve again if the
    /// subtree is re-attached.
    pub fn remove_child(
        &self,
        parent: ElementId,
        child: ElementId,
        raise_changed: bool,
    ) -> TreeResult<()> {
        {
            let mut state = self.state.write();
            state.node(child)?;
            let removed = state
                .node_mut(parent)?
                .refs
                .remove_forward(child, RefKind::Child)
                .ok_or(TreeError::NotAChild)?;
            state
                .node_mut(child)?
                .refs
                .remove_inverse(parent, &removed.identifier, RefKind::Child);
            state.clear_addresses(child);
            debug!(parent = %parent, child = %child, "child detached");
        }
        self.notify(&TreeChange::ElementRemoved {
            parent,
            element: child,
        });
        if raise_changed {
            self.notify(&TreeChange::Changed {
                element: Some(parent),
            });
        }
        Ok(())
    }

    /// Add a non-owning link from `source` to `target`.
    ///
    /// The identifier defaults to the target's own. The target's canonical
    /// address and lifetime are unaffected; it merely becomes reachable
    /// under the source's path as well.
    pub fn add_link(
        &self,
        source: ElementId,
        target: ElementId,
        identifier: Option<&str>,
        raise_changed: bool,
    ) -> TreeResult<()> {
        let ident;
        {
            let mut state = self.state.write();
            let target_ident = state.node(target)?.identifier().to_string();
            state.node(source)?;
            ident = match identifier {
                Some(i) => i.to_string(),
                None => target_ident,
            };
            if !address::is_valid_identifier(&ident) {
                return Err(TreeError::InvalidIdentifier(ident));
            }
            if source == target {
                return Err(TreeError::SelfReference);
            }
            if state.is_ancestor(target, source) {
                return Err(TreeError::CircularReference);
            }
            state
                .node_mut(source)?
                .refs
                .add_forward(source, target, &ident, RefKind::Link)?;
            state
                .node_mut(target)?
                .refs
                .add_inverse(source, target, &ident, RefKind::Link);
            debug!(source = %source, target = %target, identifier = %ident, "link added");
        }
        self.notify(&TreeChange::LinkAdded {
            source,
            target,
            identifier: ident,
        });
        if raise_changed {
            self.notify(&TreeChange::Changed {
                element: Some(source),
            });
        }
        Ok(())
    }

    /// Remove the link from `source` to `target`.
    ///
    /// Matching is by element identity, so a target resolved through the
    /// link address and one resolved through its canonical address remove
    /// the same edge.
    pub fn remove_link(
        &self,
        source: ElementId,
        target: ElementId,
        raise_changed: bool,
    ) -> TreeResult<()> {
        let ident;
        {
            let mut state = self.state.write();
            state.node(target)?;
            let removed = state
                .node_mut(source)?
                .refs
                .remove_forward(target, RefKind::Link)
                .ok_or(TreeError::LinkNotFound)?;
            ident = removed.identifier;
            state
                .node_mut(target)?
                .refs
                .remove_inverse(source, &ident, RefKind::Link);
            debug!(source = %source, target = %target, identifier = %ident, "link removed");
        }
        self.notify(&TreeChange::LinkRemoved {
            source,
            target,
            identifier: ident,
        });
        if raise_changed {
            self.notify(&TreeChange::Changed {
                element: Some(source),
            });
        }
        Ok(())
    }

    /// Destroy a detached element and its whole subtree.
    ///
    /// Link edges crossing the subtree boundary are severed on the outside
    /// element as well, so no dangling half-edges remain. Returns the number
    /// of elements destroyed. Fails with `StillAttached` when the element
    /// has a parent or is the root.
    pub fn discard(&self, element: ElementId) -> TreeResult<usize> {
        let mut state = self.state.write();
        let node = state.node(element)?;
        if element == self.root || node.parent().is_some() {
            return Err(TreeError::StillAttached);
        }
        let subtree = state.collect_subtree(element);
        let members: HashSet<ElementId> = subtree.iter().copied().collect();

        // Boundary-crossing link halves, gathered before any mutation.
        let mut boundary: Vec<(ElementId, Reference)> = Vec::new();
        for &member in &subtree {
            if let Some(node) = state.arena.get(member) {
                for r in node.refs.forward() {
                    if r.kind == RefKind::Link && !members.contains(&r.target) {
                        boundary.push((r.target, r.clone()));
                    }
                }
                for r in node.refs.inverse() {
                    if r.kind == RefKind::Link && !members.contains(&r.source) {
                        boundary.push((r.source, r.clone()));
                    }
                }
            }
        }
        for (outside, edge) in boundary {
            if let Some(node) = state.arena.get_mut(outside) {
                match edge.direction {
                    RefDirection::Forward => {
                        node.refs
                            .remove_inverse(edge.source, &edge.identifier, RefKind::Link);
                    }
                    RefDirection::Inverse => {
                        node.refs
                            .remove_forward_exact(edge.target, &edge.identifier, RefKind::Link);
                    }
                }
            }
        }
        let mut discarded = 0;
        for &member in &subtree {
            if let Some(node) = state.arena.get_mut(member) {
                node.refs.clear();
            }
            if state.arena.remove(member).is_some() {
                discarded += 1;
            }
        }
        debug!(element = %element, discarded, "subtree discarded");
        Ok(discarded)
    }

    // ===== PROFILES =====

    /// Tag an element with a capability profile. Returns false when the
    /// profile was already present.
    pub fn add_profile(&self, id: ElementId, name: &str) -> TreeResult<bool> {
        let mut state = self.state.write();
        let added = state.node_mut(id)?.add_profile(name);
        if added && state.node(id)?.address().is_some() {
            state.by_profile.entry(name.to_string()).or_default().push(id);
        }
        Ok(added)
    }

    pub fn remove_profile(&self, id: ElementId, name: &str) -> TreeResult<bool> {
        let mut state = self.state.write();
        let removed = state.node_mut(id)?.remove_profile(name);
        if removed {
            state.unindex_profile(id, name);
        }
        Ok(removed)
    }

    pub fn has_profile(&self, id: ElementId, name: &str) -> TreeResult<bool> {
        let state = self.state.read();
        Ok(state.node(id)?.has_profile(name))
    }

    pub fn profiles(&self, id: ElementId) -> TreeResult<Vec<String>> {
        let state = self.state.read();
        Ok(state.node(id)?.profiles().to_vec())
    }

    // ===== RESOLUTION =====

    /// Resolve a root-based address to an element.
    ///
    /// Canonical addresses hit the index directly; anything else falls back
    /// to walking forward edges from the root, which also covers addresses
    /// formed through links. A link whose target is detached resolves to
    /// nothing.
    pub fn element_by_address(&self, addr: &str) -> Option<ElementId> {
        let state = self.state.read();
        if addr == address::ROOT {
            return Some(self.root);
        }
        if let Some(&id) = state.by_address.get(addr) {
            return Some(id);
        }
        state.walk(self.root, addr, true, true)
    }

    /// Resolve an address relative to `start` by walking forward edges.
    ///
    /// An empty address resolves to `start` itself; `recurse: false` limits
    /// the walk to the first segment. This is a structural walk: it works on
    /// detached subtrees and does not consult the index.
    pub fn element_at(
        &self,
        start: ElementId,
        addr: &str,
        recurse: bool,
    ) -> TreeResult<Option<ElementId>> {
        let state = self.state.read();
        state.node(start)?;
        Ok(state.walk(start, addr, recurse, false))
    }

    /// All attached elements carrying a profile, via the index.
    pub fn elements_by_profile(&self, profile: &str) -> Vec<ElementId> {
        let state = self.state.read();
        state
            .by_profile
            .get(profile)
            .cloned()
            .unwrap_or_default()
    }

    // ===== SEARCH =====

    /// Depth-first search over forward edges collecting every element the
    /// predicate accepts. The predicate runs under the tree's read lock and
    /// must not call back into the tree.
    pub fn elements_where(
        &self,
        start: ElementId,
        include_self: bool,
        recurse: bool,
        pred: impl Fn(&ElementNode) -> bool,
    ) -> TreeResult<Vec<ElementId>> {
        let state = self.state.read();
        state.node(start)?;
        Ok(state.collect_matching(start, include_self, recurse, &pred))
    }

    pub fn elements_by_type(
        &self,
        start: ElementId,
        element_type: ElementType,
        include_self: bool,
        recurse: bool,
    ) -> TreeResult<Vec<ElementId>> {
        self.elements_where(start, include_self, recurse, |node| {
            node.element_type() == element_type
        })
    }

    pub fn elements_by_profile_in(
        &self,
        start: ElementId,
        profile: &str,
        include_self: bool,
        recurse: bool,
    ) -> TreeResult<Vec<ElementId>> {
        self.elements_where(start, include_self, recurse, |node| {
            node.has_profile(profile)
        })
    }

    /// First element the predicate accepts, in depth-first order.
    pub fn find_where(
        &self,
        start: ElementId,
        include_self: bool,
        recurse: bool,
        pred: impl Fn(&ElementNode) -> bool,
    ) -> TreeResult<Option<ElementId>> {
        let state = self.state.read();
        state.node(start)?;
        Ok(state.find_matching(start, include_self, recurse, &pred))
    }

    pub fn find_by_identifier(
        &self,
        start: ElementId,
        identifier: &str,
        include_self: bool,
        recurse: bool,
    ) -> TreeResult<Option<ElementId>> {
        self.find_where(start, include_self, recurse, |node| {
            node.identifier() == identifier
        })
    }

    pub fn find_by_profile(
        &self,
        start: ElementId,
        profile: &str,
        include_self: bool,
        recurse: bool,
    ) -> TreeResult<Option<ElementId>> {
        self.find_where(start, include_self, recurse, |node| {
            node.has_profile(profile)
        })
    }

    // ===== PER-ELEMENT ACCESSORS =====

    pub fn identifier(&self, id: ElementId) -> TreeResult<String> {
        let state = self.state.read();
        Ok(state.node(id)?.identifier().to_string())
    }

    pub fn element_type(&self, id: ElementId) -> TreeResult<ElementType> {
        let state = self.state.read();
        Ok(state.node(id)?.element_type())
    }

    /// Canonical address, `None` while detached.
    pub fn address(&self, id: ElementId) -> TreeResult<Option<String>> {
        let state = self.state.read();
        Ok(state.node(id)?.address().map(str::to_string))
    }

    pub fn parent(&self, id: ElementId) -> TreeResult<Option<ElementId>> {
        let state = self.state.read();
        Ok(state.node(id)?.parent())
    }

    /// Child-edge targets in insertion order.
    pub fn children(&self, id: ElementId) -> TreeResult<Vec<ElementId>> {
        let state = self.state.read();
        Ok(state
            .node(id)?
            .refs
            .forward()
            .iter()
            .filter(|r| r.kind == RefKind::Child)
            .map(|r| r.target)
            .collect())
    }

    pub fn forward_references(&self, id: ElementId) -> TreeResult<Vec<Reference>> {
        let state = self.state.read();
        Ok(state.node(id)?.refs.forward().to_vec())
    }

    pub fn inverse_references(&self, id: ElementId) -> TreeResult<Vec<Reference>> {
        let state = self.state.read();
        Ok(state.node(id)?.refs.inverse().to_vec())
    }

    pub fn uid(&self, id: ElementId) -> TreeResult<Option<String>> {
        let state = self.state.read();
        Ok(state.node(id)?.uid().map(str::to_string))
    }

    pub fn set_uid(&self, id: ElementId, uid: Option<String>) -> TreeResult<()> {
        let mut state = self.state.write();
        state.node_mut(id)?.set_uid(uid);
        Ok(())
    }

    pub fn format(&self, id: ElementId) -> TreeResult<Option<Format>> {
        let state = self.state.read();
        Ok(state.node(id)?.format().cloned())
    }

    /// Replace the introspection format. A data element keeps validating
    /// writes against the format its spec was built with.
    pub fn set_format(&self, id: ElementId, format: Option<Format>) -> TreeResult<()> {
        let mut state = self.state.write();
        state.node_mut(id)?.set_format(format);
        Ok(())
    }

    pub fn is_hidden(&self, id: ElementId) -> TreeResult<bool> {
        let state = self.state.read();
        Ok(state.node(id)?.is_hidden())
    }

    pub fn set_hidden(&self, id: ElementId, hidden: bool) -> TreeResult<()> {
        let mut state = self.state.write();
        state.node_mut(id)?.set_hidden(hidden);
        Ok(())
    }

    pub fn user_data(&self, id: ElementId) -> TreeResult<Option<Arc<dyn Any + Send + Sync>>> {
        let state = self.state.read();
        Ok(state.node(id)?.user_data().cloned())
    }

    pub fn set_user_data(
        &self,
        id: ElementId,
        data: Option<Arc<dyn Any + Send + Sync>>,
    ) -> TreeResult<()> {
        let mut state = self.state.write();
        state.node_mut(id)?.set_user_data(data);
        Ok(())
    }

    // ===== KIND-SPECIFIC STATE =====

    /// Shared handle to a data element's state.
    pub fn data(&self, id: ElementId) -> TreeResult<DataPoint> {
        let state = self.state.read();
        match state.node(id)?.kind() {
            ElementKind::Data(point) => Ok(point.clone()),
            other => Err(TreeError::KindMismatch {
                expected: ElementType::Data,
                actual: other.element_type(),
            }),
        }
    }

    /// Shared handle to a service element's state.
    pub fn service(&self, id: ElementId) -> TreeResult<ServicePoint> {
        let state = self.state.read();
        match state.node(id)?.kind() {
            ElementKind::Service(point) => Ok(point.clone()),
            other => Err(TreeError::KindMismatch {
                expected: ElementType::Service,
                actual: other.element_type(),
            }),
        }
    }

    /// Shared handle to an event element's state.
    pub fn event(&self, id: ElementId) -> TreeResult<EventPoint> {
        let state = self.state.read();
        match state.node(id)?.kind() {
            ElementKind::Event(point) => Ok(point.clone()),
            other => Err(TreeError::KindMismatch {
                expected: ElementType::Event,
                actual: other.element_type(),
            }),
        }
    }

    // ===== EVENTS AND NOTIFICATION =====

    /// Fire an event element.
    ///
    /// Subscribers with an in-process handler are called right here; the
    /// rest come back as deliveries for the caller to transport. Each
    /// subscriber's `data_to_send` addresses are resolved to current values;
    /// an address that fails to resolve or read contributes a null.
    pub fn raise_event(&self, event: ElementId) -> TreeResult<Vec<EventDelivery>> {
        let (point, source, event_ident) = {
            let state = self.state.read();
            let node = state.node(event)?;
            let point = match node.kind() {
                ElementKind::Event(point) => point.clone(),
                other => {
                    return Err(TreeError::KindMismatch {
                        expected: ElementType::Event,
                        actual: other.element_type(),
                    })
                }
            };
            let source = node
                .parent()
                .and_then(|p| state.arena.get(p))
                .and_then(|n| n.address())
                .map(str::to_string)
                .unwrap_or_else(|| node.identifier().to_string());
            (point, source, node.identifier().to_string())
        };
        let mut deliveries = Vec::new();
        for subscription in point.subscriptions() {
            let values: Vec<(String, Variant)> = subscription
                .data_to_send
                .iter()
                .map(|addr| (addr.clone(), self.read_data_at(addr)))
                .collect();
            let notification = EventNotification {
                source: source.clone(),
                event: event_ident.clone(),
                values,
            };
            match subscription.handler.clone() {
                Some(handler) => handler(&notification),
                None => deliveries.push(EventDelivery {
                    subscription,
                    notification,
                }),
            }
        }
        Ok(deliveries)
    }

    /// Announce that a data element's value changed.
    ///
    /// Invalidates the element's cache, notifies observers, and raises the
    /// `datachanged` child event when one exists, returning its deliveries.
    pub fn raise_data_changed(&self, data: ElementId) -> TreeResult<Vec<EventDelivery>> {
        let (point, changed_event) = {
            let state = self.state.read();
            let node = state.node(data)?;
            let point = match node.kind() {
                ElementKind::Data(point) => point.clone(),
                other => {
                    return Err(TreeError::KindMismatch {
                        expected: ElementType::Data,
                        actual: other.element_type(),
                    })
                }
            };
            let changed_event = node
                .refs
                .forward_by_identifier(device::DATA_CHANGED)
                .map(|r| r.target)
                .filter(|&target| {
                    state
                        .arena
                        .get(target)
                        .map_or(false, |n| n.element_type() == ElementType::Event)
                });
            (point, changed_event)
        };
        point.invalidate();
        self.notify(&TreeChange::DataChanged { element: data });
        match changed_event {
            Some(event) => self.raise_event(event),
            None => Ok(Vec::new()),
        }
    }

    /// Emit an aggregate shape-change notification; `None` means the whole
    /// tree changed.
    pub fn raise_tree_changed(&self, element: Option<ElementId>) {
        self.notify(&TreeChange::Changed { element });
    }

    /// Register a change observer. Observers run after the tree lock is
    /// released and may call back into the tree.
    pub fn add_observer(&self, observer: impl Fn(&TreeChange) + Send + Sync + 'static) -> ObserverId {
        let id = self.observer_seq.fetch_add(1, Ordering::Relaxed);
        self.observers.write().push((id, Arc::new(observer)));
        ObserverId(id)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(oid, _)| *oid != id.0);
        observers.len() != before
    }

    fn notify(&self, change: &TreeChange) {
        let snapshot: Vec<ChangeObserver> =
            self.observers.read().iter().map(|(_, o)| o.clone()).collect();
        for observer in snapshot {
            observer(change);
        }
    }

    fn read_data_at(&self, addr: &str) -> Variant {
        let id = match self.element_by_address(addr) {
            Some(id) => id,
            None => return Variant::Null,
        };
        match self.data(id) {
            Ok(point) => point.read().unwrap_or(Variant::Null),
            Err(_) => Variant::Null,
        }
    }
}

impl TreeState {
    fn node(&self, id: ElementId) -> TreeResult<&ElementNode> {
        self.arena.get(id).ok_or(TreeError::UnknownElement)
    }

    fn node_mut(&mut self, id: ElementId) -> TreeResult<&mut ElementNode> {
        self.arena.get_mut(id).ok_or(TreeError::UnknownElement)
    }

    /// Is `candidate` equal to `node` or one of its child-chain ancestors?
    fn is_ancestor(&self, candidate: ElementId, mut node: ElementId) -> bool {
        loop {
            if candidate == node {
                return true;
            }
            match self.arena.get(node).and_then(|n| n.parent()) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    /// Assign addresses to `start` and its child subtree, updating both
    /// indexes. Links are not followed; their targets are addressed through
    /// their own parent chain.
    fn assign_addresses(&mut self, start: ElementId, parent_address: &str) {
        let mut stack = vec![(start, parent_address.to_string())];
        while let Some((id, parent_addr)) = stack.pop() {
            let assigned = match self.arena.get_mut(id) {
                Some(node) => {
                    let addr = address::join(&parent_addr, node.identifier());
                    node.set_address(Some(addr.clone()));
                    let profiles = node.profiles().to_vec();
                    let children: Vec<ElementId> = node
                        .refs
                        .forward()
                        .iter()
                        .filter(|r| r.kind == RefKind::Child)
                        .map(|r| r.target)
                        .collect();
                    Some((addr, profiles, children))
                }
                None => None,
            };
            if let Some((addr, profiles, children)) = assigned {
                self.by_address.insert(addr.clone(), id);
                for profile in profiles {
                    self.by_profile.entry(profile).or_default().push(id);
                }
                for child in children {
                    stack.push((child, addr.clone()));
                }
            }
        }
    }

    /// Clear addresses of `start` and its child subtree, removing both
    /// index entries.
    fn clear_addresses(&mut self, start: ElementId) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let cleared = match self.arena.get_mut(id) {
                Some(node) => {
                    let addr = node.take_address();
                    let profiles = node.profiles().to_vec();
                    let children: Vec<ElementId> = node
                        .refs
                        .forward()
                        .iter()
                        .filter(|r| r.kind == RefKind::Child)
                        .map(|r| r.target)
                        .collect();
                    Some((addr, profiles, children))
                }
                None => None,
            };
            if let Some((addr, profiles, children)) = cleared {
                if let Some(addr) = addr {
                    self.by_address.remove(&addr);
                }
                for profile in profiles {
                    self.unindex_profile(id, &profile);
                }
                stack.extend(children);
            }
        }
    }

    fn unindex_profile(&mut self, id: ElementId, profile: &str) {
        if let Some(ids) = self.by_profile.get_mut(profile) {
            ids.retain(|&e| e != id);
            if ids.is_empty() {
                self.by_profile.remove(profile);
            }
        }
    }

    /// Walk forward edges segment by segment from `start`.
    ///
    /// With `require_attached_links`, traversing a link whose target is
    /// detached fails the walk; root-based resolution uses this so stale
    /// links into removed subtrees stay unresolvable.
    fn walk(
        &self,
        start: ElementId,
        addr: &str,
        recurse: bool,
        require_attached_links: bool,
    ) -> Option<ElementId> {
        let mut current = start;
        for (depth, segment) in address::segments(addr).enumerate() {
            if depth > 0 && !recurse {
                return None;
            }
            let node = self.arena.get(current)?;
            let edge = node.refs.forward_by_identifier(segment)?;
            if require_attached_links && edge.kind == RefKind::Link {
                let target = self.arena.get(edge.target)?;
                if target.address().is_none() {
                    return None;
                }
            }
            current = edge.target;
        }
        Some(current)
    }

    fn collect_subtree(&self, start: ElementId) -> Vec<ElementId> {
        let mut out = vec![start];
        let mut i = 0;
        while i < out.len() {
            if let Some(node) = self.arena.get(out[i]) {
                out.extend(
                    node.refs
                        .forward()
                        .iter()
                        .filter(|r| r.kind == RefKind::Child)
                        .map(|r| r.target),
                );
            }
            i += 1;
        }
        out
    }

    /// Depth-first collection over forward edges. The visited set keeps
    /// mutual links from looping the traversal.
    fn collect_matching(
        &self,
        start: ElementId,
        include_self: bool,
        recurse: bool,
        pred: &dyn Fn(&ElementNode) -> bool,
    ) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(start);
        let start_node = match self.arena.get(start) {
            Some(node) => node,
            None => return out,
        };
        if include_self && pred(start_node) {
            out.push(start);
        }
        let mut stack: Vec<ElementId> =
            start_node.refs.forward().iter().rev().map(|r| r.target).collect();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let node = match self.arena.get(id) {
                Some(node) => node,
                None => continue,
            };
            if pred(node) {
                out.push(id);
            }
            if recurse {
                for r in node.refs.forward().iter().rev() {
                    if !visited.contains(&r.target) {
                        stack.push(r.target);
                    }
                }
            }
        }
        out
    }

    fn find_matching(
        &self,
        start: ElementId,
        include_self: bool,
        recurse: bool,
        pred: &dyn Fn(&ElementNode) -> bool,
    ) -> Option<ElementId> {
        let mut visited = HashSet::new();
        visited.insert(start);
        let start_node = self.arena.get(start)?;
        if include_self && pred(start_node) {
            return Some(start);
        }
        let mut stack: Vec<ElementId> =
            start_node.refs.forward().iter().rev().map(|r| r.target).collect();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let node = match self.arena.get(id) {
                Some(node) => node,
                None => continue,
            };
            if pred(node) {
                return Some(id);
            }
            if recurse {
                for r in node.refs.forward().iter().rev() {
                    if !visited.contains(&r.target) {
                        stack.push(r.target);
                    }
                }
            }
        }
        None
    }
}
