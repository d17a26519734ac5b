//! Element nodes
//!
//! An element is a typed node: identity, canonical address, capability
//! profiles, and a reference table. Kind-specific state rides along in
//! `ElementKind` behind shared handles, so the tree can hand it out without
//! keeping its own lock held.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use trellis_core::{address, ElementId, ElementType, Format, TreeError, TreeResult};

use crate::{DataPoint, EventPoint, RefTable, ServicePoint};

/// Kind-specific element state
pub enum ElementKind {
    Device,
    Structure,
    Data(DataPoint),
    Service(ServicePoint),
    Event(EventPoint),
}

impl ElementKind {
    pub fn element_type(&self) -> ElementType {
        match self {
            ElementKind::Device => ElementType::Device,
            ElementKind::Structure => ElementType::Structure,
            ElementKind::Data(_) => ElementType::Data,
            ElementKind::Service(_) => ElementType::Service,
            ElementKind::Event(_) => ElementType::Event,
        }
    }
}

/// A node in the element tree
///
/// Constructed detached: no parent, no address. Attachment via a Child edge
/// assigns the canonical address; detachment clears it again.
pub struct ElementNode {
    identifier: String,
    kind: ElementKind,
    address: Option<String>,
    uid: Option<String>,
    format: Option<Format>,
    profiles: Vec<String>,
    hidden: bool,
    user_data: Option<Arc<dyn Any + Send + Sync>>,
    pub(crate) refs: RefTable,
}

impl ElementNode {
    pub(crate) fn new(identifier: impl Into<String>, kind: ElementKind) -> TreeResult<Self> {
        let identifier = identifier.into();
        if !address::is_valid_identifier(&identifier) {
            return Err(TreeError::InvalidIdentifier(identifier));
        }
        Ok(ElementNode {
            identifier,
            kind,
            address: None,
            uid: None,
            format: None,
            profiles: Vec::new(),
            hidden: false,
            user_data: None,
            refs: RefTable::default(),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn element_type(&self) -> ElementType {
        self.kind.element_type()
    }

    /// Canonical address; `None` while detached
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    pub fn format(&self) -> Option<&Format> {
        self.format.as_ref()
    }

    /// Capability tags in insertion order
    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    pub fn has_profile(&self, name: &str) -> bool {
        self.profiles.iter().any(|p| p == name)
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn user_data(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.user_data.as_ref()
    }

    pub fn refs(&self) -> &RefTable {
        &self.refs
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.refs.parent()
    }

    pub(crate) fn set_address(&mut self, address: Option<String>) {
        self.address = address;
    }

    pub(crate) fn take_address(&mut self) -> Option<String> {
        self.address.take()
    }

    /// Returns true when the profile was not already present
    pub(crate) fn add_profile(&mut self, name: &str) -> bool {
        if self.has_profile(name) {
            return false;
        }
        self.profiles.push(name.to_string());
        true
    }

    /// Returns true when the profile was present
    pub(crate) fn remove_profile(&mut self, name: &str) -> bool {
        let before = self.profiles.len();
        self.profiles.retain(|p| p != name);
        self.profiles.len() != before
    }

    pub(crate) fn set_uid(&mut self, uid: Option<String>) {
        self.uid = uid;
    }

    pub(crate) fn set_format(&mut self, format: Option<Format>) {
        self.format = format;
    }

    pub(crate) fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub(crate) fn set_user_data(&mut self, data: Option<Arc<dyn Any + Send + Sync>>) {
        self.user_data = data;
    }
}

impl fmt::Debug for ElementNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementNode")
            .field("identifier", &self.identifier)
            .field("element_type", &self.element_type())
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_detached() {
        let node = ElementNode::new("valve", ElementKind::Structure).unwrap();
        assert_eq!(node.identifier(), "valve");
        assert_eq!(node.address(), None);
        assert_eq!(node.parent(), None);
        assert_eq!(node.element_type(), ElementType::Structure);
    }

    #[test]
    fn test_identifier_validation() {
        assert_eq!(
            ElementNode::new("", ElementKind::Structure).unwrap_err(),
            TreeError::InvalidIdentifier(String::new())
        );
        assert!(matches!(
            ElementNode::new("a/b", ElementKind::Structure),
            Err(TreeError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_profiles_keep_insertion_order() {
        let mut node = ElementNode::new("x", ElementKind::Structure).unwrap();
        assert!(node.add_profile("beta"));
        assert!(node.add_profile("alpha"));
        assert!(!node.add_profile("beta"));
        assert_eq!(node.profiles(), &["beta".to_string(), "alpha".to_string()]);
        assert!(node.remove_profile("beta"));
        assert!(!node.remove_profile("beta"));
        assert_eq!(node.profiles(), &["alpha".to_string()]);
    }

    #[test]
    fn test_user_data_downcast() {
        let mut node = ElementNode::new("x", ElementKind::Structure).unwrap();
        node.set_user_data(Some(Arc::new(42u32)));
        let data = node.user_data().unwrap();
        assert_eq!(data.downcast_ref::<u32>(), Some(&42));
    }
}
