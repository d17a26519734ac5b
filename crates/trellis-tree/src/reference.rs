//! Forward and inverse edge storage
//!
//! Every logical edge is stored twice: a Forward entry on the source's table
//! and an Inverse entry on the target's, both describing the same edge. A
//! Child edge is owning (at most one inverse Child per element); Link edges
//! are non-owning and unlimited. The table itself checks only identifier
//! uniqueness within the forward list; every other invariant belongs to the
//! tree operations that call it.

use trellis_core::{ElementId, TreeError, TreeResult};

/// Edge kind: owning child or non-owning link
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefKind {
    Child,
    Link,
}

impl RefKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RefKind::Child => "child",
            RefKind::Link => "link",
        }
    }
}

/// Which half of a logical edge an entry represents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefDirection {
    Forward,
    Inverse,
}

/// One half of a logical edge
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    pub source: ElementId,
    pub target: ElementId,
    /// Name under which the target is reachable from the source
    pub identifier: String,
    pub kind: RefKind,
    pub direction: RefDirection,
}

/// Per-element edge store
#[derive(Default)]
pub struct RefTable {
    forward: Vec<Reference>,
    inverse: Vec<Reference>,
}

impl RefTable {
    /// Append a forward edge, rejecting a duplicate identifier
    pub(crate) fn add_forward(
        &mut self,
        source: ElementId,
        target: ElementId,
        identifier: &str,
        kind: RefKind,
    ) -> TreeResult<()> {
        if self.has_identifier(identifier) {
            return Err(TreeError::DuplicateIdentifier(identifier.to_string()));
        }
        self.forward.push(Reference {
            source,
            target,
            identifier: identifier.to_string(),
            kind,
            direction: RefDirection::Forward,
        });
        Ok(())
    }

    /// Append the inverse half of an edge created on some source's table
    pub(crate) fn add_inverse(
        &mut self,
        source: ElementId,
        target: ElementId,
        identifier: &str,
        kind: RefKind,
    ) {
        self.inverse.push(Reference {
            source,
            target,
            identifier: identifier.to_string(),
            kind,
            direction: RefDirection::Inverse,
        });
    }

    /// Remove the first forward edge of `kind` pointing at `target`
    pub(crate) fn remove_forward(&mut self, target: ElementId, kind: RefKind) -> Option<Reference> {
        let position = self
            .forward
            .iter()
            .position(|r| r.target == target && r.kind == kind)?;
        Some(self.forward.remove(position))
    }

    /// Remove the forward edge matching target, identifier, and kind exactly
    pub(crate) fn remove_forward_exact(
        &mut self,
        target: ElementId,
        identifier: &str,
        kind: RefKind,
    ) -> Option<Reference> {
        let position = self
            .forward
            .iter()
            .position(|r| r.target == target && r.kind == kind && r.identifier == identifier)?;
        Some(self.forward.remove(position))
    }

    /// Remove the inverse half of the edge from `source` named `identifier`
    pub(crate) fn remove_inverse(
        &mut self,
        source: ElementId,
        identifier: &str,
        kind: RefKind,
    ) -> Option<Reference> {
        let position = self
            .inverse
            .iter()
            .position(|r| r.source == source && r.kind == kind && r.identifier == identifier)?;
        Some(self.inverse.remove(position))
    }

    /// Drop all edges (decommissioning)
    pub(crate) fn clear(&mut self) {
        self.forward.clear();
        self.inverse.clear();
    }

    pub fn forward(&self) -> &[Reference] {
        &self.forward
    }

    pub fn inverse(&self) -> &[Reference] {
        &self.inverse
    }

    pub fn forward_by_identifier(&self, identifier: &str) -> Option<&Reference> {
        self.forward.iter().find(|r| r.identifier == identifier)
    }

    pub fn has_identifier(&self, identifier: &str) -> bool {
        self.forward.iter().any(|r| r.identifier == identifier)
    }

    /// The owning inverse Child entry, present while this element is parented
    pub fn parent_ref(&self) -> Option<&Reference> {
        self.inverse.iter().find(|r| r.kind == RefKind::Child)
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent_ref().map(|r| r.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: u32) -> ElementId {
        ElementId::new(index, 1)
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let mut table = RefTable::default();
        table.add_forward(id(0), id(1), "a", RefKind::Child).unwrap();
        let err = table
            .add_forward(id(0), id(2), "a", RefKind::Link)
            .unwrap_err();
        assert_eq!(err, TreeError::DuplicateIdentifier("a".to_string()));
        assert_eq!(table.forward().len(), 1);
    }

    #[test]
    fn test_remove_forward_returns_edge() {
        let mut table = RefTable::default();
        table.add_forward(id(0), id(1), "a", RefKind::Link).unwrap();
        let removed = table.remove_forward(id(1), RefKind::Link).unwrap();
        assert_eq!(removed.identifier, "a");
        assert_eq!(removed.direction, RefDirection::Forward);
        assert!(table.remove_forward(id(1), RefKind::Link).is_none());
    }

    #[test]
    fn test_remove_is_kind_aware() {
        let mut table = RefTable::default();
        table.add_forward(id(0), id(1), "kid", RefKind::Child).unwrap();
        assert!(table.remove_forward(id(1), RefKind::Link).is_none());
        assert!(table.remove_forward(id(1), RefKind::Child).is_some());
    }

    #[test]
    fn test_parent_is_inverse_child_entry() {
        let mut table = RefTable::default();
        assert_eq!(table.parent(), None);
        table.add_inverse(id(7), id(3), "me", RefKind::Link);
        assert_eq!(table.parent(), None);
        table.add_inverse(id(5), id(3), "me", RefKind::Child);
        assert_eq!(table.parent(), Some(id(5)));
        table.remove_inverse(id(5), "me", RefKind::Child);
        assert_eq!(table.parent(), None);
    }

    #[test]
    fn test_exact_removal_picks_right_link() {
        let mut table = RefTable::default();
        table.add_forward(id(0), id(1), "x", RefKind::Link).unwrap();
        table.add_forward(id(0), id(1), "y", RefKind::Link).unwrap();
        let removed = table.remove_forward_exact(id(1), "y", RefKind::Link).unwrap();
        assert_eq!(removed.identifier, "y");
        assert!(table.has_identifier("x"));
        assert!(!table.has_identifier("y"));
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut table = RefTable::default();
        table.add_forward(id(0), id(1), "a", RefKind::Child).unwrap();
        table.add_inverse(id(9), id(0), "b", RefKind::Link);
        table.clear();
        assert!(table.forward().is_empty());
        assert!(table.inverse().is_empty());
    }
}
