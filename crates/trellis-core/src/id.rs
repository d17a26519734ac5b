//! Element handles
//!
//! Elements live in an arena owned by the tree; a handle is a slot index plus
//! a generation counter. Generations start at 1 and advance when a slot is
//! reused, so a retained handle to a discarded element can never alias a
//! later element in the same slot.

use std::fmt;

/// Stable handle to an element in the tree arena
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ElementId {
    index: u32,
    generation: u32,
}

impl ElementId {
    /// The default handle; generation 0 never refers to a live slot
    pub const NONE: ElementId = ElementId {
        index: 0,
        generation: 0,
    };

    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        ElementId { index, generation }
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Element({}:{})", self.index, self.generation)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_default() {
        assert_eq!(ElementId::default(), ElementId::NONE);
        assert_eq!(ElementId::NONE.generation(), 0);
    }

    #[test]
    fn test_same_slot_different_generation_differs() {
        let a = ElementId::new(4, 1);
        let b = ElementId::new(4, 2);
        assert_ne!(a, b);
        assert_eq!(a.index(), b.index());
    }
}
