//! Generational element arena
//!
//! Slots are reused through a free list; each removal bumps the slot's
//! generation, so a retained handle to a discarded element misses instead of
//! aliasing whatever took over the slot. Generations start at 1, leaving
//! generation 0 permanently dead for the default handle.

use crate::ElementNode;
use trellis_core::ElementId;

pub(crate) struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

struct Slot {
    generation: u32,
    node: Option<ElementNode>,
}

impl Arena {
    pub(crate) fn new() -> Self {
        Arena {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub(crate) fn insert(&mut self, node: ElementNode) -> ElementId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                ElementId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 1,
                    node: Some(node),
                });
                ElementId::new(index, 1)
            }
        }
    }

    pub(crate) fn remove(&mut self, id: ElementId) -> Option<ElementNode> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() || slot.node.is_none() {
            return None;
        }
        slot.generation = slot.generation.wrapping_add(1);
        if slot.generation == 0 {
            slot.generation = 1;
        }
        self.free.push(id.index());
        self.live -= 1;
        slot.node.take()
    }

    pub(crate) fn get(&self, id: ElementId) -> Option<&ElementNode> {
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: ElementId) -> Option<&mut ElementNode> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_mut()
    }

    pub(crate) fn contains(&self, id: ElementId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ElementId, &ElementNode)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node
                .as_ref()
                .map(|node| (ElementId::new(index as u32, slot.generation), node))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ElementKind;
    use proptest::prelude::*;

    fn node(identifier: &str) -> ElementNode {
        ElementNode::new(identifier, ElementKind::Structure).unwrap()
    }

    #[test]
    fn test_insert_then_get() {
        let mut arena = Arena::new();
        let id = arena.insert(node("a"));
        assert_eq!(arena.get(id).unwrap().identifier(), "a");
        assert_eq!(arena.len(), 1);
        assert!(arena.contains(id));
    }

    #[test]
    fn test_removed_handle_goes_stale() {
        let mut arena = Arena::new();
        let id = arena.insert(node("a"));
        assert!(arena.remove(id).is_some());
        assert!(arena.get(id).is_none());
        assert!(arena.remove(id).is_none());
        assert_eq!(arena.len(), 0);
    }

    #[test]
    fn test_slot_reuse_bumps_generation() {
        let mut arena = Arena::new();
        let first = arena.insert(node("a"));
        arena.remove(first);
        let second = arena.insert(node("b"));
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second).unwrap().identifier(), "b");
    }

    #[test]
    fn test_iter_skips_free_slots() {
        let mut arena = Arena::new();
        let a = arena.insert(node("a"));
        let _b = arena.insert(node("b"));
        arena.remove(a);
        let names: Vec<&str> = arena.iter().map(|(_, n)| n.identifier()).collect();
        assert_eq!(names, vec!["b"]);
    }

    proptest! {
        // Interleaved inserts and removes keep len consistent with what get sees.
        #[test]
        fn arena_len_matches_live_handles(ops in proptest::collection::vec(proptest::bool::ANY, 1..64)) {
            let mut arena = Arena::new();
            let mut live: Vec<ElementId> = Vec::new();
            for insert in ops {
                if insert || live.is_empty() {
                    live.push(arena.insert(node("x")));
                } else {
                    let id = live.swap_remove(live.len() / 2);
                    prop_assert!(arena.remove(id).is_some());
                }
            }
            prop_assert_eq!(arena.len(), live.len());
            for id in live {
                prop_assert!(arena.get(id).is_some());
            }
        }
    }
}
