//! Identifiers for evaluation contexts.

use serde::{Deserialize, Serialize};

/// Identifies one evaluation context (e.g. one character instance) sharing a
/// blend space configuration. Each context owns its own cached state.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub u32);

/// Monotonic allocator for ContextId.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_context: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_context(&mut self) -> ContextId {
        let id = ContextId(self.next_context);
        self.next_context = self.next_context.wrapping_add(1);
        id
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc_context(), ContextId(0));
        assert_eq!(alloc.alloc_context(), ContextId(1));
        alloc.reset();
        assert_eq!(alloc.alloc_context(), ContextId(0));
    }
}
