//! Shared atomic union-find forest over the pixel grid.

use bumpalo::Bump;

use crate::label::Label;

/// A disjoint-set forest with one atomic parent pointer per grid cell.
///
/// Roots hold their own linear index. Unions always point the larger root at
/// the smaller one, so a component's root converges to its minimum linear
/// index regardless of merge interleaving — this is what pins the scanline
/// ordering of the final dense labels.
///
/// Invariant: a parent pointer is never greater than its cell index, so
/// parent-following strictly descends and always terminates at a root.
#[derive(Clone, Copy)]
pub struct LabelForest<'a, L: Label> {
    cells: &'a [L::Atomic],
}

impl<'a, L: Label> LabelForest<'a, L> {
    /// Create a forest of singleton roots backed by the provided arena.
    pub fn new_in(arena: &'a Bump, len: usize) -> Self {
        let cells = arena.alloc_slice_fill_with(len, |i| L::new_atomic(L::from_index(i)));
        Self { cells }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Current parent pointer of `i`.
    #[inline(always)]
    pub fn parent(&self, i: usize) -> usize {
        L::load(&self.cells[i]).index()
    }

    #[inline(always)]
    pub fn set_parent(&self, i: usize, parent: usize) {
        L::store(&self.cells[i], L::from_index(parent));
    }

    /// Follow parent pointers to the root without mutating the path.
    #[inline]
    pub fn root_of(&self, i: usize) -> usize {
        let mut cur = i;
        loop {
            let p = self.parent(cur);
            if p == cur {
                return cur;
            }
            cur = p;
        }
    }

    /// Atomically unite the components of `a` and `b`.
    ///
    /// Lock-free: repeated compare-and-swap on the losing root's parent
    /// pointer until one attempt wins. Idempotent and order-independent in
    /// its final effect on component membership. Returns the number of
    /// failed attempts (merge-conflict statistic).
    pub fn union(&self, a: usize, b: usize) -> u64 {
        let mut failed = 0;
        loop {
            let ra = self.root_of(a);
            let rb = self.root_of(b);
            if ra == rb {
                return failed;
            }
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            if L::compare_exchange(&self.cells[hi], L::from_index(hi), L::from_index(lo)) {
                return failed;
            }
            // Another worker re-parented `hi` first; retry from the new roots.
            failed += 1;
        }
    }

    /// Re-point `i` directly at its current root (partial flatten).
    #[inline]
    pub fn flatten(&self, i: usize) {
        let root = self.root_of(i);
        if root != self.parent(i) {
            self.set_parent(i, root);
        }
    }

    /// Pointer-halving compaction: after this returns, `i` points directly
    /// at its root. Concurrent halving stores are benign — parent pointers
    /// only ever decrease toward the root.
    pub fn compact(&self, i: usize) {
        let mut root = i;
        loop {
            let p = self.parent(root);
            if p == root {
                break;
            }
            let gp = self.parent(p);
            if gp != p {
                self.set_parent(root, gp);
            }
            root = p;
        }
        if self.parent(i) != root {
            self.set_parent(i, root);
        }
    }

    /// Snapshot the forest into a plain vector (debug capture).
    #[must_use]
    pub fn snapshot(&self) -> Vec<L> {
        self.cells.iter().map(|cell| L::load(cell)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_union_find() {
        let arena = Bump::new();
        let forest: LabelForest<u32> = LabelForest::new_in(&arena, 10);

        forest.union(1, 2);
        forest.union(2, 3);
        forest.union(5, 6);

        assert_eq!(forest.root_of(1), forest.root_of(3));
        assert_eq!(forest.root_of(1), forest.root_of(2));
        assert_ne!(forest.root_of(1), forest.root_of(5));

        forest.union(3, 5);
        assert_eq!(forest.root_of(1), forest.root_of(6));
    }

    #[test]
    fn test_root_is_component_minimum() {
        let arena = Bump::new();
        let forest: LabelForest<u32> = LabelForest::new_in(&arena, 8);
        forest.union(7, 4);
        forest.union(4, 6);
        forest.union(6, 2);
        assert_eq!(forest.root_of(7), 2);
        assert_eq!(forest.root_of(4), 2);
    }

    #[test]
    fn test_compact_points_directly_at_root() {
        let arena = Bump::new();
        let forest: LabelForest<u32> = LabelForest::new_in(&arena, 6);
        // Build a chain 5 -> 4 -> 3 -> 0 by hand.
        forest.set_parent(5, 4);
        forest.set_parent(4, 3);
        forest.set_parent(3, 0);
        forest.compact(5);
        assert_eq!(forest.parent(5), 0);
        assert_eq!(forest.root_of(4), 0);
    }

    proptest! {
        #[test]
        fn prop_union_is_transitive(pairs in prop::collection::vec((0..64usize, 0..64usize), 0..64)) {
            let arena = Bump::new();
            let forest: LabelForest<u32> = LabelForest::new_in(&arena, 64);
            for (a, b) in pairs {
                forest.union(a, b);
                prop_assert_eq!(forest.root_of(a), forest.root_of(b));
            }
        }

        #[test]
        fn prop_parent_never_exceeds_index(pairs in prop::collection::vec((0..64usize, 0..64usize), 0..64)) {
            let arena = Bump::new();
            let forest: LabelForest<u32> = LabelForest::new_in(&arena, 64);
            for (a, b) in pairs {
                forest.union(a, b);
            }
            for i in 0..forest.len() {
                prop_assert!(forest.parent(i) <= i);
            }
        }
    }
}
