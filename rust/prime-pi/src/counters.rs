//! Binary-indexed prefix counts over a segment bit sieve.
//!
//! The special-leaves loops repeatedly need "how many live bits at offset
//! <= k" while the same segment keeps losing bits to cross-offs. A Fenwick
//! tree with one i32 leaf per sieve position answers both the query and the
//! decrement in O(log n).

use crate::bit_sieve::BitSieve;

pub struct Counters {
    tree: Vec<i32>,
    size: usize,
}

impl Counters {
    pub fn new(capacity: usize) -> Counters {
        Counters {
            tree: vec![0; capacity],
            size: capacity,
        }
    }

    /// Rebuild the tree from the sieve: afterwards `query(k)` equals the
    /// number of live bits at offsets [0, k]. O(n) via one child-to-parent
    /// pass.
    pub fn init(&mut self, sieve: &BitSieve) {
        let size = sieve.len();
        debug_assert!(size <= self.tree.len());
        self.size = size;

        for i in 0..size {
            self.tree[i] = sieve.get(i) as i32;
        }
        for i in 1..=size {
            let parent = i + (i & i.wrapping_neg());
            if parent <= size {
                self.tree[parent - 1] += self.tree[i - 1];
            }
        }
    }

    /// Record that the bit at `pos` went from live to dead. Must be called
    /// exactly once per cleared bit, right after the unset.
    #[inline]
    pub fn decrement(&mut self, pos: usize) {
        let mut i = pos + 1;
        while i <= self.size {
            self.tree[i - 1] -= 1;
            i += i & i.wrapping_neg();
        }
    }

    /// Number of live bits at offsets [0, pos].
    #[inline]
    pub fn query(&self, pos: usize) -> i64 {
        debug_assert!(pos < self.size);
        let mut sum = 0i64;
        let mut i = pos + 1;
        while i > 0 {
            sum += self.tree[i - 1] as i64;
            i -= i & i.wrapping_neg();
        }
        sum
    }
}
