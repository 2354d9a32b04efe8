//! Eviction policies for the translation cache.
//!
//! Every policy shares one insertion-ordered list; they differ in how a hit
//! updates the list and the usage metadata, and in which slot they pick as the
//! victim:
//!
//! - `Fifo`: hits change nothing, the oldest insertion is evicted.
//! - `Lru`: hits move the slot to the back, the front is evicted.
//! - `Lfu`: hits bump a counter, the lowest counter is evicted with the oldest
//!   insertion winning ties.

use super::order::OrderList;

/// Replacement policy applied when a full entry set must admit a new key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum EvictionPolicy {
    /// First in, first out.
    #[default]
    Fifo,
    /// Least recently used.
    Lru,
    /// Least frequently used.
    Lfu,
}

impl EvictionPolicy {
    /// Usage metadata for a freshly inserted key.
    pub(super) const fn initial_usage(self, stamp: u64) -> u64 {
        match self {
            Self::Fifo => 0,
            Self::Lru => stamp,
            Self::Lfu => 1,
        }
    }

    /// Updates order and metadata after `slot` was hit.
    pub(super) fn touch(self, order: &mut OrderList, usage: &mut [u64], slot: usize, stamp: u64) {
        match self {
            Self::Fifo => {}
            Self::Lru => {
                usage[slot] = stamp;
                order.move_to_back(slot);
            }
            Self::Lfu => usage[slot] = usage[slot].saturating_add(1),
        }
    }

    /// Picks the slot to evict from a full set.
    pub(super) fn victim(self, order: &OrderList, usage: &[u64]) -> Option<usize> {
        match self {
            Self::Fifo | Self::Lru => order.front(),
            Self::Lfu => order.iter().min_by_key(|slot| usage[*slot]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EvictionPolicy;
    use crate::tlb::order::OrderList;

    fn three_slots() -> (OrderList, Vec<u64>) {
        let mut order = OrderList::with_slots(3);
        for slot in 0..3 {
            order.push_back(slot);
        }
        (order, vec![1, 1, 1])
    }

    #[test]
    fn fifo_ignores_hits() {
        let (mut order, mut usage) = three_slots();
        EvictionPolicy::Fifo.touch(&mut order, &mut usage, 0, 9);
        assert_eq!(EvictionPolicy::Fifo.victim(&order, &usage), Some(0));
    }

    #[test]
    fn lru_hit_protects_slot() {
        let (mut order, mut usage) = three_slots();
        EvictionPolicy::Lru.touch(&mut order, &mut usage, 0, 9);
        assert_eq!(usage[0], 9);
        assert_eq!(EvictionPolicy::Lru.victim(&order, &usage), Some(1));
    }

    #[test]
    fn lfu_breaks_ties_by_insertion_order() {
        let (mut order, mut usage) = three_slots();
        EvictionPolicy::Lfu.touch(&mut order, &mut usage, 0, 0);
        assert_eq!(usage, vec![2, 1, 1]);
        assert_eq!(EvictionPolicy::Lfu.victim(&order, &usage), Some(1));
        EvictionPolicy::Lfu.touch(&mut order, &mut usage, 1, 0);
        assert_eq!(EvictionPolicy::Lfu.victim(&order, &usage), Some(2));
    }
}
