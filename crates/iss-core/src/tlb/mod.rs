//! Address translation cache model.
//!
//! The cache tracks which virtual pages were touched recently so that hit and
//! miss counts can be reported; it never changes the result of a memory
//! access. The entry set is created on the first lookup and seeded to full
//! capacity: the first key plus `capacity - 1` cold placeholder slots that
//! never match and are the first eviction candidates.

mod order;
/// Replacement policies.
pub mod policy;

use std::collections::HashMap;

use tracing::debug;

use crate::api::ConfigError;
use order::OrderList;
pub use policy::EvictionPolicy;

/// Supported page sizes, in address units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum PageSize {
    /// 8 units.
    U8 = 3,
    /// 16 units.
    U16 = 4,
    /// 32 units.
    U32 = 5,
    /// 64 units.
    U64 = 6,
    /// 128 units.
    U128 = 7,
}

impl PageSize {
    /// Converts a unit count into a page size.
    #[must_use]
    pub const fn from_units(units: u64) -> Option<Self> {
        match units {
            8 => Some(Self::U8),
            16 => Some(Self::U16),
            32 => Some(Self::U32),
            64 => Some(Self::U64),
            128 => Some(Self::U128),
            _ => None,
        }
    }

    /// Units per page.
    #[must_use]
    pub const fn units(self) -> u64 {
        1 << self.shift()
    }

    /// Right shift turning a masked address into a page key.
    #[must_use]
    pub const fn shift(self) -> u32 {
        self as u32
    }

    /// Mask clearing the in-page offset.
    #[must_use]
    pub const fn mask(self) -> u64 {
        !(self.units() - 1)
    }
}

/// Translation cache parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TlbConfig {
    /// Number of entries in the set.
    pub capacity: usize,
    /// Page size in address units (8, 16, 32, 64 or 128).
    pub page_size: u64,
    /// Replacement policy.
    pub policy: EvictionPolicy,
}

impl TlbConfig {
    /// Checks capacity and page size.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroTlbCapacity`] or
    /// [`ConfigError::UnsupportedPageSize`].
    pub fn validate(&self) -> Result<PageSize, ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroTlbCapacity);
        }
        PageSize::from_units(self.page_size).ok_or(ConfigError::UnsupportedPageSize(self.page_size))
    }
}

/// Result of one lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlbLookup {
    /// Page key was resident.
    Hit,
    /// Page key was not resident and has been inserted.
    Miss,
}

/// Monotonic lookup counters. `hits + misses` equals the number of lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TlbStats {
    /// Lookups that found their key.
    pub hits: u64,
    /// Lookups that inserted their key.
    pub misses: u64,
    /// Resident keys displaced by a miss. Placeholder slots are not counted.
    pub evictions: u64,
}

/// Resident entry as exposed for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TlbEntry {
    /// Virtual page key.
    pub page: u64,
    /// Policy metadata: unused (FIFO), recency stamp (LRU) or hit count (LFU).
    pub usage: u64,
}

/// Fully associative translation cache with a pluggable eviction policy.
#[derive(Debug, Clone)]
pub struct Tlb {
    capacity: usize,
    page: PageSize,
    policy: EvictionPolicy,
    keys: Vec<Option<u64>>,
    usage: Vec<u64>,
    index: HashMap<u64, usize>,
    order: OrderList,
    stamp: u64,
    stats: TlbStats,
}

impl Tlb {
    /// Creates an empty cache; the entry set is materialised by the first lookup.
    ///
    /// # Errors
    ///
    /// Propagates [`TlbConfig::validate`] failures.
    pub fn new(config: TlbConfig) -> Result<Self, ConfigError> {
        let page = config.validate()?;
        Ok(Self {
            capacity: config.capacity,
            page,
            policy: config.policy,
            keys: Vec::new(),
            usage: Vec::new(),
            index: HashMap::with_capacity(config.capacity),
            order: OrderList::default(),
            stamp: 0,
            stats: TlbStats::default(),
        })
    }

    /// Entry count once seeded.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured page size.
    #[must_use]
    pub const fn page_size(&self) -> PageSize {
        self.page
    }

    /// Configured replacement policy.
    #[must_use]
    pub const fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Lookup counters.
    #[must_use]
    pub const fn stats(&self) -> TlbStats {
        self.stats
    }

    /// Page key for an address.
    #[must_use]
    pub const fn page_key(&self, addr: u64) -> u64 {
        (addr & self.page.mask()) >> self.page.shift()
    }

    /// Records an access to `addr`.
    pub fn lookup(&mut self, addr: u64) -> TlbLookup {
        self.stamp = self.stamp.wrapping_add(1);
        let key = self.page_key(addr);

        if self.keys.is_empty() {
            self.seed(key);
            self.stats.misses += 1;
            return TlbLookup::Miss;
        }

        if let Some(&slot) = self.index.get(&key) {
            self.policy
                .touch(&mut self.order, &mut self.usage, slot, self.stamp);
            self.stats.hits += 1;
            return TlbLookup::Hit;
        }

        self.stats.misses += 1;
        if let Some(victim) = self.policy.victim(&self.order, &self.usage) {
            if let Some(evicted) = self.keys[victim].take() {
                self.index.remove(&evicted);
                self.stats.evictions += 1;
                debug!(evicted, inserted = key, policy = ?self.policy, "tlb eviction");
            }
            self.order.unlink(victim);
            self.install(victim, key);
        }
        TlbLookup::Miss
    }

    /// Resident entries, oldest (next to be evicted under FIFO/LRU) first.
    #[must_use]
    pub fn entries(&self) -> Vec<TlbEntry> {
        self.order
            .iter()
            .filter_map(|slot| {
                self.keys[slot].map(|page| TlbEntry {
                    page,
                    usage: self.usage[slot],
                })
            })
            .collect()
    }

    /// Returns true when `addr`'s page is resident, without touching metadata.
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        self.index.contains_key(&self.page_key(addr))
    }

    /// Drops every entry. Counters are kept; the next lookup is a compulsory miss.
    pub fn flush(&mut self) {
        self.keys.clear();
        self.usage.clear();
        self.index.clear();
        self.order = OrderList::default();
    }

    fn seed(&mut self, key: u64) {
        self.keys = vec![None; self.capacity];
        self.usage = vec![0; self.capacity];
        self.order = OrderList::with_slots(self.capacity);
        let last = self.capacity - 1;
        for placeholder in 0..last {
            self.order.push_back(placeholder);
        }
        self.install(last, key);
    }

    fn install(&mut self, slot: usize, key: u64) {
        self.keys[slot] = Some(key);
        self.usage[slot] = self.policy.initial_usage(self.stamp);
        self.index.insert(key, slot);
        self.order.push_back(slot);
    }
}
