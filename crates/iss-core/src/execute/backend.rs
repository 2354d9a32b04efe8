//! Loop backends: the optimizer hook consulted at every merge point.
//!
//! A backend may return a dispatch decision it specialised earlier for the
//! same [`DispatchKey`]. Because the key carries the decode table and the
//! freshly fetched word, neither a rewritten instruction nor a different
//! engine can replay a stale decode.

use std::collections::HashMap;

use tracing::debug;

use crate::decoder::TableId;

use super::control::{Dispatch, DispatchKey};

/// Hook offered every dispatch so that hot paths can be specialised.
pub trait LoopBackend {
    /// Previously specialised dispatch for `key`, if any.
    fn specialized(&mut self, key: DispatchKey) -> Option<Dispatch>;

    /// Records that `key` was resolved to `dispatch` by the matcher.
    fn observe(&mut self, key: DispatchKey, dispatch: Dispatch);
}

/// Plain interpretation: every instruction goes through the matcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Interpreter;

impl LoopBackend for Interpreter {
    fn specialized(&mut self, _key: DispatchKey) -> Option<Dispatch> {
        None
    }

    fn observe(&mut self, _key: DispatchKey, _dispatch: Dispatch) {}
}

/// Specialisations and visit counts kept before [`HotPathCache`] starts over.
pub const DEFAULT_HOT_PATH_CAPACITY: usize = 4096;

/// Caches dispatch decisions for merge points visited at least `threshold` times.
///
/// The cache follows one decode table at a time: the first key from a
/// different table drops everything learned so far. Once `capacity` program
/// counters or specialisations accumulate, the next new one flushes the cache
/// as well, so generated or rewritten code cannot grow it without bound.
#[derive(Debug, Clone)]
pub struct HotPathCache {
    threshold: u32,
    capacity: usize,
    table: Option<TableId>,
    visits: HashMap<u64, u32>,
    cache: HashMap<DispatchKey, Dispatch>,
    reuses: u64,
    flushes: u64,
}

impl HotPathCache {
    /// Promotes a program counter once it has been resolved `threshold` times.
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self::with_capacity(threshold, DEFAULT_HOT_PATH_CAPACITY)
    }

    /// Like [`HotPathCache::new`], keeping at most `capacity` program counters
    /// and specialisations.
    #[must_use]
    pub fn with_capacity(threshold: u32, capacity: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            capacity: capacity.max(1),
            table: None,
            visits: HashMap::new(),
            cache: HashMap::new(),
            reuses: 0,
            flushes: 0,
        }
    }

    /// Number of specialised dispatch keys.
    #[must_use]
    pub fn promoted(&self) -> usize {
        self.cache.len()
    }

    /// Dispatches served from the cache instead of the matcher.
    #[must_use]
    pub const fn reuses(&self) -> u64 {
        self.reuses
    }

    /// Times the cache dropped its contents on its own, after filling up or
    /// meeting another table.
    #[must_use]
    pub const fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Drops every specialisation and visit count.
    pub fn clear(&mut self) {
        self.visits.clear();
        self.cache.clear();
    }

    fn flush(&mut self, why: &'static str) {
        debug!(
            visits = self.visits.len(),
            promoted = self.cache.len(),
            why,
            "hot path cache flushed"
        );
        self.clear();
        self.flushes += 1;
    }
}

impl LoopBackend for HotPathCache {
    fn specialized(&mut self, key: DispatchKey) -> Option<Dispatch> {
        let hit = self.cache.get(&key).copied();
        if hit.is_some() {
            self.reuses += 1;
        }
        hit
    }

    fn observe(&mut self, key: DispatchKey, dispatch: Dispatch) {
        match self.table {
            Some(table) if table == key.table => {}
            Some(_) => {
                self.flush("table changed");
                self.table = Some(key.table);
            }
            None => self.table = Some(key.table),
        }
        if self.visits.len() >= self.capacity && !self.visits.contains_key(&key.pc) {
            self.flush("full");
        }

        let visits = self.visits.entry(key.pc).or_insert(0);
        *visits = visits.saturating_add(1);
        if *visits < self.threshold || self.cache.contains_key(&key) {
            return;
        }
        if self.cache.len() >= self.capacity {
            self.flush("full");
        }
        debug!(pc = key.pc, mnemonic = dispatch.mnemonic, "hot path promoted");
        self.cache.insert(key, dispatch);
    }
}
