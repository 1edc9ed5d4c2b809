//! Bounded schema cache.
//!
//! Keeps introspected column lists per table key so re-selecting a table does
//! not trigger another schema introspection call. Entries are kept in a slab of
//! nodes threaded into a doubly-linked recency list (most recent at the head)
//! and indexed by a hash map, so `get`, `set` and eviction are all O(1).
//!
//! Expired entries are not swept; a `get` that finds one treats it as a miss
//! and drops it.

use std::{cell::Cell, collections::HashMap, rc::Rc};

use chrono::{DateTime, TimeDelta, Utc};
use log::debug;

use crate::mapping::ColumnList;

pub const DEFAULT_MAX_ENTRIES: usize = 50;
pub const DEFAULT_TTL_SECONDS: i64 = 300;

/// Source of the current time for TTL checks.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock; clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl: Option<TimeDelta>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl: Some(TimeDelta::seconds(DEFAULT_TTL_SECONDS)),
        }
    }
}

impl CacheConfig {
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_ttl(mut self, ttl: Option<TimeDelta>) -> Self {
        self.ttl = ttl;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    /// Fraction of lookups served from the cache, `0.0` before any lookup.
    pub hit_rate: f64,
}

#[derive(Debug)]
struct Node<V> {
    key: String,
    value: V,
    stored_at: DateTime<Utc>,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
pub struct SchemaCache<V = ColumnList, C = SystemClock> {
    config: CacheConfig,
    clock: C,
    index: HashMap<String, usize>,
    nodes: Vec<Option<Node<V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<V> SchemaCache<V, SystemClock> {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<V> Default for SchemaCache<V, SystemClock> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<V, C: Clock> SchemaCache<V, C> {
    /// A capacity of zero is treated as one.
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        let config = config.with_max_entries(config.max_entries.max(1));
        Self {
            config,
            clock,
            index: HashMap::with_capacity(config.max_entries),
            nodes: Vec::with_capacity(config.max_entries),
            free: Vec::new(),
            head: None,
            tail: None,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let node = self.node(idx);
            keys.push(node.key.as_str());
            cursor = node.next;
        }
        keys
    }

    /// Looks up `key`, refreshing its recency on a hit. An entry older than the
    /// configured TTL counts as a miss and is removed.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let Some(&idx) = self.index.get(key) else {
            self.misses += 1;
            return None;
        };
        if self.is_expired(idx) {
            debug!("Schema cache entry '{key}' expired");
            self.remove_node(idx);
            self.misses += 1;
            return None;
        }
        self.hits += 1;
        self.move_to_front(idx);
        Some(&self.node(idx).value)
    }

    /// Stores `value` under `key` as the most recently used entry, evicting the
    /// least recently used entry when the cache is full.
    pub fn set(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        let now = self.clock.now();
        if let Some(&idx) = self.index.get(&key) {
            let node = self.node_mut(idx);
            node.value = value;
            node.stored_at = now;
            self.move_to_front(idx);
            return;
        }
        if self.len() >= self.config.max_entries {
            if let Some(lru) = self.tail {
                debug!("Evicting schema cache entry '{}'", self.node(lru).key);
                self.remove_node(lru);
                self.evictions += 1;
            }
        }
        let node = Node {
            key: key.clone(),
            value,
            stored_at: now,
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.index.insert(key, idx);
        self.push_front(idx);
    }

    /// Removes the named keys only; the recency order of the rest is kept.
    pub fn invalidate<K: AsRef<str>>(&mut self, keys: &[K]) -> usize {
        let mut removed = 0usize;
        for key in keys {
            if let Some(&idx) = self.index.get(key.as_ref()) {
                self.remove_node(idx);
                removed += 1;
            }
        }
        removed
    }

    /// Drops every entry and resets the counters.
    pub fn clear(&mut self) {
        self.index.clear();
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let lookups = self.hits + self.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        };
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            size: self.len(),
            hit_rate,
        }
    }

    fn is_expired(&self, idx: usize) -> bool {
        match self.config.ttl {
            Some(ttl) => self.clock.now() - self.node(idx).stored_at > ttl,
            None => false,
        }
    }

    fn node(&self, idx: usize) -> &Node<V> {
        self.nodes[idx]
            .as_ref()
            .expect("linked cache slot is occupied")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<V> {
        self.nodes[idx]
            .as_mut()
            .expect("linked cache slot is occupied")
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.node(idx);
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
        let node = self.node_mut(idx);
        node.prev = None;
        node.next = None;
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.node_mut(idx);
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => self.node_mut(h).prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn remove_node(&mut self, idx: usize) {
        self.unlink(idx);
        if let Some(node) = self.nodes[idx].take() {
            self.index.remove(&node.key);
        }
        self.free.push(idx);
    }
}
