//! The canonical hash containers used by the compiler core.
//!
//! Four maps cover the core's needs: [`HandleMap`] (open addressing with
//! quadratic probing over mixed 64-bit keys), [`StrMap`] (owned string keys
//! with DJB2 hashing and linear probing), [`IntMap`] (SplitMix64 mixing with
//! an occupancy bitmap and a single-entry lookup cache), and
//! [`ConcurrentMap`] (lock-free per-slot chains, never resized). All but the
//! concurrent map rehash by doubling once half full. Iteration order is
//! unspecified.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

/// Finalizer of the SplitMix64 generator, used to mix raw 64-bit keys.
#[inline]
pub fn mix_bits_64(mut key: u64) -> u64 {
    key = (key ^ (key >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    key = (key ^ (key >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    key ^ (key >> 31)
}

/// 32-bit avalanche mix applied after string hashing.
#[inline]
pub fn mix_bits_32(mut key: u32) -> u32 {
    key = (key ^ (key >> 16)).wrapping_mul(0x85eb_ca6b);
    key = (key ^ (key >> 13)).wrapping_mul(0xc2b2_ae35);
    key ^ (key >> 16)
}

fn next_power_of_2(n: usize) -> usize {
    n.next_power_of_two().max(2)
}

/// Open-addressing map from 64-bit handles to values.
///
/// Uses quadratic probing and rehashes by doubling when half full. This is
/// the workhorse map for handle-keyed caches; a conservative initial size
/// should be chosen since rebuilding is expensive.
#[derive(Debug, Clone)]
pub struct HandleMap<V> {
    slots: Vec<Option<(u64, V)>>,
    members: usize,
}

impl<V> HandleMap<V> {
    /// Creates a map with capacity for at least `size` entries before the
    /// first rehash.
    pub fn new(size: usize) -> Self {
        Self {
            slots: (0..next_power_of_2(size * 2)).map(|_| None).collect(),
            members: 0,
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.members
    }

    /// Returns `true` if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.members == 0
    }

    /// Inserts or replaces the value for `key`. Returns `true` if an
    /// existing entry was replaced.
    pub fn put(&mut self, key: u64, value: V) -> bool {
        if self.members >= self.slots.len() / 2 {
            self.grow();
        }

        let mask = self.slots.len() - 1;
        let mut slot = (mix_bits_64(key) as usize) & mask;
        let mut i = 1;
        loop {
            match &self.slots[slot] {
                Some((k, _)) if *k == key => {
                    self.slots[slot] = Some((key, value));
                    return true;
                }
                Some(_) => {
                    slot = (slot + i) & mask;
                    i += 1;
                }
                None => {
                    self.slots[slot] = Some((key, value));
                    self.members += 1;
                    return false;
                }
            }
        }
    }

    /// Looks up the value for `key`.
    pub fn get(&self, key: u64) -> Option<&V> {
        let mask = self.slots.len() - 1;
        let mut slot = (mix_bits_64(key) as usize) & mask;
        let mut i = 1;
        loop {
            match &self.slots[slot] {
                Some((k, v)) if *k == key => return Some(v),
                Some(_) => {
                    slot = (slot + i) & mask;
                    i += 1;
                }
                None => return None,
            }
        }
    }

    /// Iterates over `(key, &value)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &V)> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref().map(|(k, v)| (*k, v)))
    }

    fn grow(&mut self) {
        let doubled = self.slots.len() * 2;
        let old = std::mem::replace(&mut self.slots, (0..doubled).map(|_| None).collect());
        self.members = 0;
        for entry in old.into_iter().flatten() {
            self.put(entry.0, entry.1);
        }
    }
}

/// Open-addressing map from strings to values with owned keys.
///
/// Hashes with DJB2 followed by a 32-bit mix, probes linearly, and doubles
/// when half full.
#[derive(Debug, Clone)]
pub struct StrMap<V> {
    slots: Vec<Option<(String, V)>>,
    members: usize,
}

fn djb2(key: &str) -> u32 {
    let mut hash: u32 = 5381;
    for byte in key.bytes() {
        hash = hash.wrapping_shl(5).wrapping_add(hash).wrapping_add(byte as u32);
    }
    hash
}

impl<V> StrMap<V> {
    /// Creates a map with capacity for at least `size` entries before the
    /// first rehash.
    pub fn new(size: usize) -> Self {
        Self {
            slots: (0..next_power_of_2(size * 2)).map(|_| None).collect(),
            members: 0,
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.members
    }

    /// Returns `true` if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.members == 0
    }

    fn slot_of(&self, key: &str) -> usize {
        (mix_bits_32(djb2(key)) as usize) & (self.slots.len() - 1)
    }

    /// Inserts or replaces the value for `key`, copying the key.
    pub fn put(&mut self, key: &str, value: V) {
        if self.members >= self.slots.len() / 2 {
            let doubled = self.slots.len() * 2;
            let old = std::mem::replace(&mut self.slots, (0..doubled).map(|_| None).collect());
            self.members = 0;
            for (k, v) in old.into_iter().flatten() {
                self.put_owned(k, v);
            }
        }
        self.put_owned(key.to_owned(), value);
    }

    fn put_owned(&mut self, key: String, value: V) {
        let mask = self.slots.len() - 1;
        let mut slot = self.slot_of(&key);
        loop {
            match &self.slots[slot] {
                Some((k, _)) if *k == key => {
                    self.slots[slot] = Some((key, value));
                    return;
                }
                Some(_) => slot = (slot + 1) & mask,
                None => {
                    self.slots[slot] = Some((key, value));
                    self.members += 1;
                    return;
                }
            }
        }
    }

    /// Looks up the value for `key`.
    pub fn get(&self, key: &str) -> Option<&V> {
        let mask = self.slots.len() - 1;
        let mut slot = self.slot_of(key);
        loop {
            match &self.slots[slot] {
                Some((k, v)) if k == key => return Some(v),
                Some(_) => slot = (slot + 1) & mask,
                None => return None,
            }
        }
    }

    /// Iterates over `(&key, &value)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref().map(|(k, v)| (k.as_str(), v)))
    }
}

/// Map from `u64` keys to values with SplitMix64 mixing, an occupancy
/// bitmap, and a single-entry lookup cache.
///
/// The cache remembers the last key looked up or inserted, including
/// negative lookups, so repeated queries for the same key skip probing.
#[derive(Debug, Clone)]
pub struct IntMap<V> {
    keys: Vec<u64>,
    values: Vec<Option<V>>,
    mask: Vec<u64>,
    members: usize,
    cache: Option<(u64, Option<usize>)>,
}

impl<V> IntMap<V> {
    /// Creates a map with capacity for at least `size` entries before the
    /// first rehash.
    pub fn new(size: usize) -> Self {
        let n = next_power_of_2(size * 2);
        Self {
            keys: vec![0; n],
            values: (0..n).map(|_| None).collect(),
            mask: vec![0; n.div_ceil(64)],
            members: 0,
            cache: None,
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.members
    }

    /// Returns `true` if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.members == 0
    }

    #[inline]
    fn occupied(&self, slot: usize) -> bool {
        self.mask[slot / 64] & (1u64 << (slot % 64)) != 0
    }

    /// Inserts or replaces the value for `key`.
    pub fn put(&mut self, key: u64, value: V) {
        if self.members >= self.keys.len() / 2 {
            self.grow();
        }

        let size = self.keys.len();
        let mut slot = (mix_bits_64(key) as usize) & (size - 1);
        loop {
            if !self.occupied(slot) {
                self.keys[slot] = key;
                self.values[slot] = Some(value);
                self.mask[slot / 64] |= 1u64 << (slot % 64);
                self.members += 1;
                break;
            } else if self.keys[slot] == key {
                self.values[slot] = Some(value);
                break;
            }
            slot = (slot + 1) & (size - 1);
        }
        self.cache = Some((key, Some(slot)));
    }

    /// Looks up the value for `key`, consulting the lookup cache first.
    pub fn get(&mut self, key: u64) -> Option<&V> {
        if self.members > 0 {
            if let Some((ck, cslot)) = self.cache {
                if ck == key {
                    return cslot.and_then(|s| self.values[s].as_ref());
                }
            }
        }

        let size = self.keys.len();
        let mut slot = (mix_bits_64(key) as usize) & (size - 1);
        loop {
            if !self.occupied(slot) {
                self.cache = Some((key, None));
                return None;
            } else if self.keys[slot] == key {
                self.cache = Some((key, Some(slot)));
                return self.values[slot].as_ref();
            }
            slot = (slot + 1) & (size - 1);
        }
    }

    fn grow(&mut self) {
        let new_size = self.keys.len() * 2;
        let old_keys = std::mem::replace(&mut self.keys, vec![0; new_size]);
        let old_values = std::mem::replace(
            &mut self.values,
            (0..new_size).map(|_| None).collect(),
        );
        let old_mask = std::mem::replace(&mut self.mask, vec![0; new_size.div_ceil(64)]);
        self.members = 0;
        self.cache = None;

        for (i, value) in old_values.into_iter().enumerate() {
            if old_mask[i / 64] & (1u64 << (i % 64)) != 0 {
                if let Some(v) = value {
                    self.put(old_keys[i], v);
                }
            }
        }
    }
}

struct ChainNode<V> {
    key: u64,
    value: V,
    chain: AtomicPtr<ChainNode<V>>,
}

/// Lock-free map from 64-bit keys to values with per-slot chains.
///
/// The slot array is sized at construction and never resized. Readers use
/// acquire loads and never block; writers insert at chain tails with a
/// compare-and-swap and never block readers. Entries are never removed, so
/// a reference obtained from [`get`](Self::get) stays valid for the map's
/// lifetime. Insertion is first-writer-wins.
pub struct ConcurrentMap<V> {
    slots: Box<[AtomicPtr<ChainNode<V>>]>,
    members: AtomicUsize,
}

impl<V> ConcurrentMap<V> {
    /// Creates a map with the given fixed slot count (rounded up to a power
    /// of two).
    pub fn new(size: usize) -> Self {
        let n = next_power_of_2(size);
        Self {
            slots: (0..n).map(|_| AtomicPtr::new(ptr::null_mut())).collect(),
            members: AtomicUsize::new(0),
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.members.load(Ordering::Acquire)
    }

    /// Returns `true` if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts `value` for `key` if absent, returning a reference to the
    /// stored value. If another writer races on the same key, the first
    /// insertion wins and the losing value is dropped.
    pub fn insert(&self, key: u64, value: V) -> &V {
        let slot = (mix_bits_64(key) as usize) & (self.slots.len() - 1);

        let node = Box::into_raw(Box::new(ChainNode {
            key,
            value,
            chain: AtomicPtr::new(ptr::null_mut()),
        }));

        let mut link = &self.slots[slot];
        loop {
            let head = link.load(Ordering::Acquire);
            if head.is_null() {
                match link.compare_exchange(
                    ptr::null_mut(),
                    node,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => {
                        self.members.fetch_add(1, Ordering::AcqRel);
                        // SAFETY: the node was just published and is never
                        // freed until the map is dropped.
                        return unsafe { &(*node).value };
                    }
                    Err(_) => continue,
                }
            }
            // SAFETY: published nodes are never freed until the map drops,
            // so `head` stays valid for the borrow of `self`.
            let existing = unsafe { &*head };
            if existing.key == key {
                // SAFETY: `node` was created above and never published.
                drop(unsafe { Box::from_raw(node) });
                return &existing.value;
            }
            link = &existing.chain;
        }
    }

    /// Looks up the value for `key` without blocking.
    pub fn get(&self, key: u64) -> Option<&V> {
        let slot = (mix_bits_64(key) as usize) & (self.slots.len() - 1);
        let mut current = self.slots[slot].load(Ordering::Acquire);
        while !current.is_null() {
            // SAFETY: published nodes are never freed until the map drops.
            let node = unsafe { &*current };
            if node.key == key {
                return Some(&node.value);
            }
            current = node.chain.load(Ordering::Acquire);
        }
        None
    }

    /// Calls `f` for every entry in unspecified order.
    pub fn for_each(&self, mut f: impl FnMut(u64, &V)) {
        for slot in self.slots.iter() {
            let mut current = slot.load(Ordering::Acquire);
            while !current.is_null() {
                // SAFETY: published nodes are never freed until the map drops.
                let node = unsafe { &*current };
                f(node.key, &node.value);
                current = node.chain.load(Ordering::Acquire);
            }
        }
    }
}

impl<V> Drop for ConcurrentMap<V> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            let mut current = *slot.get_mut();
            while !current.is_null() {
                // SAFETY: we have exclusive access in drop; every published
                // node was created with Box::into_raw and freed exactly once.
                let node = unsafe { Box::from_raw(current) };
                current = node.chain.load(Ordering::Relaxed);
            }
        }
    }
}

// SAFETY: all shared mutation goes through atomics; values are only ever
// read through shared references once published.
unsafe impl<V: Send + Sync> Send for ConcurrentMap<V> {}
unsafe impl<V: Send + Sync> Sync for ConcurrentMap<V> {}
