//! Node-local storage engine: the map + LRU + byte-accounting triple (§4.2,
//! §9's design note).
//!
//! `Store` knows nothing about the ring or ownership; the node server checks
//! ownership before calling into it (§4.2's "ownership check... before
//! touching local state"). Entries live in a slab (`Vec<Option<Slot>>`) linked
//! into an intrusive doubly-linked list for O(1) LRU touch/evict, the same
//! shape the `lru` crate and a slab-backed cache use internally — plain
//! `HashMap` + `VecDeque` would make "touch on read" O(n).

use std::collections::HashMap;

/// Fixed per-entry bookkeeping overhead folded into the byte cost (§3).
pub const ENTRY_OVERHEAD_BYTES: u64 = 48;

/// Ceiling on LRU evictions performed within a single `put`, so one oversized
/// write can't be made to walk the entire list (§4.2: "bounded per operation
/// to prevent pathological thrash").
const MAX_EVICTIONS_PER_PUT: usize = 4096;

struct Slot {
    key: String,
    value: Vec<u8>,
    last_access: u64,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Outcome of a `put` against local storage (ownership already checked by the caller).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    Ok,
    OutOfRoom,
}

/// Outcome of a `get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetOutcome {
    Hit(Vec<u8>),
    Miss,
}

/// Outcome of a `delete` (idempotent, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Ok,
    Miss,
}

/// Point-in-time stats snapshot (§4.2 `Stats()`, minus the ring-derived
/// `version`/`status` fields the node server layers on top).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub max_bytes: u64,
    pub used_bytes: u64,
    pub num_objects: u64,
}

/// The node's local cache: one instance per process, guarded by a single
/// `parking_lot::Mutex` at the call site (§4.2 Concurrency).
pub struct Store {
    max_bytes: u64,
    used_bytes: u64,
    slots: Vec<Option<Slot>>,
    free_list: Vec<usize>,
    index: HashMap<String, usize>,
    head: Option<usize>, // most recently used
    tail: Option<usize>, // least recently used
    clock: u64,
}

fn cost(key: &str, value: &[u8]) -> u64 {
    key.len() as u64 + value.len() as u64 + ENTRY_OVERHEAD_BYTES
}

impl Store {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            slots: Vec::new(),
            free_list: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            clock: 0,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    pub fn num_objects(&self) -> u64 {
        self.index.len() as u64
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            max_bytes: self.max_bytes,
            used_bytes: self.used_bytes,
            num_objects: self.num_objects(),
        }
    }

    /// Snapshot of every key currently held, for the migration engine's
    /// post-`ChangeConfig` scan (§4.4). Taken under the same lock as any
    /// other `Store` access, so it reflects one consistent point in time.
    pub fn snapshot_keys(&self) -> Vec<String> {
        self.index.keys().cloned().collect()
    }

    pub fn get(&mut self, key: &str) -> GetOutcome {
        let Some(&idx) = self.index.get(key) else {
            return GetOutcome::Miss;
        };
        self.touch(idx);
        let value = self.slots[idx].as_ref().unwrap().value.clone();
        GetOutcome::Hit(value)
    }

    /// Insert or overwrite `key`. Evicts LRU entries (bounded) to make room;
    /// fails with `OutOfRoom` if the entry can never fit or the ceiling is hit.
    pub fn put(&mut self, key: String, value: Vec<u8>) -> PutOutcome {
        let new_cost = cost(&key, &value);
        if new_cost > self.max_bytes {
            return PutOutcome::OutOfRoom;
        }

        if let Some(&idx) = self.index.get(&key) {
            let old_cost = {
                let slot = self.slots[idx].as_ref().unwrap();
                cost(&slot.key, &slot.value)
            };
            self.used_bytes -= old_cost;
            // Protect `idx` from its own eviction: without this, make_room can
            // pick the very entry being overwritten as the LRU victim, double-
            // subtracting its cost and freeing the slot out from under us.
            if !self.make_room(new_cost, Some(idx)) {
                // Restore accounting for the entry we're about to fail to replace.
                self.used_bytes += old_cost;
                return PutOutcome::OutOfRoom;
            }
            self.used_bytes += new_cost;
            let slot = self.slots[idx].as_mut().unwrap();
            slot.value = value;
            slot.last_access = self.next_tick();
            self.touch(idx);
            return PutOutcome::Ok;
        }

        if !self.make_room(new_cost, None) {
            return PutOutcome::OutOfRoom;
        }

        let idx = self.alloc_slot(Slot {
            key: key.clone(),
            value,
            last_access: self.next_tick(),
            prev: None,
            next: None,
        });
        self.index.insert(key, idx);
        self.used_bytes += new_cost;
        self.push_front(idx);
        PutOutcome::Ok
    }

    pub fn delete(&mut self, key: &str) -> DeleteOutcome {
        let Some(idx) = self.index.remove(key) else {
            return DeleteOutcome::Miss;
        };
        self.detach(idx);
        let slot = self.slots[idx].take().unwrap();
        self.used_bytes -= cost(&slot.key, &slot.value);
        self.free_list.push(idx);
        DeleteOutcome::Ok
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_list.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
        self.used_bytes = 0;
    }

    /// Evict LRU entries until `extra` bytes fit, up to the eviction ceiling.
    /// `protect` excludes a slot (the one being overwritten by the caller)
    /// from eviction, so an overwrite can never evict its own stale entry.
    /// Returns `false` if room could not be made.
    fn make_room(&mut self, extra: u64, protect: Option<usize>) -> bool {
        let mut evictions = 0;
        while self.used_bytes + extra > self.max_bytes {
            let Some(lru_idx) = self.lru_victim(protect) else {
                return false;
            };
            if evictions >= MAX_EVICTIONS_PER_PUT {
                return false;
            }
            let key = self.slots[lru_idx].as_ref().unwrap().key.clone();
            self.index.remove(&key);
            self.detach(lru_idx);
            let slot = self.slots[lru_idx].take().unwrap();
            self.used_bytes -= cost(&slot.key, &slot.value);
            self.free_list.push(lru_idx);
            evictions += 1;
        }
        true
    }

    /// The LRU-most slot that isn't `protect`, walking from the tail.
    fn lru_victim(&self, protect: Option<usize>) -> Option<usize> {
        let mut idx = self.tail;
        while let Some(i) = idx {
            if Some(i) != protect {
                return Some(i);
            }
            idx = self.slots[i].as_ref().unwrap().prev;
        }
        None
    }

    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn alloc_slot(&mut self, slot: Slot) -> usize {
        if let Some(idx) = self.free_list.pop() {
            self.slots[idx] = Some(slot);
            idx
        } else {
            self.slots.push(Some(slot));
            self.slots.len() - 1
        }
    }

    fn touch(&mut self, idx: usize) {
        self.slots[idx].as_mut().unwrap().last_access = self.next_tick();
        if self.head == Some(idx) {
            return;
        }
        self.detach(idx);
        self.push_front(idx);
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let slot = self.slots[idx].as_ref().unwrap();
            (slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.slots[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
        let slot = self.slots[idx].as_mut().unwrap();
        slot.prev = None;
        slot.next = None;
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let slot = self.slots[idx].as_mut().unwrap();
            slot.next = old_head;
            slot.prev = None;
        }
        if let Some(h) = old_head {
            self.slots[h].as_mut().unwrap().prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_basic_put_get() {
        let mut store = Store::new(1 << 20);
        assert_eq!(
            store.put("k".into(), vec![0x01, 0x02, 0x03]),
            PutOutcome::Ok
        );
        assert_eq!(
            store.get("k"),
            GetOutcome::Hit(vec![0x01, 0x02, 0x03])
        );
        assert_eq!(store.num_objects(), 1);
    }

    #[test]
    fn s2_lru_eviction() {
        let mut store = Store::new(100);
        let val = |n| vec![0u8; n];
        assert_eq!(store.put("a".into(), val(39)), PutOutcome::Ok); // cost 40
        assert_eq!(store.put("b".into(), val(39)), PutOutcome::Ok); // cost 40, used=80
        assert!(matches!(store.get("a"), GetOutcome::Hit(_))); // a now MRU
        assert_eq!(store.put("c".into(), val(39)), PutOutcome::Ok); // evicts b
        assert!(matches!(store.get("a"), GetOutcome::Hit(_)));
        assert_eq!(store.get("b"), GetOutcome::Miss);
        assert!(matches!(store.get("c"), GetOutcome::Hit(_)));
    }

    #[test]
    fn delete_then_miss() {
        let mut store = Store::new(1024);
        store.put("k".into(), vec![1, 2, 3]);
        assert_eq!(store.delete("k"), DeleteOutcome::Ok);
        assert_eq!(store.get("k"), GetOutcome::Miss);
        assert_eq!(store.delete("k"), DeleteOutcome::Miss);
    }

    #[test]
    fn clear_zeroes_accounting() {
        let mut store = Store::new(1024);
        store.put("a".into(), vec![1; 10]);
        store.put("b".into(), vec![1; 10]);
        store.clear();
        assert_eq!(store.used_bytes(), 0);
        assert_eq!(store.num_objects(), 0);
        assert_eq!(store.get("a"), GetOutcome::Miss);
    }

    #[test]
    fn oversized_entry_is_out_of_room_not_partial_eviction() {
        let mut store = Store::new(100);
        assert_eq!(store.put("huge".into(), vec![0u8; 200]), PutOutcome::OutOfRoom);
        assert_eq!(store.used_bytes(), 0);
    }

    #[test]
    fn used_bytes_never_exceeds_max_under_many_puts() {
        let mut store = Store::new(1000);
        for i in 0..500 {
            store.put(format!("key-{i}"), vec![0u8; 20]);
            assert!(store.used_bytes() <= store.max_bytes());
        }
    }

    #[test]
    fn overwrite_updates_lru_position_and_accounting() {
        let mut store = Store::new(1000);
        store.put("k".into(), vec![0u8; 10]);
        let used_before = store.used_bytes();
        store.put("k".into(), vec![0u8; 20]);
        assert!(store.used_bytes() > used_before);
        assert_eq!(store.num_objects(), 1);
    }

    #[test]
    fn overwrite_of_the_lru_tail_that_forces_its_own_eviction_does_not_panic() {
        let mut store = Store::new(200);
        assert_eq!(store.put("a".into(), vec![0u8; 50]), PutOutcome::Ok); // cost 99
        assert_eq!(store.used_bytes(), 99);
        assert_eq!(store.put("b".into(), vec![0u8; 40]), PutOutcome::Ok); // cost 89, used=188
        assert_eq!(store.used_bytes(), 188);
        // "a" is the LRU tail at this point; overwriting it with a bigger
        // value forces make_room to evict to fit, and "a" itself is the
        // only other candidate once "b" is gone.
        assert_eq!(store.put("a".into(), vec![0u8; 100]), PutOutcome::Ok); // cost 149
        assert_eq!(store.num_objects(), 1);
        assert_eq!(store.get("a"), GetOutcome::Hit(vec![0u8; 100]));
        assert_eq!(store.used_bytes(), 149);
        assert_eq!(store.get("b"), GetOutcome::Miss);
        assert!(store.used_bytes() <= store.max_bytes());
    }
}
