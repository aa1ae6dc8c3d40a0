//! Memory tier: a capacity-bounded LRU cache that delegates to a
//! backing store on miss.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{RunResult, Store, StoreError};

const NIL: usize = usize::MAX;

/// An in-memory LRU cache in front of a backing [`Store`]. `save` writes
/// through; `load` promotes misses into the cache. All list and map
/// mutations are serialized under one mutex.
pub struct LruStore<S> {
    cap: usize,
    back: S,
    inner: Mutex<LruList>,
}

/// Doubly-linked recency list over slab indices. Each node carries its
/// key so eviction can remove the map entry without scanning.
#[derive(Default)]
struct LruList {
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    index: HashMap<String, usize>,
}

struct Node {
    key: String,
    result: RunResult,
    prev: usize,
    next: usize,
}

impl<S: Store> LruStore<S> {
    /// Creates an LRU cache with the given capacity delegating to `back`.
    /// Capacity is clamped to at least 1.
    pub fn new(cap: usize, back: S) -> Self {
        LruStore {
            cap: cap.max(1),
            back,
            inner: Mutex::new(LruList {
                head: NIL,
                tail: NIL,
                ..LruList::default()
            }),
        }
    }

    fn insert_front(&self, list: &mut LruList, result: RunResult) {
        let key = result.id.clone();
        if let Some(&at) = list.index.get(&key) {
            list.nodes[at].result = result;
            list.move_to_front(at);
            return;
        }

        let at = match list.free.pop() {
            Some(at) => {
                list.nodes[at] = Node {
                    key: key.clone(),
                    result,
                    prev: NIL,
                    next: NIL,
                };
                at
            }
            None => {
                list.nodes.push(Node {
                    key: key.clone(),
                    result,
                    prev: NIL,
                    next: NIL,
                });
                list.nodes.len() - 1
            }
        };
        list.index.insert(key, at);
        list.push_front(at);

        if list.index.len() > self.cap {
            list.evict_tail();
        }
    }
}

impl<S: Store> Store for LruStore<S> {
    /// Inserts or refreshes the cache entry, then always writes through
    /// to the backing store.
    fn save(&self, result: &RunResult) -> Result<(), StoreError> {
        {
            let mut list = self.inner.lock().expect("lru mutex poisoned");
            self.insert_front(&mut list, result.clone());
        }
        self.back.save(result)
    }

    /// Checks the cache first; on miss, loads from the backing store and
    /// promotes. A concurrent load may have inserted the entry in the
    /// meantime; the race resolves by moving the existing node forward.
    fn load(&self, run_id: &str) -> Result<RunResult, StoreError> {
        {
            let mut list = self.inner.lock().expect("lru mutex poisoned");
            if let Some(&at) = list.index.get(run_id) {
                list.move_to_front(at);
                return Ok(list.nodes[at].result.clone());
            }
        }

        let result = self.back.load(run_id)?;

        let mut list = self.inner.lock().expect("lru mutex poisoned");
        self.insert_front(&mut list, result.clone());
        Ok(result)
    }
}

impl LruList {
    fn push_front(&mut self, at: usize) {
        self.nodes[at].prev = NIL;
        self.nodes[at].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = at;
        }
        self.head = at;
        if self.tail == NIL {
            self.tail = at;
        }
    }

    fn unlink(&mut self, at: usize) {
        let (prev, next) = (self.nodes[at].prev, self.nodes[at].next);
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }
        self.nodes[at].prev = NIL;
        self.nodes[at].next = NIL;
    }

    fn move_to_front(&mut self, at: usize) {
        if self.head == at {
            return;
        }
        self.unlink(at);
        self.push_front(at);
    }

    fn evict_tail(&mut self) {
        let at = self.tail;
        if at == NIL {
            return;
        }
        self.unlink(at);
        let key = std::mem::take(&mut self.nodes[at].key);
        self.index.remove(&key);
        self.free.push(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{DiskStore, Kind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backing store that counts loads, to observe cache hits.
    struct CountingStore {
        inner: DiskStore,
        loads: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            CountingStore {
                inner: DiskStore::new(),
                loads: AtomicUsize::new(0),
            }
        }
    }

    impl Store for CountingStore {
        fn save(&self, result: &RunResult) -> Result<(), StoreError> {
            self.inner.save(result)
        }
        fn load(&self, run_id: &str) -> Result<RunResult, StoreError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load(run_id)
        }
    }

    #[test]
    fn save_then_load_hits_cache() {
        let store = LruStore::new(2, CountingStore::new());
        let rr = RunResult::new("a", Kind::Check);
        store.save(&rr).unwrap();

        assert_eq!(store.load("a").unwrap(), rr);
        assert_eq!(store.back.loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn eviction_falls_back_to_disk() {
        let store = LruStore::new(2, CountingStore::new());
        for id in ["a", "b", "c"] {
            store.save(&RunResult::new(id, Kind::Check)).unwrap();
        }

        // "a" was evicted from memory but is still loadable from disk.
        assert_eq!(store.load("a").unwrap().id, "a");
        assert_eq!(store.back.loads.load(Ordering::SeqCst), 1);

        // The promotion put "a" back in the cache.
        assert_eq!(store.load("a").unwrap().id, "a");
        assert_eq!(store.back.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn recently_loaded_entries_survive_eviction() {
        let store = LruStore::new(2, CountingStore::new());
        store.save(&RunResult::new("a", Kind::Check)).unwrap();
        store.save(&RunResult::new("b", Kind::Check)).unwrap();

        // Touch "a" so "b" becomes the eviction candidate.
        store.load("a").unwrap();
        store.save(&RunResult::new("c", Kind::Check)).unwrap();

        store.load("a").unwrap();
        assert_eq!(store.back.loads.load(Ordering::SeqCst), 0);
        store.load("b").unwrap();
        assert_eq!(store.back.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn capacity_clamped_to_one() {
        let store = LruStore::new(0, CountingStore::new());
        store.save(&RunResult::new("a", Kind::Check)).unwrap();
        assert_eq!(store.load("a").unwrap().id, "a");
    }

    #[test]
    fn resave_updates_cached_value() {
        let store = LruStore::new(2, CountingStore::new());
        let mut rr = RunResult::new("a", Kind::Check);
        store.save(&rr).unwrap();
        rr.auto_fixes = 7;
        store.save(&rr).unwrap();
        assert_eq!(store.load("a").unwrap().auto_fixes, 7);
    }
}
