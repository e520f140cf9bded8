use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Error;

/// One entry in the recency list. Slots are arena-allocated and linked by
/// index; `prev` points toward the most-recent end.
#[derive(Debug)]
struct Slot {
    key: String,
    value: String,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
struct Inner {
    capacity: usize,
    index: HashMap<String, usize>, // key -> slot position
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>, // most recently used
    tail: Option<usize>, // least recently used
}

/// Thread-safe Least Recently Used (LRU) cache with fixed capacity.
///
/// - Stores string key-value pairs with O(1) get/put/eviction.
/// - Evicts exactly one least recently used entry when capacity is exceeded.
/// - Safe for concurrent access via a single mutex on internal state; a `get`
///   that returns a value also guarantees the entry is observed as most
///   recently used by operations starting after it completes.
#[derive(Debug)]
pub struct LruStore {
    inner: Mutex<Inner>,
}

impl LruStore {
    /// Create a store with a fixed positive capacity.
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity(capacity));
        }
        Ok(Self {
            inner: Mutex::new(Inner {
                capacity,
                index: HashMap::with_capacity(capacity),
                slots: Vec::with_capacity(capacity),
                free: Vec::new(),
                head: None,
                tail: None,
            }),
        })
    }

    /// Get a value by key, marking the entry as most recently used on hit.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let pos = *inner.index.get(key)?;
        inner.move_to_front(pos);
        Some(inner.slots[pos].value.clone())
    }

    /// Insert or overwrite a key, moving it to the most-recent position.
    ///
    /// Inserting a new key into a full store evicts the least recently used
    /// entry. Cannot fail.
    pub fn put(&self, key: &str, value: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(&pos) = inner.index.get(key) {
            inner.slots[pos].value = value.to_string();
            inner.move_to_front(pos);
            return;
        }

        let pos = inner.alloc(key.to_string(), value.to_string());
        inner.attach_front(pos);
        inner.index.insert(key.to_string(), pos);
        inner.evict_if_needed();
    }

    /// Current number of entries stored.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.index.len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The fixed capacity the store was created with.
    pub fn capacity(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.capacity
    }

    /// Returns keys ordered from most-recent (front) to least-recent (back).
    ///
    /// Intended for observability and tests.
    pub fn keys_by_recency(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = Vec::with_capacity(inner.index.len());
        let mut current = inner.head;
        while let Some(pos) = current {
            out.push(inner.slots[pos].key.clone());
            current = inner.slots[pos].next;
        }
        out
    }
}

impl Inner {
    fn alloc(&mut self, key: String, value: String) -> usize {
        match self.free.pop() {
            Some(pos) => {
                self.slots[pos] = Slot {
                    key,
                    value,
                    prev: None,
                    next: None,
                };
                pos
            }
            None => {
                self.slots.push(Slot {
                    key,
                    value,
                    prev: None,
                    next: None,
                });
                self.slots.len() - 1
            }
        }
    }

    fn move_to_front(&mut self, pos: usize) {
        if self.head == Some(pos) {
            return;
        }
        self.detach(pos);
        self.attach_front(pos);
    }

    fn detach(&mut self, pos: usize) {
        let prev = self.slots[pos].prev.take();
        let next = self.slots[pos].next.take();

        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
    }

    fn attach_front(&mut self, pos: usize) {
        self.slots[pos].prev = None;
        self.slots[pos].next = self.head;

        if let Some(old_head) = self.head {
            self.slots[old_head].prev = Some(pos);
        }
        self.head = Some(pos);

        if self.tail.is_none() {
            self.tail = Some(pos);
        }
    }

    fn evict_if_needed(&mut self) {
        if self.index.len() <= self.capacity {
            return;
        }
        if let Some(pos) = self.tail {
            self.detach(pos);
            let key = std::mem::take(&mut self.slots[pos].key);
            self.slots[pos].value.clear();
            self.index.remove(&key);
            self.free.push(pos);
        }
    }
}
