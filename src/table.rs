//! ChainTable: bucket array of chain heads over a slot arena of entries.
//!
//! Chains are singly linked through arena keys rather than pointers, so
//! growth relinks entries without moving or reallocating them, and a
//! splice during removal can never leave a dangling link.

use crate::config::TableConfig;
use crate::error::TableError;
use crate::hash::KeyHash;
use crate::value::{copy_bytes, Ownership, Stored};
use slotmap::{new_key_type, SlotMap};
use std::collections::TryReserveError;
use tracing::{debug, trace};

new_key_type! {
    struct EntryKey;
}

#[derive(Debug)]
struct Entry<'v> {
    key: Box<[u8]>,
    value: Stored<'v>,
    hash: u64,
    next: Option<EntryKey>,
}

/// Separate-chaining hash table over byte keys.
///
/// Values are held according to the [`Ownership`] chosen at insert; see
/// [`crate::value`]. Borrowed values must outlive the table (`'v`).
/// Dropping the table releases every entry exactly once.
pub struct ChainTable<'v> {
    buckets: Vec<Option<EntryKey>>,
    entries: SlotMap<EntryKey, Entry<'v>>,
    growth_factor: usize,
    load_factor: f64,
    hasher: Box<dyn KeyHash>,
}

#[inline]
fn bucket_index(hash: u64, capacity: usize) -> usize {
    (hash % capacity as u64) as usize
}

fn alloc_buckets(capacity: usize) -> Result<Vec<Option<EntryKey>>, TryReserveError> {
    let mut buckets = Vec::new();
    buckets.try_reserve_exact(capacity)?;
    buckets.resize(capacity, None);
    Ok(buckets)
}

impl<'v> ChainTable<'v> {
    /// Table with the default capacity, growth policy and SDBM hashing.
    pub fn new() -> Result<Self, TableError> {
        TableConfig::new().build()
    }

    pub(crate) fn from_config(config: TableConfig) -> Result<Self, TableError> {
        config.validate()?;
        let buckets = alloc_buckets(config.capacity)?;
        Ok(Self {
            buckets,
            entries: SlotMap::with_key(),
            growth_factor: config.growth_factor,
            load_factor: config.load_factor,
            hasher: config.hasher,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn matches(&self, k: EntryKey, hash: u64, key: &[u8]) -> bool {
        let e = &self.entries[k];
        e.hash == hash && *e.key == *key
    }

    fn find_entry(&self, hash: u64, key: &[u8]) -> Option<EntryKey> {
        let mut cur = self.buckets[bucket_index(hash, self.buckets.len())];
        while let Some(k) = cur {
            if self.matches(k, hash, key) {
                return Some(k);
            }
            cur = self.entries[k].next;
        }
        None
    }

    /// Stored bytes for `key`, or `None` if absent.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let hash = self.hasher.hash_key(key);
        self.find_entry(hash, key).map(|k| self.entries[k].value.bytes())
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        let hash = self.hasher.hash_key(key);
        self.find_entry(hash, key).is_some()
    }

    /// Append `k` to the tail of its chain in `buckets`.
    fn place(
        buckets: &mut [Option<EntryKey>],
        entries: &mut SlotMap<EntryKey, Entry<'v>>,
        k: EntryKey,
    ) {
        debug_assert!(entries[k].next.is_none());
        let idx = bucket_index(entries[k].hash, buckets.len());
        match buckets[idx] {
            None => buckets[idx] = Some(k),
            Some(mut tail) => {
                while let Some(next) = entries[tail].next {
                    tail = next;
                }
                entries[tail].next = Some(k);
            }
        }
    }

    fn needs_growth(&self) -> bool {
        (self.len() + 1) as f64 > self.buckets.len() as f64 * self.load_factor
    }

    /// Relink every entry into a bucket array `growth_factor` times larger.
    /// On allocation failure the table is left as it was.
    fn grow(&mut self) -> Result<(), TableError> {
        let old_cap = self.buckets.len();
        let new_cap = old_cap.saturating_mul(self.growth_factor);
        let mut buckets = alloc_buckets(new_cap)?;

        for head in self.buckets.iter() {
            let mut cur = *head;
            while let Some(k) = cur {
                cur = self.entries[k].next.take();
                Self::place(&mut buckets, &mut self.entries, k);
            }
        }

        self.buckets = buckets;
        debug!(old_cap, new_cap, len = self.len(), "grew bucket array");
        Ok(())
    }

    /// Insert `key` unless it is already present; never overwrites.
    ///
    /// May grow the bucket array first. Errors leave every existing entry
    /// in place; a custom value is not released when its insert fails.
    pub fn insert(&mut self, key: &[u8], value: Ownership<'_, 'v>) -> Result<(), TableError> {
        let hash = self.hasher.hash_key(key);
        if self.find_entry(hash, key).is_some() {
            return Err(TableError::DuplicateKey);
        }

        let key = copy_bytes(key)?;
        if self.needs_growth() {
            self.grow()?;
        }
        let value = value.into_stored()?;

        let k = self.entries.insert(Entry {
            key,
            value,
            hash,
            next: None,
        });
        Self::place(&mut self.buckets, &mut self.entries, k);
        trace!(hash, len = self.len(), "inserted entry");
        Ok(())
    }

    /// Unlink and release the entry for `key`.
    pub fn remove(&mut self, key: &[u8]) -> Result<(), TableError> {
        let hash = self.hasher.hash_key(key);
        let idx = bucket_index(hash, self.buckets.len());
        let head = self.buckets[idx].ok_or(TableError::NotFound)?;

        let found = if self.matches(head, hash, key) {
            self.buckets[idx] = self.entries[head].next;
            head
        } else {
            let mut prev = head;
            loop {
                let Some(cur) = self.entries[prev].next else {
                    return Err(TableError::NotFound);
                };
                if self.matches(cur, hash, key) {
                    self.entries[prev].next = self.entries[cur].next;
                    break cur;
                }
                prev = cur;
            }
        };

        // Structure is consistent before the value's release policy runs.
        let entry = self.entries.remove(found);
        debug_assert!(entry.is_some());
        trace!(hash, len = self.len(), "removed entry");
        drop(entry);
        Ok(())
    }

    /// Replace the hash function. Only allowed while the table is empty,
    /// since existing entries are not rehashed.
    pub fn set_hash_function<H: KeyHash + 'static>(&mut self, hasher: H) -> Result<(), TableError> {
        if !self.is_empty() {
            return Err(TableError::Misuse(
                "hash function can only be replaced on an empty table",
            ));
        }
        self.hasher = Box::new(hasher);
        debug!("replaced hash function");
        Ok(())
    }

    /// Keys of bucket `idx` in chain order.
    #[cfg(test)]
    pub(crate) fn chain_keys(&self, idx: usize) -> Vec<&[u8]> {
        let mut out = Vec::new();
        let mut cur = self.buckets[idx];
        while let Some(k) = cur {
            out.push(&*self.entries[k].key);
            cur = self.entries[k].next;
        }
        out
    }

    /// Bucket index `key` maps to under the current capacity.
    #[cfg(test)]
    pub(crate) fn bucket_of(&self, key: &[u8]) -> usize {
        bucket_index(self.hasher.hash_key(key), self.buckets.len())
    }
}

impl core::fmt::Debug for ChainTable<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChainTable")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("growth_factor", &self.growth_factor)
            .field("load_factor", &self.load_factor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CAPACITY;
    use crate::error::ErrorKind;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Forces "Test", "Test2" and "Test3" into bucket 1 of a default-capacity
    /// table; everything else hashes normally.
    fn colliding_hash(key: &[u8]) -> u64 {
        let cap = DEFAULT_CAPACITY as u64;
        match key {
            b"Test" => 1,
            b"Test2" => 1 + cap,
            b"Test3" => 1 + 2 * cap,
            other => crate::hash::sdbm(other),
        }
    }

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let c = Rc::new(Cell::new(0));
        (c.clone(), c)
    }

    /// Invariant: a stored value is returned unchanged until removal.
    #[test]
    fn insert_then_get() {
        let mut t = ChainTable::new().unwrap();
        t.insert(b"alpha", Ownership::Copy(b"one")).unwrap();
        t.insert(b"beta", Ownership::Copy(b"two")).unwrap();
        assert_eq!(t.get(b"alpha"), Some(&b"one"[..]));
        assert_eq!(t.get(b"beta"), Some(&b"two"[..]));
        assert_eq!(t.get(b"gamma"), None);
        assert_eq!(t.len(), 2);
        assert_eq!(t.capacity(), DEFAULT_CAPACITY);
    }

    /// Invariant: duplicate inserts are rejected and leave the original intact.
    #[test]
    fn duplicate_insert_rejected() {
        let mut t = ChainTable::new().unwrap();
        t.insert(b"dup", Ownership::Copy(b"1")).unwrap();
        match t.insert(b"dup", Ownership::Copy(b"2")) {
            Err(TableError::DuplicateKey) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(b"dup"), Some(&b"1"[..]));
    }

    /// Invariant: a failed custom insert never runs the releaser.
    #[test]
    fn duplicate_custom_insert_not_released() {
        let (calls, c) = counter();
        let mut t = ChainTable::new().unwrap();
        t.insert(b"k", Ownership::Copy(b"v")).unwrap();
        let e = t
            .insert(b"k", Ownership::custom(vec![1u8], move |_| c.set(c.get() + 1)))
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::DuplicateKey);
        assert_eq!(calls.get(), 0);
    }

    /// Invariant: len == inserts - removes.
    #[test]
    fn size_tracks_inserts_and_removes() {
        let mut t = ChainTable::new().unwrap();
        for i in 0..50u32 {
            t.insert(&i.to_le_bytes(), Ownership::Copy(b"x")).unwrap();
        }
        for i in 0..20u32 {
            t.remove(&i.to_le_bytes()).unwrap();
        }
        assert_eq!(t.len(), 30);
        assert!(!t.contains_key(&5u32.to_le_bytes()));
        assert!(t.contains_key(&25u32.to_le_bytes()));
    }

    /// Invariant: growth fires exactly when `len + 1 > capacity * 0.7` and
    /// multiplies the capacity by the growth factor.
    #[test]
    fn growth_threshold_and_factor() {
        let mut t = ChainTable::new().unwrap();
        // 31 * 0.7 = 21.7: the 22nd insert grows.
        for i in 0..21u32 {
            t.insert(&i.to_le_bytes(), Ownership::Copy(b"v")).unwrap();
        }
        assert_eq!(t.capacity(), 31);
        t.insert(&21u32.to_le_bytes(), Ownership::Copy(b"v")).unwrap();
        assert_eq!(t.capacity(), 62);
        // 62 * 0.7 = 43.4: the 44th insert grows again.
        for i in 22..43u32 {
            t.insert(&i.to_le_bytes(), Ownership::Copy(b"v")).unwrap();
        }
        assert_eq!(t.capacity(), 62);
        t.insert(&43u32.to_le_bytes(), Ownership::Copy(b"v")).unwrap();
        assert_eq!(t.capacity(), 124);
    }

    /// Invariant: every live entry survives growth with its value.
    #[test]
    fn growth_preserves_entries() {
        let mut t = ChainTable::new().unwrap();
        for i in 0..500u32 {
            let v = (i * 3).to_le_bytes();
            t.insert(&i.to_le_bytes(), Ownership::Copy(&v)).unwrap();
        }
        assert!(t.capacity() > DEFAULT_CAPACITY);
        for i in 0..500u32 {
            assert_eq!(t.get(&i.to_le_bytes()), Some(&(i * 3).to_le_bytes()[..]));
        }
    }

    /// Invariant: growth relinks entries without releasing custom values.
    #[test]
    fn growth_does_not_release() {
        let (calls, c) = counter();
        let mut t = TableConfig::new().capacity(1).load_factor(1.0).build().unwrap();
        for i in 0..8u8 {
            let c = c.clone();
            t.insert(&[i], Ownership::custom(vec![i], move |_| c.set(c.get() + 1)))
                .unwrap();
        }
        assert_eq!(t.capacity(), 8);
        assert_eq!(calls.get(), 0);
        drop(t);
        assert_eq!(calls.get(), 8);
    }

    /// Invariant: growth can be forced after a single insert via config.
    #[test]
    fn tiny_load_factor_grows_on_first_insert() {
        let mut t = TableConfig::new()
            .capacity(2)
            .growth_factor(3)
            .load_factor(0.1)
            .build()
            .unwrap();
        t.insert(b"a", Ownership::Copy(b"1")).unwrap();
        assert_eq!(t.capacity(), 6);
        assert_eq!(t.get(b"a"), Some(&b"1"[..]));
    }

    /// Invariant: chains keep arrival order within a bucket.
    #[test]
    fn chain_preserves_arrival_order() {
        let mut t = TableConfig::new().hasher(colliding_hash).build().unwrap();
        for k in [&b"Test"[..], b"Test2", b"Test3"] {
            t.insert(k, Ownership::Copy(b"v")).unwrap();
        }
        assert_eq!(t.bucket_of(b"Test2"), 1);
        assert_eq!(
            t.chain_keys(1),
            vec![&b"Test"[..], &b"Test2"[..], &b"Test3"[..]]
        );
    }

    /// Invariant: removing the middle of a chain keeps both neighbours.
    #[test]
    fn remove_mid_chain() {
        let mut t = TableConfig::new().hasher(colliding_hash).build().unwrap();
        t.insert(b"Test", Ownership::Copy(b"1")).unwrap();
        t.insert(b"Test2", Ownership::Copy(b"2")).unwrap();
        t.insert(b"Test3", Ownership::Copy(b"3")).unwrap();

        t.remove(b"Test2").unwrap();
        assert_eq!(t.get(b"Test"), Some(&b"1"[..]));
        assert_eq!(t.get(b"Test3"), Some(&b"3"[..]));
        assert_eq!(t.get(b"Test2"), None);
        assert_eq!(t.remove(b"Test2"), Err(TableError::NotFound));
        assert_eq!(t.chain_keys(1), vec![&b"Test"[..], &b"Test3"[..]]);
        assert_eq!(t.len(), 2);
    }

    /// Invariant: head and tail removal relink the chain correctly.
    #[test]
    fn remove_head_and_tail() {
        let mut t = TableConfig::new().hasher(colliding_hash).build().unwrap();
        for k in [&b"Test"[..], b"Test2", b"Test3"] {
            t.insert(k, Ownership::Copy(k)).unwrap();
        }
        t.remove(b"Test").unwrap();
        assert_eq!(t.chain_keys(1), vec![&b"Test2"[..], &b"Test3"[..]]);
        t.remove(b"Test3").unwrap();
        assert_eq!(t.chain_keys(1), vec![&b"Test2"[..]]);
        t.remove(b"Test2").unwrap();
        assert!(t.chain_keys(1).is_empty());
        assert!(t.is_empty());
    }

    /// Invariant: removal from an empty bucket or exhausted chain is not-found.
    #[test]
    fn remove_absent() {
        let mut t = TableConfig::new().hasher(colliding_hash).build().unwrap();
        assert_eq!(t.remove(b"nothing"), Err(TableError::NotFound));
        t.insert(b"Test", Ownership::Copy(b"1")).unwrap();
        // Same bucket as "Test", not present.
        assert_eq!(t.remove(b"Test3"), Err(TableError::NotFound));
        assert_eq!(t.len(), 1);
    }

    /// Invariant: distinct keys with equal hashes are distinct entries.
    #[test]
    fn equal_hashes_distinct_keys() {
        let mut t = TableConfig::new().hasher(|_: &[u8]| 42u64).build().unwrap();
        t.insert(b"a", Ownership::Copy(b"1")).unwrap();
        t.insert(b"b", Ownership::Copy(b"2")).unwrap();
        assert_eq!(t.get(b"a"), Some(&b"1"[..]));
        assert_eq!(t.get(b"b"), Some(&b"2"[..]));
        t.remove(b"a").unwrap();
        assert!(!t.contains_key(b"a"));
        assert_eq!(t.get(b"b"), Some(&b"2"[..]));
    }

    /// Invariant: the hash function is replaceable only on an empty table.
    #[test]
    fn set_hash_function_requires_empty() {
        let mut t = ChainTable::new().unwrap();
        t.insert(b"k", Ownership::Copy(b"v")).unwrap();
        let before = t.bucket_of(b"k");
        let e = t.set_hash_function(|_: &[u8]| 0u64).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Misuse);
        assert_eq!(t.bucket_of(b"k"), before);
        assert_eq!(t.get(b"k"), Some(&b"v"[..]));

        t.remove(b"k").unwrap();
        t.set_hash_function(|_: &[u8]| 5u64).unwrap();
        t.insert(b"x", Ownership::Copy(b"1")).unwrap();
        t.insert(b"y", Ownership::Copy(b"2")).unwrap();
        assert_eq!(t.bucket_of(b"x"), 5);
        assert_eq!(t.chain_keys(5), vec![&b"x"[..], &b"y"[..]]);
        assert_eq!(t.get(b"y"), Some(&b"2"[..]));
    }

    /// Invariant: a copied value is independent of the caller's buffer.
    #[test]
    fn copy_independent_of_caller_buffer() {
        let mut t = ChainTable::new().unwrap();
        let mut buf = vec![1u8, 2, 3];
        t.insert(b"k", Ownership::Copy(&buf)).unwrap();
        buf.iter_mut().for_each(|b| *b = 0);
        drop(buf);
        assert_eq!(t.get(b"k"), Some(&[1u8, 2, 3][..]));
    }

    /// Invariant: a borrowed value is returned by reference, never copied.
    #[test]
    fn borrowed_value_is_aliased() {
        let data = [9u8; 16];
        let mut t = ChainTable::new().unwrap();
        t.insert(b"k", Ownership::Borrowed(&data)).unwrap();
        assert_eq!(t.get(b"k").map(|v| v.as_ptr()), Some(data.as_ptr()));
        t.remove(b"k").unwrap();
        drop(t);
        assert_eq!(data, [9u8; 16]);
    }

    /// Invariant: custom values are released exactly once at removal.
    #[test]
    fn custom_released_once_on_remove() {
        let (calls, c) = counter();
        let mut t = ChainTable::new().unwrap();
        t.insert(b"k", Ownership::custom(vec![1u8, 2], move |_| c.set(c.get() + 1)))
            .unwrap();
        assert_eq!(t.get(b"k"), Some(&[1u8, 2][..]));
        t.remove(b"k").unwrap();
        assert_eq!(calls.get(), 1);
        drop(t);
        assert_eq!(calls.get(), 1);
    }

    /// Invariant: dropping the table releases each custom value exactly once.
    #[test]
    fn teardown_releases_each_custom_once() {
        let (calls, c) = counter();
        let mut t = ChainTable::new().unwrap();
        for i in 0..100u32 {
            let c = c.clone();
            t.insert(
                &i.to_le_bytes(),
                Ownership::custom(i.to_le_bytes(), move |_| c.set(c.get() + 1)),
            )
            .unwrap();
        }
        for i in 0..10u32 {
            t.remove(&i.to_le_bytes()).unwrap();
        }
        assert_eq!(calls.get(), 10);
        drop(t);
        assert_eq!(calls.get(), 100);
    }

    /// Invariant: a failed growth aborts the insert and leaves the table as
    /// it was; the rejected custom value is never released.
    #[test]
    fn growth_alloc_failure_keeps_table() {
        let (calls, c) = counter();
        let mut t = TableConfig::new()
            .capacity(3)
            .growth_factor(usize::MAX)
            .build()
            .unwrap();
        t.insert(b"a", Ownership::Copy(b"1")).unwrap();
        t.insert(b"b", Ownership::Copy(b"2")).unwrap();

        let e = t
            .insert(b"c", Ownership::custom(vec![3u8], move |_| c.set(c.get() + 1)))
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Alloc);
        assert_eq!(t.capacity(), 3);
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(b"a"), Some(&b"1"[..]));
        assert_eq!(t.get(b"b"), Some(&b"2"[..]));
        assert!(!t.contains_key(b"c"));
        assert_eq!(calls.get(), 0);
        drop(t);
        assert_eq!(calls.get(), 0);
    }

    /// Invariant: init reports an unsatisfiable bucket array as Alloc.
    #[test]
    fn oversized_capacity_is_alloc_error() {
        let e = TableConfig::new().capacity(usize::MAX).build().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Alloc);
    }

    /// Invariant: empty keys and values are ordinary entries.
    #[test]
    fn empty_key_and_value() {
        let mut t = ChainTable::new().unwrap();
        t.insert(b"", Ownership::Copy(b"")).unwrap();
        assert_eq!(t.get(b""), Some(&b""[..]));
        assert!(t.contains_key(b""));
        t.remove(b"").unwrap();
        assert!(t.is_empty());
    }
}
