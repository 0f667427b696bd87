//! Extendible hash table.
//!
//! Maps keys to values in expected O(1) by hashing into a directory whose
//! size doubles on demand. The buffer pool instantiates it as the page
//! table (`PageId` → `FrameId`); the structure is generic so tests and
//! other components can key it differently.
//!
//! ```text
//! global depth g = 2            bucket arena
//! ┌──────────────┐
//! │ dir[00] ──────────▶ bucket 0 (local depth 2) [k0, k4]
//! │ dir[01] ──────────▶ bucket 1 (local depth 1) [k1, k3]
//! │ dir[10] ──────────▶ bucket 2 (local depth 2) [k2]
//! │ dir[11] ──────────▶ bucket 1 (shared: 2^(g-l) = 2 entries)
//! └──────────────┘
//! ```
//!
//! Directory entries are indices into a bucket arena rather than shared
//! pointers; sharing is explicit in the index values, and a split rewires
//! the affected directory entries in place.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};
use std::mem;

use parking_lot::Mutex;

/// One key/value slot, tagged with the key's full hash.
///
/// Keeping the hash in the slot means a split repartitions without
/// rehashing every key.
struct Slot<K, V> {
    hash: u64,
    key: K,
    value: V,
}

/// A bucket holding up to `bucket_size` slots.
///
/// Local depth is the number of low hash bits every key in this bucket
/// agrees on. It only ever grows; buckets never merge.
struct Bucket<K, V> {
    local_depth: u32,
    slots: Vec<Slot<K, V>>,
}

impl<K, V> Bucket<K, V> {
    fn new(local_depth: u32) -> Self {
        Self {
            local_depth,
            slots: Vec::new(),
        }
    }
}

struct Inner<K, V> {
    /// Number of low hash bits used to index the directory.
    global_depth: u32,
    /// Directory of `2^global_depth` entries, each an index into `buckets`.
    directory: Vec<usize>,
    /// Bucket arena. Every arena entry is referenced by the directory.
    buckets: Vec<Bucket<K, V>>,
    /// Total number of live slots.
    len: usize,
}

impl<K, V> Inner<K, V> {
    fn dir_index(&self, hash: u64) -> usize {
        (hash & ((1u64 << self.global_depth) - 1)) as usize
    }

    /// Split the bucket at arena index `old_idx`, using `hash` (any hash
    /// that currently lands in that bucket) to locate the directory
    /// entries pointing at it.
    fn split(&mut self, old_idx: usize, hash: u64) {
        let new_depth = self.buckets[old_idx].local_depth + 1;
        let bit = 1u64 << (new_depth - 1);

        let old_slots = mem::take(&mut self.buckets[old_idx].slots);
        self.buckets[old_idx].local_depth = new_depth;

        let sibling_idx = self.buckets.len();
        self.buckets.push(Bucket::new(new_depth));

        // Partition on the distinguishing bit: set goes to the sibling,
        // clear stays in the old arena slot.
        for slot in old_slots {
            if slot.hash & bit != 0 {
                self.buckets[sibling_idx].slots.push(slot);
            } else {
                self.buckets[old_idx].slots.push(slot);
            }
        }

        // Every directory entry that pointed at the old bucket agrees with
        // `hash` on the low (new_depth - 1) bits; walk them by that stride
        // and rewire according to the distinguishing bit.
        let stride = bit as usize;
        let mut i = (hash as usize) & (stride - 1);
        while i < self.directory.len() {
            self.directory[i] = if i & stride != 0 { sibling_idx } else { old_idx };
            i += stride;
        }
    }
}

/// A dynamically growing hash table with directory doubling.
///
/// All operations are serialized by an internal mutex, so a shared
/// reference suffices and the table is safe to use standalone. When driven
/// from under the buffer pool's latch the inner lock is uncontended.
///
/// # Growth
/// Inserting into a full bucket splits it: slots are repartitioned on the
/// next hash bit and the directory entries that pointed at the old bucket
/// are rewired. When the full bucket already uses every directory bit
/// (`local == global`), the directory doubles first. Deletion never
/// shrinks anything.
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    bucket_size: usize,
    hasher: S,
    inner: Mutex<Inner<K, V>>,
}

impl<K: Hash + Eq, V> ExtendibleHashTable<K, V, RandomState> {
    /// Create a table whose buckets split once they hold `bucket_size`
    /// slots.
    ///
    /// # Panics
    /// Panics if `bucket_size` is 0.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> ExtendibleHashTable<K, V, S> {
    /// Create a table with an explicit hasher.
    pub fn with_hasher(bucket_size: usize, hasher: S) -> Self {
        assert!(bucket_size > 0, "bucket_size must be > 0");

        Self {
            bucket_size,
            hasher,
            inner: Mutex::new(Inner {
                global_depth: 0,
                directory: vec![0],
                buckets: vec![Bucket::new(0)],
                len: 0,
            }),
        }
    }

    fn hash_of(&self, key: &K) -> u64 {
        let mut state = self.hasher.build_hasher();
        key.hash(&mut state);
        state.finish()
    }

    /// Look up the value for `key`.
    pub fn find(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let hash = self.hash_of(key);
        let inner = self.inner.lock();

        let bucket = &inner.buckets[inner.directory[inner.dir_index(hash)]];
        bucket
            .slots
            .iter()
            .find(|slot| slot.hash == hash && slot.key == *key)
            .map(|slot| slot.value.clone())
    }

    /// Remove the entry for `key`. Returns false if it was absent.
    ///
    /// Buckets never merge and local depth never decreases.
    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hash_of(key);
        let mut inner = self.inner.lock();

        let bucket_idx = inner.directory[inner.dir_index(hash)];
        let slots = &mut inner.buckets[bucket_idx].slots;
        match slots
            .iter()
            .position(|slot| slot.hash == hash && slot.key == *key)
        {
            Some(pos) => {
                slots.remove(pos);
                inner.len -= 1;
                true
            }
            None => false,
        }
    }

    /// Insert `key` → `value`, overwriting any existing entry for the key.
    ///
    /// Splits the target bucket (doubling the directory when needed) until
    /// it has room. A bucket whose occupants all share the inserting key's
    /// full 64-bit hash cannot be separated by any split; such a bucket is
    /// allowed to exceed `bucket_size` instead of splitting forever.
    pub fn insert(&self, key: K, value: V) {
        let hash = self.hash_of(&key);
        let mut inner = self.inner.lock();

        let mut bucket_idx = inner.directory[inner.dir_index(hash)];
        if let Some(slot) = inner.buckets[bucket_idx]
            .slots
            .iter_mut()
            .find(|slot| slot.hash == hash && slot.key == key)
        {
            slot.value = value;
            return;
        }

        while inner.buckets[bucket_idx].slots.len() >= self.bucket_size {
            if inner.buckets[bucket_idx]
                .slots
                .iter()
                .all(|slot| slot.hash == hash)
            {
                break;
            }

            if inner.buckets[bucket_idx].local_depth == inner.global_depth {
                // Double the directory: entry i + 2^g aliases entry i, so
                // every existing bucket keeps its 2^(g-l) references.
                let entries = inner.directory.len();
                for i in 0..entries {
                    let target = inner.directory[i];
                    inner.directory.push(target);
                }
                inner.global_depth += 1;
            }

            inner.split(bucket_idx, hash);
            bucket_idx = inner.directory[inner.dir_index(hash)];
        }

        inner.buckets[bucket_idx].slots.push(Slot { hash, key, value });
        inner.len += 1;
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    /// True if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of low hash bits used to index the directory.
    pub fn global_depth(&self) -> u32 {
        self.inner.lock().global_depth
    }

    /// Local depth of the bucket behind directory entry `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of directory bounds.
    pub fn local_depth(&self, index: usize) -> u32 {
        let inner = self.inner.lock();
        inner.buckets[inner.directory[index]].local_depth
    }

    /// Number of directory entries (`2^global_depth`).
    pub fn directory_size(&self) -> usize {
        self.inner.lock().directory.len()
    }

    /// Number of distinct buckets.
    pub fn bucket_count(&self) -> usize {
        self.inner.lock().buckets.len()
    }

    /// Verify the structural invariants. Test-only.
    #[cfg(test)]
    fn assert_invariants(&self) {
        let inner = self.inner.lock();

        assert_eq!(inner.directory.len(), 1usize << inner.global_depth);

        let mut refs = vec![0usize; inner.buckets.len()];
        for (i, &bucket_idx) in inner.directory.iter().enumerate() {
            let local = inner.buckets[bucket_idx].local_depth;
            assert!(local <= inner.global_depth);

            // Entries agreeing on the low `local` bits share the bucket
            let mask = (1usize << local) - 1;
            assert_eq!(
                inner.directory[i & mask], bucket_idx,
                "entries agreeing on low bits must share a bucket"
            );
            refs[bucket_idx] += 1;
        }

        for (bucket_idx, bucket) in inner.buckets.iter().enumerate() {
            assert_eq!(
                refs[bucket_idx],
                1usize << (inner.global_depth - bucket.local_depth),
                "bucket must be referenced by exactly 2^(g-l) entries"
            );
        }

        let total: usize = inner.buckets.iter().map(|b| b.slots.len()).sum();
        assert_eq!(total, inner.len);
    }
}
