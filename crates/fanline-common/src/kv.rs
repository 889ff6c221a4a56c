//! Injectable key-value state store
//!
//! Per-user quota state (rate-limit windows, usage metrics) lives behind
//! this trait so the enforcement logic never touches a concrete map. The
//! default [`MemoryStore`] is process-local; a deployment that needs
//! cross-instance quotas swaps in a distributed implementation without
//! changing any caller.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Keyed state store with an atomic compare-and-swap primitive
pub trait KeyValueStore<V>: Send + Sync
where
    V: Clone + PartialEq + Send + Sync,
{
    /// Read the value for `key`, if present
    fn get(&self, key: &str) -> Option<V>;

    /// Unconditionally write the value for `key`
    fn set(&self, key: &str, value: V);

    /// Atomically replace the current value with `value`, but only when the
    /// current value equals `expected` (`None` means "insert only if
    /// absent"). Returns whether the swap happened. Check-then-update
    /// sequences must loop on this rather than `get` + `set`.
    fn compare_and_swap(&self, key: &str, expected: Option<&V>, value: V) -> bool;

    /// Drop any state held for `key`
    fn remove(&self, key: &str);
}

/// Default in-process store: a concurrent map with per-key entry locking.
///
/// Each instance enforces its own independent view of the state; there is no
/// cross-instance coordination.
pub struct MemoryStore<V> {
    entries: DashMap<String, V>,
}

impl<V> MemoryStore<V> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of keys currently held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> KeyValueStore<V> for MemoryStore<V>
where
    V: Clone + PartialEq + Send + Sync,
{
    fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    fn set(&self, key: &str, value: V) {
        self.entries.insert(key.to_string(), value);
    }

    fn compare_and_swap(&self, key: &str, expected: Option<&V>, value: V) -> bool {
        match self.entries.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                if expected.is_none() {
                    slot.insert(value);
                    true
                } else {
                    false
                }
            }
            Entry::Occupied(mut slot) => match expected {
                Some(exp) if slot.get() == exp => {
                    slot.insert(value);
                    true
                }
                _ => false,
            },
        }
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}
