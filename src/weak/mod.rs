//! Weakly-keyed pair-associative storage for reflective access grants.
//!
//! This module provides [`WeakPairMap`], the backing store for every dynamically-added
//! (reflective) relation in the access-control graph: reads edges, export/open overlays
//! and service-use declarations. The defining property is that recording a fact about a
//! pair of runtime objects must not extend the lifetime of either object - a module that
//! once received a reflective grant must still become collectable, transitively releasing
//! its loader, when nothing else references it.
//!
//! # Design
//!
//! Entries are keyed by the addresses of the two `Arc` allocations and carry [`Weak`]
//! handles to both endpoints. A lookup only counts as a hit when both weak handles still
//! upgrade; a stale entry (either endpoint dropped) behaves as absent and is removed on
//! sight. Address reuse is harmless: if the stored weak still upgrades, the allocation at
//! that address is by definition the original one.
//!
//! There is no reference-queue equivalent to drive eager expunging, so the map sweeps
//! opportunistically - every [`PRUNE_INTERVAL`]-th insert walks the table and drops dead
//! entries - and exposes [`WeakPairMap::prune`] for callers that tear down a whole loader.
//!
//! # Thread Safety
//!
//! All operations support concurrent callers. `put_if_absent` and `compute_if_absent`
//! are atomic per pair via the underlying [`DashMap`] entry API: two racing threads
//! never observe two different values for the same pair.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Weak,
};

use dashmap::{mapref::entry::Entry, DashMap};

/// Number of inserts between opportunistic sweeps of dead entries.
const PRUNE_INTERVAL: usize = 64;

/// One recorded pair plus the value attached to it.
///
/// The weak handles double as liveness witnesses for the raw-address key: an entry is
/// only ever reported to callers after both handles upgraded successfully.
struct PairEntry<A: ?Sized, B: ?Sized, V> {
    first: Weak<A>,
    second: Weak<B>,
    value: V,
}

impl<A: ?Sized, B: ?Sized, V> PairEntry<A, B, V> {
    fn is_live(&self) -> bool {
        self.first.strong_count() > 0 && self.second.strong_count() > 0
    }
}

/// A concurrent map from an ordered pair of reference-identified objects to a value,
/// holding both keys weakly.
///
/// Behaves as a standard map keyed by the ordered pair `(A, B)`, except that an entry is
/// permitted to silently vanish at any time after either key loses its last strong
/// reference outside the table. No operation fails because of this pruning - a vanished
/// entry simply behaves as absent. This makes the map suitable for best-effort overlay
/// state, not for data that must be retained indefinitely.
///
/// Keys are compared by reference identity (`Arc` pointer), never by value. Values are
/// returned by clone; in practice they are markers, flags or `Arc` handles, all cheap.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use modscope::WeakPairMap;
///
/// let map: WeakPairMap<str, str, u32> = WeakPairMap::new();
/// let a: Arc<str> = Arc::from("first");
/// let b: Arc<str> = Arc::from("second");
///
/// assert_eq!(map.put_if_absent(&a, &b, 7), None);
/// assert_eq!(map.get(&a, &b), Some(7));
///
/// // A second insert for the same pair does not replace the value.
/// assert_eq!(map.put_if_absent(&a, &b, 9), Some(7));
/// ```
pub struct WeakPairMap<A: ?Sized, B: ?Sized, V> {
    entries: DashMap<(usize, usize), PairEntry<A, B, V>>,
    inserts: AtomicUsize,
}

impl<A: ?Sized, B: ?Sized, V: Clone> WeakPairMap<A, B, V> {
    /// Create a new empty map.
    #[must_use]
    pub fn new() -> Self {
        WeakPairMap {
            entries: DashMap::new(),
            inserts: AtomicUsize::new(0),
        }
    }

    fn key(first: &Arc<A>, second: &Arc<B>) -> (usize, usize) {
        (
            Arc::as_ptr(first).cast::<()>() as usize,
            Arc::as_ptr(second).cast::<()>() as usize,
        )
    }

    /// Look up the value recorded for the pair `(first, second)`.
    ///
    /// Returns `None` if no value was recorded, or if a recorded entry has gone stale
    /// because either endpoint was dropped. Stale entries are removed on sight.
    ///
    /// # Arguments
    /// * `first`  - First element of the pair
    /// * `second` - Second element of the pair
    pub fn get(&self, first: &Arc<A>, second: &Arc<B>) -> Option<V> {
        let key = Self::key(first, second);
        if let Some(entry) = self.entries.get(&key) {
            if entry.is_live() {
                return Some(entry.value.clone());
            }
        } else {
            return None;
        }

        // Stale - the allocation behind one of the addresses is gone.
        self.entries.remove_if(&key, |_, e| !e.is_live());
        None
    }

    /// Check whether a live value is recorded for the pair `(first, second)`.
    ///
    /// # Arguments
    /// * `first`  - First element of the pair
    /// * `second` - Second element of the pair
    #[must_use]
    pub fn contains_pair(&self, first: &Arc<A>, second: &Arc<B>) -> bool {
        self.get(first, second).is_some()
    }

    /// Record `value` for the pair `(first, second)` unless a live value is already present.
    ///
    /// Returns the previously recorded value, or `None` if the pair was vacant (or stale)
    /// and `value` was inserted. Atomic per pair: of two racing inserts exactly one wins
    /// and the other observes the winner's value.
    ///
    /// # Arguments
    /// * `first`  - First element of the pair
    /// * `second` - Second element of the pair
    /// * `value`  - The value to associate with the pair
    pub fn put_if_absent(&self, first: &Arc<A>, second: &Arc<B>, value: V) -> Option<V> {
        let key = Self::key(first, second);

        // Resolve the entry while holding the shard lock, but defer the opportunistic
        // sweep until the guard is dropped.
        let previous = match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live() {
                    Some(occupied.get().value.clone())
                } else {
                    // The slot belonged to a dead pair whose address got reused.
                    *occupied.get_mut() = PairEntry {
                        first: Arc::downgrade(first),
                        second: Arc::downgrade(second),
                        value,
                    };
                    None
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(PairEntry {
                    first: Arc::downgrade(first),
                    second: Arc::downgrade(second),
                    value,
                });
                None
            }
        };

        if previous.is_none() {
            self.note_insert();
        }
        previous
    }

    /// Return the value recorded for the pair `(first, second)`, inserting the result of
    /// `factory` first if the pair is vacant.
    ///
    /// The factory runs at most once per winning insert; racing callers for the same pair
    /// all receive the single recorded value.
    ///
    /// # Arguments
    /// * `first`   - First element of the pair
    /// * `second`  - Second element of the pair
    /// * `factory` - Producer for the value if the pair is vacant
    pub fn compute_if_absent(
        &self,
        first: &Arc<A>,
        second: &Arc<B>,
        factory: impl FnOnce() -> V,
    ) -> V {
        let key = Self::key(first, second);

        let (value, inserted) = match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live() {
                    (occupied.get().value.clone(), false)
                } else {
                    // The slot belonged to a dead pair whose address got reused.
                    let value = factory();
                    *occupied.get_mut() = PairEntry {
                        first: Arc::downgrade(first),
                        second: Arc::downgrade(second),
                        value: value.clone(),
                    };
                    (value, true)
                }
            }
            Entry::Vacant(vacant) => {
                let value = factory();
                vacant.insert(PairEntry {
                    first: Arc::downgrade(first),
                    second: Arc::downgrade(second),
                    value: value.clone(),
                });
                (value, true)
            }
        };

        if inserted {
            self.note_insert();
        }
        value
    }

    /// Drop every entry whose pair is no longer fully alive.
    ///
    /// Called opportunistically from the insert path and explicitly by callers tearing
    /// down a loader or layer.
    pub fn prune(&self) {
        self.entries.retain(|_, entry| entry.is_live());
    }

    /// Number of entries currently held, including entries that may already be stale.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn note_insert(&self) {
        let count = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if count % PRUNE_INTERVAL == 0 {
            self.prune();
        }
    }
}

impl<A: ?Sized, B: ?Sized, V: Clone> Default for WeakPairMap<A, B, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arcs() -> (Arc<str>, Arc<str>) {
        (Arc::from("alpha"), Arc::from("beta"))
    }

    #[test]
    fn new_map_is_empty() {
        let map: WeakPairMap<str, str, bool> = WeakPairMap::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn get_after_put() {
        let map: WeakPairMap<str, str, u32> = WeakPairMap::new();
        let (a, b) = arcs();

        assert_eq!(map.get(&a, &b), None);
        assert_eq!(map.put_if_absent(&a, &b, 1), None);
        assert_eq!(map.get(&a, &b), Some(1));
        assert!(map.contains_pair(&a, &b));
    }

    #[test]
    fn pair_order_matters() {
        let map: WeakPairMap<str, str, u32> = WeakPairMap::new();
        let (a, b) = arcs();

        map.put_if_absent(&a, &b, 1);
        assert_eq!(map.get(&b, &a), None);
    }

    #[test]
    fn put_if_absent_keeps_first_value() {
        let map: WeakPairMap<str, str, u32> = WeakPairMap::new();
        let (a, b) = arcs();

        assert_eq!(map.put_if_absent(&a, &b, 1), None);
        assert_eq!(map.put_if_absent(&a, &b, 2), Some(1));
        assert_eq!(map.get(&a, &b), Some(1));
    }

    #[test]
    fn compute_if_absent_runs_factory_once() {
        let map: WeakPairMap<str, str, u32> = WeakPairMap::new();
        let (a, b) = arcs();

        assert_eq!(map.compute_if_absent(&a, &b, || 5), 5);
        assert_eq!(map.compute_if_absent(&a, &b, || unreachable!()), 5);
    }

    #[test]
    fn entry_vanishes_when_second_key_dropped() {
        let map: WeakPairMap<str, str, u32> = WeakPairMap::new();
        let a: Arc<str> = Arc::from("keep");
        let b: Arc<str> = Arc::from("drop");
        let b_weak = Arc::downgrade(&b);

        map.put_if_absent(&a, &b, 3);
        drop(b);

        assert!(b_weak.upgrade().is_none(), "map must not pin the key");
        let resurrected: Arc<str> = Arc::from("drop");
        assert_eq!(map.get(&a, &resurrected), None);
    }

    #[test]
    fn prune_drops_dead_entries() {
        let map: WeakPairMap<str, str, u32> = WeakPairMap::new();
        let a: Arc<str> = Arc::from("keep");
        {
            let b: Arc<str> = Arc::from("transient");
            map.put_if_absent(&a, &b, 3);
        }
        assert_eq!(map.len(), 1);
        map.prune();
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn concurrent_compute_if_absent_yields_single_value() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let map: Arc<WeakPairMap<str, str, usize>> = Arc::new(WeakPairMap::new());
        let (a, b) = arcs();
        let built = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let map = map.clone();
                let a = a.clone();
                let b = b.clone();
                let built = built.clone();
                std::thread::spawn(move || {
                    map.compute_if_absent(&a, &b, || built.fetch_add(1, Ordering::SeqCst))
                })
            })
            .collect();

        let values: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(values.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }
}
