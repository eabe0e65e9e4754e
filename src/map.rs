use crate::error::BuildError;
use crate::raw::{self, Tuning};
use seize::{Collector, Guard, LocalGuard, OwnedGuard};

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;

/// A concurrent, non-blocking hash table.
///
/// Most hash table operations require a [`Guard`](crate::Guard), which can be acquired through
/// [`HashMap::guard`] or using the [`HashMap::pin`] API. See the [crate-level documentation](crate#usage)
/// for details.
pub struct HashMap<K, V, S = RandomState> {
    raw: raw::HashMap<K, V, S>,
}

/// A builder for a [`HashMap`].
///
/// # Examples
///
/// ```rust
/// use nbhm::HashMap;
/// use seize::Collector;
/// use std::collections::hash_map::RandomState;
///
/// let map: HashMap<i32, i32> = HashMap::builder()
///     // Set the initial capacity.
///     .capacity(2048)
///     // Set the hasher.
///     .hasher(RandomState::new())
///     // Resize once three quarters of the key slots are claimed.
///     .load_factor(0.75)
///     // Copy 32 slots at a time while resizing.
///     .copy_chunk(32)
///     // Set a custom garbage collector.
///     .collector(Collector::new().batch_size(128))
///     // Construct the hash map.
///     .build();
/// ```
pub struct HashMapBuilder<K, V, S = RandomState> {
    hasher: S,
    capacity: usize,
    collector: Collector,
    tuning: Tuning,
    _kv: PhantomData<(K, V)>,
}

// Tables are never larger than this many entries.
const MAX_CAPACITY: usize = (isize::MAX as usize) >> 6;

impl<K, V> HashMapBuilder<K, V> {
    /// Set the hash builder used to hash keys.
    ///
    /// Warning: `hash_builder` is normally randomly generated, and is designed
    /// to allow HashMaps to be resistant to attacks that cause many collisions
    /// and very poor performance. Setting it manually using this function can
    /// expose a DoS attack vector.
    ///
    /// The `hash_builder` passed should implement the [`BuildHasher`] trait for
    /// the HashMap to be useful, see its documentation for details.
    pub fn hasher<S>(self, hasher: S) -> HashMapBuilder<K, V, S> {
        HashMapBuilder {
            hasher,
            capacity: self.capacity,
            collector: self.collector,
            tuning: self.tuning,
            _kv: PhantomData,
        }
    }
}

impl<K, V, S> HashMapBuilder<K, V, S> {
    /// Set the initial capacity of the map.
    ///
    /// The map should be able to hold at least `capacity` elements before resizing.
    /// However, the capacity is an estimate, and the map may prematurely resize due
    /// to poor hash distribution.
    pub fn capacity(self, capacity: usize) -> HashMapBuilder<K, V, S> {
        HashMapBuilder { capacity, ..self }
    }

    /// Set the constant part of the reprobe limit.
    ///
    /// An operation gives up on a table after probing `base + len / 4` slots, or every
    /// slot for small tables. Writers then force a resize, and readers continue in the
    /// table being resized into. Defaults to 10.
    pub fn reprobe_limit(mut self, base: usize) -> HashMapBuilder<K, V, S> {
        self.tuning.reprobe_base = base;
        self
    }

    /// Set the fraction of key slots that may be claimed before a table is resized.
    ///
    /// Must be in `(0, 1]`. Defaults to `0.75`.
    pub fn load_factor(mut self, load_factor: f64) -> HashMapBuilder<K, V, S> {
        self.tuning.load_factor = load_factor;
        self
    }

    /// Set the factor by which the number of live entries is scaled when sizing
    /// a new table.
    ///
    /// Must be at least 2. Defaults to 2.
    pub fn growth_factor(mut self, growth_factor: usize) -> HashMapBuilder<K, V, S> {
        self.tuning.growth_factor = growth_factor;
        self
    }

    /// Set the number of slots a thread claims at once when helping with a resize.
    ///
    /// Smaller chunks spread the copy across more writers, larger chunks make each
    /// writer that runs into a resize do more of it. Must be non-zero. Defaults to 64.
    pub fn copy_chunk(mut self, chunk: usize) -> HashMapBuilder<K, V, S> {
        self.tuning.copy_chunk = chunk;
        self
    }

    /// Set the [`seize::Collector`] used for garbage collection.
    ///
    /// This method may be useful when you want more control over garbage collection.
    ///
    /// Note that all `Guard` references used to access the map must be produced by
    /// the provided `collector`.
    pub fn collector(self, collector: Collector) -> HashMapBuilder<K, V, S> {
        HashMapBuilder { collector, ..self }
    }

    /// Construct a [`HashMap`] from the builder, returning an error if the
    /// configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::{BuildError, HashMap};
    ///
    /// let result = HashMap::<i32, i32>::builder().load_factor(1.5).try_build();
    /// assert_eq!(result.err(), Some(BuildError::LoadFactor(1.5)));
    /// ```
    pub fn try_build(self) -> Result<HashMap<K, V, S>, BuildError> {
        let tuning = self.tuning;

        if !(tuning.load_factor > 0.0 && tuning.load_factor <= 1.0) {
            return Err(BuildError::LoadFactor(tuning.load_factor));
        }

        if tuning.growth_factor < 2 {
            return Err(BuildError::GrowthFactor(tuning.growth_factor));
        }

        if tuning.copy_chunk == 0 {
            return Err(BuildError::CopyChunk);
        }

        if tuning.reprobe_base == 0 {
            return Err(BuildError::ReprobeLimit);
        }

        if self.capacity > MAX_CAPACITY {
            return Err(BuildError::Capacity(self.capacity));
        }

        Ok(HashMap {
            raw: raw::HashMap::new(self.capacity, self.hasher, self.collector, tuning),
        })
    }

    /// Construct a [`HashMap`] from the builder, using the configured options.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid, see [`HashMapBuilder::try_build`].
    pub fn build(self) -> HashMap<K, V, S> {
        match self.try_build() {
            Ok(map) => map,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<K, V, S> fmt::Debug for HashMapBuilder<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashMapBuilder")
            .field("capacity", &self.capacity)
            .field("collector", &self.collector)
            .field("tuning", &self.tuning)
            .finish()
    }
}

impl<K, V> HashMap<K, V> {
    /// Creates an empty `HashMap`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    /// let map: HashMap<&str, i32> = HashMap::new();
    /// ```
    pub fn new() -> HashMap<K, V> {
        HashMap::with_capacity_and_hasher(0, RandomState::new())
    }

    /// Creates an empty `HashMap` with the specified capacity.
    ///
    /// The map should be able to hold at least `capacity` elements before resizing.
    /// However, the capacity is an estimate, and the map may prematurely resize due
    /// to poor hash distribution.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    /// let map: HashMap<&str, i32> = HashMap::with_capacity(10);
    /// ```
    pub fn with_capacity(capacity: usize) -> HashMap<K, V> {
        HashMap::with_capacity_and_hasher(capacity, RandomState::new())
    }

    /// Returns a builder for a `HashMap`.
    ///
    /// The builder can be used for more complex configuration, such as using
    /// a custom [`Collector`], or tuning how the map resizes.
    pub fn builder() -> HashMapBuilder<K, V> {
        HashMapBuilder {
            capacity: 0,
            hasher: RandomState::default(),
            collector: Collector::new(),
            tuning: Tuning::default(),
            _kv: PhantomData,
        }
    }
}

impl<K, V, S> Default for HashMap<K, V, S>
where
    S: Default,
{
    fn default() -> Self {
        HashMap::with_hasher(S::default())
    }
}

impl<K, V, S> HashMap<K, V, S> {
    /// Creates an empty `HashMap` which will use the given hash builder to hash
    /// keys.
    ///
    /// Warning: `hash_builder` is normally randomly generated, and is designed
    /// to allow HashMaps to be resistant to attacks that cause many collisions
    /// and very poor performance. Setting it manually using this function can
    /// expose a DoS attack vector.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    /// use std::collections::hash_map::RandomState;
    ///
    /// let s = RandomState::new();
    /// let map = HashMap::with_hasher(s);
    /// map.pin().insert(1, 2);
    /// ```
    pub fn with_hasher(hash_builder: S) -> HashMap<K, V, S> {
        HashMap::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates an empty `HashMap` with at least the specified capacity, using
    /// `hash_builder` to hash the keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    /// use std::collections::hash_map::RandomState;
    ///
    /// let s = RandomState::new();
    /// let map = HashMap::with_capacity_and_hasher(10, s);
    /// map.pin().insert(1, 2);
    /// ```
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> HashMap<K, V, S> {
        HashMap {
            raw: raw::HashMap::new(
                capacity,
                hash_builder,
                Collector::default(),
                Tuning::default(),
            ),
        }
    }

    /// Returns a pinned reference to the map.
    ///
    /// The returned reference manages a guard internally, preventing garbage collection
    /// for as long as it is held. See the [crate-level documentation](crate#usage) for details.
    #[inline]
    pub fn pin(&self) -> HashMapRef<'_, K, V, S, LocalGuard<'_>> {
        HashMapRef {
            guard: self.guard(),
            map: self,
        }
    }

    /// Returns a pinned reference to the map.
    ///
    /// Unlike [`HashMap::pin`], the returned reference implements `Send` and `Sync`,
    /// allowing it to be held across `.await` points in work-stealing schedulers.
    /// This is especially useful for iterators.
    ///
    /// The returned reference manages a guard internally, preventing garbage collection
    /// for as long as it is held. See the [crate-level documentation](crate#usage) for details.
    #[inline]
    pub fn pin_owned(&self) -> HashMapRef<'_, K, V, S, OwnedGuard<'_>> {
        HashMapRef {
            guard: self.owned_guard(),
            map: self,
        }
    }

    /// Returns a guard for use with this map.
    ///
    /// Note that holding on to a guard prevents garbage collection.
    /// See the [crate-level documentation](crate#usage) for details.
    #[inline]
    pub fn guard(&self) -> LocalGuard<'_> {
        self.raw.guard()
    }

    /// Returns an owned guard for use with this map.
    ///
    /// Owned guards implement `Send` and `Sync`, allowing them to be held across
    /// `.await` points in work-stealing schedulers. This is especially useful
    /// for iterators.
    ///
    /// Note that holding on to a guard prevents garbage collection.
    /// See the [crate-level documentation](crate#usage) for details.
    #[inline]
    pub fn owned_guard(&self) -> OwnedGuard<'_> {
        self.raw.owned_guard()
    }

    /// Returns a reference to the map's [`BuildHasher`].
    #[inline]
    pub fn hasher(&self) -> &S {
        &self.raw.hasher
    }

    /// Returns the number of entries in the map.
    ///
    /// The count is exact when no other thread is modifying the map, and an
    /// estimate otherwise.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    ///
    /// let map = HashMap::new();
    ///
    /// map.pin().insert(1, "a");
    /// map.pin().insert(2, "b");
    /// assert!(map.len() == 2);
    /// ```
    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the map is empty. Otherwise returns `false`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    ///
    /// let map = HashMap::new();
    /// assert!(map.is_empty());
    /// map.pin().insert("a", 1);
    /// assert!(!map.is_empty());
    /// ```
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of slots in the map's newest table.
    ///
    /// This is always a power of two, and grows as the map is resized. While a
    /// resize is in progress, some entries may still live in older, smaller tables.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.raw.capacity(&self.guard())
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// The key may be any borrowed form of the map's key type, but
    /// [`Hash`] and [`Eq`] on the borrowed form *must* match those for
    /// the key type.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    ///
    /// let map = HashMap::new();
    /// map.pin().insert(1, "a");
    /// assert_eq!(map.pin().contains_key(&1), true);
    /// assert_eq!(map.pin().contains_key(&2), false);
    /// ```
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q, guard: &impl Guard) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key, guard).is_some()
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    ///
    /// let map = HashMap::new();
    /// map.pin().insert(1, "a");
    /// assert_eq!(map.pin().get(&1), Some(&"a"));
    /// assert_eq!(map.pin().get(&2), None);
    /// ```
    #[inline]
    pub fn get<'g, Q>(&self, key: &Q, guard: &'g impl Guard) -> Option<&'g V>
    where
        K: Borrow<Q> + 'g,
        Q: Hash + Eq + ?Sized,
    {
        self.raw.verify(guard);
        self.raw.get(key, guard).map(|(_, v)| v)
    }

    /// Returns the key-value pair corresponding to the supplied key.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    ///
    /// let map = HashMap::new();
    /// map.pin().insert(1, "a");
    /// assert_eq!(map.pin().get_key_value(&1), Some((&1, &"a")));
    /// assert_eq!(map.pin().get_key_value(&2), None);
    /// ```
    #[inline]
    pub fn get_key_value<'g, Q>(&self, key: &Q, guard: &'g impl Guard) -> Option<(&'g K, &'g V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.raw.verify(guard);
        self.raw.get(key, guard)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map did not have this key present, [`None`] is returned.
    ///
    /// If the map did have this key present, the value is updated, and the old
    /// value is returned. The key is not updated.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    ///
    /// let map = HashMap::new();
    /// assert_eq!(map.pin().insert(37, "a"), None);
    /// assert_eq!(map.pin().is_empty(), false);
    ///
    /// map.pin().insert(37, "b");
    /// assert_eq!(map.pin().insert(37, "c"), Some(&"b"));
    /// assert_eq!(map.pin()[&37], "c");
    /// ```
    #[inline]
    pub fn insert<'g>(&self, key: K, value: V, guard: &'g impl Guard) -> Option<&'g V> {
        self.raw.verify(guard);
        self.raw.insert(key, value, guard)
    }

    /// Inserts a key-value pair into the map, unless the key already has a value.
    ///
    /// Returns [`None`] if the value was inserted, or a reference to the current
    /// value if there was one, in which case the map is left unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    ///
    /// let map = HashMap::new();
    /// assert_eq!(map.pin().insert_if_absent(1, "a"), None);
    /// assert_eq!(map.pin().insert_if_absent(1, "b"), Some(&"a"));
    /// assert_eq!(map.pin().get(&1), Some(&"a"));
    /// ```
    #[inline]
    pub fn insert_if_absent<'g>(&self, key: K, value: V, guard: &'g impl Guard) -> Option<&'g V> {
        self.raw.verify(guard);
        self.raw.insert_if_absent(key, value, guard)
    }

    /// Replaces the value of a key that is already present in the map.
    ///
    /// Returns the previous value, or [`None`] if the key was not present,
    /// in which case the map is left unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    ///
    /// let map = HashMap::new();
    /// assert_eq!(map.pin().replace(&1, "a"), None);
    /// assert!(map.pin().is_empty());
    ///
    /// map.pin().insert(1, "a");
    /// assert_eq!(map.pin().replace(&1, "b"), Some(&"a"));
    /// ```
    #[inline]
    pub fn replace<'g, Q>(&self, key: &Q, value: V, guard: &'g impl Guard) -> Option<&'g V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.raw.verify(guard);
        self.raw.replace(key, value, guard)
    }

    /// Replaces the value of a key only if it is currently equal to `current`.
    ///
    /// Returns `true` if the value was replaced.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    ///
    /// let map = HashMap::new();
    /// map.pin().insert(1, "a");
    /// assert!(!map.pin().compare_and_replace(&1, &"b", "c"));
    /// assert!(map.pin().compare_and_replace(&1, &"a", "c"));
    /// assert_eq!(map.pin().get(&1), Some(&"c"));
    /// ```
    #[inline]
    pub fn compare_and_replace<Q>(&self, key: &Q, current: &V, value: V, guard: &impl Guard) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: PartialEq,
    {
        self.raw.verify(guard);
        self.raw.compare_and_replace(key, current, value, guard)
    }

    /// Removes a key from the map, returning the value at the key if the key
    /// was previously in the map.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    ///
    /// let map = HashMap::new();
    /// map.pin().insert(1, "a");
    /// assert_eq!(map.pin().remove(&1), Some(&"a"));
    /// assert_eq!(map.pin().remove(&1), None);
    /// ```
    #[inline]
    pub fn remove<'g, Q>(&self, key: &Q, guard: &'g impl Guard) -> Option<&'g V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.raw.verify(guard);
        self.raw.remove(key, guard)
    }

    /// Removes a key from the map only if its value is currently equal to `current`.
    ///
    /// Returns `true` if the key was removed.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    ///
    /// let map = HashMap::new();
    /// map.pin().insert(1, "a");
    /// assert!(!map.pin().compare_and_remove(&1, &"b"));
    /// assert!(map.pin().compare_and_remove(&1, &"a"));
    /// assert!(map.pin().is_empty());
    /// ```
    #[inline]
    pub fn compare_and_remove<Q>(&self, key: &Q, current: &V, guard: &impl Guard) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: PartialEq,
    {
        self.raw.verify(guard);
        self.raw.compare_and_remove(key, current, guard)
    }

    /// Returns `true` if any key in the map currently maps to `value`.
    ///
    /// This walks the entire map.
    #[inline]
    pub fn contains_value(&self, value: &V, guard: &impl Guard) -> bool
    where
        V: PartialEq,
    {
        self.iter(guard).any(|(_, v)| v == value)
    }

    /// Clears the map, removing all key-value pairs.
    ///
    /// Keys inserted concurrently with the call may survive it.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    ///
    /// let map = HashMap::new();
    ///
    /// map.pin().insert(1, "a");
    /// map.pin().clear();
    /// assert!(map.pin().is_empty());
    /// ```
    #[inline]
    pub fn clear(&self, guard: &impl Guard) {
        self.raw.verify(guard);
        self.raw.clear(guard)
    }

    /// An iterator visiting all key-value pairs in arbitrary order.
    /// The iterator element type is `(&K, &V)`.
    ///
    /// Iteration is weakly consistent: every entry that is present for the entire
    /// walk is yielded exactly once, entries inserted or removed concurrently may
    /// or may not be.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    ///
    /// let map = HashMap::from([
    ///     ("a", 1),
    ///     ("b", 2),
    ///     ("c", 3),
    /// ]);
    ///
    /// for (key, val) in map.pin().iter() {
    ///     println!("key: {key} val: {val}");
    /// }
    /// ```
    #[inline]
    pub fn iter<'g, G>(&'g self, guard: &'g G) -> Iter<'g, K, V, S, G>
    where
        G: Guard,
    {
        self.raw.verify(guard);

        Iter {
            raw: self.raw.iter(guard),
        }
    }

    /// An iterator visiting all keys in arbitrary order.
    /// The iterator element type is `&K`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    ///
    /// let map = HashMap::from([
    ///     ("a", 1),
    ///     ("b", 2),
    ///     ("c", 3),
    /// ]);
    ///
    /// for key in map.pin().keys() {
    ///     println!("{key}");
    /// }
    /// ```
    #[inline]
    pub fn keys<'g, G>(&'g self, guard: &'g G) -> Keys<'g, K, V, S, G>
    where
        G: Guard,
    {
        Keys {
            iter: self.iter(guard),
        }
    }

    /// An iterator visiting all values in arbitrary order.
    /// The iterator element type is `&V`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbhm::HashMap;
    ///
    /// let map = HashMap::from([
    ///     ("a", 1),
    ///     ("b", 2),
    ///     ("c", 3),
    /// ]);
    ///
    /// for value in map.pin().values() {
    ///     println!("{value}");
    /// }
    /// ```
    #[inline]
    pub fn values<'g, G>(&'g self, guard: &'g G) -> Values<'g, K, V, S, G>
    where
        G: Guard,
    {
        Values {
            iter: self.iter(guard),
        }
    }
}

impl<K, V, S> PartialEq for HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }

        let (guard1, guard2) = (&self.guard(), &other.guard());

        let mut iter = self.iter(guard1);
        iter.all(|(key, value)| other.get(key, guard2).is_some_and(|v| *value == *v))
    }
}

impl<K, V, S> Eq for HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, S> fmt::Debug for HashMap<K, V, S>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.guard();
        f.debug_map().entries(self.iter(&guard)).finish()
    }
}

impl<K, V, S> fmt::Display for HashMap<K, V, S>
where
    K: Hash + Eq + Clone + fmt::Display,
    V: fmt::Display,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.guard();
        display_entries(self.iter(&guard), f)
    }
}

// Writes entries as `{k1=v1, k2=v2}`.
fn display_entries<'a, K, V>(
    entries: impl Iterator<Item = (&'a K, &'a V)>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result
where
    K: fmt::Display + 'a,
    V: fmt::Display + 'a,
{
    f.write_str("{")?;

    for (i, (key, value)) in entries.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }

        write!(f, "{key}={value}")?;
    }

    f.write_str("}")
}

impl<K, V, S> Extend<(K, V)> for &HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        let guard = self.guard();

        for (key, value) in iter {
            self.insert(key, value, &guard);
        }
    }
}

impl<'a, K, V, S> Extend<(&'a K, &'a V)> for &HashMap<K, V, S>
where
    K: Copy + Hash + Eq + 'a,
    V: Copy + 'a,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (&'a K, &'a V)>>(&mut self, iter: T) {
        self.extend(iter.into_iter().map(|(&key, &value)| (key, value)));
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for HashMap<K, V, RandomState>
where
    K: Hash + Eq + Clone,
{
    fn from(arr: [(K, V); N]) -> Self {
        HashMap::from_iter(arr)
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();

        let map = HashMap::with_capacity_and_hasher(lower, S::default());

        // `insert` returns references to values that were replaced and retired,
        // so we need a real guard.
        {
            let map = map.pin();
            for (key, value) in iter {
                map.insert(key, value);
            }
        }

        map
    }
}

impl<K, V, S> Clone for HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    fn clone(&self) -> HashMap<K, V, S> {
        let tuning = self.raw.tuning();

        let other = HashMap::builder()
            .capacity(self.len())
            .hasher(self.raw.hasher.clone())
            .reprobe_limit(tuning.reprobe_base)
            .load_factor(tuning.load_factor)
            .growth_factor(tuning.growth_factor)
            .copy_chunk(tuning.copy_chunk)
            .build();

        {
            let (guard1, guard2) = (&self.guard(), &other.guard());
            for (key, value) in self.iter(guard1) {
                other.insert(key.clone(), value.clone(), guard2);
            }
        }

        other
    }
}

/// A pinned reference to a [`HashMap`].
///
/// This type is created with [`HashMap::pin`] and can be used to easily access a [`HashMap`]
/// without explicitly managing a guard. See the [crate-level documentation](crate#usage) for details.
pub struct HashMapRef<'map, K, V, S, G> {
    guard: G,
    map: &'map HashMap<K, V, S>,
}

impl<'map, K, V, S, G> HashMapRef<'map, K, V, S, G>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
    G: Guard,
{
    /// Returns a reference to the inner [`HashMap`].
    #[inline]
    pub fn map(&self) -> &'map HashMap<K, V, S> {
        self.map
    }

    /// Returns the number of entries in the map.
    ///
    /// See [`HashMap::len`] for details.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.raw.len()
    }

    /// Returns `true` if the map is empty. Otherwise returns `false`.
    ///
    /// See [`HashMap::is_empty`] for details.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of slots in the map's newest table.
    ///
    /// See [`HashMap::capacity`] for details.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.map.raw.capacity(&self.guard)
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// See [`HashMap::contains_key`] for details.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// See [`HashMap::get`] for details.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.raw.get(key, &self.guard).map(|(_, v)| v)
    }

    /// Returns the key-value pair corresponding to the supplied key.
    ///
    /// See [`HashMap::get_key_value`] for details.
    #[inline]
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.raw.get(key, &self.guard)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// See [`HashMap::insert`] for details.
    #[inline]
    pub fn insert(&self, key: K, value: V) -> Option<&V> {
        self.map.raw.insert(key, value, &self.guard)
    }

    /// Inserts a key-value pair into the map, unless the key already has a value.
    ///
    /// See [`HashMap::insert_if_absent`] for details.
    #[inline]
    pub fn insert_if_absent(&self, key: K, value: V) -> Option<&V> {
        self.map.raw.insert_if_absent(key, value, &self.guard)
    }

    /// Replaces the value of a key that is already present in the map.
    ///
    /// See [`HashMap::replace`] for details.
    #[inline]
    pub fn replace<Q>(&self, key: &Q, value: V) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.raw.replace(key, value, &self.guard)
    }

    /// Replaces the value of a key only if it is currently equal to `current`.
    ///
    /// See [`HashMap::compare_and_replace`] for details.
    #[inline]
    pub fn compare_and_replace<Q>(&self, key: &Q, current: &V, value: V) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: PartialEq,
    {
        self.map
            .raw
            .compare_and_replace(key, current, value, &self.guard)
    }

    /// Removes a key from the map, returning the value at the key if the key
    /// was previously in the map.
    ///
    /// See [`HashMap::remove`] for details.
    #[inline]
    pub fn remove<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.raw.remove(key, &self.guard)
    }

    /// Removes a key from the map only if its value is currently equal to `current`.
    ///
    /// See [`HashMap::compare_and_remove`] for details.
    #[inline]
    pub fn compare_and_remove<Q>(&self, key: &Q, current: &V) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: PartialEq,
    {
        self.map.raw.compare_and_remove(key, current, &self.guard)
    }

    /// Returns `true` if any key in the map currently maps to `value`.
    ///
    /// See [`HashMap::contains_value`] for details.
    #[inline]
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.iter().any(|(_, v)| v == value)
    }

    /// Clears the map, removing all key-value pairs.
    ///
    /// See [`HashMap::clear`] for details.
    #[inline]
    pub fn clear(&self) {
        self.map.raw.clear(&self.guard)
    }

    /// An iterator visiting all key-value pairs in arbitrary order.
    /// The iterator element type is `(&K, &V)`.
    ///
    /// See [`HashMap::iter`] for details.
    #[inline]
    pub fn iter(&self) -> Iter<'_, K, V, S, G> {
        Iter {
            raw: self.map.raw.iter(&self.guard),
        }
    }

    /// An iterator visiting all keys in arbitrary order.
    /// The iterator element type is `&K`.
    ///
    /// See [`HashMap::keys`] for details.
    #[inline]
    pub fn keys(&self) -> Keys<'_, K, V, S, G> {
        Keys { iter: self.iter() }
    }

    /// An iterator visiting all values in arbitrary order.
    /// The iterator element type is `&V`.
    ///
    /// See [`HashMap::values`] for details.
    #[inline]
    pub fn values(&self) -> Values<'_, K, V, S, G> {
        Values { iter: self.iter() }
    }
}

impl<K, V, S, G, Q> std::ops::Index<&Q> for HashMapRef<'_, K, V, S, G>
where
    K: Hash + Eq + Clone + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    S: BuildHasher,
    G: Guard,
{
    type Output = V;

    #[inline]
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("no entry found for key")
    }
}

impl<K, V, S, G> fmt::Debug for HashMapRef<'_, K, V, S, G>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
    G: Guard,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S, G> fmt::Display for HashMapRef<'_, K, V, S, G>
where
    K: Hash + Eq + Clone + fmt::Display,
    V: fmt::Display,
    S: BuildHasher,
    G: Guard,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_entries(self.iter(), f)
    }
}

impl<'a, K, V, S, G> IntoIterator for &'a HashMapRef<'_, K, V, S, G>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
    G: Guard,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, S, G>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over a map's entries.
///
/// This struct is created by the [`iter`](HashMap::iter) method on [`HashMap`]. See its documentation for details.
pub struct Iter<'g, K, V, S, G> {
    raw: raw::Iter<'g, K, V, S, G>,
}

impl<'g, K: 'g, V: 'g, S, G> Iterator for Iter<'g, K, V, S, G>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
    G: Guard,
{
    type Item = (&'g K, &'g V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.raw.next()
    }
}

impl<K, V, S, G> fmt::Debug for Iter<'_, K, V, S, G>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
    G: Guard,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(Iter {
                raw: self.raw.clone(),
            })
            .finish()
    }
}

/// An iterator over a map's keys.
///
/// This struct is created by the [`keys`](HashMap::keys) method on [`HashMap`]. See its documentation for details.
pub struct Keys<'g, K, V, S, G> {
    iter: Iter<'g, K, V, S, G>,
}

impl<'g, K: 'g, V: 'g, S, G> Iterator for Keys<'g, K, V, S, G>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
    G: Guard,
{
    type Item = &'g K;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let (key, _) = self.iter.next()?;
        Some(key)
    }
}

impl<K, V, S, G> fmt::Debug for Keys<'_, K, V, S, G>
where
    K: Hash + Eq + Clone + fmt::Debug,
    S: BuildHasher,
    G: Guard,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(Keys {
                iter: Iter {
                    raw: self.iter.raw.clone(),
                },
            })
            .finish()
    }
}

/// An iterator over a map's values.
///
/// This struct is created by the [`values`](HashMap::values) method on [`HashMap`]. See its documentation for details.
pub struct Values<'g, K, V, S, G> {
    iter: Iter<'g, K, V, S, G>,
}

impl<'g, K: 'g, V: 'g, S, G> Iterator for Values<'g, K, V, S, G>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
    G: Guard,
{
    type Item = &'g V;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let (_, value) = self.iter.next()?;
        Some(value)
    }
}

impl<K, V, S, G> fmt::Debug for Values<'_, K, V, S, G>
where
    K: Hash + Eq + Clone,
    V: fmt::Debug,
    S: BuildHasher,
    G: Guard,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(Values {
                iter: Iter {
                    raw: self.iter.raw.clone(),
                },
            })
            .finish()
    }
}
