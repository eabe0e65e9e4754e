mod alloc;
mod probe;
mod slot;
mod utils;

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use seize::{reclaim, Collector, Guard, LocalGuard, OwnedGuard};

use self::alloc::{RawTable, State, Table};
use self::probe::Probe;
use self::slot::{Key, Status, Value};
use self::utils::{Counter, StrictProvenance};

/// A lock-free hash-table.
pub struct HashMap<K, V, S> {
    /// A pointer to the root table.
    table: AtomicPtr<RawTable>,

    /// Collector for memory reclamation.
    collector: Collector,

    /// The number of live entries in the map.
    count: Counter,

    /// Resize and probing parameters.
    tuning: Tuning,

    /// Hasher for keys.
    pub hasher: S,

    _kv: PhantomData<(K, V)>,
}

// Safety: keys and values are shared across threads through the map, and may be
// dropped by any thread that holds a guard.
unsafe impl<K: Send + Sync, V: Send + Sync, S: Send> Send for HashMap<K, V, S> {}
unsafe impl<K: Send + Sync, V: Send + Sync, S: Sync> Sync for HashMap<K, V, S> {}

/// Probing and resize parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tuning {
    /// The constant part of the reprobe limit.
    pub reprobe_base: usize,

    /// The fraction of key cells that may be claimed before a table is overloaded.
    pub load_factor: f64,

    /// The factor by which live entries are scaled to size a successor table.
    pub growth_factor: usize,

    /// The number of slots claimed at once by a copier.
    pub copy_chunk: usize,
}

impl Default for Tuning {
    fn default() -> Tuning {
        Tuning {
            reprobe_base: 10,
            load_factor: 0.75,
            growth_factor: 2,
            copy_chunk: 64,
        }
    }
}

// A precondition for a write.
enum Expect<'a, V> {
    // Write unconditionally.
    Any,

    // Write only if the key has no live value.
    Absent,

    // Write only if the key has a live value.
    Present,

    // Write only if the live value matches.
    Matches(&'a dyn Fn(&V) -> bool),
}

// The raw result of a write.
enum Outcome<V> {
    // The write was applied, replacing the given live value, if any.
    Applied(Option<*mut Value<V>>),

    // The precondition failed against the given live value, if any.
    Rejected(Option<*mut Value<V>>),
}

// Probe lengths past which a fresh key claim checks whether the table is overloaded.
const OVERLOAD_PROBE: usize = 8;

impl<K, V, S> HashMap<K, V, S> {
    /// Creates new hash-table with the given options.
    pub fn new(capacity: usize, hasher: S, collector: Collector, tuning: Tuning) -> HashMap<K, V, S> {
        let len = probe::entries_for(capacity);
        let table = Table::<K, V>::alloc(len, tuning.reprobe_base, tuning.load_factor);
        table.state().status.store(State::PROMOTED, Ordering::Relaxed);

        HashMap {
            table: AtomicPtr::new(table.raw),
            collector,
            count: Counter::default(),
            tuning,
            hasher,
            _kv: PhantomData,
        }
    }

    /// Returns a guard for this collector.
    #[inline]
    pub fn guard(&self) -> LocalGuard<'_> {
        self.collector.enter()
    }

    /// Returns an owned guard for this collector.
    #[inline]
    pub fn owned_guard(&self) -> OwnedGuard<'_> {
        self.collector.enter_owned()
    }

    /// Verify a guard is valid to use with this map.
    #[inline]
    pub fn verify(&self, guard: &impl Guard) {
        assert_eq!(
            *guard.collector(),
            self.collector,
            "Attempted to access map with incorrect guard"
        );
    }

    /// Returns the resize parameters.
    #[inline]
    pub fn tuning(&self) -> Tuning {
        self.tuning
    }

    /// Returns the number of live entries in the map.
    #[inline]
    pub fn len(&self) -> usize {
        self.count.sum()
    }

    /// Returns the length of the newest table in the migration chain.
    #[inline]
    pub fn capacity(&self, guard: &impl Guard) -> usize {
        let mut table = self.root(guard);

        // Pending tables are only freed after the root they hang off of, so they
        // stay valid for as long as the guard protects the root.
        while let Some(next) = table.next_table() {
            table = next;
        }

        table.len()
    }

    // Returns the root table.
    #[inline]
    fn root(&self, guard: &impl Guard) -> Table<K, V> {
        let raw = guard.protect(&self.table, Ordering::Acquire);

        // Safety: The root table is always a valid table allocation.
        unsafe { Table::from_raw(raw) }
    }

    // Returns `true` if the table is the current root.
    #[inline]
    fn is_root(&self, table: Table<K, V>) -> bool {
        self.table.load(Ordering::Acquire) == table.raw
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    /// Returns the entry for the given key.
    #[inline]
    pub fn get<'g, Q>(&self, key: &Q, guard: &'g impl Guard) -> Option<(&'g K, &'g V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);
        self.find(self.root(guard), hash, key, guard)
    }

    /// Maps the key to the value, returning the previous value.
    #[inline]
    pub fn insert<'g>(&self, key: K, value: V, guard: &'g impl Guard) -> Option<&'g V> {
        let hash = self.hasher.hash_one(&key);
        let new = Value::boxed(value);

        match self.write(hash, &key, Some(&key), new, Expect::Any, guard) {
            Outcome::Applied(previous) => previous.map(|p| unsafe { &(*p).value }),
            Outcome::Rejected(_) => unreachable!("unconditional write was rejected"),
        }
    }

    /// Maps the key to the value if it has no live value, returning the current value otherwise.
    #[inline]
    pub fn insert_if_absent<'g>(&self, key: K, value: V, guard: &'g impl Guard) -> Option<&'g V> {
        let hash = self.hasher.hash_one(&key);
        let new = Value::boxed(value);

        match self.write(hash, &key, Some(&key), new, Expect::Absent, guard) {
            Outcome::Applied(_) => None,
            Outcome::Rejected(current) => {
                // Safety: We never published the value.
                drop(unsafe { Box::from_raw(new) });
                current.map(|p| unsafe { &(*p).value })
            }
        }
    }

    /// Replaces the value of a present key, returning the previous value.
    #[inline]
    pub fn replace<'g, Q>(&self, key: &Q, value: V, guard: &'g impl Guard) -> Option<&'g V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);
        let new = Value::boxed(value);

        match self.write(hash, key, None, new, Expect::Present, guard) {
            Outcome::Applied(previous) => previous.map(|p| unsafe { &(*p).value }),
            Outcome::Rejected(_) => {
                drop(unsafe { Box::from_raw(new) });
                None
            }
        }
    }

    /// Replaces the value of a key only if it is currently equal to `current`.
    #[inline]
    pub fn compare_and_replace<Q>(&self, key: &Q, current: &V, value: V, guard: &impl Guard) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: PartialEq,
    {
        let hash = self.hasher.hash_one(key);
        let new = Value::boxed(value);
        let matches = |found: &V| found == current;

        match self.write(hash, key, None, new, Expect::Matches(&matches), guard) {
            Outcome::Applied(_) => true,
            Outcome::Rejected(_) => {
                drop(unsafe { Box::from_raw(new) });
                false
            }
        }
    }

    /// Removes a key, returning its previous value.
    #[inline]
    pub fn remove<'g, Q>(&self, key: &Q, guard: &'g impl Guard) -> Option<&'g V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);

        match self.write(hash, key, None, Value::tombstone(), Expect::Present, guard) {
            Outcome::Applied(previous) => previous.map(|p| unsafe { &(*p).value }),
            Outcome::Rejected(_) => None,
        }
    }

    /// Removes a key only if its value is currently equal to `current`.
    #[inline]
    pub fn compare_and_remove<Q>(&self, key: &Q, current: &V, guard: &impl Guard) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: PartialEq,
    {
        let hash = self.hasher.hash_one(key);
        let matches = |found: &V| found == current;

        matches!(
            self.write(hash, key, None, Value::tombstone(), Expect::Matches(&matches), guard),
            Outcome::Applied(_)
        )
    }

    /// Removes every key that is live when visited.
    pub fn clear(&self, guard: &impl Guard) {
        for (key, _) in self.iter(guard) {
            self.remove(key, guard);
        }
    }

    /// Returns an iterator over the entries of the map.
    #[inline]
    pub fn iter<'g, G>(&'g self, guard: &'g G) -> Iter<'g, K, V, S, G>
    where
        G: Guard,
    {
        Iter {
            i: 0,
            table: self.linearize(guard),
            map: self,
            guard,
        }
    }

    // Returns the entry for the given key, starting at the given table.
    fn find<'g, Q>(
        &self,
        mut table: Table<K, V>,
        hash: u64,
        key: &Q,
        guard: &'g impl Guard,
    ) -> Option<(&'g K, &'g V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        'table: loop {
            let mut probe = Probe::start(hash, table.mask);

            while probe.len < table.limit {
                // Safety: `probe.i` is always in-bounds for the table length.
                let slot = unsafe { table.slot(probe.i) };

                let found = slot.key.load(Ordering::Acquire);

                // Keys are claimed in probe order, so an unclaimed cell ends the search.
                if found.is_null() {
                    return None;
                }

                // Safety: Claimed key cells are never modified, and the table is kept
                // alive by the guard.
                let found: &'g Key<K> = unsafe { &*found };

                if found.hash == hash && <K as Borrow<Q>>::borrow(&found.key) == key {
                    let value = guard.protect(&slot.value, Ordering::Acquire).unpack();

                    match Status::from(value) {
                        // Safety: We performed a protected load of a live value.
                        Status::Live(value) => {
                            return Some((&found.key, unsafe { &(*value).value }))
                        }
                        Status::Empty | Status::Tombstone => return None,
                        // The slot is being migrated, the current value lives in the next table.
                        Status::Frozen(_) | Status::Dead => {
                            table = self.copy_slot_and_next(table, probe.i, guard);
                            continue 'table;
                        }
                    }
                }

                probe.next(table.mask);
            }

            // The probe was exhausted, the key may have been inserted into the next table.
            match table.next_table() {
                Some(next) => table = next,
                None => return None,
            }
        }
    }

    // Writes `new` to the slot of the given key, if `expect` holds.
    //
    // `claim` is the key to insert if no slot exists for it. A tombstone as `new` removes
    // the key. The caller is responsible for freeing `new` if the write is rejected.
    fn write<Q>(
        &self,
        hash: u64,
        key: &Q,
        claim: Option<&K>,
        new: *mut Value<V>,
        expect: Expect<'_, V>,
        guard: &impl Guard,
    ) -> Outcome<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let removing = new == Value::tombstone();
        let mut table = self.root(guard);

        'table: loop {
            let mut probe = Probe::start(hash, table.mask);
            let mut fresh = false;

            // Find or claim the key cell.
            let found = loop {
                if probe.len >= table.limit {
                    break None;
                }

                // Safety: `probe.i` is always in-bounds for the table length.
                let slot = unsafe { table.slot(probe.i) };
                let mut found = slot.key.load(Ordering::Acquire);

                if found.is_null() {
                    // The key is not present.
                    let Some(claim) = claim else {
                        return Outcome::Rejected(None);
                    };

                    let new_key = Box::into_raw(Box::new(Key {
                        hash,
                        key: claim.clone(),
                    }));

                    match slot.key.compare_exchange(
                        ptr::null_mut(),
                        new_key,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            table.state().occupied.get(guard).fetch_add(1, Ordering::Relaxed);
                            fresh = true;
                            break Some(probe.i);
                        }
                        Err(winner) => {
                            // Safety: We never published the key.
                            drop(unsafe { Box::from_raw(new_key) });
                            found = winner;
                        }
                    }
                }

                // Safety: Claimed key cells are never modified, and the table is kept
                // alive by the guard.
                let found = unsafe { &*found };
                if found.hash == hash && <K as Borrow<Q>>::borrow(&found.key) == key {
                    break Some(probe.i);
                }

                probe.next(table.mask);
            };

            let Some(i) = found else {
                // The key can only be in the next table, if there is one.
                if claim.is_none() {
                    match table.next_table() {
                        Some(next) => {
                            table = next;
                            continue 'table;
                        }
                        None => return Outcome::Rejected(None),
                    }
                }

                // Otherwise, force a resize.
                let next = self.get_or_alloc_next(table, guard);
                if self.is_root(table) {
                    self.help_copy(false, guard);
                }

                table = next;
                continue 'table;
            };

            match table.next_table() {
                // The root is being migrated, move the slot to the next table before writing.
                Some(_) if self.is_root(table) => {
                    table = self.copy_slot_and_next(table, i, guard);
                    continue 'table;
                }

                // A table that is still being filled by a resize accepts writes directly.
                Some(_) => {}

                None => {
                    if fresh
                        && probe.len >= OVERLOAD_PROBE
                        && table.state().occupied.sum() >= table.max_load
                    {
                        self.get_or_alloc_next(table, guard);

                        if self.is_root(table) {
                            table = self.copy_slot_and_next(table, i, guard);
                            continue 'table;
                        }
                    }
                }
            }

            // Safety: `i` is in-bounds for the table length.
            let slot = unsafe { table.slot(i) };

            loop {
                let current = guard.protect(&slot.value, Ordering::Acquire).unpack();
                let status = Status::from(current);

                // The slot is being migrated.
                if status.is_primed() {
                    table = self.copy_slot_and_next(table, i, guard);
                    continue 'table;
                }

                let live = status.live();

                let satisfied = match expect {
                    Expect::Any => true,
                    Expect::Absent => live.is_none(),
                    Expect::Present => live.is_some(),
                    // Safety: We performed a protected load of a live value.
                    Expect::Matches(matches) => live.is_some_and(|v| matches(unsafe { &(*v).value })),
                };

                if !satisfied {
                    return Outcome::Rejected(live);
                }

                // Nothing to remove.
                if removing && live.is_none() {
                    return Outcome::Applied(None);
                }

                match slot.value.compare_exchange(
                    current.raw,
                    new,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => {
                        match (live, removing) {
                            (None, false) => {
                                self.count.get(guard).fetch_add(1, Ordering::Relaxed);
                            }
                            (Some(_), true) => {
                                self.count.get(guard).fetch_sub(1, Ordering::Relaxed);
                            }
                            _ => {}
                        }

                        if let Some(previous) = live {
                            // Safety: The value is unreachable from this slot and was never
                            // live anywhere else. Readers that loaded it hold a guard.
                            unsafe { guard.defer_retire(previous, reclaim::boxed::<Value<V>>) };
                        }

                        return Outcome::Applied(live);
                    }

                    // Lost the race, re-check the precondition against the new value.
                    Err(_) => continue,
                }
            }
        }
    }
}

/// Resize operations.
impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
{
    // Returns the next table, allocating it if it has not already been created.
    #[cold]
    #[inline(never)]
    fn get_or_alloc_next(&self, table: Table<K, V>, guard: &impl Guard) -> Table<K, V> {
        // The next table is already allocated.
        if let Some(next) = table.next_table() {
            return next;
        }

        let len = table.len();
        let live = self.len();

        // Tables never shrink.
        let mut next_len = match cfg!(nbhm_stress) {
            // Only grow the table when forced to, stressing the copy protocol.
            true => len,
            false => probe::entries_for(live.saturating_mul(self.tuning.growth_factor)).max(len),
        };

        // Copying into a table of the same size only helps if most claimed keys are
        // tombstones. Otherwise the probe was exhausted by collisions or load.
        let occupied = table.state().occupied.sum();
        if next_len <= len && (live >= (len >> 2) || occupied < live << 1) {
            next_len = len << 1;
        }

        assert!(
            next_len <= isize::MAX as usize,
            "`HashMap` exceeded maximum capacity"
        );

        let next = Table::alloc(next_len, self.tuning.reprobe_base, self.tuning.load_factor);

        // Race to install the next table.
        match table.state().next.compare_exchange(
            ptr::null_mut(),
            next.raw,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                tracing::debug!(
                    from = len,
                    to = next_len,
                    live,
                    thread = guard.thread_id(),
                    "allocated successor table"
                );

                next
            }

            // Someone beat us, deallocate our table and use the table that was written.
            Err(found) => {
                // Safety: We allocated the table above and never shared it.
                unsafe { Table::dealloc(next) };

                // Safety: The successor pointer is always a valid table once written.
                unsafe { Table::from_raw(found) }
            }
        }
    }

    // Copies slot `i` out of a table that is being migrated, returning the next table.
    #[cold]
    fn copy_slot_and_next(&self, table: Table<K, V>, i: usize, guard: &impl Guard) -> Table<K, V> {
        debug_assert_ne!(
            table.state().status.load(Ordering::Relaxed),
            State::PENDING,
            "copying out of a table that was never promoted"
        );

        let Some(next) = table.next_table() else {
            unreachable!("migrating a table without a successor")
        };

        if self.copy_slot(table, i, next, guard) {
            self.try_promote(table, next, 1, guard);
        }

        // Help with the rest of the copy.
        self.help_copy(false, guard);

        next
    }

    // Help along with the migration of the root table, returning the next table.
    //
    // If `copy_all` is `true`, the migration is complete and the next table has been
    // promoted when this returns.
    fn help_copy(&self, copy_all: bool, guard: &impl Guard) -> Table<K, V> {
        // Always help the root table.
        let table = self.root(guard);

        // The copy we tried to help was already promoted.
        let Some(next) = table.next_table() else {
            return table;
        };

        let state = next.state();
        let chunk = self.tuning.copy_chunk;

        loop {
            // Every slot has already been claimed.
            if state.claim.load(Ordering::Relaxed) >= table.len() {
                break;
            }

            // Claim a chunk to copy.
            let start = state.claim.fetch_add(chunk, Ordering::Relaxed);
            let end = start.saturating_add(chunk).min(table.len());

            let mut copied = 0;
            for i in start..end {
                if self.copy_slot(table, i, next, guard) {
                    copied += 1;
                }
            }

            // Only copy a single chunk unless we are forced to complete the migration.
            if self.try_promote(table, next, copied, guard) || !copy_all {
                return next;
            }
        }

        if copy_all {
            // Copies of some claimed chunks are still in flight. Instead of waiting for
            // them, finish every slot ourselves.
            tracing::trace!(len = table.len(), "sweeping table");

            let copied = (0..table.len())
                .filter(|&i| self.copy_slot(table, i, next, guard))
                .count();

            // Every slot is now dead, the counter may still be waiting on stalled copiers.
            if !self.try_promote(table, next, copied, guard) {
                self.promote(table, next, guard);
            }
        }

        next
    }

    // Migrates the slot at index `i` into the next table.
    //
    // Returns `true` if this call finalized the slot.
    fn copy_slot(&self, table: Table<K, V>, i: usize, next: Table<K, V>, guard: &impl Guard) -> bool {
        // Safety: Copiers only pass in-bounds indices.
        let slot = unsafe { table.slot(i) };
        let mut current = slot.value.load(Ordering::Acquire);

        loop {
            match Status::from(current.unpack()) {
                // Someone else finished the copy.
                Status::Dead => return false,

                // There is nothing to copy, kill the slot.
                Status::Empty | Status::Tombstone => {
                    match slot.value.compare_exchange(
                        current,
                        Value::dead(),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => return true,
                        Err(found) => current = found,
                    }
                }

                // Freeze the value, preventing any further writes to this slot.
                Status::Live(value) => {
                    let frozen = Value::prime(value);

                    match slot.value.compare_exchange(
                        current,
                        frozen,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => current = frozen,
                        Err(found) => current = found,
                    }
                }

                Status::Frozen(value) => {
                    // Safety: A value is only written after its key cell is claimed.
                    let key = unsafe { &*slot.key.load(Ordering::Acquire) };
                    self.insert_copy(key, value, next, guard);

                    // Finalize the copy, racing with other copiers of this slot.
                    return slot
                        .value
                        .compare_exchange(current, Value::dead(), Ordering::AcqRel, Ordering::Acquire)
                        .is_ok();
                }
            }
        }
    }

    // Installs a frozen value into the next table.
    fn insert_copy(
        &self,
        key: &Key<K>,
        value: *mut Value<V>,
        mut table: Table<K, V>,
        guard: &impl Guard,
    ) {
        loop {
            let mut probe = Probe::start(key.hash, table.mask);

            while probe.len < table.limit {
                // Safety: `probe.i` is always in-bounds for the table length.
                let slot = unsafe { table.slot(probe.i) };
                let mut found = slot.key.load(Ordering::Acquire);

                if found.is_null() {
                    let new_key = Box::into_raw(Box::new(Key {
                        hash: key.hash,
                        key: key.key.clone(),
                    }));

                    match slot.key.compare_exchange(
                        ptr::null_mut(),
                        new_key,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            table.state().occupied.get(guard).fetch_add(1, Ordering::Relaxed);
                            found = new_key;
                        }
                        Err(winner) => {
                            // Safety: We never published the key.
                            drop(unsafe { Box::from_raw(new_key) });
                            found = winner;
                        }
                    }
                }

                // Safety: Claimed key cells are never modified.
                let found = unsafe { &*found };

                if found.hash == key.hash && found.key == key.key {
                    // Only an untouched cell accepts the copy. Any other state means the
                    // value was already installed, and possibly overwritten since.
                    let _ = slot.value.compare_exchange(
                        ptr::null_mut(),
                        value,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );

                    return;
                }

                probe.next(table.mask);
            }

            // The next table is too crowded as well, keep going.
            table = self.get_or_alloc_next(table, guard);
        }
    }

    // Update the copy count and attempt to promote the next table to the root.
    //
    // Returns `true` if every slot of the table has been copied.
    fn try_promote(
        &self,
        table: Table<K, V>,
        next: Table<K, V>,
        copied: usize,
        guard: &impl Guard,
    ) -> bool {
        let state = next.state();

        let copied = if copied > 0 {
            state.copied.fetch_add(copied, Ordering::AcqRel) + copied
        } else {
            state.copied.load(Ordering::Acquire)
        };

        if copied == table.len() {
            self.promote(table, next, guard);
            return true;
        }

        false
    }

    // Replaces a fully copied root table with its successor.
    fn promote(&self, table: Table<K, V>, next: Table<K, V>, guard: &impl Guard) {
        // Mark the table before it becomes reachable as the root. A stalled copier may
        // arrive after the table was already promoted and retired.
        if next
            .state()
            .status
            .compare_exchange(
                State::PENDING,
                State::PROMOTED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }

        if self
            .table
            .compare_exchange(table.raw, next.raw, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        table.state().status.store(State::RETIRED, Ordering::Release);

        tracing::debug!(len = next.len(), "promoted successor table");

        // Safety: The CAS above made the table unreachable from the root. Every slot is
        // dead, so it no longer owns any values.
        unsafe { guard.defer_retire(table.raw, reclaim_table::<K, V>) };
    }

    // Completes all pending migrations, returning a root table with no successor.
    fn linearize(&self, guard: &impl Guard) -> Table<K, V> {
        loop {
            let table = self.root(guard);

            if table.next_table().is_none() {
                return table;
            }

            self.help_copy(true, guard);
        }
    }
}

// Frees a table that has been unlinked from the map, along with its keys.
unsafe fn reclaim_table<K, V>(raw: *mut RawTable, _collector: &Collector) {
    // Safety: The table was retired after being unlinked.
    let table = unsafe { Table::<K, V>::from_raw(raw) };

    for i in 0..table.len() {
        // Safety: `i` is in-bounds and we have unique access to the table.
        let key = unsafe { table.slot(i) }.key.load(Ordering::Relaxed);

        if !key.is_null() {
            drop(unsafe { Box::from_raw(key) });
        }
    }

    unsafe { Table::dealloc(table) };
}

impl<K, V, S> Drop for HashMap<K, V, S> {
    fn drop(&mut self) {
        // Make sure all retired values and tables are reclaimed before the collector
        // is dropped.
        //
        // Safety: We have a unique reference to the map, so there are no active guards.
        unsafe { self.collector.reclaim_all() };

        let mut raw = *self.table.get_mut();

        // Drop the root and any successors left behind by an unfinished migration.
        while !raw.is_null() {
            // Safety: The root and next tables are always valid pointers to a
            // table allocation, or null.
            let table = unsafe { Table::<K, V>::from_raw(raw) };
            raw = table.state().next.load(Ordering::Relaxed);

            for i in 0..table.len() {
                // Safety: `i` is in-bounds and we have unique access to the table.
                let slot = unsafe { table.slot(i) };

                // A value is live in exactly one table, frozen copies are skipped.
                let value = slot.value.load(Ordering::Relaxed).unpack();
                if let Status::Live(value) = Status::from(value) {
                    drop(unsafe { Box::from_raw(value) });
                }

                let key = slot.key.load(Ordering::Relaxed);
                if !key.is_null() {
                    drop(unsafe { Box::from_raw(key) });
                }
            }

            // Safety: The table is not accessed after this call.
            unsafe { Table::dealloc(table) };
        }
    }
}

// An iterator over the entries of a map.
//
// Walks a snapshot of the root table taken after completing any migration.
pub struct Iter<'g, K, V, S, G> {
    i: usize,
    table: Table<K, V>,
    map: &'g HashMap<K, V, S>,
    guard: &'g G,
}

impl<'g, K, V, S, G> Iterator for Iter<'g, K, V, S, G>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
    G: Guard,
{
    type Item = (&'g K, &'g V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // Iterated over every slot in the table, we're done.
            if self.i >= self.table.len() {
                return None;
            }

            // Safety: We verified that `self.i` is in-bounds above.
            let slot = unsafe { self.table.slot(self.i) };
            self.i += 1;

            let key = slot.key.load(Ordering::Acquire);
            if key.is_null() {
                continue;
            }

            // Safety: Claimed key cells are never modified, and the table is kept
            // alive by the guard.
            let key: &'g Key<K> = unsafe { &*key };

            let value = self.guard.protect(&slot.value, Ordering::Acquire).unpack();

            match Status::from(value) {
                // Safety: We performed a protected load of a live value.
                Status::Live(value) => return Some((&key.key, unsafe { &(*value).value })),
                Status::Empty | Status::Tombstone => continue,

                // A migration started after the snapshot was taken, finish copying the
                // slot and look for the key where it was copied to.
                Status::Frozen(_) | Status::Dead => {
                    let next = self.map.copy_slot_and_next(self.table, self.i - 1, self.guard);

                    match self.map.find(next, key.hash, &key.key, self.guard) {
                        Some(entry) => return Some(entry),
                        None => continue,
                    }
                }
            }
        }
    }
}

impl<K, V, S, G> Clone for Iter<'_, K, V, S, G> {
    #[inline]
    fn clone(&self) -> Self {
        Iter {
            i: self.i,
            table: self.table,
            map: self.map,
            guard: self.guard,
        }
    }
}

// Safety: An iterator holds shared references to the map and the guard, and
// yields shared references to keys and values.
unsafe impl<K, V, S, G> Send for Iter<'_, K, V, S, G>
where
    K: Sync,
    V: Sync,
    S: Sync,
    G: Sync,
{
}

unsafe impl<K, V, S, G> Sync for Iter<'_, K, V, S, G>
where
    K: Sync,
    V: Sync,
    S: Sync,
    G: Sync,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::RandomState;

    type Map = HashMap<usize, usize, RandomState>;

    fn map() -> Map {
        HashMap::new(0, RandomState::new(), Collector::new(), Tuning::default())
    }

    // Inserts fresh keys until the current root has a successor, returning that root.
    fn grow(map: &Map, next_key: &mut usize, guard: &impl Guard) -> Table<usize, usize> {
        let root = map.root(guard);
        while root.next_table().is_none() {
            map.insert(*next_key, *next_key, guard);
            *next_key += 1;
        }
        root
    }

    #[test]
    fn late_promotion_is_ignored() {
        let map = map();
        let guard = map.guard();
        let mut keys = 0;

        let first = grow(&map, &mut keys, &guard);
        let Some(second) = first.next_table() else {
            unreachable!()
        };
        map.linearize(&guard);

        grow(&map, &mut keys, &guard);
        let root = map.linearize(&guard);
        assert_eq!(second.state().status.load(Ordering::Acquire), State::RETIRED);

        // A copier that stalled through both migrations finally tries to promote.
        map.promote(first, second, &guard);

        assert_eq!(second.state().status.load(Ordering::Acquire), State::RETIRED);
        assert_eq!(map.root(&guard).raw, root.raw);
        assert_eq!(map.len(), keys);
        for k in 0..keys {
            assert_eq!(map.get(&k, &guard), Some((&k, &k)));
        }
    }

    #[test]
    fn capacity_follows_pending_tables() {
        let map = map();
        let guard = map.guard();
        let mut keys = 0;

        let root = grow(&map, &mut keys, &guard);
        let mut newest = root;
        while let Some(next) = newest.next_table() {
            newest = next;
        }

        assert_eq!(map.capacity(&guard), newest.len());
        assert!(map.capacity(&guard) >= root.len());
    }
}
