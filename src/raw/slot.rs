//! Slot cells and the value state machine.
//!
//! A slot is a pair of independently updated atomic pointers. The key cell is
//! write-once: it starts out null and is claimed by a single CAS, after which
//! only the value cell changes. The value cell is a tagged pointer that encodes
//! one of five states:
//!
//! | raw pointer              | state        |
//! |--------------------------|--------------|
//! | null                     | `Empty`      |
//! | `TOMBSTONE`              | `Tombstone`  |
//! | `ptr`                    | `Live(ptr)`  |
//! | `ptr \| PRIME`           | `Frozen(ptr)`|
//! | `PRIME \| TOMBSTONE`     | `Dead`       |
//!
//! Legal transitions:
//!
//! - `Empty | Tombstone -> Live` (insert, re-insert)
//! - `Live -> Live` (overwrite, compare-and-replace)
//! - `Live -> Tombstone` (remove, compare-and-remove)
//! - `Live -> Frozen` and `Empty | Tombstone -> Dead` (migration begins, root table only)
//! - `Frozen -> Dead` (migration of the slot is finalized)
//!
//! `Frozen` and `Dead` are terminal for writers, who must continue in the
//! successor table. States are always decoded from the tag bits, so a sentinel
//! is never handed to the caller's `Eq` or `PartialEq`.

use std::sync::atomic::AtomicPtr;

use super::utils::{StrictProvenance, Tagged, Unpack};

// A slot in a table.
pub struct Slot<K, V> {
    // The key cell, null until claimed.
    pub key: AtomicPtr<Key<K>>,

    // The value cell, a tagged pointer.
    pub value: AtomicPtr<Value<V>>,
}

// A key owned by a table, along with its full hash.
pub struct Key<K> {
    pub hash: u64,
    pub key: K,
}

// A boxed value.
//
// Aligned so the two low bits of every pointer are free for tags.
#[repr(C, align(4))]
pub struct Value<V> {
    pub value: V,
}

impl Value<()> {
    // The value has been frozen in an old table during a resize.
    pub const PRIME: usize = 0b01;

    // The key is logically absent.
    pub const TOMBSTONE: usize = 0b10;
}

impl<V> Unpack for Value<V> {
    // Mask for a value pointer, ignoring any tag bits.
    const MASK: usize = !(Value::<()>::PRIME | Value::<()>::TOMBSTONE);
}

impl<V> Value<V> {
    // Allocates a boxed value.
    #[inline]
    pub fn boxed(value: V) -> *mut Value<V> {
        Box::into_raw(Box::new(Value { value }))
    }

    // The deleted-key sentinel.
    #[inline]
    pub fn tombstone() -> *mut Value<V> {
        Value::<()>::TOMBSTONE as *mut Value<V>
    }

    // The sentinel for a fully migrated (or never used) slot.
    #[inline]
    pub fn dead() -> *mut Value<V> {
        (Value::<()>::PRIME | Value::<()>::TOMBSTONE) as *mut Value<V>
    }

    // Freezes a live value pointer.
    #[inline]
    pub fn prime(value: *mut Value<V>) -> *mut Value<V> {
        StrictProvenance::map_addr(value, |addr| addr | Value::<()>::PRIME)
    }
}

/// The decoded state of a value cell.
#[derive(Debug)]
pub enum Status<V> {
    /// The cell was never written.
    Empty,

    /// The key was deleted.
    Tombstone,

    /// A live value.
    Live(*mut Value<V>),

    /// The live value is being copied to the next table.
    Frozen(*mut Value<V>),

    /// The slot has been migrated, nothing may be written here again.
    Dead,
}

impl<V> Status<V> {
    // Returns the live value, if any.
    #[inline]
    pub fn live(&self) -> Option<*mut Value<V>> {
        match *self {
            Status::Live(value) => Some(value),
            _ => None,
        }
    }

    // Returns `true` if the slot is frozen or dead.
    #[inline]
    pub fn is_primed(&self) -> bool {
        matches!(self, Status::Frozen(_) | Status::Dead)
    }
}

impl<V> From<Tagged<Value<V>>> for Status<V> {
    #[inline]
    fn from(value: Tagged<Value<V>>) -> Status<V> {
        let tag = value.tag();

        if tag & Value::<()>::PRIME != 0 {
            if value.ptr.is_null() {
                Status::Dead
            } else {
                Status::Frozen(value.ptr)
            }
        } else if tag & Value::<()>::TOMBSTONE != 0 {
            Status::Tombstone
        } else if value.ptr.is_null() {
            Status::Empty
        } else {
            Status::Live(value.ptr)
        }
    }
}
