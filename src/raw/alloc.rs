use std::alloc::Layout;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicPtr, AtomicU8, AtomicUsize, Ordering};
use std::{alloc, mem, ptr};

use super::probe;
use super::slot::Slot;
use super::utils::Counter;

// A hash-table laid out in a single allocation.
#[repr(transparent)]
pub struct RawTable(u8);

// The layout of the table allocation.
//
// The slots immediately follow the header.
#[repr(C)]
struct TableLayout {
    mask: usize,
    limit: usize,
    max_load: usize,
    state: State,
    slots: [Slot<(), ()>; 0],
}

// Resize state for a table.
pub struct State {
    // The successor table, installed once by CAS.
    pub next: AtomicPtr<RawTable>,

    // The number of slots claimed by copiers, but not necessarily copied.
    //
    // Note that this lives in the table being copied *to*.
    pub claim: AtomicUsize,

    // The number of slots that have been copied into this table.
    pub copied: AtomicUsize,

    // Whether the table is being filled, is the root, or has been retired.
    pub status: AtomicU8,

    // The number of key cells claimed in this table.
    pub occupied: Counter,
}

impl Default for State {
    fn default() -> State {
        State {
            next: AtomicPtr::new(ptr::null_mut()),
            claim: AtomicUsize::new(0),
            copied: AtomicUsize::new(0),
            status: AtomicU8::new(State::PENDING),
            occupied: Counter::default(),
        }
    }
}

impl State {
    // The table is being filled by a resize.
    pub const PENDING: u8 = 0;

    // The table is the root.
    pub const PROMOTED: u8 = 1;

    // The table was fully copied and unlinked from the root.
    pub const RETIRED: u8 = 2;
}

// Manages a table allocation.
pub struct Table<K, V> {
    // Mask for the table length.
    pub mask: usize,

    // The probe limit.
    pub limit: usize,

    // The number of claimed key cells past which the table is overloaded.
    pub max_load: usize,

    // The raw table pointer.
    pub raw: *mut RawTable,

    _kv: PhantomData<(K, V)>,
}

impl<K, V> Copy for Table<K, V> {}

impl<K, V> Clone for Table<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Table<K, V> {
    // Allocate a table with the provided length.
    pub fn alloc(len: usize, reprobe_base: usize, load_factor: f64) -> Table<K, V> {
        assert!(len.is_power_of_two());
        assert!(mem::align_of::<TableLayout>() >= mem::align_of::<Slot<K, V>>());

        let mask = len - 1;
        let limit = probe::limit(len, reprobe_base);
        let max_load = ((len as f64 * load_factor) as usize).clamp(1, len);

        unsafe {
            let layout = Self::layout(len);

            // Allocate the table, zeroing the slots.
            //
            // A zeroed slot has a null key and an empty value.
            let ptr = alloc::alloc_zeroed(layout);
            if ptr.is_null() {
                alloc::handle_alloc_error(layout);
            }

            // Write the table header.
            ptr.cast::<TableLayout>().write(TableLayout {
                mask,
                limit,
                max_load,
                state: State::default(),
                slots: [],
            });

            Table {
                mask,
                limit,
                max_load,
                raw: ptr.cast::<RawTable>(),
                _kv: PhantomData,
            }
        }
    }

    // Creates a `Table` from a raw pointer.
    #[inline]
    pub unsafe fn from_raw(raw: *mut RawTable) -> Table<K, V> {
        let layout = unsafe { &*raw.cast::<TableLayout>() };

        Table {
            raw,
            mask: layout.mask,
            limit: layout.limit,
            max_load: layout.max_load,
            _kv: PhantomData,
        }
    }

    // Returns the slot at the given index.
    #[inline]
    pub unsafe fn slot(&self, i: usize) -> &Slot<K, V> {
        debug_assert!(i < self.len());

        let offset = mem::size_of::<TableLayout>() + i * mem::size_of::<Slot<K, V>>();
        unsafe { &*self.raw.add(offset).cast::<Slot<K, V>>() }
    }

    // Returns the length of the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.mask + 1
    }

    // Returns a reference to the table state.
    #[inline]
    pub fn state(&self) -> &State {
        unsafe { &(*self.raw.cast::<TableLayout>()).state }
    }

    // Returns the successor table, if one has been installed.
    #[inline]
    pub fn next_table(&self) -> Option<Table<K, V>> {
        let next = self.state().next.load(Ordering::Acquire);

        if next.is_null() {
            return None;
        }

        // Safety: The successor pointer is either null or a valid table allocation.
        unsafe { Some(Table::from_raw(next)) }
    }

    // Deallocate the table.
    //
    // The slots are not touched, freeing keys and values is up to the caller.
    pub unsafe fn dealloc(table: Table<K, V>) {
        let layout = Self::layout(table.len());

        unsafe {
            ptr::drop_in_place(table.raw.cast::<TableLayout>());
            alloc::dealloc(table.raw.cast::<u8>(), layout)
        }
    }

    // The table layout used for allocation.
    fn layout(len: usize) -> Layout {
        let size = mem::size_of::<TableLayout>() + (mem::size_of::<Slot<K, V>>() * len);

        Layout::from_size_align(size, mem::align_of::<TableLayout>())
            .unwrap_or_else(|_| panic!("table of length {len} exceeds the maximum allocation"))
    }
}
