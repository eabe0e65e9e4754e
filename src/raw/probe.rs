// The smallest table that will be allocated.
pub const MIN_LEN: usize = 16;

// Returns the maximum probe length for a table of the given length.
//
// Every operation that walks this many slots without finding its key or a
// free key cell gives up on the table: readers continue in the successor
// table, writers force a resize.
#[inline]
pub fn limit(len: usize, base: usize) -> usize {
    base.saturating_add(len >> 2).min(len)
}

// Returns the table length needed to hold `capacity` elements.
pub fn entries_for(capacity: usize) -> usize {
    // We should rarely resize before 75%.
    let capacity = capacity.checked_mul(8).expect("capacity overflow") / 6;
    capacity.next_power_of_two().max(MIN_LEN)
}

// A hybrid probe sequence.
//
// The probe sequence walks a number of entries linearly before making
// a quadratic jump, balancing cache locality with probe lengths.
#[derive(Default)]
pub struct Probe {
    // The current index in the probe sequence.
    pub i: usize,
    // The current length of the probe sequence.
    pub len: usize,
    // The current quadratic stride.
    stride: usize,
}

impl Probe {
    // Number of linear probes per quadratic jump.
    const GROUP: usize = 8;

    // Initialize the probe sequence.
    #[inline]
    pub fn start(hash: u64, mask: usize) -> Probe {
        Probe {
            i: (hash as usize) & mask,
            len: 0,
            stride: 0,
        }
    }

    // Increment the probe sequence.
    #[inline]
    pub fn next(&mut self, mask: usize) {
        self.len += 1;

        if self.len & (Probe::GROUP - 1) == 0 {
            self.stride += Probe::GROUP;
            self.i += self.stride;
        } else {
            self.i += 1;
        }

        self.i &= mask;
    }
}
