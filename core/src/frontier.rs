//! Width-adaptive ring buffer of non-negative integers.
//!
//! The slot width (1, 2 or 4 bytes) is picked once from a maximum value hint.
//! Values outside the direct range of the width are escape-encoded: a marker
//! slot announcing `k` literal slots, followed by those slots most significant
//! first. With `L = 32 / bits` the direct range is `[0, 2^bits - L)` and the
//! markers are `2^bits - L + (k - 1)` for `k` in `1..=L`.
//!
//! Because one value may occupy several slots, a tail position recorded with
//! [`CompactFrontierQueue::bookmark`] can only be moved forward by decoding;
//! [`CompactFrontierQueue::rewind`] does exactly that.

const MIN_CAPACITY: usize = 8;

/// Storage width selected for a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotWidth {
    U8,
    U16,
    U32,
}

/// Logical tail position. Stays valid across capacity growth as long as the
/// head has not moved past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bookmark(u64);

trait Slot: Copy + Default {
    const BITS: u32;
    /// Largest `k` a marker can announce.
    const MAX_LITERALS: u32 = 32 / Self::BITS;
    /// First marker value; everything below is stored directly.
    const DIRECT_LIMIT: u32 = ((1u64 << Self::BITS) - Self::MAX_LITERALS as u64) as u32;

    fn from_u32(value: u32) -> Self;
    fn to_u32(self) -> u32;
}

impl Slot for u8 {
    const BITS: u32 = 8;
    fn from_u32(value: u32) -> Self {
        value as u8
    }
    fn to_u32(self) -> u32 {
        self as u32
    }
}

impl Slot for u16 {
    const BITS: u32 = 16;
    fn from_u32(value: u32) -> Self {
        value as u16
    }
    fn to_u32(self) -> u32 {
        self as u32
    }
}

impl Slot for u32 {
    const BITS: u32 = 32;
    fn from_u32(value: u32) -> Self {
        value
    }
    fn to_u32(self) -> u32 {
        self
    }
}

struct Ring<S> {
    slots: Vec<S>,
    head: usize,
    tail: usize,
    /// Slots ever written, minus slots given back by `rewind`.
    written: u64,
}

impl<S: Slot> Ring<S> {
    fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY).next_power_of_two();
        Self {
            slots: vec![S::default(); capacity],
            head: 0,
            tail: 0,
            written: 0,
        }
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    fn len(&self) -> usize {
        self.tail.wrapping_sub(self.head) & self.mask()
    }

    fn push_slot(&mut self, slot: u32) {
        self.slots[self.tail] = S::from_u32(slot);
        self.tail = (self.tail + 1) & self.mask();
        self.written += 1;
        if self.tail == self.head {
            self.grow();
        }
    }

    fn pop_slot(&mut self) -> u32 {
        let slot = self.slots[self.head].to_u32();
        self.head = (self.head + 1) & self.mask();
        slot
    }

    /// Double the capacity, moving the logical contents to `0..len`.
    fn grow(&mut self) {
        let old = self.slots.len();
        let mut slots = Vec::with_capacity(old * 2);
        slots.extend_from_slice(&self.slots[self.head..]);
        slots.extend_from_slice(&self.slots[..self.head]);
        slots.resize(old * 2, S::default());
        self.slots = slots;
        self.head = 0;
        self.tail = old;
    }

    fn offer(&mut self, value: u32) {
        if value < S::DIRECT_LIMIT {
            self.push_slot(value);
            return;
        }
        let significant = 32 - value.leading_zeros();
        let literals = significant.div_ceil(S::BITS).max(1);
        self.push_slot(S::DIRECT_LIMIT + (literals - 1));
        for i in (0..literals).rev() {
            self.push_slot(((value as u64 >> (i * S::BITS)) & ((1u64 << S::BITS) - 1)) as u32);
        }
    }

    fn poll(&mut self) -> Option<u32> {
        if self.head == self.tail {
            return None;
        }
        let first = self.pop_slot();
        if first < S::DIRECT_LIMIT {
            return Some(first);
        }
        let mut value: u64 = 0;
        for _ in 0..Self::literals_after(first) {
            value = (value << S::BITS) | self.pop_slot() as u64;
        }
        Some(value as u32)
    }

    fn literals_after(marker: u32) -> u32 {
        if marker < S::DIRECT_LIMIT {
            0
        } else {
            marker - S::DIRECT_LIMIT + 1
        }
    }

    fn rewind(&mut self, bookmark: Bookmark, keep: usize) {
        let behind = (self.written - bookmark.0) as usize;
        debug_assert!(behind <= self.len(), "bookmark behind queue head");
        let mut pos = self.tail.wrapping_sub(behind) & self.mask();
        let mut kept = 0usize;
        for _ in 0..keep {
            let step = 1 + Self::literals_after(self.slots[pos].to_u32()) as usize;
            pos = (pos + step) & self.mask();
            kept += step;
        }
        debug_assert!(kept <= behind, "rewind past current tail");
        self.tail = pos;
        self.written = bookmark.0 + kept as u64;
    }
}

enum Slots {
    Narrow(Ring<u8>),
    Medium(Ring<u16>),
    Wide(Ring<u32>),
}

macro_rules! each_ring {
    ($slots:expr, $ring:ident => $body:expr) => {
        match $slots {
            Slots::Narrow($ring) => $body,
            Slots::Medium($ring) => $body,
            Slots::Wide($ring) => $body,
        }
    };
}

/// Growable FIFO of `u32` values packed into the narrowest slot width that
/// covers the expected values.
pub struct CompactFrontierQueue {
    slots: Slots,
}

impl CompactFrontierQueue {
    /// `capacity` is a lower bound on initial slots; `max_value_hint` picks the
    /// width. Larger values still work, they just take more slots.
    pub fn with_capacity(capacity: usize, max_value_hint: u32) -> Self {
        let slots = if max_value_hint < <u8 as Slot>::DIRECT_LIMIT {
            Slots::Narrow(Ring::with_capacity(capacity))
        } else if max_value_hint < <u16 as Slot>::DIRECT_LIMIT {
            Slots::Medium(Ring::with_capacity(capacity))
        } else {
            Slots::Wide(Ring::with_capacity(capacity))
        };
        Self { slots }
    }

    pub fn width(&self) -> SlotWidth {
        match self.slots {
            Slots::Narrow(_) => SlotWidth::U8,
            Slots::Medium(_) => SlotWidth::U16,
            Slots::Wide(_) => SlotWidth::U32,
        }
    }

    pub fn offer(&mut self, value: u32) {
        each_ring!(&mut self.slots, ring => ring.offer(value))
    }

    pub fn poll(&mut self) -> Option<u32> {
        each_ring!(&mut self.slots, ring => ring.poll())
    }

    /// Number of occupied slots (not values).
    pub fn len(&self) -> usize {
        each_ring!(&self.slots, ring => ring.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        each_ring!(&self.slots, ring => ring.slots.len())
    }

    /// Current tail position.
    pub fn bookmark(&self) -> Bookmark {
        Bookmark(each_ring!(&self.slots, ring => ring.written))
    }

    /// Move the tail back to `bookmark`, then forward over the next `keep`
    /// values written since. Everything after them is discarded.
    ///
    /// The head must not have passed the bookmark.
    pub fn rewind(&mut self, bookmark: Bookmark, keep: usize) {
        each_ring!(&mut self.slots, ring => ring.rewind(bookmark, keep))
    }
}
