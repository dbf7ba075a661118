//! Helpers for table and node bitmaps.

/// Bitmap over table numbers of one query block.
pub type TableMap = u64;

/// Bitmap over hypergraph node indices.
pub type NodeMap = u64;

/// Largest number of bits a [`TableMap`] or [`NodeMap`] can hold.
pub const MAX_BITMAP_BITS: usize = u64::BITS as usize;

#[inline]
pub fn table_bitmap(idx: usize) -> u64 {
    debug_assert!(idx < MAX_BITMAP_BITS);
    1u64 << idx
}

#[inline]
pub fn overlaps(a: u64, b: u64) -> bool {
    a & b != 0
}

/// Tests whether every bit of `a` is also set in `b`.
#[inline]
pub fn is_subset(a: u64, b: u64) -> bool {
    a & b == a
}

#[inline]
pub fn is_single_bit_set(x: u64) -> bool {
    x != 0 && x & (x - 1) == 0
}

#[inline]
pub fn find_lowest_bit_set(x: u64) -> usize {
    debug_assert!(x != 0);
    x.trailing_zeros() as usize
}

/// Iterates over the indices of the set bits, lowest first.
pub fn bits_set_in(x: u64) -> BitsSetIn {
    BitsSetIn { state: x }
}

pub struct BitsSetIn {
    state: u64,
}

impl Iterator for BitsSetIn {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.state == 0 {
            return None;
        }
        let idx = self.state.trailing_zeros() as usize;
        // Clear the lowest set bit.
        self.state &= self.state - 1;
        Some(idx)
    }
}
