//! Bit-packed 2D buffer for boolean masks.
//!
//! Uses 1 bit per element instead of 1 byte. Layout matches `Buffer2`:
//! `(x, y)` maps to bit `y * width + x`.

use std::ops::{BitOrAssign, Index};

use crate::{wrap_coord, Buffer2};

/// Number of bits per storage word.
const BITS_PER_WORD: usize = 64;

/// A 2D buffer storing boolean values packed as bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitBuffer2 {
    /// Packed bit storage, LSB first. Bits past `len` are always zero.
    words: Vec<u64>,
    width: usize,
    height: usize,
    len: usize,
}

impl BitBuffer2 {
    /// Create a new bit buffer filled with the given value.
    pub fn new_filled(width: usize, height: usize, value: bool) -> Self {
        let len = width * height;
        let mut buf = Self {
            words: vec![0u64; len.div_ceil(BITS_PER_WORD)],
            width,
            height,
            len,
        };
        if value {
            buf.fill(true);
        }
        buf
    }

    /// Create a new bit buffer with all bits set to false.
    #[inline]
    pub fn new_default(width: usize, height: usize) -> Self {
        Self::new_filled(width, height, false)
    }

    /// Create a new bit buffer from a row-major slice of booleans.
    pub fn from_slice(width: usize, height: usize, data: &[bool]) -> Self {
        let len = width * height;
        assert_eq!(
            data.len(),
            len,
            "data length {} does not match dimensions {}x{}={}",
            data.len(),
            width,
            height,
            len
        );

        let mut buf = Self::new_default(width, height);
        for (i, &value) in data.iter().enumerate() {
            if value {
                buf.words[i / BITS_PER_WORD] |= 1u64 << (i % BITS_PER_WORD);
            }
        }
        buf
    }

    /// Build a mask by evaluating `f(x, y)` for every cell.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut buf = Self::new_default(width, height);
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    buf.set_xy(x, y, true);
                }
            }
        }
        buf
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, idx: usize) -> bool {
        debug_assert!(idx < self.len);
        (self.words[idx / BITS_PER_WORD] >> (idx % BITS_PER_WORD)) & 1 != 0
    }

    #[inline]
    pub fn set(&mut self, idx: usize, value: bool) {
        debug_assert!(idx < self.len);
        let word_idx = idx / BITS_PER_WORD;
        let bit = 1u64 << (idx % BITS_PER_WORD);
        if value {
            self.words[word_idx] |= bit;
        } else {
            self.words[word_idx] &= !bit;
        }
    }

    #[inline]
    pub fn get_xy(&self, x: usize, y: usize) -> bool {
        debug_assert!(x < self.width && y < self.height);
        self.get(y * self.width + x)
    }

    #[inline]
    pub fn set_xy(&mut self, x: usize, y: usize, value: bool) {
        debug_assert!(x < self.width && y < self.height);
        self.set(y * self.width + x, value);
    }

    /// Fill all bits with the given value.
    pub fn fill(&mut self, value: bool) {
        let fill = if value { !0u64 } else { 0u64 };
        self.words.fill(fill);
        self.clear_tail();
    }

    /// Count the number of set bits.
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True if any bit is set.
    #[inline]
    pub fn any(&self) -> bool {
        self.words.iter().any(|&w| w != 0)
    }

    #[inline]
    pub fn same_shape(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Toroidal shift: bit `(x, y)` moves to `((x + dx) mod w, (y + dy) mod h)`.
    pub fn rolled(&self, dx: isize, dy: isize) -> Self {
        let mut out = Self::new_default(self.width, self.height);
        if self.len == 0 {
            return out;
        }
        for idx in self.iter_ones() {
            let (x, y) = (idx % self.width, idx / self.width);
            let tx = wrap_coord(x as isize + dx, self.width);
            let ty = wrap_coord(y as isize + dy, self.height);
            out.set_xy(tx, ty, true);
        }
        out
    }

    /// Like [`rolled`](Self::rolled) but bits pushed past an edge are dropped.
    pub fn shifted(&self, dx: isize, dy: isize) -> Self {
        let mut out = Self::new_default(self.width, self.height);
        for idx in self.iter_ones() {
            let tx = (idx % self.width) as isize + dx;
            let ty = (idx / self.width) as isize + dy;
            if tx >= 0 && ty >= 0 && (tx as usize) < self.width && (ty as usize) < self.height {
                out.set_xy(tx as usize, ty as usize, true);
            }
        }
        out
    }

    /// Iterate over all bit values in row-major order.
    #[inline]
    pub fn iter(&self) -> BitIter<'_> {
        BitIter {
            buffer: self,
            idx: 0,
        }
    }

    /// Iterate over the linear indices of set bits, ascending.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_idx, &word)| {
                let mut remaining = word;
                std::iter::from_fn(move || {
                    if remaining == 0 {
                        return None;
                    }
                    let bit = remaining.trailing_zeros() as usize;
                    remaining &= remaining - 1;
                    Some(word_idx * BITS_PER_WORD + bit)
                })
            })
    }

    fn clear_tail(&mut self) {
        let tail = self.len % BITS_PER_WORD;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
    }
}

impl BitOrAssign<&BitBuffer2> for BitBuffer2 {
    fn bitor_assign(&mut self, rhs: &BitBuffer2) {
        assert!(self.same_shape(rhs), "shape mismatch");
        for (dst, src) in self.words.iter_mut().zip(rhs.words.iter()) {
            *dst |= *src;
        }
    }
}

impl From<&Buffer2<bool>> for BitBuffer2 {
    fn from(buf: &Buffer2<bool>) -> Self {
        Self::from_slice(buf.width(), buf.height(), buf.pixels())
    }
}

/// Index by linear index.
impl Index<usize> for BitBuffer2 {
    type Output = bool;

    #[inline]
    fn index(&self, idx: usize) -> &Self::Output {
        if self.get(idx) { &true } else { &false }
    }
}

/// Index by (x, y) coordinates.
impl Index<(usize, usize)> for BitBuffer2 {
    type Output = bool;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        if self.get_xy(x, y) { &true } else { &false }
    }
}

/// Iterator over bit values.
pub struct BitIter<'a> {
    buffer: &'a BitBuffer2,
    idx: usize,
}

impl Iterator for BitIter<'_> {
    type Item = bool;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.idx < self.buffer.len {
            let value = self.buffer.get(self.idx);
            self.idx += 1;
            Some(value)
        } else {
            None
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.buffer.len - self.idx;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BitIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_across_word_boundary() {
        let mut buf = BitBuffer2::new_filled(64, 64, false);
        buf.set(63, true);
        buf.set(64, true);
        assert!(buf.get(63));
        assert!(buf.get(64));
        assert!(!buf.get(62));
        assert!(!buf.get(65));
    }

    #[test]
    fn test_fill_true_leaves_tail_clear() {
        let buf = BitBuffer2::new_filled(10, 10, true);
        assert_eq!(buf.count_ones(), 100);
    }

    #[test]
    fn test_from_fn_and_index() {
        let buf = BitBuffer2::from_fn(4, 3, |x, y| x == y);
        assert!(buf[(0, 0)]);
        assert!(buf[(2, 2)]);
        assert!(!buf[(1, 0)]);
        assert_eq!(buf.count_ones(), 3);
    }

    #[test]
    #[should_panic(expected = "data length")]
    fn test_from_slice_wrong_length() {
        BitBuffer2::from_slice(2, 2, &[true, false, true]);
    }

    #[test]
    fn test_iter_ones_ascending() {
        let mut buf = BitBuffer2::new_default(20, 10);
        for idx in [199, 0, 64, 63, 127] {
            buf.set(idx, true);
        }
        let ones: Vec<usize> = buf.iter_ones().collect();
        assert_eq!(ones, vec![0, 63, 64, 127, 199]);
    }

    #[test]
    fn test_rolled_wraps() {
        let mut buf = BitBuffer2::new_default(5, 5);
        buf.set_xy(4, 0, true);
        let rolled = buf.rolled(1, -1);
        assert!(rolled.get_xy(0, 4));
        assert_eq!(rolled.count_ones(), 1);
    }

    #[test]
    fn test_shifted_drops_out_of_range() {
        let mut buf = BitBuffer2::new_default(5, 5);
        buf.set_xy(4, 2, true);
        buf.set_xy(1, 2, true);
        let shifted = buf.shifted(1, 0);
        assert!(shifted.get_xy(2, 2));
        assert_eq!(shifted.count_ones(), 1);
    }

    #[test]
    fn test_bitor_assign() {
        let mut a = BitBuffer2::from_fn(3, 3, |x, _| x == 0);
        let b = BitBuffer2::from_fn(3, 3, |_, y| y == 0);
        a |= &b;
        assert_eq!(a.count_ones(), 5);
    }

    #[test]
    fn test_from_bool_buffer() {
        let grid = Buffer2::new(2, 2, vec![true, false, false, true]);
        let buf = BitBuffer2::from(&grid);
        assert!(buf.get_xy(0, 0));
        assert!(buf.get_xy(1, 1));
        assert!(buf.any());
    }
}
