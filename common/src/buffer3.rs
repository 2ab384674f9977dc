//! Row-major 3D grid.
//!
//! `(x, y, z)` maps to `(z * height + y) * width + x`, so each `z` level is a
//! contiguous `Buffer2`-compatible slab. A 2D grid converts into a volume of
//! depth 1.

use std::ops::{Index, IndexMut};
use std::slice;

use crate::{wrap_coord, Buffer2};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer3<T> {
    cells: Vec<T>,
    width: usize,
    height: usize,
    depth: usize,
}

impl<T> Buffer3<T> {
    pub fn new(width: usize, height: usize, depth: usize, cells: Vec<T>) -> Self {
        assert_eq!(
            cells.len(),
            width * height * depth,
            "cells length must equal width * height * depth"
        );
        Self {
            cells,
            width,
            height,
            depth,
        }
    }

    /// Build a volume by evaluating `f(x, y, z)` for every cell.
    pub fn from_fn(
        width: usize,
        height: usize,
        depth: usize,
        mut f: impl FnMut(usize, usize, usize) -> T,
    ) -> Self {
        let mut cells = Vec::with_capacity(width * height * depth);
        for z in 0..depth {
            for y in 0..height {
                for x in 0..width {
                    cells.push(f(x, y, z));
                }
            }
        }
        Self {
            cells,
            width,
            height,
            depth,
        }
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
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.height + y) * self.width + x
    }

    /// Inverse of [`index`](Self::index).
    #[inline]
    pub fn coords(&self, idx: usize) -> (usize, usize, usize) {
        let plane = self.width * self.height;
        let z = idx / plane;
        let rem = idx % plane;
        (rem % self.width, rem / self.width, z)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> &T {
        debug_assert!(x < self.width && y < self.height && z < self.depth);
        &self.cells[self.index(x, y, z)]
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize, z: usize) -> &mut T {
        debug_assert!(x < self.width && y < self.height && z < self.depth);
        let idx = self.index(x, y, z);
        &mut self.cells[idx]
    }

    #[inline]
    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.cells.iter()
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Buffer3<U> {
        Buffer3 {
            cells: self.cells.iter().map(f).collect(),
            width: self.width,
            height: self.height,
            depth: self.depth,
        }
    }

    #[inline]
    pub fn same_shape<U>(&self, other: &Buffer3<U>) -> bool {
        self.width == other.width && self.height == other.height && self.depth == other.depth
    }
}

impl<T: Clone> Buffer3<T> {
    pub fn new_filled(width: usize, height: usize, depth: usize, value: T) -> Self {
        Self {
            cells: vec![value; width * height * depth],
            width,
            height,
            depth,
        }
    }

    /// Reduce every vertical column (bottom level first) to a single value.
    pub fn columns<U>(&self, mut f: impl FnMut(&[T]) -> U) -> Buffer2<U> {
        let mut column = Vec::with_capacity(self.depth);
        Buffer2::from_fn(self.width, self.height, |x, y| {
            column.clear();
            column.extend((0..self.depth).map(|z| self.get(x, y, z).clone()));
            f(&column)
        })
    }

    /// Copy out a single `z` level.
    pub fn level(&self, z: usize) -> Buffer2<T> {
        assert!(
            z < self.depth,
            "level {} out of range for depth {}",
            z,
            self.depth
        );
        let plane = self.width * self.height;
        Buffer2::new(
            self.width,
            self.height,
            self.cells[z * plane..(z + 1) * plane].to_vec(),
        )
    }

    /// Toroidal shift of every level along x and y; z is untouched.
    pub fn rolled_horizontal(&self, dx: isize, dy: isize) -> Self {
        if self.cells.is_empty() {
            return self.clone();
        }
        let mut out = self.cells.clone();
        for z in 0..self.depth {
            for y in 0..self.height {
                let ty = wrap_coord(y as isize + dy, self.height);
                for x in 0..self.width {
                    let tx = wrap_coord(x as isize + dx, self.width);
                    out[self.index(tx, ty, z)] = self.cells[self.index(x, y, z)].clone();
                }
            }
        }
        Self {
            cells: out,
            width: self.width,
            height: self.height,
            depth: self.depth,
        }
    }
}

impl<T> From<Buffer2<T>> for Buffer3<T> {
    fn from(buf: Buffer2<T>) -> Self {
        let (width, height) = (buf.width(), buf.height());
        Self {
            cells: buf.into_vec(),
            width,
            height,
            depth: 1,
        }
    }
}

impl<T> Index<(usize, usize, usize)> for Buffer3<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y, z): (usize, usize, usize)) -> &Self::Output {
        self.get(x, y, z)
    }
}

impl<T> IndexMut<(usize, usize, usize)> for Buffer3<T> {
    #[inline]
    fn index_mut(&mut self, (x, y, z): (usize, usize, usize)) -> &mut Self::Output {
        self.get_mut(x, y, z)
    }
}

impl<T> Index<usize> for Buffer3<T> {
    type Output = T;

    #[inline]
    fn index(&self, idx: usize) -> &Self::Output {
        &self.cells[idx]
    }
}

impl<T> IndexMut<usize> for Buffer3<T> {
    #[inline]
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.cells[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_layout() {
        let buf = Buffer3::from_fn(3, 2, 2, |x, y, z| (x, y, z));
        assert_eq!(buf.index(2, 1, 1), 11);
        assert_eq!(buf[11], (2, 1, 1));
        assert_eq!(buf.coords(11), (2, 1, 1));
        assert_eq!(buf.coords(4), (1, 1, 0));
    }

    #[test]
    fn test_from_buffer2_has_depth_one() {
        let flat = Buffer2::new(2, 2, vec![1, 2, 3, 4]);
        let vol = Buffer3::from(flat.clone());
        assert_eq!(vol.depth(), 1);
        assert_eq!(vol.level(0), flat);
    }

    #[test]
    fn test_level_extracts_plane() {
        let buf = Buffer3::from_fn(2, 2, 3, |_, _, z| z as u32);
        assert!(buf.level(2).iter().all(|&v| v == 2));
    }

    #[test]
    #[should_panic(expected = "level 3 out of range")]
    fn test_level_out_of_range() {
        Buffer3::new_filled(2, 2, 3, 0u8).level(3);
    }

    #[test]
    fn test_rolled_horizontal_keeps_levels() {
        let mut buf = Buffer3::new_filled(4, 4, 2, 0u32);
        buf[(3, 0, 1)] = 9;
        let rolled = buf.rolled_horizontal(1, 2);
        assert_eq!(rolled[(0, 2, 1)], 9);
        assert_eq!(rolled.iter().filter(|&&v| v != 0).count(), 1);
    }

    #[test]
    fn test_columns_reduce() {
        let mut buf = Buffer3::new_filled(2, 1, 3, false);
        buf[(1, 0, 2)] = true;
        let any = buf.columns(|column| column.contains(&true));
        assert_eq!(any.pixels(), &[false, true]);
    }
}
