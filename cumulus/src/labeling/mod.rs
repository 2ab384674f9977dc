//! Connected component labeling of thresholded masks.
//!
//! Flood fill seeded in column-major raster order (x outermost, then y, then
//! z), so the numbering of components is reproducible for identical input.
//! Label 0 is background; components are numbered 1..=N in discovery order.


use std::ops::Index;

use common::{wrap_coord, BitBuffer2, Buffer2, Buffer3};

use crate::config::{Connectivity, EdgeMode, LabelConfig};

// ============================================================================
// Grid geometry
// ============================================================================

/// Extent of a labelled grid. 2D grids have `depth == 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Shape {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}

impl Shape {
    pub fn of<T>(buf: &Buffer3<T>) -> Self {
        Self {
            width: buf.width(),
            height: buf.height(),
            depth: buf.depth(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height * self.depth
    }

    #[inline]
    pub fn is_volume(&self) -> bool {
        self.depth > 1
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.height + y) * self.width + x
    }

    #[inline]
    pub fn coords(&self, idx: usize) -> (usize, usize, usize) {
        let plane = self.width * self.height;
        let rem = idx % plane;
        (rem % self.width, rem / self.width, idx / plane)
    }

    /// Cell displaced from `(x, y, z)` by `offset`. Horizontal axes follow
    /// `edge`; the vertical axis never wraps.
    #[inline]
    pub fn neighbour(
        &self,
        (x, y, z): (usize, usize, usize),
        [dx, dy, dz]: [isize; 3],
        edge: EdgeMode,
    ) -> Option<(usize, usize, usize)> {
        let nz = z as isize + dz;
        if nz < 0 || nz as usize >= self.depth {
            return None;
        }
        let nx = x as isize + dx;
        let ny = y as isize + dy;
        match edge {
            EdgeMode::Wrap => Some((
                wrap_coord(nx, self.width),
                wrap_coord(ny, self.height),
                nz as usize,
            )),
            EdgeMode::Clip => {
                if nx < 0 || ny < 0 || nx as usize >= self.width || ny as usize >= self.height {
                    None
                } else {
                    Some((nx as usize, ny as usize, nz as usize))
                }
            }
        }
    }
}

/// Offsets `[dx, dy, dz]` of the cells adjacent to a given cell.
///
/// `Four` yields edge neighbours (4 in 2D, 6 in 3D); `Eight` adds every
/// diagonal (8 in 2D, 26 in 3D).
pub(crate) fn neighbour_offsets(connectivity: Connectivity, volumetric: bool) -> Vec<[isize; 3]> {
    let mut offsets = vec![[0, -1, 0], [0, 1, 0], [-1, 0, 0], [1, 0, 0]];
    match (connectivity, volumetric) {
        (Connectivity::Four, false) => {}
        (Connectivity::Eight, false) => {
            offsets.extend([[-1, -1, 0], [1, -1, 0], [-1, 1, 0], [1, 1, 0]]);
        }
        (Connectivity::Four, true) => {
            offsets.extend([[0, 0, -1], [0, 0, 1]]);
        }
        (Connectivity::Eight, true) => {
            offsets.clear();
            for dz in -1..=1 {
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        if (dx, dy, dz) != (0, 0, 0) {
                            offsets.push([dx, dy, dz]);
                        }
                    }
                }
            }
        }
    }
    offsets
}

// ============================================================================
// Flood fill
// ============================================================================

/// Label every set cell of a grid of the given shape. Returns the labels in
/// row-major layout and the number of components kept.
fn label_cells(shape: Shape, is_set: impl Fn(usize) -> bool, config: &LabelConfig) -> (Vec<u32>, usize) {
    let offsets = neighbour_offsets(config.connectivity, shape.is_volume());
    let mut labels = vec![0u32; shape.len()];
    let mut sizes: Vec<usize> = Vec::new();

    let mut frontier: Vec<(usize, usize, usize)> = Vec::new();
    let mut next_frontier: Vec<(usize, usize, usize)> = Vec::new();

    for x in 0..shape.width {
        for y in 0..shape.height {
            for z in 0..shape.depth {
                let seed = shape.index(x, y, z);
                if labels[seed] != 0 || !is_set(seed) {
                    continue;
                }

                let label = sizes.len() as u32 + 1;
                labels[seed] = label;
                let mut count = 1usize;

                frontier.clear();
                frontier.push((x, y, z));
                while !frontier.is_empty() {
                    next_frontier.clear();
                    for &cell in &frontier {
                        for &offset in &offsets {
                            let Some((nx, ny, nz)) = shape.neighbour(cell, offset, config.edge)
                            else {
                                continue;
                            };
                            let n = shape.index(nx, ny, nz);
                            if labels[n] == 0 && is_set(n) {
                                labels[n] = label;
                                count += 1;
                                next_frontier.push((nx, ny, nz));
                            }
                        }
                    }
                    std::mem::swap(&mut frontier, &mut next_frontier);
                }

                sizes.push(count);
            }
        }
    }

    if config.min_cells == 0 {
        return (labels, sizes.len());
    }

    // Drop small components and renumber the rest, keeping discovery order.
    let mut remap = vec![0u32; sizes.len() + 1];
    let mut kept = 0u32;
    for (i, &size) in sizes.iter().enumerate() {
        if size >= config.min_cells {
            kept += 1;
            remap[i + 1] = kept;
        }
    }
    for label in labels.iter_mut() {
        *label = remap[*label as usize];
    }

    (labels, kept as usize)
}

// ============================================================================
// LabelMap
// ============================================================================

/// Labels of a 2D mask: 0 for background, 1..=num_labels for components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    labels: Buffer2<u32>,
    num_labels: usize,
}

impl LabelMap {
    pub fn from_mask(mask: &BitBuffer2, config: &LabelConfig) -> Self {
        let shape = Shape {
            width: mask.width(),
            height: mask.height(),
            depth: 1,
        };
        let (labels, num_labels) = label_cells(shape, |idx| mask.get(idx), config);
        Self {
            labels: Buffer2::new(shape.width, shape.height, labels),
            num_labels,
        }
    }

    #[inline]
    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    #[inline]
    pub fn labels(&self) -> &Buffer2<u32> {
        &self.labels
    }

    #[inline]
    pub fn into_labels(self) -> Buffer2<u32> {
        self.labels
    }
}

impl Index<usize> for LabelMap {
    type Output = u32;

    #[inline]
    fn index(&self, idx: usize) -> &Self::Output {
        &self.labels[idx]
    }
}

impl Index<(usize, usize)> for LabelMap {
    type Output = u32;

    #[inline]
    fn index(&self, xy: (usize, usize)) -> &Self::Output {
        &self.labels[xy]
    }
}

// ============================================================================
// LabelVolume
// ============================================================================

/// Labels of a 3D mask. Horizontal wrap follows the config; z never wraps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVolume {
    labels: Buffer3<u32>,
    num_labels: usize,
}

impl LabelVolume {
    pub fn from_mask(mask: &Buffer3<bool>, config: &LabelConfig) -> Self {
        let shape = Shape::of(mask);
        let cells = mask.cells();
        let (labels, num_labels) = label_cells(shape, |idx| cells[idx], config);
        Self {
            labels: Buffer3::new(shape.width, shape.height, shape.depth, labels),
            num_labels,
        }
    }

    #[inline]
    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    #[inline]
    pub fn labels(&self) -> &Buffer3<u32> {
        &self.labels
    }

    #[inline]
    pub fn into_labels(self) -> Buffer3<u32> {
        self.labels
    }
}

impl Index<(usize, usize, usize)> for LabelVolume {
    type Output = u32;

    #[inline]
    fn index(&self, xyz: (usize, usize, usize)) -> &Self::Output {
        &self.labels[xyz]
    }
}
