//! One-step morphological growth of binary masks.
//!
//! A grown mask is the union of the input with copies of itself shifted by
//! every neighbour offset of the chosen connectivity. Used for touch matching
//! between projected and current regions.


use common::BitBuffer2;

use crate::config::{Connectivity, EdgeMode};
use crate::labeling::neighbour_offsets;

/// Grow `mask` by one cell.
///
/// With [`EdgeMode::Wrap`] shifted copies roll around the domain; with
/// [`EdgeMode::Clip`] cells pushed past an edge are discarded. Shape and the
/// input cells are always preserved.
pub fn grow(mask: &BitBuffer2, connectivity: Connectivity, edge: EdgeMode) -> BitBuffer2 {
    let mut grown = mask.clone();
    if !mask.any() {
        return grown;
    }

    for [dx, dy, _] in neighbour_offsets(connectivity, false) {
        let moved = match edge {
            EdgeMode::Wrap => mask.rolled(dx, dy),
            EdgeMode::Clip => mask.shifted(dx, dy),
        };
        grown |= &moved;
    }
    grown
}
