//! Regions and the lineage graph that links them across timesteps.
//!
//! Regions live in an arena owned by [`RegionGraph`] and refer to each other
//! by [`RegionId`]. A link always points from a region at time `t` to one at
//! time `t + 1`, so the graph is acyclic. Fraction data is stored on the
//! incoming edge of the successor.


use std::fmt;
use std::ops::Index;

use glam::DVec2;

/// Sequential identity of a region within one tracking run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(u32);

impl RegionId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Incoming edge from a predecessor, with its apportioned fractions.
#[derive(Debug, Clone, PartialEq)]
pub struct PrevLink {
    pub region: RegionId,
    /// First-pass Plant (2009) term; `None` until the group is analysed or
    /// when the simple method is used.
    pub reduced_fraction: Option<f64>,
    /// Share of the predecessor attributed to this region.
    pub fraction: Option<f64>,
}

impl PrevLink {
    fn new(region: RegionId) -> Self {
        Self {
            region,
            reduced_fraction: None,
            fraction: None,
        }
    }
}

/// One connected component of one timestep's label field.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: RegionId,
    /// Label value in its frame, never 0.
    pub label: u32,
    pub time_index: usize,
    /// Centroid in metres, `(x, y)`.
    pub position: DVec2,
    /// Number of cells.
    pub size: usize,
    /// Summed flux over the region's cells, when a flux field was supplied.
    pub mass_flux: Option<f64>,
    /// Lowest and highest occupied level in metres (cell centres), 3D only.
    pub vertical_extent: Option<(f64, f64)>,
    pub(crate) prev: Vec<PrevLink>,
    pub(crate) next: Vec<RegionId>,
    pub lifetime: Option<u32>,
    pub is_complex: bool,
}

impl Region {
    /// Predecessors in link insertion order.
    pub fn prev(&self) -> impl ExactSizeIterator<Item = RegionId> + '_ {
        self.prev.iter().map(|link| link.region)
    }

    pub fn prev_links(&self) -> &[PrevLink] {
        &self.prev
    }

    /// Successors in link insertion order.
    pub fn next(&self) -> &[RegionId] {
        &self.next
    }

    pub fn num_prev(&self) -> usize {
        self.prev.len()
    }

    pub fn num_next(&self) -> usize {
        self.next.len()
    }

    pub fn has_prev(&self, region: RegionId) -> bool {
        self.prev.iter().any(|link| link.region == region)
    }

    pub fn has_next(&self, region: RegionId) -> bool {
        self.next.contains(&region)
    }

    /// Share of predecessor `prev` attributed to this region.
    ///
    /// # Panics
    /// If `prev` is not a predecessor of this region.
    pub fn fraction(&self, prev: RegionId) -> Option<f64> {
        self.prev_link(prev).fraction
    }

    /// # Panics
    /// If `prev` is not a predecessor of this region.
    pub fn reduced_fraction(&self, prev: RegionId) -> Option<f64> {
        self.prev_link(prev).reduced_fraction
    }

    fn prev_link(&self, prev: RegionId) -> &PrevLink {
        match self.prev.iter().find(|link| link.region == prev) {
            Some(link) => link,
            None => panic!("{} is not a predecessor of {}", prev, self.id),
        }
    }

    pub(crate) fn prev_link_mut(&mut self, prev: RegionId) -> &mut PrevLink {
        let id = self.id;
        match self.prev.iter_mut().find(|link| link.region == prev) {
            Some(link) => link,
            None => panic!("{} is not a predecessor of {}", prev, id),
        }
    }
}

/// Arena of regions plus their links.
#[derive(Debug, Clone, Default)]
pub struct RegionGraph {
    regions: Vec<Region>,
}

impl RegionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// All regions in creation order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id.index())
    }

    /// Create a region with the next sequential id.
    pub fn add_region(&mut self, label: u32, time_index: usize, position: DVec2, size: usize) -> RegionId {
        assert!(label != 0, "label 0 is background and cannot form a region");
        assert!(
            self.regions.len() < u32::MAX as usize,
            "region id space exhausted"
        );
        let id = RegionId(self.regions.len() as u32);
        self.regions.push(Region {
            id,
            label,
            time_index,
            position,
            size,
            mass_flux: None,
            vertical_extent: None,
            prev: Vec::new(),
            next: Vec::new(),
            lifetime: None,
            is_complex: false,
        });
        id
    }

    /// Link `prev` to `next`. Both sides record the link.
    ///
    /// # Panics
    /// On a self-link, a duplicate link, or when `next` is not exactly one
    /// timestep after `prev`.
    pub fn add_link(&mut self, prev: RegionId, next: RegionId) {
        assert!(prev != next, "cannot link {} to itself", prev);
        let prev_time = self[prev].time_index;
        let next_time = self[next].time_index;
        assert_eq!(
            next_time,
            prev_time + 1,
            "link {} -> {} must join consecutive timesteps, got {} -> {}",
            prev,
            next,
            prev_time,
            next_time
        );
        assert!(
            !self[prev].has_next(next) && !self[next].has_prev(prev),
            "duplicate link {} -> {}",
            prev,
            next
        );

        self.regions[prev.index()].next.push(next);
        self.regions[next.index()].prev.push(PrevLink::new(prev));
    }

    #[inline]
    pub(crate) fn region_mut(&mut self, id: RegionId) -> &mut Region {
        &mut self.regions[id.index()]
    }
}

impl Index<RegionId> for RegionGraph {
    type Output = Region;

    #[inline]
    fn index(&self, id: RegionId) -> &Self::Output {
        &self.regions[id.index()]
    }
}
