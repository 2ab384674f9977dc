//! Lineage tracking across a sequence of labelled fields.
//!
//! For every pair of consecutive frames the tracker:
//! 1. Creates one region per label present in the new frame
//! 2. Estimates the displacement between the two occupancies by correlation
//! 3. Rolls the previous labels by that displacement (the projected field)
//! 4. Links every previous label to the current labels it overlaps (or
//!    touches) in the projected field, in ascending label order
//!
//! Linking is inherently sequential. Group analytics afterwards are
//! independent per group and run in parallel.
//!
//! Every region of every timestep stays in memory for the lifetime of the
//! tracker, so memory grows with the total number of regions tracked. Long
//! runs should be split into independent trackers.

mod frame;

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};

use common::{BitBuffer2, Buffer3};
use glam::DVec2;
use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;

use crate::cluster::{cluster_regions, Cluster};
use crate::config::{EdgeMode, TrackerConfig};
use crate::correlation::{Displacement, FieldCorrelator};
use crate::diagnostics::{DiagnosticSink, NullSink, OverlapFrame};
use crate::error::{Error, Result};
use crate::group::{CloudGroup, GroupAnalysis, GroupStats};
use crate::labeling::{neighbour_offsets, LabelMap, Shape};
use crate::region::{Region, RegionGraph, RegionId};

pub use frame::Frame;

/// State carried from one frame to the next.
#[derive(Debug)]
struct PreviousFrame {
    labels: Buffer3<u32>,
    occupancy: BitBuffer2,
    /// Region of each label value, indexed by label.
    regions: Vec<Option<RegionId>>,
}

/// Per-label accumulators for region creation.
#[derive(Debug, Clone, Copy, Default)]
struct LabelStats {
    size: usize,
    sum_x: f64,
    sum_y: f64,
    min_z: usize,
    max_z: usize,
    flux: f64,
}

/// Builds the lineage graph and derives groups and clusters from it.
#[derive(Debug)]
pub struct Tracker {
    config: TrackerConfig,
    graph: RegionGraph,
    regions_at_time: Vec<Vec<RegionId>>,
    displacements: Vec<Option<Displacement>>,
    groups: Vec<CloudGroup>,
    clusters_at_time: Vec<Vec<Cluster>>,
    ignored_links: usize,
    consistency_errors: usize,
    previous: Option<PreviousFrame>,
    correlator: Option<FieldCorrelator>,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        config.validate();
        Self {
            config,
            graph: RegionGraph::new(),
            regions_at_time: Vec::new(),
            displacements: Vec::new(),
            groups: Vec::new(),
            clusters_at_time: Vec::new(),
            ignored_links: 0,
            consistency_errors: 0,
            previous: None,
            correlator: None,
        }
    }

    // ------------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------------

    /// Consume `frames` in order and extend the lineage graph.
    ///
    /// Calling this again continues the sequence where the last call stopped.
    /// Returns the regions of every timestep tracked so far, in ascending
    /// label order.
    pub fn track<I>(&mut self, frames: I) -> Result<&[Vec<RegionId>]>
    where
        I: IntoIterator,
        I::Item: Into<Frame>,
    {
        self.track_with_diagnostics(frames, &mut NullSink)
    }

    /// Like [`track`](Self::track), reporting an [`OverlapFrame`] for every
    /// correlated pair to `sink`.
    pub fn track_with_diagnostics<I>(
        &mut self,
        frames: I,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<&[Vec<RegionId>]>
    where
        I: IntoIterator,
        I::Item: Into<Frame>,
    {
        let first_new = self.regions_at_time.len();
        for frame in frames {
            self.step(frame.into(), sink)?;
        }

        tracing::info!(
            "Tracked {} frames ({} total): {} regions, {} ignored links",
            self.regions_at_time.len() - first_new,
            self.regions_at_time.len(),
            self.graph.len(),
            self.ignored_links
        );

        Ok(&self.regions_at_time)
    }

    /// Label raw 2D masks with the configured labeler, then track them.
    pub fn track_masks<I>(&mut self, masks: I) -> Result<&[Vec<RegionId>]>
    where
        I: IntoIterator,
        I::Item: Borrow<BitBuffer2>,
    {
        let labeling = self.config.labeling;
        self.track(
            masks
                .into_iter()
                .map(move |mask| LabelMap::from_mask(mask.borrow(), &labeling)),
        )
    }

    fn step(&mut self, frame: Frame, sink: &mut dyn DiagnosticSink) -> Result<()> {
        let time_index = self.regions_at_time.len();
        let labels = frame.labels();

        if let Some(previous) = &self.previous {
            assert!(
                previous.labels.same_shape(labels),
                "frame shape mismatch at time index {}: {}x{}x{} after {}x{}x{}",
                time_index,
                labels.width(),
                labels.height(),
                labels.depth(),
                previous.labels.width(),
                previous.labels.height(),
                previous.labels.depth()
            );
        }

        // A failed correlation leaves the tracker unchanged
        let occupancy = frame.occupancy(self.config.track_level);
        let previous = self.previous.take();
        let estimate = match &previous {
            Some(previous) => self.estimate_displacement(time_index, &previous.occupancy, &occupancy),
            None => Ok(None),
        };
        let displacement = match estimate {
            Ok(displacement) => displacement,
            Err(err) => {
                self.previous = previous;
                return Err(err);
            }
        };

        let (regions, by_label) = self.create_regions(time_index, &frame);

        let mut num_links = 0;
        if let (Some(previous), Some(d)) = (&previous, displacement) {
            let projected = previous.labels.rolled_horizontal(d.dx, d.dy);
            sink.overlap_frame(OverlapFrame::new(
                time_index,
                d,
                &occupancy,
                &previous.occupancy.rolled(d.dx, d.dy),
            ));

            let pairs = self.matching_labels(&projected, frame.labels());
            num_links = self.link(&pairs, &previous.regions, &by_label);
        }

        tracing::debug!(
            "time {}: {} regions, {} links, displacement {:?}",
            time_index,
            regions.len(),
            num_links,
            displacement.map(|d| (d.dx, d.dy))
        );

        self.regions_at_time.push(regions);
        self.displacements.push(displacement);
        self.previous = Some(PreviousFrame {
            labels: frame.labels().clone(),
            occupancy,
            regions: by_label,
        });
        Ok(())
    }

    /// `None` when either occupancy is empty.
    fn estimate_displacement(
        &mut self,
        time_index: usize,
        previous: &BitBuffer2,
        current: &BitBuffer2,
    ) -> Result<Option<Displacement>> {
        if !previous.any() || !current.any() {
            tracing::debug!(
                "time {}: no active cells on one side, skipping correlation",
                time_index
            );
            return Ok(None);
        }

        self.correlator(current.width(), current.height())
            .correlate(previous, current)
            .map(Some)
            .map_err(|source| Error::Correlation {
                time_index,
                source: Box::new(source),
            })
    }

    fn correlator(&mut self, width: usize, height: usize) -> &FieldCorrelator {
        let window = self.config.window;
        if self
            .correlator
            .as_ref()
            .is_some_and(|c| c.width() != width || c.height() != height)
        {
            self.correlator = None;
        }
        self.correlator
            .get_or_insert_with(|| FieldCorrelator::new(width, height, window))
    }

    /// One region per label present in the frame, ascending by label.
    fn create_regions(&mut self, time_index: usize, frame: &Frame) -> (Vec<RegionId>, Vec<Option<RegionId>>) {
        let labels = frame.labels();
        let max_label = labels.iter().copied().max().unwrap_or(0) as usize;

        let mut stats = vec![LabelStats::default(); max_label + 1];
        for (idx, &label) in labels.iter().enumerate() {
            if label == 0 {
                continue;
            }
            let (x, y, z) = labels.coords(idx);
            let s = &mut stats[label as usize];
            if s.size == 0 {
                s.min_z = z;
                s.max_z = z;
            }
            s.size += 1;
            s.sum_x += x as f64;
            s.sum_y += y as f64;
            s.min_z = s.min_z.min(z);
            s.max_z = s.max_z.max(z);
            if let Some(flux) = frame.flux() {
                s.flux += flux[idx];
            }
        }

        let resolution = self.config.resolution;
        let mut regions = Vec::new();
        let mut by_label = vec![None; max_label + 1];
        for (label, s) in stats.iter().enumerate().skip(1) {
            if s.size == 0 {
                continue;
            }
            let centroid = DVec2::new(s.sum_x, s.sum_y) / s.size as f64;
            let id = self.graph.add_region(
                label as u32,
                time_index,
                centroid * resolution.horizontal,
                s.size,
            );

            let region = self.graph.region_mut(id);
            if frame.flux().is_some() {
                region.mass_flux = Some(s.flux);
            }
            if frame.is_volume() {
                region.vertical_extent = Some((
                    s.min_z as f64 * resolution.vertical,
                    s.max_z as f64 * resolution.vertical,
                ));
            }

            regions.push(id);
            by_label[label] = Some(id);
        }

        (regions, by_label)
    }

    /// Pairs `(previous label, current label)` that overlap in the projected
    /// field, or touch it when touching is enabled.
    fn matching_labels(&self, projected: &Buffer3<u32>, current: &Buffer3<u32>) -> BTreeMap<u32, BTreeSet<u32>> {
        let mut pairs: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
        let shape = Shape::of(current);
        let touch_offsets = if self.config.include_touching {
            neighbour_offsets(self.config.touching_connectivity(), false)
        } else {
            Vec::new()
        };
        let edge: EdgeMode = self.config.labeling.edge;

        for (idx, &prev_label) in projected.iter().enumerate() {
            if prev_label == 0 {
                continue;
            }
            let cur_label = current[idx];
            if cur_label != 0 {
                pairs.entry(prev_label).or_default().insert(cur_label);
            }

            if touch_offsets.is_empty() {
                continue;
            }
            let cell = shape.coords(idx);
            for &offset in &touch_offsets {
                if let Some((x, y, z)) = shape.neighbour(cell, offset, edge) {
                    let touching = current[(x, y, z)];
                    if touching != 0 {
                        pairs.entry(prev_label).or_default().insert(touching);
                    }
                }
            }
        }

        pairs
    }

    /// Link matched pairs, skipping those involving regions at or below the
    /// ignore threshold. Returns the number of links created.
    fn link(
        &mut self,
        pairs: &BTreeMap<u32, BTreeSet<u32>>,
        prev_regions: &[Option<RegionId>],
        cur_regions: &[Option<RegionId>],
    ) -> usize {
        let ignore = self.config.ignore_smaller_than;
        let mut created = 0;

        for (&prev_label, cur_labels) in pairs {
            let Some(prev) = prev_regions.get(prev_label as usize).copied().flatten() else {
                continue;
            };
            for &cur_label in cur_labels {
                let Some(next) = cur_regions.get(cur_label as usize).copied().flatten() else {
                    continue;
                };
                if self.graph[prev].size <= ignore || self.graph[next].size <= ignore {
                    self.ignored_links += 1;
                    continue;
                }
                self.graph.add_link(prev, next);
                created += 1;
            }
        }

        created
    }

    // ------------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------------

    /// Partition tracked regions into weakly connected groups and analyse
    /// each. Regions at or below the ignore threshold belong to no group.
    ///
    /// Rebuilds from the links every time, so repeated calls agree.
    pub fn group(&mut self) -> &[CloudGroup] {
        let ignore = self.config.ignore_smaller_than;
        self.consistency_errors = 0;

        let mut found: HashMap<RegionId, usize> = HashMap::new();
        let mut components: Vec<Vec<RegionId>> = Vec::new();
        for region in self.graph.regions() {
            if region.size <= ignore || found.contains_key(&region.id) {
                continue;
            }
            let members = connected_regions(&self.graph, region.id);
            let group_index = components.len();
            for &member in &members {
                if let Some(other) = found.insert(member, group_index) {
                    tracing::error!(
                        "Region {} found in groups {} and {}",
                        member,
                        other,
                        group_index
                    );
                    self.consistency_errors += 1;
                }
            }
            components.push(members);
        }

        let method = self.config.fraction_method;
        let graph = &self.graph;
        let analyses: Vec<GroupAnalysis> = components
            .into_par_iter()
            .map(|regions| GroupAnalysis::compute(graph, regions, method))
            .collect();
        self.groups = analyses
            .into_iter()
            .map(|analysis| analysis.apply(&mut self.graph))
            .collect();

        tracing::info!(
            "Grouped {} regions into {} groups",
            found.len(),
            self.groups.len()
        );

        &self.groups
    }

    // ------------------------------------------------------------------------
    // Clusters
    // ------------------------------------------------------------------------

    /// Cluster the regions of every timestep by centre distance.
    pub fn cluster(&mut self) -> &[Vec<Cluster>] {
        let distance = self.config.cluster_distance;
        self.clusters_at_time = self
            .regions_at_time
            .iter()
            .enumerate()
            .map(|(time_index, regions)| cluster_regions(&self.graph, regions, time_index, distance))
            .collect();
        &self.clusters_at_time
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn graph(&self) -> &RegionGraph {
        &self.graph
    }

    pub fn region(&self, id: RegionId) -> &Region {
        &self.graph[id]
    }

    pub fn all_regions(&self) -> &[Region] {
        self.graph.regions()
    }

    pub fn regions_at_time(&self) -> &[Vec<RegionId>] {
        &self.regions_at_time
    }

    pub fn num_frames(&self) -> usize {
        self.regions_at_time.len()
    }

    /// Displacement from frame `t - 1` to frame `t`; `None` for the first
    /// frame and for pairs that were not correlated.
    pub fn displacements(&self) -> &[Option<Displacement>] {
        &self.displacements
    }

    pub fn groups(&self) -> &[CloudGroup] {
        &self.groups
    }

    pub fn group_stats(&self) -> GroupStats {
        GroupStats::from_groups(&self.groups)
    }

    pub fn clusters_at_time(&self) -> &[Vec<Cluster>] {
        &self.clusters_at_time
    }

    /// Links skipped because an endpoint was at or below the ignore threshold.
    pub fn ignored_links(&self) -> usize {
        self.ignored_links
    }

    /// Regions assigned to more than one group by the last [`group`](Self::group).
    pub fn consistency_errors(&self) -> usize {
        self.consistency_errors
    }
}

/// Breadth-first search over prev and next links from `seed`.
fn connected_regions(graph: &RegionGraph, seed: RegionId) -> Vec<RegionId> {
    let mut visited: HashSet<RegionId> = HashSet::new();
    visited.insert(seed);
    let mut members = vec![seed];
    let mut frontier = vec![seed];

    while !frontier.is_empty() {
        let mut next_frontier = Vec::new();
        for &id in &frontier {
            let region = &graph[id];
            for neighbour in region.next().iter().copied().chain(region.prev()) {
                if visited.insert(neighbour) {
                    members.push(neighbour);
                    next_frontier.push(neighbour);
                }
            }
        }
        frontier = next_frontier;
    }

    members
}
