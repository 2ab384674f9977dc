//! Weakly connected groups of regions and their lineage analytics.
//!
//! A [`CloudGroup`] is built in two steps: a read-only [`GroupAnalysis`] of
//! the graph (topology, fractions, lifetimes), then a write-back of the
//! per-region results. Analyses of disjoint groups are independent, so the
//! tracker runs the first step in parallel.
//!
//! Fraction apportionment follows Plant (2009), eqns 4-6, or a simple
//! size-proportional split.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fmt;

use hashbrown::{HashMap, HashSet};

use crate::config::FractionMethod;
use crate::region::{Region, RegionGraph, RegionId};

// ============================================================================
// Analysis
// ============================================================================

/// Fraction data for one `prev -> next` edge.
#[derive(Debug, Clone, Copy, PartialEq)]
struct EdgeFraction {
    prev: RegionId,
    next: RegionId,
    reduced_fraction: Option<f64>,
    fraction: f64,
}

/// Everything derived from a group's links, computed without mutating the graph.
#[derive(Debug, Clone)]
pub(crate) struct GroupAnalysis {
    group: CloudGroup,
    complex: Vec<RegionId>,
    fractions: Vec<EdgeFraction>,
    lifetimes: Vec<(RegionId, u32)>,
}

impl GroupAnalysis {
    pub(crate) fn compute(graph: &RegionGraph, mut regions: Vec<RegionId>, method: FractionMethod) -> Self {
        assert!(!regions.is_empty(), "a group needs at least one region");
        regions.sort_unstable();
        regions.dedup();

        let start_regions: Vec<RegionId> = regions
            .iter()
            .copied()
            .filter(|&id| graph[id].num_prev() == 0)
            .collect();
        let end_regions: Vec<RegionId> = regions
            .iter()
            .copied()
            .filter(|&id| graph[id].num_next() == 0)
            .collect();

        let (num_splits, num_merges, complex) = classify(graph, &regions);
        let (first_time_index, regions_at_time) = arrange_by_time(graph, &regions);

        let fractions = match method {
            FractionMethod::Pc2009 => pc2009_fractions(graph, &regions),
            FractionMethod::Simple => simple_fractions(graph, &regions),
        };
        let lifetimes = propagate_lifetimes(graph, &start_regions);

        Self {
            group: CloudGroup {
                regions,
                start_regions,
                end_regions,
                first_time_index,
                regions_at_time,
                num_splits,
                num_merges,
                num_complex_rel: complex.len(),
            },
            complex,
            fractions,
            lifetimes,
        }
    }

    /// Write per-region results into the graph.
    pub(crate) fn apply(self, graph: &mut RegionGraph) -> CloudGroup {
        for &id in &self.group.regions {
            graph.region_mut(id).is_complex = false;
        }
        for &id in &self.complex {
            graph.region_mut(id).is_complex = true;
        }
        for edge in &self.fractions {
            let link = graph.region_mut(edge.next).prev_link_mut(edge.prev);
            link.reduced_fraction = edge.reduced_fraction;
            link.fraction = Some(edge.fraction);
        }
        for &(id, lifetime) in &self.lifetimes {
            graph.region_mut(id).lifetime = Some(lifetime);
        }
        self.group
    }
}

/// Count splits and merges and find regions in complex relationships.
///
/// A region with at least two successors is complex when another region
/// shares at least two of those successors.
fn classify(graph: &RegionGraph, regions: &[RegionId]) -> (usize, usize, Vec<RegionId>) {
    let mut num_splits = 0;
    let mut num_merges = 0;
    let mut complex = Vec::new();

    for &id in regions {
        let region = &graph[id];

        if region.num_next() >= 2 {
            num_splits += 1;

            let successors: HashSet<RegionId> = region.next().iter().copied().collect();
            let is_complex = region
                .next()
                .iter()
                .flat_map(|&next| graph[next].prev())
                .filter(|&other| other != id)
                .any(|other| {
                    graph[other]
                        .next()
                        .iter()
                        .filter(|next| successors.contains(*next))
                        .count()
                        >= 2
                });
            if is_complex {
                complex.push(id);
            }
        }

        if region.num_prev() >= 2 {
            num_merges += 1;
        }
    }

    (num_splits, num_merges, complex)
}

/// Bucket regions by timestep, covering every step from first to last.
fn arrange_by_time(graph: &RegionGraph, regions: &[RegionId]) -> (usize, Vec<Vec<RegionId>>) {
    let first = regions
        .iter()
        .map(|&id| graph[id].time_index)
        .min()
        .unwrap_or(0);
    let last = regions
        .iter()
        .map(|&id| graph[id].time_index)
        .max()
        .unwrap_or(0);

    let mut buckets = vec![Vec::new(); last - first + 1];
    for &id in regions {
        buckets[graph[id].time_index - first].push(id);
    }
    (first, buckets)
}

/// Successor share of a predecessor that cannot be represented is reported
/// and replaced by infinity.
fn checked_fraction(prev: RegionId, next: RegionId, fraction: f64) -> f64 {
    if fraction.is_finite() {
        fraction
    } else {
        tracing::warn!(
            "fraction of {} attributed to {} is not finite ({}), zero-size successors?",
            prev,
            next,
            fraction
        );
        f64::INFINITY
    }
}

/// Two-pass apportionment of Plant (2009).
///
/// Pass 1, for each region `c` with predecessors:
/// `reduced(c, p) = c.size - sum_q(q.size / |q.next|) + p.size / |p.next|`.
/// Pass 2 normalises each predecessor's reduced fractions over its successors.
fn pc2009_fractions(graph: &RegionGraph, regions: &[RegionId]) -> Vec<EdgeFraction> {
    let share = |id: RegionId| {
        let region = &graph[id];
        region.size as f64 / region.num_next() as f64
    };

    let mut reduced: HashMap<(RegionId, RegionId), f64> = HashMap::new();
    for &id in regions {
        let region = &graph[id];
        if region.num_prev() == 0 {
            continue;
        }
        let remainder = region.size as f64 - region.prev().map(share).sum::<f64>();
        for prev in region.prev() {
            reduced.insert((id, prev), remainder + share(prev));
        }
    }

    let mut fractions = Vec::with_capacity(reduced.len());
    for &id in regions {
        let region = &graph[id];
        match region.next() {
            [] => {}
            [next] => fractions.push(EdgeFraction {
                prev: id,
                next: *next,
                reduced_fraction: Some(reduced[&(*next, id)]),
                fraction: 1.0,
            }),
            nexts => {
                let norm = 1.0 / nexts.iter().map(|&next| reduced[&(next, id)]).sum::<f64>();
                for &next in nexts {
                    let reduced_fraction = reduced[&(next, id)];
                    fractions.push(EdgeFraction {
                        prev: id,
                        next,
                        reduced_fraction: Some(reduced_fraction),
                        fraction: checked_fraction(id, next, norm * reduced_fraction),
                    });
                }
            }
        }
    }
    fractions
}

/// Each successor takes its size over the summed size of all successors.
fn simple_fractions(graph: &RegionGraph, regions: &[RegionId]) -> Vec<EdgeFraction> {
    let mut fractions = Vec::new();
    for &id in regions {
        let nexts = graph[id].next();
        if nexts.len() == 1 {
            fractions.push(EdgeFraction {
                prev: id,
                next: nexts[0],
                reduced_fraction: None,
                fraction: 1.0,
            });
            continue;
        }

        let total: usize = nexts.iter().map(|&next| graph[next].size).sum();
        for &next in nexts {
            fractions.push(EdgeFraction {
                prev: id,
                next,
                reduced_fraction: None,
                fraction: checked_fraction(id, next, graph[next].size as f64 / total as f64),
            });
        }
    }
    fractions
}

/// Lifetime is the hop count along the longest chain of predecessors.
///
/// Breadth-first from the start regions; a region joins the frontier only
/// once every predecessor has a lifetime.
fn propagate_lifetimes(graph: &RegionGraph, start_regions: &[RegionId]) -> Vec<(RegionId, u32)> {
    let mut lifetimes: HashMap<RegionId, u32> = HashMap::new();
    let mut order = Vec::new();
    let mut frontier: Vec<RegionId> = start_regions.to_vec();

    while !frontier.is_empty() {
        for &id in &frontier {
            let lifetime = graph[id]
                .prev()
                .map(|prev| lifetimes[&prev])
                .max()
                .map_or(1, |longest| longest + 1);
            lifetimes.insert(id, lifetime);
            order.push((id, lifetime));
        }

        let mut queued: HashSet<RegionId> = HashSet::new();
        let mut next_frontier = Vec::new();
        for &id in &frontier {
            for &next in graph[id].next() {
                if !lifetimes.contains_key(&next)
                    && graph[next].prev().all(|prev| lifetimes.contains_key(&prev))
                    && queued.insert(next)
                {
                    next_frontier.push(next);
                }
            }
        }
        frontier = next_frontier;
    }

    order
}

// ============================================================================
// CloudGroup
// ============================================================================

/// Regions connected through prev/next links, with their topology summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudGroup {
    regions: Vec<RegionId>,
    start_regions: Vec<RegionId>,
    end_regions: Vec<RegionId>,
    first_time_index: usize,
    regions_at_time: Vec<Vec<RegionId>>,
    num_splits: usize,
    num_merges: usize,
    num_complex_rel: usize,
}

impl CloudGroup {
    /// Analyse `regions` (which must be linked to each other and to nothing
    /// else) and store fractions, lifetimes and complexity flags in `graph`.
    pub fn new(graph: &mut RegionGraph, regions: Vec<RegionId>, method: FractionMethod) -> Self {
        GroupAnalysis::compute(graph, regions, method).apply(graph)
    }

    /// Members in ascending id order.
    pub fn regions(&self) -> &[RegionId] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Members without predecessors.
    pub fn start_regions(&self) -> &[RegionId] {
        &self.start_regions
    }

    /// Members without successors.
    pub fn end_regions(&self) -> &[RegionId] {
        &self.end_regions
    }

    pub fn first_time_index(&self) -> usize {
        self.first_time_index
    }

    pub fn last_time_index(&self) -> usize {
        self.first_time_index + self.regions_at_time.len() - 1
    }

    /// One bucket per timestep from first to last, possibly empty.
    pub fn regions_at_time(&self) -> &[Vec<RegionId>] {
        &self.regions_at_time
    }

    pub fn num_splits(&self) -> usize {
        self.num_splits
    }

    pub fn num_merges(&self) -> usize {
        self.num_merges
    }

    pub fn num_complex_rel(&self) -> usize {
        self.num_complex_rel
    }

    pub fn has_splits(&self) -> bool {
        self.num_splits > 0
    }

    pub fn has_merges(&self) -> bool {
        self.num_merges > 0
    }

    pub fn has_complex_rel(&self) -> bool {
        self.num_complex_rel > 0
    }

    pub fn is_linear(&self) -> bool {
        !(self.has_splits() || self.has_merges() || self.has_complex_rel())
    }

    pub fn contains(&self, id: RegionId) -> bool {
        self.regions.binary_search(&id).is_ok()
    }

    /// Fraction-weighted history of `property` leading to each end region.
    ///
    /// For every end region the walk goes back one timestep at a time. Each
    /// predecessor's weight is the sum over its successors on the path of
    /// `weight(successor) * fraction(successor, predecessor)`; the value at
    /// that timestep is the weighted sum of `property`. Series are returned
    /// oldest first, in the order of [`end_regions`](Self::end_regions).
    pub fn lifetime_properties(
        &self,
        graph: &RegionGraph,
        property: impl Fn(&Region) -> f64,
    ) -> Vec<Vec<f64>> {
        self.end_regions
            .iter()
            .map(|&end| {
                let mut series = Vec::new();
                let mut frontier: BTreeMap<RegionId, f64> = BTreeMap::from([(end, 1.0)]);

                while !frontier.is_empty() {
                    series.push(
                        frontier
                            .iter()
                            .map(|(&id, &weight)| weight * property(&graph[id]))
                            .sum(),
                    );

                    let mut next_frontier: BTreeMap<RegionId, f64> = BTreeMap::new();
                    for (&id, &weight) in &frontier {
                        let region = &graph[id];
                        for link in region.prev_links() {
                            // Links outside an analysed group carry no fraction.
                            let fraction = link.fraction.unwrap_or(1.0);
                            *next_frontier.entry(link.region).or_insert(0.0) += weight * fraction;
                        }
                    }
                    frontier = next_frontier;
                }

                series.reverse();
                series
            })
            .collect()
    }
}

// ============================================================================
// Summary statistics
// ============================================================================

/// Topology counts over a set of groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupStats {
    pub num_regions: usize,
    pub num_groups: usize,
    pub linear: usize,
    pub merge_only: usize,
    pub split_only: usize,
    pub merge_and_split: usize,
    pub complex: usize,
}

impl GroupStats {
    pub fn from_groups(groups: &[CloudGroup]) -> Self {
        let mut stats = Self {
            num_groups: groups.len(),
            ..Self::default()
        };
        for group in groups {
            stats.num_regions += group.len();
            match (group.has_splits(), group.has_merges()) {
                (false, false) => {}
                (false, true) => stats.merge_only += 1,
                (true, false) => stats.split_only += 1,
                (true, true) => stats.merge_and_split += 1,
            }
            if group.is_linear() {
                stats.linear += 1;
            }
            if group.has_complex_rel() {
                stats.complex += 1;
            }
        }
        stats
    }
}

impl fmt::Display for GroupStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total regions: {}", self.num_regions)?;
        writeln!(f, "Total groups: {}", self.num_groups)?;
        writeln!(f, "Linear groups: {}", self.linear)?;
        writeln!(f, "Merge only groups: {}", self.merge_only)?;
        writeln!(f, "Split only groups: {}", self.split_only)?;
        writeln!(f, "Merge and split groups: {}", self.merge_and_split)?;
        write!(f, "Complex groups: {}", self.complex)
    }
}
