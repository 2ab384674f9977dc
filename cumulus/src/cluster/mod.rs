//! Per-timestep spatial clustering of regions.
//!
//! Clusters are connected components of the "centres closer than the
//! threshold" relation among regions of one timestep. They are unrelated to
//! the lineage graph and carry no identity across timesteps.


use crate::region::{RegionGraph, RegionId};

/// Regions of one timestep that are transitively close to each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub time_index: usize,
    /// Members in discovery order; the first is the seed.
    pub regions: Vec<RegionId>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Partition `regions` (all from `time_index`) into clusters.
///
/// Two regions are neighbours when their centres are strictly closer than
/// `distance` metres. Seeds are taken in the order of `regions`.
pub fn cluster_regions(
    graph: &RegionGraph,
    regions: &[RegionId],
    time_index: usize,
    distance: f64,
) -> Vec<Cluster> {
    let mut clustered = vec![false; regions.len()];
    let mut clusters = Vec::new();

    for seed in 0..regions.len() {
        if clustered[seed] {
            continue;
        }
        clustered[seed] = true;

        let mut members = vec![regions[seed]];
        let mut frontier = vec![seed];
        while !frontier.is_empty() {
            let mut next_frontier = Vec::new();
            for &current in &frontier {
                let position = graph[regions[current]].position;
                for (other, &id) in regions.iter().enumerate() {
                    if !clustered[other] && position.distance(graph[id].position) < distance {
                        clustered[other] = true;
                        members.push(id);
                        next_frontier.push(other);
                    }
                }
            }
            frontier = next_frontier;
        }

        clusters.push(Cluster {
            time_index,
            regions: members,
        });
    }

    tracing::debug!(
        "time {}: {} regions in {} clusters",
        time_index,
        regions.len(),
        clusters.len()
    );

    clusters
}
