use common::FloatExt;
use glam::DVec2;

use super::*;

/// Six timesteps of four regions each; region `label` at any time has size `label`.
fn grid_of_regions() -> (RegionGraph, Vec<Vec<RegionId>>) {
    let mut graph = RegionGraph::new();
    let ids = (0..6)
        .map(|time_index| {
            (1..=4)
                .map(|label| graph.add_region(label, time_index, DVec2::ZERO, label as usize))
                .collect::<Vec<_>>()
        })
        .collect();
    (graph, ids)
}

fn sized(graph: &mut RegionGraph, time_index: usize, size: usize) -> RegionId {
    graph.add_region(1, time_index, DVec2::ZERO, size)
}

fn pc2009(graph: &mut RegionGraph, regions: &[RegionId]) -> CloudGroup {
    CloudGroup::new(graph, regions.to_vec(), FractionMethod::Pc2009)
}

// ============================================================================
// Topology
// ============================================================================

#[test]
fn simple_link_is_linear() {
    let (mut graph, c) = grid_of_regions();
    graph.add_link(c[0][0], c[1][0]);

    let group = pc2009(&mut graph, &[c[0][0], c[1][0]]);

    assert!(group.is_linear());
    assert!(!group.has_splits());
    assert!(!group.has_merges());
    assert!(!group.has_complex_rel());
    assert_eq!(group.len(), 2);
}

#[test]
fn one_split() {
    let (mut graph, c) = grid_of_regions();
    graph.add_link(c[0][0], c[1][0]);
    graph.add_link(c[0][0], c[1][1]);

    let group = pc2009(&mut graph, &[c[0][0], c[1][0], c[1][1]]);

    assert!(!group.is_linear());
    assert!(group.has_splits());
    assert_eq!(group.num_splits(), 1);
    assert!(!group.has_merges());
    assert!(!group.has_complex_rel());
}

#[test]
fn one_merge() {
    let (mut graph, c) = grid_of_regions();
    graph.add_link(c[0][0], c[1][0]);
    graph.add_link(c[0][1], c[1][0]);

    let group = pc2009(&mut graph, &[c[0][0], c[0][1], c[1][0]]);

    assert!(!group.is_linear());
    assert!(!group.has_splits());
    assert!(group.has_merges());
    assert_eq!(group.num_merges(), 1);
    assert!(!group.has_complex_rel());
}

#[test]
fn split_and_merge_sharing_one_successor_is_not_complex() {
    let (mut graph, c) = grid_of_regions();
    graph.add_link(c[0][0], c[1][0]);
    graph.add_link(c[0][0], c[1][1]);
    graph.add_link(c[0][1], c[1][0]);

    let group = pc2009(&mut graph, &[c[0][0], c[0][1], c[1][0], c[1][1]]);

    assert!(!group.is_linear());
    assert_eq!(group.num_splits(), 1);
    assert_eq!(group.num_merges(), 1);
    assert!(!group.has_complex_rel());
}

#[test]
fn fan_in_to_split_successors_is_not_complex() {
    let (mut graph, c) = grid_of_regions();
    let (p, n) = (&c[0], &c[1]);
    graph.add_link(p[0], n[0]);
    graph.add_link(p[0], n[1]);
    graph.add_link(p[0], n[2]);
    graph.add_link(p[1], n[1]);
    graph.add_link(p[2], n[2]);
    graph.add_link(p[3], n[2]);

    let members = [p[0], p[1], p[2], p[3], n[0], n[1], n[2]];
    let group = pc2009(&mut graph, &members);

    assert!(!group.is_linear());
    assert_eq!(group.num_splits(), 1);
    assert_eq!(group.num_merges(), 2);
    assert!(!group.has_complex_rel());
}

#[test]
fn two_regions_sharing_two_successors_are_complex() {
    let (mut graph, c) = grid_of_regions();
    graph.add_link(c[0][0], c[1][0]);
    graph.add_link(c[0][0], c[1][1]);
    graph.add_link(c[0][1], c[1][0]);
    graph.add_link(c[0][1], c[1][1]);

    let group = pc2009(&mut graph, &[c[0][0], c[0][1], c[1][0], c[1][1]]);

    assert!(!group.is_linear());
    assert_eq!(group.num_splits(), 2);
    assert_eq!(group.num_merges(), 2);
    assert!(group.has_complex_rel());
    assert_eq!(group.num_complex_rel(), 2);
    assert!(graph[c[0][0]].is_complex);
    assert!(graph[c[0][1]].is_complex);
    assert!(!graph[c[1][0]].is_complex);
}

#[test]
fn complex_relationships_counted_once_per_region() {
    let (mut graph, c) = grid_of_regions();
    let (p, n) = (&c[0], &c[1]);
    graph.add_link(p[0], n[0]);
    graph.add_link(p[0], n[1]);
    graph.add_link(p[0], n[2]);
    graph.add_link(p[1], n[1]);
    graph.add_link(p[1], n[2]);
    graph.add_link(p[2], n[2]);
    graph.add_link(p[3], n[0]);
    graph.add_link(p[3], n[2]);
    graph.add_link(p[3], n[3]);

    let members: Vec<RegionId> = p.iter().chain(n.iter()).copied().collect();
    let group = pc2009(&mut graph, &members);

    assert!(!group.is_linear());
    assert_eq!(group.num_splits(), 3);
    assert_eq!(group.num_merges(), 3);
    assert_eq!(group.num_complex_rel(), 3);
    assert_eq!(group.start_regions().len(), 4);
    assert_eq!(group.end_regions().len(), 4);
    assert!(!graph[p[2]].is_complex);
}

#[test]
fn regions_are_bucketed_by_time() {
    let (mut graph, c) = grid_of_regions();
    graph.add_link(c[2][0], c[3][0]);
    graph.add_link(c[2][0], c[3][1]);
    graph.add_link(c[3][1], c[4][2]);

    let group = pc2009(&mut graph, &[c[4][2], c[3][1], c[2][0], c[3][0]]);

    assert_eq!(group.first_time_index(), 2);
    assert_eq!(group.last_time_index(), 4);
    assert_eq!(
        group.regions_at_time(),
        &[vec![c[2][0]], vec![c[3][0], c[3][1]], vec![c[4][2]]]
    );
    assert_eq!(group.regions(), &[c[2][0], c[3][0], c[3][1], c[4][2]]);
    assert!(group.contains(c[3][1]));
    assert!(!group.contains(c[3][2]));
}

#[test]
fn rebuilding_is_idempotent() {
    let (mut graph, c) = grid_of_regions();
    graph.add_link(c[0][0], c[1][0]);
    graph.add_link(c[0][0], c[1][1]);
    graph.add_link(c[0][1], c[1][0]);
    graph.add_link(c[0][1], c[1][1]);
    let members = vec![c[0][0], c[0][1], c[1][0], c[1][1]];

    let first = CloudGroup::new(&mut graph, members.clone(), FractionMethod::Pc2009);
    let snapshot = graph.regions().to_vec();
    let second = CloudGroup::new(&mut graph, members, FractionMethod::Pc2009);

    assert_eq!(first, second);
    assert_eq!(graph.regions(), snapshot.as_slice());
}

// ============================================================================
// Fractions
// ============================================================================

#[test]
fn simple_fractions_split_by_size() {
    let mut graph = RegionGraph::new();
    let parent = sized(&mut graph, 0, 3);
    let small = sized(&mut graph, 1, 4);
    let large = sized(&mut graph, 1, 5);
    graph.add_link(parent, small);
    graph.add_link(parent, large);

    CloudGroup::new(&mut graph, vec![parent, small, large], FractionMethod::Simple);

    assert!(graph[small].fraction(parent).unwrap().approximately_eq(4.0 / 9.0));
    assert!(graph[large].fraction(parent).unwrap().approximately_eq(5.0 / 9.0));
    assert_eq!(graph[small].reduced_fraction(parent), None);
}

#[test]
fn pc2009_fractions_two_predecessors_three_successors() {
    let mut graph = RegionGraph::new();
    let p1 = sized(&mut graph, 0, 3);
    let p2 = sized(&mut graph, 0, 4);
    let n5 = sized(&mut graph, 1, 5);
    let n6 = sized(&mut graph, 1, 6);
    let n7 = sized(&mut graph, 1, 7);
    graph.add_link(p1, n5);
    graph.add_link(p1, n6);
    graph.add_link(p2, n5);
    graph.add_link(p2, n6);
    graph.add_link(p2, n7);

    pc2009(&mut graph, &[p1, p2, n5, n6, n7]);

    let expected = [
        (n5, p1, 11.0 / 25.0),
        (n5, p2, 7.0 / 30.0),
        (n6, p1, 14.0 / 25.0),
        (n6, p2, 9.0 / 30.0),
        (n7, p2, 14.0 / 30.0),
    ];
    for (next, prev, fraction) in expected {
        let actual = graph[next].fraction(prev).unwrap();
        assert!(
            actual.approximately_eq(fraction),
            "fraction of {} in {}: expected {}, got {}",
            prev,
            next,
            fraction,
            actual
        );
    }

    // First pass: 5 - (3/2 + 4/3) + 3/2
    assert!(graph[n5].reduced_fraction(p1).unwrap().approximately_eq(11.0 / 3.0));
    assert!(graph[n7].reduced_fraction(p2).unwrap().approximately_eq(7.0));
}

#[test]
fn pc2009_single_successor_takes_everything() {
    let mut graph = RegionGraph::new();
    let a = sized(&mut graph, 0, 10);
    let b = sized(&mut graph, 1, 2);
    graph.add_link(a, b);

    pc2009(&mut graph, &[a, b]);

    assert_eq!(graph[b].fraction(a), Some(1.0));
}

#[test]
fn pc2009_fractions_of_each_predecessor_sum_to_one() {
    let mut graph = RegionGraph::new();
    let p1 = sized(&mut graph, 0, 8);
    let p2 = sized(&mut graph, 0, 2);
    let n1 = sized(&mut graph, 1, 3);
    let n2 = sized(&mut graph, 1, 9);
    let n3 = sized(&mut graph, 1, 1);
    graph.add_link(p1, n1);
    graph.add_link(p1, n2);
    graph.add_link(p2, n2);
    graph.add_link(p2, n3);

    pc2009(&mut graph, &[p1, p2, n1, n2, n3]);

    for prev in [p1, p2] {
        let total: f64 = graph[prev]
            .next()
            .iter()
            .map(|&next| graph[next].fraction(prev).unwrap())
            .sum();
        assert!(total.approximately_eq(1.0), "fractions of {} sum to {}", prev, total);
    }
}

#[test]
fn zero_size_successors_give_infinite_fraction() {
    for method in [FractionMethod::Simple, FractionMethod::Pc2009] {
        let mut graph = RegionGraph::new();
        let parent = sized(&mut graph, 0, 0);
        let a = sized(&mut graph, 1, 0);
        let b = sized(&mut graph, 1, 0);
        graph.add_link(parent, a);
        graph.add_link(parent, b);

        CloudGroup::new(&mut graph, vec![parent, a, b], method);

        assert_eq!(graph[a].fraction(parent), Some(f64::INFINITY), "{:?}", method);
        assert_eq!(graph[b].fraction(parent), Some(f64::INFINITY), "{:?}", method);
    }
}

// ============================================================================
// Lifetimes
// ============================================================================

#[test]
fn linear_chain_lifetime_counts_hops() {
    let mut graph = RegionGraph::new();
    let chain: Vec<RegionId> = (0..3).map(|t| sized(&mut graph, t, 1)).collect();
    graph.add_link(chain[0], chain[1]);
    graph.add_link(chain[1], chain[2]);

    pc2009(&mut graph, &chain);

    let lifetimes: Vec<Option<u32>> = chain.iter().map(|&id| graph[id].lifetime).collect();
    assert_eq!(lifetimes, vec![Some(1), Some(2), Some(3)]);
}

#[test]
fn merge_lifetime_follows_longest_branch() {
    // a0 -> a1 -> m, and b1 -> m
    let mut graph = RegionGraph::new();
    let a0 = sized(&mut graph, 0, 1);
    let a1 = sized(&mut graph, 1, 1);
    let b1 = sized(&mut graph, 1, 1);
    let m = sized(&mut graph, 2, 2);
    graph.add_link(a0, a1);
    graph.add_link(a1, m);
    graph.add_link(b1, m);

    let group = pc2009(&mut graph, &[a0, a1, b1, m]);

    assert_eq!(group.start_regions(), &[a0, b1]);
    assert_eq!(graph[b1].lifetime, Some(1));
    assert_eq!(graph[a1].lifetime, Some(2));
    assert_eq!(graph[m].lifetime, Some(3));
}

#[test]
fn every_region_gets_a_lifetime() {
    let (mut graph, c) = grid_of_regions();
    graph.add_link(c[0][0], c[1][0]);
    graph.add_link(c[0][0], c[1][1]);
    graph.add_link(c[1][0], c[2][0]);
    graph.add_link(c[1][1], c[2][0]);
    graph.add_link(c[1][2], c[2][0]);
    graph.add_link(c[2][0], c[3][0]);
    let members = vec![c[0][0], c[1][0], c[1][1], c[1][2], c[2][0], c[3][0]];

    pc2009(&mut graph, &members);

    assert!(members.iter().all(|&id| graph[id].lifetime.is_some()));
    assert_eq!(graph[c[1][2]].lifetime, Some(1));
    assert_eq!(graph[c[3][0]].lifetime, Some(4));
}

// ============================================================================
// Property timeseries
// ============================================================================

#[test]
fn lifetime_properties_of_chain() {
    let mut graph = RegionGraph::new();
    let chain: Vec<RegionId> = (0..3).map(|t| sized(&mut graph, t, t + 1)).collect();
    graph.add_link(chain[0], chain[1]);
    graph.add_link(chain[1], chain[2]);

    let group = pc2009(&mut graph, &chain);
    let series = group.lifetime_properties(&graph, |region| region.size as f64);

    assert_eq!(series, vec![vec![1.0, 2.0, 3.0]]);
}

#[test]
fn lifetime_properties_sum_merged_predecessors() {
    let mut graph = RegionGraph::new();
    let a = sized(&mut graph, 0, 2);
    let b = sized(&mut graph, 0, 4);
    let m = sized(&mut graph, 1, 6);
    graph.add_link(a, m);
    graph.add_link(b, m);

    let group = pc2009(&mut graph, &[a, b, m]);
    let series = group.lifetime_properties(&graph, |region| region.size as f64);

    assert_eq!(series, vec![vec![6.0, 6.0]]);
}

#[test]
fn lifetime_properties_weight_split_parent() {
    let mut graph = RegionGraph::new();
    let parent = sized(&mut graph, 0, 3);
    let x = sized(&mut graph, 1, 4);
    let y = sized(&mut graph, 1, 5);
    graph.add_link(parent, x);
    graph.add_link(parent, y);

    let group = CloudGroup::new(&mut graph, vec![parent, x, y], FractionMethod::Simple);
    let series = group.lifetime_properties(&graph, |region| region.size as f64);

    assert_eq!(group.end_regions(), &[x, y]);
    assert_eq!(series.len(), 2);
    assert!(series[0][0].approximately_eq(4.0 / 3.0));
    assert!(series[0][1].approximately_eq(4.0));
    assert!(series[1][0].approximately_eq(5.0 / 3.0));
    assert!(series[1][1].approximately_eq(5.0));
}

// ============================================================================
// Summary statistics
// ============================================================================

#[test]
fn group_stats_classify_groups() {
    let (mut graph, c) = grid_of_regions();
    // Linear
    graph.add_link(c[0][0], c[1][0]);
    // Split only
    graph.add_link(c[0][1], c[1][1]);
    graph.add_link(c[0][1], c[1][2]);
    // Complex
    graph.add_link(c[2][0], c[3][0]);
    graph.add_link(c[2][0], c[3][1]);
    graph.add_link(c[2][1], c[3][0]);
    graph.add_link(c[2][1], c[3][1]);

    let groups = vec![
        pc2009(&mut graph, &[c[0][0], c[1][0]]),
        pc2009(&mut graph, &[c[0][1], c[1][1], c[1][2]]),
        pc2009(&mut graph, &[c[2][0], c[2][1], c[3][0], c[3][1]]),
    ];
    let stats = GroupStats::from_groups(&groups);

    assert_eq!(
        stats,
        GroupStats {
            num_regions: 9,
            num_groups: 3,
            linear: 1,
            merge_only: 0,
            split_only: 1,
            merge_and_split: 1,
            complex: 1,
        }
    );
    assert!(stats.to_string().contains("Complex groups: 1"));
}
