// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
// https://arxiv.org/abs/0803.0476

//! Multi-level Louvain optimization over any [`QualityFunction`].
//!
//! Each level runs the local moving phase until the objective stops
//! improving, records the resulting partition and, if anything moved,
//! collapses every community into a single node before starting over on the
//! smaller graph.

use fixedbitset::FixedBitSet;
use foldhash::{HashMap, HashMapExt};
use serde::Serialize;
use tracing::{debug, info, trace};

use super::common::{
    build_rng, compose_mapping, compose_up_to, group_by_labels, renumber, shuffle_nodes,
    CommunityRng,
};
use super::quality::{GraphConstants, Objective, QualityFunction, QualitySpec};
use crate::config::LouvainConfig;
use crate::error::{LouvainError, Result};
use crate::graph::CompactGraph;

// ========================
// Local moving phase
// ========================

/// Greedy node relocation for one level.
///
/// Scratch buffers are indexed by community id and reused across nodes and
/// levels.
#[derive(Clone, Debug)]
pub struct LocalOptimizer {
    precision: f64,
    max_passes: Option<usize>,
    /// Weight shared with each touched community
    shared: Vec<f64>,
    touched: FixedBitSet,
    /// Touched communities in scan order, own community first
    candidates: Vec<usize>,
}

impl LocalOptimizer {
    pub fn new(precision: f64, max_passes: Option<usize>) -> Self {
        LocalOptimizer {
            precision,
            max_passes,
            shared: Vec::new(),
            touched: FixedBitSet::new(),
            candidates: Vec::new(),
        }
    }

    fn reset(&mut self, node_count: usize) {
        self.shared.clear();
        self.shared.resize(node_count, 0.0);
        self.touched.clear();
        self.touched.grow(node_count);
        self.candidates.clear();
    }

    /// Collect the communities adjacent to `node` and the weight it shares
    /// with each. Self-loops are skipped.
    fn scan_neighborhood<'g, Q: QualityFunction<'g>>(&mut self, objective: &Q, node: usize) {
        let state = objective.state();
        let own = state.community(node);
        self.touched.insert(own);
        self.candidates.push(own);
        self.shared[own] = 0.0;

        for (neighbor, weight) in objective.graph().neighbors(node) {
            if neighbor == node {
                continue;
            }
            let comm = state.community(neighbor);
            if !self.touched.put(comm) {
                self.candidates.push(comm);
                self.shared[comm] = 0.0;
            }
            self.shared[comm] += weight;
        }
    }

    fn clear_scan(&mut self) {
        for &comm in &self.candidates {
            self.touched.set(comm, false);
        }
        self.candidates.clear();
    }

    /// Run passes over all nodes until the objective converges.
    ///
    /// Every pass visits the nodes in a fresh permutation drawn from `rng`.
    /// A node leaves its community only for a neighbor community with a
    /// strictly greater gain than returning home.
    ///
    /// # Returns
    /// * `true` if the final assignment differs from the identity partition
    pub fn one_level<'g, Q: QualityFunction<'g>>(
        &mut self,
        objective: &mut Q,
        rng: &mut CommunityRng,
    ) -> bool {
        let graph = objective.graph();
        let node_count = graph.node_count();
        if node_count == 0 {
            return false;
        }
        self.reset(node_count);

        let mut nodes: Vec<usize> = (0..node_count).collect();
        let mut quality = objective.quality();
        let mut pass = 0;

        loop {
            pass += 1;
            shuffle_nodes(rng, &mut nodes);
            let mut moves = 0;

            for &node in &nodes {
                self.scan_neighborhood(objective, node);
                let own = self.candidates[0];
                let own_shared = self.shared[own];
                let degree = graph.weighted_degree(node);

                objective.remove(node, own, own_shared);

                let mut best = own;
                let mut best_shared = own_shared;
                let mut best_gain = objective.gain(node, own, own_shared, degree);
                for &comm in &self.candidates[1..] {
                    let shared = self.shared[comm];
                    let gain = objective.gain(node, comm, shared, degree);
                    if gain > best_gain {
                        best = comm;
                        best_shared = shared;
                        best_gain = gain;
                    }
                }

                objective.insert(node, best, best_shared);
                if best != own {
                    moves += 1;
                }
                self.clear_scan();
            }

            let new_quality = objective.quality();
            trace!(pass, moves, quality = new_quality, "pass finished");

            let threshold = if quality.abs() <= f64::EPSILON {
                self.precision
            } else {
                self.precision * quality.abs()
            };
            let increase = new_quality - quality;
            quality = new_quality;

            if moves == 0
                || increase < threshold
                || self.max_passes.is_some_and(|max| pass >= max)
            {
                break;
            }
        }

        objective
            .assignment()
            .iter()
            .enumerate()
            .any(|(node, &comm)| node != comm)
    }
}

// ========================
// Aggregation
// ========================

impl CompactGraph {
    /// Collapse every community of `partition` into one node.
    ///
    /// `partition` must map each node to a contiguous community id (see the
    /// renumbering done by the level driver). Edges between two communities
    /// are merged into one edge carrying the summed weight; edges inside a
    /// community become a single self-loop holding every internal slot, so
    /// the total weight is unchanged. Node weights are summed.
    ///
    /// # Errors
    /// `MalformedGraph` if `partition` does not assign every node.
    pub fn aggregate(&self, partition: &[usize]) -> Result<CompactGraph> {
        if partition.len() != self.node_count() {
            return Err(LouvainError::malformed(format!(
                "partition covers {} nodes, graph has {}",
                partition.len(),
                self.node_count()
            )));
        }
        let count = partition.iter().copied().max().map_or(0, |max| max + 1);

        let mut merged: Vec<HashMap<usize, f64>> = vec![HashMap::new(); count];
        let mut node_weights = vec![0.0; count];
        for (node, &comm) in partition.iter().enumerate() {
            node_weights[comm] += self.node_weight(node);
            for (neighbor, weight) in self.neighbors(node) {
                *merged[comm].entry(partition[neighbor]).or_insert(0.0) += weight;
            }
        }

        let slots: usize = merged.iter().map(|neighbors| neighbors.len()).sum();
        let mut degrees = Vec::with_capacity(count);
        let mut links = Vec::with_capacity(slots);
        let mut weights = Vec::with_capacity(slots);
        for neighbors in merged {
            let mut entries: Vec<(usize, f64)> = neighbors.into_iter().collect();
            entries.sort_unstable_by_key(|&(neighbor, _)| neighbor);
            for (neighbor, weight) in entries {
                links.push(neighbor);
                weights.push(weight);
            }
            degrees.push(links.len() as u64);
        }

        Ok(CompactGraph::from_trusted(
            degrees,
            links,
            weights,
            node_weights,
        ))
    }
}

// ========================
// Level driver
// ========================

/// Partitions found at every level, with the objective value each level
/// reached.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Hierarchy {
    levels: Vec<Vec<usize>>,
    qualities: Vec<f64>,
    final_quality: f64,
}

impl Hierarchy {
    /// Per-level partitions. Level 0 is indexed by original node id, level
    /// `l + 1` by the community ids of level `l`.
    pub fn levels(&self) -> &[Vec<usize>] {
        &self.levels
    }

    pub fn qualities(&self) -> &[f64] {
        &self.qualities
    }

    /// Quality of the last level, 0 for an empty graph.
    pub fn final_quality(&self) -> f64 {
        self.final_quality
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Top-level community of every original node.
    pub fn mapping(&self) -> Vec<(usize, usize)> {
        compose_mapping(&self.levels)
    }

    /// Community of every original node after `level` aggregations.
    ///
    /// # Errors
    /// `InvalidParameter` if the hierarchy has no such level.
    pub fn partition_at(&self, level: usize) -> Result<Vec<usize>> {
        if level >= self.levels.len() {
            return Err(LouvainError::invalid(
                "level",
                format!("level {level} requested, hierarchy has {}", self.levels.len()),
            ));
        }
        Ok(compose_up_to(&self.levels, level + 1))
    }

    /// Original nodes grouped by top-level community.
    pub fn communities(&self) -> Vec<Vec<usize>> {
        group_by_labels(&compose_up_to(&self.levels, self.levels.len()))
    }

    pub fn community_count(&self) -> usize {
        self.levels
            .last()
            .and_then(|level| level.iter().copied().max())
            .map_or(0, |max| max + 1)
    }
}

/// Runs optimize, record, aggregate cycles until a level stops improving.
pub struct LevelDriver {
    spec: QualitySpec,
    optimizer: LocalOptimizer,
    rng: CommunityRng,
    constants: Option<GraphConstants>,
}

impl LevelDriver {
    pub fn new(config: &LouvainConfig) -> Self {
        LevelDriver {
            spec: config.quality.normalized(),
            optimizer: LocalOptimizer::new(config.precision, config.max_passes),
            rng: build_rng(config.seed),
            constants: None,
        }
    }

    /// Build the objective for one level, preparing the graph on first use.
    fn objective<'g>(&mut self, graph: &'g mut CompactGraph) -> Objective<'g> {
        let constants = match self.constants.take() {
            Some(constants) => constants,
            None => self.spec.prepare(graph),
        };
        self.constants = Some(constants);
        let graph: &'g CompactGraph = graph;
        self.spec.build(graph, &constants)
    }

    pub fn run(mut self, mut graph: CompactGraph) -> Result<Hierarchy> {
        let mut hierarchy = Hierarchy::default();
        info!(
            quality = self.spec.name(),
            nodes = graph.node_count(),
            links = graph.link_count(),
            "starting multi-level optimization"
        );
        if graph.node_count() == 0 {
            return Ok(hierarchy);
        }

        loop {
            debug!(
                level = hierarchy.depth(),
                nodes = graph.node_count(),
                links = graph.link_count(),
                total_weight = graph.total_weight(),
                "network size"
            );
            let (improved, partition, quality) = {
                let mut objective = self.objective(&mut graph);
                let before = objective.quality();
                let improved = self.optimizer.one_level(&mut objective, &mut self.rng);
                let after = objective.quality();
                debug!("quality increased from {before} to {after}");
                (improved, renumber(objective.assignment()), after)
            };

            let next = if improved {
                Some(graph.aggregate(&partition)?)
            } else {
                None
            };
            hierarchy.levels.push(partition);
            hierarchy.qualities.push(quality);
            hierarchy.final_quality = quality;

            match next {
                // a relabelling that merges nothing cannot make progress
                Some(coarse) if coarse.node_count() < graph.node_count() => graph = coarse,
                _ => break,
            }
        }

        info!(
            levels = hierarchy.depth(),
            communities = hierarchy.community_count(),
            quality = hierarchy.final_quality,
            "optimization finished"
        );
        Ok(hierarchy)
    }
}

/// Detect communities in `graph` with the objective and stopping rules of
/// `config`.
///
/// # Errors
/// `InvalidParameter` if `config` does not validate.
pub fn run(graph: CompactGraph, config: &LouvainConfig) -> Result<Hierarchy> {
    config.validate()?;
    LevelDriver::new(config).run(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::community::quality::tests::{bridged_clusters, ALL_SPECS};
    use crate::community::quality::ZahnCondorcet;
    use crate::graph::{EdgeList, WeightMode};

    fn two_triangles() -> CompactGraph {
        let mut edges = EdgeList::new();
        for &(u, v) in &[(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5)] {
            edges.add_edge(u, v, 1.0).unwrap();
        }
        edges.to_compact(WeightMode::Unweighted)
    }

    #[test]
    fn two_triangles_split_cleanly() {
        let hierarchy = run(two_triangles(), &LouvainConfig::default()).unwrap();
        assert_eq!(hierarchy.depth(), 2);

        let first = &hierarchy.levels()[0];
        assert!(first[0] == first[1] && first[1] == first[2]);
        assert!(first[3] == first[4] && first[4] == first[5]);
        assert_ne!(first[0], first[3]);
        assert_eq!(hierarchy.levels()[1], vec![0, 1]);

        let mapping = hierarchy.mapping();
        assert_eq!(mapping.len(), 6);
        assert_eq!(mapping[1].1, mapping[0].1);
        assert_ne!(mapping[3].1, mapping[0].1);
        assert_eq!(hierarchy.community_count(), 2);
        assert_eq!(hierarchy.communities(), vec![vec![0, 1, 2], vec![3, 4, 5]]);
        assert!((hierarchy.final_quality() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn intra_triangle_moves_gain_and_cross_moves_do_not() {
        let graph = two_triangles();
        let mut objective = QualitySpec::Modularity.build(&graph, &GraphConstants::default());
        let degree = graph.weighted_degree(1);
        objective.remove(1, 1, 0.0);
        assert!(objective.gain(1, 0, 1.0, degree) > 0.0);
        assert!(objective.gain(1, 2, 1.0, degree) > 0.0);
        assert!(objective.gain(1, 3, 0.0, degree) <= 0.0);
    }

    #[test]
    fn aggregation_folds_triangles_into_self_loops() {
        let coarse = two_triangles().aggregate(&[0, 0, 0, 1, 1, 1]).unwrap();
        assert_eq!(coarse.node_count(), 2);
        assert_eq!(coarse.link_count(), 2);
        assert_eq!(coarse.self_loop_weight(0), 6.0);
        assert_eq!(coarse.self_loop_weight(1), 6.0);
        assert_eq!(coarse.total_weight(), 12.0);
        assert_eq!(coarse.node_weights(), &[3.0, 3.0]);
    }

    #[test]
    fn aggregation_conserves_weight() {
        let graph = bridged_clusters();
        let coarse = graph.aggregate(&[0, 0, 0, 1, 1, 1, 1]).unwrap();
        assert_eq!(coarse.total_weight(), graph.total_weight());
        assert_eq!(coarse.sum_node_weights(), graph.sum_node_weights());
        assert_eq!(coarse.self_loop_weight(0), 2.0 * (2.0 + 1.0 + 3.0) + 1.0);
        assert_eq!(coarse.neighbors(0).collect::<Vec<_>>(), vec![(0, 13.0), (1, 0.5)]);
        assert_eq!(coarse.node_weights(), &[4.0, 7.0]);
    }

    #[test]
    fn aggregation_rejects_short_partitions() {
        let err = two_triangles().aggregate(&[0, 0, 1]).unwrap_err();
        assert!(matches!(err, LouvainError::MalformedGraph(_)));
    }

    #[test]
    fn graph_constants_come_from_the_first_level() {
        let config = LouvainConfig::default().with_quality(QualitySpec::ZahnCondorcet);
        let mut driver = LevelDriver::new(&config);
        let mut graph = bridged_clusters();
        driver.objective(&mut graph);
        assert_eq!(driver.constants.map(|c| c.max_weight), Some(3.0));

        let mut coarse = graph.aggregate(&[0, 0, 0, 1, 1, 1, 1]).unwrap();
        assert_eq!(coarse.max_edge_weight(), 16.0);
        let quality = driver.objective(&mut coarse).quality();
        assert_eq!(driver.constants.map(|c| c.max_weight), Some(3.0));

        let original = ZahnCondorcet::new(&coarse, 3.0).quality();
        let rescaled = ZahnCondorcet::new(&coarse, 16.0).quality();
        assert!((quality - original).abs() < 1e-12);
        assert!((quality - rescaled).abs() > 1e-6);
    }

    #[test]
    fn graph_preparation_runs_once() {
        let config = LouvainConfig::default().with_quality(QualitySpec::AWeightedCondorcet);
        let mut driver = LevelDriver::new(&config);
        let mut graph = bridged_clusters();
        let links = graph.link_count();
        driver.objective(&mut graph);
        assert_eq!(graph.link_count(), links + 6);
        let constants = driver.constants;

        // a later level without self-loops keeps its slots and weights
        let mut next = two_triangles();
        let links = next.link_count();
        driver.objective(&mut next);
        assert_eq!(next.link_count(), links);
        assert!(!next.is_weighted());
        assert_eq!(driver.constants, constants);
    }

    #[test]
    fn one_level_never_lowers_quality() {
        for spec in ALL_SPECS {
            let mut graph = bridged_clusters();
            let constants = spec.prepare(&mut graph);
            let mut objective = spec.build(&graph, &constants);
            let before = objective.quality();
            let mut optimizer = LocalOptimizer::new(1e-6, None);
            optimizer.one_level(&mut objective, &mut build_rng(3));
            assert!(
                objective.quality() >= before - 1e-12,
                "{}: {} < {before}",
                spec.name(),
                objective.quality()
            );
        }
    }

    #[test]
    fn every_objective_runs_to_completion() {
        for spec in ALL_SPECS {
            let config = LouvainConfig::default().with_quality(spec);
            let hierarchy = run(bridged_clusters(), &config).unwrap();
            assert!(!hierarchy.is_empty());
            assert_eq!(hierarchy.mapping().len(), 7);
            assert!(hierarchy.final_quality().is_finite(), "{}", spec.name());
            assert_eq!(hierarchy.qualities().len(), hierarchy.depth());
        }
    }

    #[test]
    fn converged_level_stays_converged() {
        let graph = two_triangles().aggregate(&[0, 0, 0, 1, 1, 1]).unwrap();
        let mut objective = QualitySpec::Modularity.build(&graph, &GraphConstants::default());
        let mut optimizer = LocalOptimizer::new(1e-6, None);
        let mut rng = build_rng(0);
        assert!(!optimizer.one_level(&mut objective, &mut rng));
        assert!(!optimizer.one_level(&mut objective, &mut rng));
        assert_eq!(objective.assignment(), &[0, 1]);
    }

    #[test]
    fn isolated_nodes_map_to_themselves() {
        for spec in ALL_SPECS {
            let graph = EdgeList::with_nodes(5).to_compact(WeightMode::Unweighted);
            let config = LouvainConfig::default().with_quality(spec);
            let hierarchy = run(graph, &config).unwrap();
            let expected: Vec<(usize, usize)> = (0..5).map(|node| (node, node)).collect();
            assert_eq!(hierarchy.mapping(), expected, "{}", spec.name());
        }
    }

    #[test]
    fn empty_graph_has_no_levels() {
        let graph = EdgeList::new().to_compact(WeightMode::Weighted);
        let hierarchy = run(graph, &LouvainConfig::default()).unwrap();
        assert!(hierarchy.is_empty());
        assert!(hierarchy.mapping().is_empty());
        assert_eq!(hierarchy.final_quality(), 0.0);
        assert_eq!(hierarchy.community_count(), 0);
    }

    #[test]
    fn same_seed_same_hierarchy() {
        let config = LouvainConfig::default().with_seed(42);
        let a = run(bridged_clusters(), &config).unwrap();
        let b = run(bridged_clusters(), &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn shi_malik_floor_freezes_moves() {
        let graph = two_triangles();
        let spec = QualitySpec::ShiMalik {
            kmin: graph.node_count(),
        };
        let hierarchy = run(graph, &LouvainConfig::default().with_quality(spec)).unwrap();
        assert_eq!(hierarchy.depth(), 1);
        assert_eq!(hierarchy.community_count(), 6);
    }

    #[test]
    fn shi_malik_keeps_a_community() {
        let mut graph = bridged_clusters();
        let spec = QualitySpec::ShiMalik { kmin: 1 };
        let constants = spec.prepare(&mut graph);
        let mut objective = spec.build(&graph, &constants);
        LocalOptimizer::new(1e-6, None).one_level(&mut objective, &mut build_rng(0));
        assert!(objective.state().kappa() >= 1);

        let config = LouvainConfig::default().with_quality(spec);
        let hierarchy = run(bridged_clusters(), &config).unwrap();
        assert!(hierarchy.community_count() >= 1);
    }

    #[test]
    fn pass_ceiling_still_produces_a_partition() {
        let config = LouvainConfig::default().with_max_passes(Some(1));
        let hierarchy = run(two_triangles(), &config).unwrap();
        assert_eq!(hierarchy.mapping().len(), 6);
    }

    #[test]
    fn partition_at_composes_prefixes() {
        let hierarchy = run(two_triangles(), &LouvainConfig::default()).unwrap();
        assert_eq!(hierarchy.partition_at(0).unwrap(), hierarchy.levels()[0]);
        assert_eq!(
            hierarchy.partition_at(1).unwrap(),
            hierarchy.mapping().into_iter().map(|(_, c)| c).collect::<Vec<_>>()
        );
        assert!(hierarchy.partition_at(2).is_err());
    }

    #[test]
    fn hierarchy_serializes() {
        let hierarchy = run(two_triangles(), &LouvainConfig::default()).unwrap();
        let json = serde_json::to_value(&hierarchy).unwrap();
        assert_eq!(json["levels"].as_array().unwrap().len(), 2);
    }
}
