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
// https://arxiv.org/abs/1406.2518

//! Quality functions driving the local moving phase.
//!
//! Every objective keeps a [`CommunityState`] over one borrowed
//! [`CompactGraph`] and answers three questions about it: what is the quality
//! of the current partition, and how much would it change if a detached node
//! were inserted into a given community (the gain). Gains are exact
//! differences of [`QualityFunction::quality`], computed in O(1) from the
//! target community's accumulators.
//!
//! Notation used by the variants: `in` is a community's internal weight (an
//! internal edge counted from both ends), `tot` the sum of its members'
//! weighted degrees, `w` its node mass, `2M` the graph's total weight, `N`
//! the sum of node weights and `max` the maximum edge weight of the original
//! graph.

mod balmod;
mod condora;
mod devind;
mod devuni;
mod goldberg;
mod modularity;
mod owzad;
mod profile;
mod shimalik;
mod zahn;

pub use balmod::BalancedModularity;
pub use condora::AWeightedCondorcet;
pub use devind::DeviationIndetermination;
pub use devuni::DeviationUniformity;
pub use goldberg::GoldbergDensity;
pub use modularity::Modularity;
pub use owzad::OwsinskiZadrozny;
pub use profile::ProfileDifference;
pub use shimalik::ShiMalik;
pub use zahn::ZahnCondorcet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::common::UNASSIGNED;
use crate::error::{LouvainError, Result};
use crate::graph::CompactGraph;

/// `numerator / denominator`, or zero for an empty denominator.
#[inline]
pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

// ============================================================================
// Community bookkeeping
// ============================================================================

/// Community assignment plus the per-community accumulators every objective
/// reads from.
///
/// Accumulators are indexed by community id. A community is empty when it
/// has no members; its accumulators are then reset to exactly zero.
#[derive(Clone, Debug)]
pub struct CommunityState<'g> {
    graph: &'g CompactGraph,
    n2c: Vec<usize>,
    members: Vec<usize>,
    kappa: usize,
    /// Internal weight
    pub(crate) inner: Vec<f64>,
    /// Sum of weighted degrees
    pub(crate) total: Vec<f64>,
    /// Node mass
    pub(crate) mass: Vec<f64>,
}

impl<'g> CommunityState<'g> {
    /// Every node in its own community.
    pub fn identity(graph: &'g CompactGraph) -> Self {
        let n = graph.node_count();
        CommunityState {
            graph,
            n2c: (0..n).collect(),
            members: vec![1; n],
            kappa: n,
            inner: (0..n).map(|node| graph.self_loop_weight(node)).collect(),
            total: (0..n).map(|node| graph.weighted_degree(node)).collect(),
            mass: graph.node_weights().to_vec(),
        }
    }

    #[inline]
    pub fn graph(&self) -> &'g CompactGraph {
        self.graph
    }

    /// Community of `node`, or `usize::MAX` while it is detached.
    #[inline]
    pub fn community(&self, node: usize) -> usize {
        self.n2c[node]
    }

    pub fn assignment(&self) -> &[usize] {
        &self.n2c
    }

    /// Number of non-empty communities.
    #[inline]
    pub fn kappa(&self) -> usize {
        self.kappa
    }

    #[inline]
    pub fn is_empty(&self, comm: usize) -> bool {
        self.members[comm] == 0
    }

    /// Ids of the non-empty communities.
    pub fn communities(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.members.len()).filter(move |&comm| self.members[comm] > 0)
    }

    /// Detach `node` from `comm`, where `shared` is the weight between the
    /// node and the other members of `comm`.
    pub fn remove(&mut self, node: usize, comm: usize, shared: f64) {
        debug_assert_eq!(self.n2c[node], comm);
        let graph = self.graph;
        self.inner[comm] -= 2.0 * shared + graph.self_loop_weight(node);
        self.total[comm] -= graph.weighted_degree(node);
        self.mass[comm] -= graph.node_weight(node);
        self.members[comm] -= 1;
        if self.members[comm] == 0 {
            self.kappa -= 1;
            self.inner[comm] = 0.0;
            self.total[comm] = 0.0;
            self.mass[comm] = 0.0;
        }
        self.n2c[node] = UNASSIGNED;
    }

    /// Attach a detached `node` to `comm`.
    pub fn insert(&mut self, node: usize, comm: usize, shared: f64) {
        debug_assert_eq!(self.n2c[node], UNASSIGNED);
        let graph = self.graph;
        if self.members[comm] == 0 {
            self.kappa += 1;
        }
        self.members[comm] += 1;
        self.inner[comm] += 2.0 * shared + graph.self_loop_weight(node);
        self.total[comm] += graph.weighted_degree(node);
        self.mass[comm] += graph.node_weight(node);
        self.n2c[node] = comm;
    }
}

// ============================================================================
// Quality function interface
// ============================================================================

/// Capability set shared by every objective.
pub trait QualityFunction<'g> {
    /// Human readable name of the criterion.
    fn name(&self) -> &'static str;

    fn state(&self) -> &CommunityState<'g>;

    fn state_mut(&mut self) -> &mut CommunityState<'g>;

    /// Change of [`QualityFunction::quality`] if the detached `node` joined
    /// `comm`, sharing `shared` weight with its members. `degree` is the
    /// node's weighted degree.
    fn gain(&self, node: usize, comm: usize, shared: f64, degree: f64) -> f64;

    /// Quality of the current partition, recomputed from the accumulators.
    fn quality(&self) -> f64;

    #[inline]
    fn graph(&self) -> &'g CompactGraph {
        self.state().graph()
    }

    #[inline]
    fn remove(&mut self, node: usize, comm: usize, shared: f64) {
        self.state_mut().remove(node, comm, shared);
    }

    #[inline]
    fn insert(&mut self, node: usize, comm: usize, shared: f64) {
        self.state_mut().insert(node, comm, shared);
    }

    fn assignment<'a>(&'a self) -> &'a [usize]
    where
        'g: 'a,
    {
        self.state().assignment()
    }
}

// ============================================================================
// Objective selection
// ============================================================================

fn default_alpha() -> f64 {
    0.5
}

fn default_kmin() -> usize {
    1
}

/// Which quality function to optimize, with its variant-specific parameters.
///
/// The numeric ids of [`QualitySpec::from_id`] follow the order of the
/// variants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualitySpec {
    #[default]
    Modularity,
    ZahnCondorcet,
    /// `alpha` must lie in (0, 1); other values fall back to 0.5.
    OwsinskiZadrozny {
        #[serde(default = "default_alpha")]
        alpha: f64,
    },
    GoldbergDensity,
    AWeightedCondorcet,
    DeviationIndetermination,
    DeviationUniformity,
    ProfileDifference,
    /// Moves are frozen while fewer than `kmin` communities are non-empty.
    ShiMalik {
        #[serde(default = "default_kmin")]
        kmin: usize,
    },
    BalancedModularity,
}

impl QualitySpec {
    /// Select a variant by its numeric id (0 to 9), with default parameters.
    pub fn from_id(id: u32) -> Result<Self> {
        let spec = match id {
            0 => QualitySpec::Modularity,
            1 => QualitySpec::ZahnCondorcet,
            2 => QualitySpec::OwsinskiZadrozny {
                alpha: default_alpha(),
            },
            3 => QualitySpec::GoldbergDensity,
            4 => QualitySpec::AWeightedCondorcet,
            5 => QualitySpec::DeviationIndetermination,
            6 => QualitySpec::DeviationUniformity,
            7 => QualitySpec::ProfileDifference,
            8 => QualitySpec::ShiMalik {
                kmin: default_kmin(),
            },
            9 => QualitySpec::BalancedModularity,
            other => {
                return Err(LouvainError::invalid(
                    "quality",
                    format!("unknown quality id {other}, expected 0 to 9"),
                ))
            }
        };
        Ok(spec)
    }

    pub fn id(&self) -> u32 {
        match self {
            QualitySpec::Modularity => 0,
            QualitySpec::ZahnCondorcet => 1,
            QualitySpec::OwsinskiZadrozny { .. } => 2,
            QualitySpec::GoldbergDensity => 3,
            QualitySpec::AWeightedCondorcet => 4,
            QualitySpec::DeviationIndetermination => 5,
            QualitySpec::DeviationUniformity => 6,
            QualitySpec::ProfileDifference => 7,
            QualitySpec::ShiMalik { .. } => 8,
            QualitySpec::BalancedModularity => 9,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            QualitySpec::Modularity => modularity::NAME,
            QualitySpec::ZahnCondorcet => zahn::NAME,
            QualitySpec::OwsinskiZadrozny { .. } => owzad::NAME,
            QualitySpec::GoldbergDensity => goldberg::NAME,
            QualitySpec::AWeightedCondorcet => condora::NAME,
            QualitySpec::DeviationIndetermination => devind::NAME,
            QualitySpec::DeviationUniformity => devuni::NAME,
            QualitySpec::ProfileDifference => profile::NAME,
            QualitySpec::ShiMalik { .. } => shimalik::NAME,
            QualitySpec::BalancedModularity => balmod::NAME,
        }
    }

    /// Set the convex-combination factor of the Owsinski-Zadrozny criterion.
    ///
    /// # Errors
    /// `InvalidParameter` when `self` is any other variant.
    pub fn with_alpha(self, alpha: f64) -> Result<Self> {
        match self {
            QualitySpec::OwsinskiZadrozny { .. } => {
                Ok(QualitySpec::OwsinskiZadrozny { alpha }.normalized())
            }
            other => Err(LouvainError::invalid(
                "alpha",
                format!("the {} criterion takes no alpha", other.name()),
            )),
        }
    }

    /// Set the minimum community count of the Shi-Malik criterion.
    ///
    /// # Errors
    /// `InvalidParameter` when `self` is any other variant.
    pub fn with_kmin(self, kmin: usize) -> Result<Self> {
        match self {
            QualitySpec::ShiMalik { .. } => Ok(QualitySpec::ShiMalik { kmin }.normalized()),
            other => Err(LouvainError::invalid(
                "kmin",
                format!("the {} criterion takes no kmin", other.name()),
            )),
        }
    }

    /// Bring parameters back into their domain.
    ///
    /// An `alpha` outside (0, 1) becomes 0.5 and a `kmin` of 0 becomes 1.
    pub fn normalized(self) -> Self {
        match self {
            QualitySpec::OwsinskiZadrozny { alpha } if !(alpha > 0.0 && alpha < 1.0) => {
                warn!(alpha, "alpha outside (0, 1), using 0.5");
                QualitySpec::OwsinskiZadrozny {
                    alpha: default_alpha(),
                }
            }
            QualitySpec::ShiMalik { kmin: 0 } => {
                warn!("kmin below 1, using 1");
                QualitySpec::ShiMalik { kmin: 1 }
            }
            other => other,
        }
    }

    /// One-time preparation of the original graph.
    ///
    /// Depending on the variant this records the maximum edge weight, adds
    /// self-loops, or replaces the edge weights by affinities. It must run
    /// once, on the first level's graph, before any objective borrows it; the
    /// returned constants are reused unchanged at every later level.
    pub fn prepare(&self, graph: &mut CompactGraph) -> GraphConstants {
        let mut constants = GraphConstants::default();
        match self {
            QualitySpec::ZahnCondorcet
            | QualitySpec::OwsinskiZadrozny { .. }
            | QualitySpec::GoldbergDensity
            | QualitySpec::BalancedModularity => {
                constants.max_weight = graph.max_edge_weight();
            }
            QualitySpec::AWeightedCondorcet => {
                graph.add_self_loops();
                constants.sum_affinity_sq = condora::graph_weighting(graph);
            }
            QualitySpec::ProfileDifference => {
                constants.max_weight = graph.max_edge_weight();
                constants.sum_affinity_sq = profile::graph_weighting(graph);
            }
            QualitySpec::Modularity
            | QualitySpec::DeviationIndetermination
            | QualitySpec::DeviationUniformity
            | QualitySpec::ShiMalik { .. } => {}
        }
        constants
    }

    /// Instantiate the objective over `graph`, every node in its own
    /// community.
    pub fn build<'g>(&self, graph: &'g CompactGraph, constants: &GraphConstants) -> Objective<'g> {
        match *self {
            QualitySpec::Modularity => Objective::Modularity(Modularity::new(graph)),
            QualitySpec::ZahnCondorcet => {
                Objective::ZahnCondorcet(ZahnCondorcet::new(graph, constants.max_weight))
            }
            QualitySpec::OwsinskiZadrozny { alpha } => Objective::OwsinskiZadrozny(
                OwsinskiZadrozny::new(graph, alpha, constants.max_weight),
            ),
            QualitySpec::GoldbergDensity => {
                Objective::GoldbergDensity(GoldbergDensity::new(graph, constants.max_weight))
            }
            QualitySpec::AWeightedCondorcet => Objective::AWeightedCondorcet(
                AWeightedCondorcet::new(graph, constants.sum_affinity_sq),
            ),
            QualitySpec::DeviationIndetermination => {
                Objective::DeviationIndetermination(DeviationIndetermination::new(graph))
            }
            QualitySpec::DeviationUniformity => {
                Objective::DeviationUniformity(DeviationUniformity::new(graph))
            }
            QualitySpec::ProfileDifference => Objective::ProfileDifference(ProfileDifference::new(
                graph,
                constants.sum_affinity_sq,
                constants.max_weight,
            )),
            QualitySpec::ShiMalik { kmin } => Objective::ShiMalik(ShiMalik::new(graph, kmin)),
            QualitySpec::BalancedModularity => {
                Objective::BalancedModularity(BalancedModularity::new(graph, constants.max_weight))
            }
        }
    }
}

/// Normalizing constants computed once from the original graph.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GraphConstants {
    /// Largest edge weight of the original graph
    pub max_weight: f64,
    /// Sum of squared affinities after reweighting
    pub sum_affinity_sq: f64,
}

impl Default for GraphConstants {
    fn default() -> Self {
        GraphConstants {
            max_weight: 1.0,
            sum_affinity_sq: 0.0,
        }
    }
}

/// One of the ten quality functions, bound to a graph for one level.
#[derive(Clone, Debug)]
pub enum Objective<'g> {
    Modularity(Modularity<'g>),
    ZahnCondorcet(ZahnCondorcet<'g>),
    OwsinskiZadrozny(OwsinskiZadrozny<'g>),
    GoldbergDensity(GoldbergDensity<'g>),
    AWeightedCondorcet(AWeightedCondorcet<'g>),
    DeviationIndetermination(DeviationIndetermination<'g>),
    DeviationUniformity(DeviationUniformity<'g>),
    ProfileDifference(ProfileDifference<'g>),
    ShiMalik(ShiMalik<'g>),
    BalancedModularity(BalancedModularity<'g>),
}

macro_rules! dispatch {
    ($objective:expr, $inner:ident => $body:expr) => {
        match $objective {
            Objective::Modularity($inner) => $body,
            Objective::ZahnCondorcet($inner) => $body,
            Objective::OwsinskiZadrozny($inner) => $body,
            Objective::GoldbergDensity($inner) => $body,
            Objective::AWeightedCondorcet($inner) => $body,
            Objective::DeviationIndetermination($inner) => $body,
            Objective::DeviationUniformity($inner) => $body,
            Objective::ProfileDifference($inner) => $body,
            Objective::ShiMalik($inner) => $body,
            Objective::BalancedModularity($inner) => $body,
        }
    };
}

impl<'g> QualityFunction<'g> for Objective<'g> {
    fn name(&self) -> &'static str {
        dispatch!(self, q => q.name())
    }

    fn state(&self) -> &CommunityState<'g> {
        dispatch!(self, q => q.state())
    }

    fn state_mut(&mut self) -> &mut CommunityState<'g> {
        dispatch!(self, q => q.state_mut())
    }

    #[inline]
    fn gain(&self, node: usize, comm: usize, shared: f64, degree: f64) -> f64 {
        dispatch!(self, q => q.gain(node, comm, shared, degree))
    }

    fn quality(&self) -> f64 {
        dispatch!(self, q => q.quality())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::graph::{EdgeList, WeightMode};

    pub(crate) const ALL_SPECS: [QualitySpec; 10] = [
        QualitySpec::Modularity,
        QualitySpec::ZahnCondorcet,
        QualitySpec::OwsinskiZadrozny { alpha: 0.3 },
        QualitySpec::GoldbergDensity,
        QualitySpec::AWeightedCondorcet,
        QualitySpec::DeviationIndetermination,
        QualitySpec::DeviationUniformity,
        QualitySpec::ProfileDifference,
        QualitySpec::ShiMalik { kmin: 1 },
        QualitySpec::BalancedModularity,
    ];

    /// Two weighted clusters joined by a light bridge, one self-loop, and
    /// uneven node masses.
    pub(crate) fn bridged_clusters() -> CompactGraph {
        let mut edges = EdgeList::new();
        for &(u, v, w) in &[
            (0, 1, 2.0),
            (0, 2, 1.0),
            (1, 2, 3.0),
            (2, 3, 0.5),
            (3, 4, 2.0),
            (3, 5, 1.5),
            (4, 5, 1.0),
            (5, 6, 2.5),
            (4, 6, 1.0),
            (1, 1, 1.0),
        ] {
            edges.add_edge(u, v, w).unwrap();
        }
        edges
            .to_compact(WeightMode::Weighted)
            .with_node_weights(vec![1.0, 2.0, 1.0, 1.0, 3.0, 1.0, 2.0])
            .unwrap()
    }

    pub(crate) fn shared_weight(state: &CommunityState<'_>, node: usize, comm: usize) -> f64 {
        state
            .graph()
            .neighbors(node)
            .filter(|&(v, _)| v != node && state.community(v) == comm)
            .map(|(_, w)| w)
            .sum()
    }

    fn relocate(objective: &mut Objective<'_>, node: usize, target: usize) {
        let own = objective.state().community(node);
        let out = shared_weight(objective.state(), node, own);
        objective.remove(node, own, out);
        let into = shared_weight(objective.state(), node, target);
        objective.insert(node, target, into);
    }

    #[test]
    fn gains_match_quality_differences() {
        for spec in ALL_SPECS {
            let mut graph = bridged_clusters();
            let constants = spec.prepare(&mut graph);
            let mut objective = spec.build(&graph, &constants);

            // {0, 1}, {2}, {3, 4}, {5}, {6}
            relocate(&mut objective, 1, 0);
            relocate(&mut objective, 4, 3);

            for node in [2, 0, 5] {
                let degree = graph.weighted_degree(node);
                let own = objective.state().community(node);
                let out = shared_weight(objective.state(), node, own);
                objective.remove(node, own, out);
                let detached = objective.quality();

                for target in [0, 2, 3, 5, 6] {
                    let shared = shared_weight(objective.state(), node, target);
                    let predicted = objective.gain(node, target, shared, degree);
                    objective.insert(node, target, shared);
                    let actual = objective.quality() - detached;
                    objective.remove(node, target, shared);
                    assert!(
                        (predicted - actual).abs() < 1e-9,
                        "{}: node {node} into {target}: gain {predicted} vs delta {actual}",
                        spec.name()
                    );
                }
                objective.insert(node, own, out);
            }
        }
    }

    #[test]
    fn kappa_tracks_non_empty_communities() {
        let graph = bridged_clusters();
        let mut state = CommunityState::identity(&graph);
        assert_eq!(state.kappa(), 7);

        let shared = shared_weight(&state, 1, 1);
        state.remove(1, 1, shared);
        assert_eq!(state.kappa(), 6);
        assert!(state.is_empty(1));
        assert_eq!(state.community(1), UNASSIGNED);

        let shared = shared_weight(&state, 1, 0);
        state.insert(1, 0, shared);
        assert_eq!(state.kappa(), 6);
        assert_eq!(state.inner[0], 2.0 * 2.0 + 1.0);
        assert_eq!(state.total[0], graph.weighted_degree(0) + graph.weighted_degree(1));
        assert_eq!(state.mass[0], 3.0);
        assert_eq!(state.communities().count(), 6);
    }

    #[test]
    fn ids_round_trip_through_from_id() {
        for spec in ALL_SPECS {
            let id = spec.id();
            assert_eq!(QualitySpec::from_id(id).unwrap().id(), id);
        }
        assert!(QualitySpec::from_id(10).is_err());
    }

    #[test]
    fn setters_reject_other_variants() {
        let err = QualitySpec::Modularity.with_alpha(0.2).unwrap_err();
        assert!(matches!(err, LouvainError::InvalidParameter { name: "alpha", .. }));
        let err = QualitySpec::from_id(2).unwrap().with_kmin(3).unwrap_err();
        assert!(matches!(err, LouvainError::InvalidParameter { name: "kmin", .. }));

        let spec = QualitySpec::from_id(2).unwrap().with_alpha(0.25).unwrap();
        assert_eq!(spec, QualitySpec::OwsinskiZadrozny { alpha: 0.25 });
        let spec = QualitySpec::from_id(8).unwrap().with_kmin(4).unwrap();
        assert_eq!(spec, QualitySpec::ShiMalik { kmin: 4 });
    }

    #[test]
    fn out_of_domain_parameters_are_clamped() {
        let spec = QualitySpec::from_id(2).unwrap().with_alpha(1.5).unwrap();
        assert_eq!(spec, QualitySpec::OwsinskiZadrozny { alpha: 0.5 });
        let spec = QualitySpec::from_id(8).unwrap().with_kmin(0).unwrap();
        assert_eq!(spec, QualitySpec::ShiMalik { kmin: 1 });
    }

    #[test]
    fn preparation_reshapes_the_graph_where_needed() {
        let mut graph = bridged_clusters();
        let constants = QualitySpec::ZahnCondorcet.prepare(&mut graph);
        assert_eq!(constants.max_weight, 3.0);

        let mut graph = bridged_clusters();
        let links = graph.link_count();
        let constants = QualitySpec::AWeightedCondorcet.prepare(&mut graph);
        assert_eq!(graph.link_count(), links + 6);
        assert!(constants.sum_affinity_sq > 0.0);

        let mut graph = bridged_clusters();
        let constants = QualitySpec::ProfileDifference.prepare(&mut graph);
        assert_eq!(constants.max_weight, 3.0);
        assert!(graph.max_edge_weight() <= 1.0);
        assert!(constants.sum_affinity_sq > 0.0);
    }

    #[test]
    fn every_objective_reports_a_finite_quality() {
        for spec in ALL_SPECS {
            let mut graph = bridged_clusters();
            let constants = spec.prepare(&mut graph);
            let objective = spec.build(&graph, &constants);
            assert!(objective.quality().is_finite(), "{}", spec.name());
            assert_eq!(objective.name(), spec.name());
        }
    }
}
