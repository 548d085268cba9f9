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

//! A-weighted Condorcet criterion.
//!
//! The graph is first rewritten into normalized affinities
//! `Â_uv = A_uv / sqrt(k_u·k_v)`. The Condorcet threshold separating "should
//! be together" from "should be apart" is then the mean affinity seen from an
//! edge endpoint, `ρ = Σ Â² / Σ Â`, instead of the maximum edge weight used
//! by Zahn-Condorcet:
//! `Q = (Σ_c (2in − ρ·w²) + ρ·N² − 2M) / (ρ·N²)`.

use super::{ratio, CommunityState, QualityFunction};
use crate::graph::CompactGraph;

pub(super) const NAME: &str = "A-weighted Condorcet";

/// Replace every weight by its normalized affinity and return `Σ Â²` over
/// all neighbor slots.
///
/// Expects the self-loops added by [`CompactGraph::add_self_loops`], so each
/// node carries a slot for its own affinity.
pub(crate) fn graph_weighting(graph: &mut CompactGraph) -> f64 {
    graph.reweight(|g, u, v, weight| {
        let scale = g.weighted_degree(u) * g.weighted_degree(v);
        if scale > 0.0 {
            weight / scale.sqrt()
        } else {
            0.0
        }
    });
    graph.edge_weights().iter().map(|w| w * w).sum()
}

#[derive(Clone, Debug)]
pub struct AWeightedCondorcet<'g> {
    state: CommunityState<'g>,
    sum_se: f64,
}

impl<'g> AWeightedCondorcet<'g> {
    pub fn new(graph: &'g CompactGraph, sum_se: f64) -> Self {
        AWeightedCondorcet {
            state: CommunityState::identity(graph),
            sum_se,
        }
    }

    /// Mean affinity `ρ`.
    #[inline]
    fn threshold(&self) -> f64 {
        ratio(self.sum_se, self.graph().total_weight())
    }

    #[inline]
    fn norm(&self) -> f64 {
        let n = self.graph().sum_node_weights();
        self.threshold() * n * n
    }
}

impl<'g> QualityFunction<'g> for AWeightedCondorcet<'g> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn state(&self) -> &CommunityState<'g> {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommunityState<'g> {
        &mut self.state
    }

    #[inline]
    fn gain(&self, node: usize, comm: usize, shared: f64, _degree: f64) -> f64 {
        let wc = self.state.mass[comm];
        let wu = self.graph().node_weight(node);
        let links = 2.0 * shared + self.graph().self_loop_weight(node);
        ratio(
            2.0 * links - self.threshold() * (2.0 * wc + wu) * wu,
            self.norm(),
        )
    }

    fn quality(&self) -> f64 {
        let rho = self.threshold();
        let n = self.graph().sum_node_weights();
        let mut q: f64 = self
            .state
            .communities()
            .map(|c| {
                let wc = self.state.mass[c];
                2.0 * self.state.inner[c] - rho * wc * wc
            })
            .sum();
        q += rho * n * n - self.graph().total_weight();
        ratio(q, self.norm())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeList, WeightMode};

    #[test]
    fn affinities_are_degree_normalized() {
        let mut edges = EdgeList::new();
        edges.add_edge(0, 1, 2.0).unwrap();
        edges.add_edge(1, 2, 2.0).unwrap();
        let mut graph = edges.to_compact(WeightMode::Weighted);
        graph.add_self_loops();

        let sum = graph_weighting(&mut graph);
        // k = [2, 4, 2]: each of the four slots becomes 2 / sqrt(8)
        let expected = 2.0 / 8f64.sqrt();
        let (_, w) = graph.neighbors(0).next().unwrap();
        assert!((w - expected).abs() < 1e-12);
        assert_eq!(graph.self_loop_weight(1), 0.0);
        assert!((sum - 4.0 * expected * expected).abs() < 1e-12);
    }
}
