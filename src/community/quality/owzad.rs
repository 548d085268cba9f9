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

//! Owsinski-Zadrozny criterion, the Zahn-Condorcet criterion with the
//! agreement and disagreement terms mixed by `alpha`:
//! `Q = (Σ_c (in − α·w²·max) + α(N²·max − 2M)) / (N²·max)`.
//!
//! `alpha = 0.5` ranks partitions exactly as Zahn-Condorcet does.

use super::{ratio, CommunityState, QualityFunction};
use crate::graph::CompactGraph;

pub(super) const NAME: &str = "Owsinski-Zadrozny";

#[derive(Clone, Debug)]
pub struct OwsinskiZadrozny<'g> {
    state: CommunityState<'g>,
    alpha: f64,
    max: f64,
}

impl<'g> OwsinskiZadrozny<'g> {
    pub fn new(graph: &'g CompactGraph, alpha: f64, max_weight: f64) -> Self {
        OwsinskiZadrozny {
            state: CommunityState::identity(graph),
            alpha,
            max: max_weight,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    #[inline]
    fn norm(&self) -> f64 {
        let n = self.graph().sum_node_weights();
        n * n * self.max
    }
}

impl<'g> QualityFunction<'g> for OwsinskiZadrozny<'g> {
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
            links - self.alpha * self.max * (2.0 * wc + wu) * wu,
            self.norm(),
        )
    }

    fn quality(&self) -> f64 {
        let n = self.graph().sum_node_weights();
        let mut q: f64 = self
            .state
            .communities()
            .map(|c| {
                let wc = self.state.mass[c];
                self.state.inner[c] - self.alpha * wc * wc * self.max
            })
            .sum();
        q += self.alpha * (n * n * self.max - self.graph().total_weight());
        ratio(q, self.norm())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::bridged_clusters;
    use super::super::ZahnCondorcet;
    use super::*;

    #[test]
    fn half_alpha_is_half_of_zahn_condorcet() {
        let graph = bridged_clusters();
        let max = graph.max_edge_weight();
        let mut oz = OwsinskiZadrozny::new(&graph, 0.5, max);
        let mut zc = ZahnCondorcet::new(&graph, max);
        assert!((2.0 * oz.quality() - zc.quality()).abs() < 1e-12);

        oz.remove(2, 2, 0.0);
        zc.remove(2, 2, 0.0);
        let oz_gain = oz.gain(2, 1, 3.0, graph.weighted_degree(2));
        let zc_gain = zc.gain(2, 1, 3.0, graph.weighted_degree(2));
        assert!((2.0 * oz_gain - zc_gain).abs() < 1e-12);
    }
}
