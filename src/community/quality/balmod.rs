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

//! Balanced modularity.
//!
//! Modularity of the graph plus modularity of its complement with respect to
//! `max`, so sparse and dense regions are judged symmetrically. Per community:
//! `2in − tot²/2M − w²·max + (N·w·max − tot)² / (N²·max − 2M)`, normalized by
//! `N²·max`.

use super::{ratio, CommunityState, QualityFunction};
use crate::graph::CompactGraph;

pub(super) const NAME: &str = "Balanced Modularity";

#[derive(Clone, Debug)]
pub struct BalancedModularity<'g> {
    state: CommunityState<'g>,
    max: f64,
}

impl<'g> BalancedModularity<'g> {
    pub fn new(graph: &'g CompactGraph, max_weight: f64) -> Self {
        BalancedModularity {
            state: CommunityState::identity(graph),
            max: max_weight,
        }
    }

    #[inline]
    fn norm(&self) -> f64 {
        let n = self.graph().sum_node_weights();
        n * n * self.max
    }

    /// Contribution of a non-empty community with the given accumulators.
    #[inline]
    fn contribution(&self, inner: f64, total: f64, mass: f64) -> f64 {
        let graph = self.graph();
        let m2 = graph.total_weight();
        let n = graph.sum_node_weights();
        let complement = n * mass * self.max - total;
        2.0 * inner - ratio(total * total, m2) - mass * mass * self.max
            + ratio(complement * complement, n * n * self.max - m2)
    }
}

impl<'g> QualityFunction<'g> for BalancedModularity<'g> {
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
    fn gain(&self, node: usize, comm: usize, shared: f64, degree: f64) -> f64 {
        let inc = self.state.inner[comm];
        let totc = self.state.total[comm];
        let wc = self.state.mass[comm];
        let wu = self.graph().node_weight(node);
        let links = 2.0 * shared + self.graph().self_loop_weight(node);

        let with_node = self.contribution(inc + links, totc + degree, wc + wu);
        let gain = if self.state.is_empty(comm) {
            with_node
        } else {
            with_node - self.contribution(inc, totc, wc)
        };
        ratio(gain, self.norm())
    }

    fn quality(&self) -> f64 {
        let q: f64 = self
            .state
            .communities()
            .map(|c| {
                self.contribution(self.state.inner[c], self.state.total[c], self.state.mass[c])
            })
            .sum();
        ratio(q, self.norm())
    }
}
