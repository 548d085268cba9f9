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

//! Deviation to indetermination.
//!
//! Compares every pair against the indetermination model
//! `A_i./N + A_.j/N − 2M/N²`, whose row and column sums match the graph's
//! while carrying no community information. Per community this gives
//! `in − 2·w·tot/N + w²·2M/N²`; the trivial one-community partition scores
//! exactly zero.

use super::{ratio, CommunityState, QualityFunction};
use crate::graph::CompactGraph;

pub(super) const NAME: &str = "Deviation to Indetermination";

#[derive(Clone, Debug)]
pub struct DeviationIndetermination<'g> {
    state: CommunityState<'g>,
}

impl<'g> DeviationIndetermination<'g> {
    pub fn new(graph: &'g CompactGraph) -> Self {
        DeviationIndetermination {
            state: CommunityState::identity(graph),
        }
    }
}

impl<'g> QualityFunction<'g> for DeviationIndetermination<'g> {
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
        let graph = self.graph();
        let n = graph.sum_node_weights();
        let m2 = graph.total_weight();
        let totc = self.state.total[comm];
        let wc = self.state.mass[comm];
        let wu = graph.node_weight(node);
        let links = 2.0 * shared + graph.self_loop_weight(node);

        let cross = wc * degree + wu * totc + wu * degree;
        let mass = (2.0 * wc + wu) * wu;
        ratio(links - 2.0 * ratio(cross, n) + m2 * ratio(mass, n * n), m2)
    }

    fn quality(&self) -> f64 {
        let graph = self.graph();
        let n = graph.sum_node_weights();
        let m2 = graph.total_weight();
        let q: f64 = self
            .state
            .communities()
            .map(|c| {
                let wc = self.state.mass[c];
                let totc = self.state.total[c];
                self.state.inner[c] - 2.0 * ratio(wc * totc, n) + m2 * ratio(wc * wc, n * n)
            })
            .sum();
        ratio(q, m2)
    }
}
