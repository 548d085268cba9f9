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

//! Deviation to uniformity: internal weight measured against a graph whose
//! total weight is spread uniformly over all node pairs,
//! `Q = Σ_c (in − w²·2M/N²) / 2M`.

use super::{ratio, CommunityState, QualityFunction};
use crate::graph::CompactGraph;

pub(super) const NAME: &str = "Deviation to Uniformity";

#[derive(Clone, Debug)]
pub struct DeviationUniformity<'g> {
    state: CommunityState<'g>,
}

impl<'g> DeviationUniformity<'g> {
    pub fn new(graph: &'g CompactGraph) -> Self {
        DeviationUniformity {
            state: CommunityState::identity(graph),
        }
    }

    /// Expected weight of one node pair under the uniform model.
    #[inline]
    fn pair_weight(&self) -> f64 {
        let n = self.graph().sum_node_weights();
        ratio(self.graph().total_weight(), n * n)
    }
}

impl<'g> QualityFunction<'g> for DeviationUniformity<'g> {
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
            links - self.pair_weight() * (2.0 * wc + wu) * wu,
            self.graph().total_weight(),
        )
    }

    fn quality(&self) -> f64 {
        let pair = self.pair_weight();
        let q: f64 = self
            .state
            .communities()
            .map(|c| {
                let wc = self.state.mass[c];
                self.state.inner[c] - wc * wc * pair
            })
            .sum();
        ratio(q, self.graph().total_weight())
    }
}
