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

//! Goldberg density: the sum over communities of internal weight per unit
//! of node mass, `Q = Σ_c (in / w) / (N·max)`.

use super::{ratio, CommunityState, QualityFunction};
use crate::graph::CompactGraph;

pub(super) const NAME: &str = "Goldberg Density";

#[derive(Clone, Debug)]
pub struct GoldbergDensity<'g> {
    state: CommunityState<'g>,
    max: f64,
}

impl<'g> GoldbergDensity<'g> {
    pub fn new(graph: &'g CompactGraph, max_weight: f64) -> Self {
        GoldbergDensity {
            state: CommunityState::identity(graph),
            max: max_weight,
        }
    }

    #[inline]
    fn norm(&self) -> f64 {
        self.graph().sum_node_weights() * self.max
    }
}

impl<'g> QualityFunction<'g> for GoldbergDensity<'g> {
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
        let inc = self.state.inner[comm];
        let wc = self.state.mass[comm];
        let wu = self.graph().node_weight(node);
        let links = 2.0 * shared + self.graph().self_loop_weight(node);

        let gain = if self.state.is_empty(comm) {
            ratio(links, wu)
        } else {
            ratio(inc + links, wc + wu) - ratio(inc, wc)
        };
        ratio(gain, self.norm())
    }

    fn quality(&self) -> f64 {
        let q: f64 = self
            .state
            .communities()
            .map(|c| ratio(self.state.inner[c], self.state.mass[c]))
            .sum();
        ratio(q, self.norm())
    }
}
