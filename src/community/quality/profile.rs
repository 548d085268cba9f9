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

//! Profile difference criterion.
//!
//! Weights are first rewritten to `Â_uv = 2·A_uv / (k_u + k_v)`. A community
//! then contributes its internal affinity per unit of mass minus one half;
//! `Q = (Σ_c (in/w − 1/2) + ΣÂ²/2) / (N·max)`.

use super::{ratio, CommunityState, QualityFunction};
use crate::graph::CompactGraph;

pub(super) const NAME: &str = "Profile Difference";

/// Replace every weight by `2·A_uv / (k_u + k_v)` and return `Σ Â²` over all
/// neighbor slots.
pub(crate) fn graph_weighting(graph: &mut CompactGraph) -> f64 {
    graph.reweight(|g, u, v, weight| {
        ratio(2.0 * weight, g.weighted_degree(u) + g.weighted_degree(v))
    });
    graph.edge_weights().iter().map(|w| w * w).sum()
}

#[derive(Clone, Debug)]
pub struct ProfileDifference<'g> {
    state: CommunityState<'g>,
    sum_sq: f64,
    max: f64,
}

impl<'g> ProfileDifference<'g> {
    pub fn new(graph: &'g CompactGraph, sum_sq: f64, max_weight: f64) -> Self {
        ProfileDifference {
            state: CommunityState::identity(graph),
            sum_sq,
            max: max_weight,
        }
    }

    #[inline]
    fn norm(&self) -> f64 {
        self.graph().sum_node_weights() * self.max
    }
}

impl<'g> QualityFunction<'g> for ProfileDifference<'g> {
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
            ratio(links, wu) - 0.5
        } else {
            ratio(inc + links, wc + wu) - ratio(inc, wc)
        };
        ratio(gain, self.norm())
    }

    fn quality(&self) -> f64 {
        let q: f64 = self
            .state
            .communities()
            .map(|c| ratio(self.state.inner[c], self.state.mass[c]) - 0.5)
            .sum();
        ratio(q + self.sum_sq / 2.0, self.norm())
    }
}
