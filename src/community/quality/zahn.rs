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

//! Zahn-Condorcet criterion.
//!
//! Pairs inside a community are rewarded by their weight, pairs split apart
//! by the weight they lack with respect to `max`:
//! `Q = (Σ_c (2in − w²·max) + N²·max − 2M) / (N²·max)`.

use super::{ratio, CommunityState, QualityFunction};
use crate::graph::CompactGraph;

pub(super) const NAME: &str = "Zahn-Condorcet";

#[derive(Clone, Debug)]
pub struct ZahnCondorcet<'g> {
    state: CommunityState<'g>,
    max: f64,
}

impl<'g> ZahnCondorcet<'g> {
    pub fn new(graph: &'g CompactGraph, max_weight: f64) -> Self {
        ZahnCondorcet {
            state: CommunityState::identity(graph),
            max: max_weight,
        }
    }

    #[inline]
    fn norm(&self) -> f64 {
        let n = self.graph().sum_node_weights();
        n * n * self.max
    }
}

impl<'g> QualityFunction<'g> for ZahnCondorcet<'g> {
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
        ratio(2.0 * links - self.max * (2.0 * wc + wu) * wu, self.norm())
    }

    fn quality(&self) -> f64 {
        let n = self.graph().sum_node_weights();
        let mut q: f64 = self
            .state
            .communities()
            .map(|c| {
                let wc = self.state.mass[c];
                2.0 * self.state.inner[c] - wc * wc * self.max
            })
            .sum();
        q += n * n * self.max - self.graph().total_weight();
        ratio(q, self.norm())
    }
}
