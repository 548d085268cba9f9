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

//! Shi-Malik criterion, the negated normalized cut:
//! `Q = Σ_c (in/tot − 1)`.
//!
//! Merging is refused outright once fewer than `kmin` communities remain
//! non-empty: every gain is then zero, so no candidate can beat staying put.

use super::{ratio, CommunityState, QualityFunction};
use crate::graph::CompactGraph;

pub(super) const NAME: &str = "Shi-Malik";

#[derive(Clone, Debug)]
pub struct ShiMalik<'g> {
    state: CommunityState<'g>,
    kmin: usize,
}

impl<'g> ShiMalik<'g> {
    pub fn new(graph: &'g CompactGraph, kmin: usize) -> Self {
        ShiMalik {
            state: CommunityState::identity(graph),
            kmin,
        }
    }

    pub fn kmin(&self) -> usize {
        self.kmin
    }
}

impl<'g> QualityFunction<'g> for ShiMalik<'g> {
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
        if self.state.kappa() < self.kmin {
            return 0.0;
        }
        let inc = self.state.inner[comm];
        let totc = self.state.total[comm];
        let links = 2.0 * shared + self.graph().self_loop_weight(node);

        if self.state.is_empty(comm) {
            ratio(links, degree) - 1.0
        } else {
            ratio(inc + links, totc + degree) - ratio(inc, totc)
        }
    }

    fn quality(&self) -> f64 {
        self.state
            .communities()
            .map(|c| ratio(self.state.inner[c], self.state.total[c]) - 1.0)
            .sum()
    }
}
