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

//! Newman-Girvan modularity: `Q = Σ_c (in − tot²/2M) / 2M`.

use super::{CommunityState, QualityFunction};
use crate::graph::CompactGraph;

pub(super) const NAME: &str = "Newman-Girvan Modularity";

#[derive(Clone, Debug)]
pub struct Modularity<'g> {
    state: CommunityState<'g>,
}

impl<'g> Modularity<'g> {
    pub fn new(graph: &'g CompactGraph) -> Self {
        Modularity {
            state: CommunityState::identity(graph),
        }
    }
}

impl<'g> QualityFunction<'g> for Modularity<'g> {
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
        let m2 = self.graph().total_weight();
        if m2 == 0.0 {
            return 0.0;
        }
        let totc = self.state.total[comm];
        let links = 2.0 * shared + self.graph().self_loop_weight(node);
        (links - (2.0 * totc + degree) * degree / m2) / m2
    }

    fn quality(&self) -> f64 {
        let m2 = self.graph().total_weight();
        if m2 == 0.0 {
            return 0.0;
        }
        let q: f64 = self
            .state
            .communities()
            .map(|c| self.state.inner[c] - self.state.total[c] * self.state.total[c] / m2)
            .sum();
        q / m2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeList, WeightMode};

    #[test]
    fn two_triangles_reach_one_half() {
        let mut edges = EdgeList::new();
        for &(u, v) in &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)] {
            edges.add_edge(u, v, 1.0).unwrap();
        }
        let graph = edges.to_compact(WeightMode::Unweighted);
        let mut q = Modularity::new(&graph);
        assert!((q.quality() + 1.0 / 6.0).abs() < 1e-12);

        for (node, target) in [(1, 0), (2, 0), (4, 3), (5, 3)] {
            q.remove(node, node, 0.0);
            let shared = if node == 2 || node == 5 { 2.0 } else { 1.0 };
            assert!(q.gain(node, target, shared, 2.0) > 0.0);
            q.insert(node, target, shared);
        }
        assert!((q.quality() - 0.5).abs() < 1e-12);
    }
}
