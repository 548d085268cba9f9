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

//! Common utilities for the multi-level optimizer.
//!
//! This module provides the seeded traversal RNG, partition renumbering and
//! the composition of per-level partitions into a final mapping.

use indexmap::IndexSet;
use rand::prelude::*;
use rand_pcg::Pcg64;

/// Marker for a node that has been detached from every community.
pub(crate) const UNASSIGNED: usize = usize::MAX;

// ============================================================================
// RNG Utilities
// ============================================================================

/// Type alias for the RNG that drives traversal order.
pub(crate) type CommunityRng = Pcg64;

/// Build the traversal RNG from a seed.
///
/// Runs are reproducible: the same seed always yields the same sequence of
/// node orders.
#[inline]
pub(crate) fn build_rng(seed: u64) -> CommunityRng {
    Pcg64::seed_from_u64(seed)
}

/// Shuffle a vector of node indices in-place using the provided RNG.
#[inline]
pub(crate) fn shuffle_nodes(rng: &mut CommunityRng, nodes: &mut [usize]) {
    nodes.shuffle(rng);
}

// ============================================================================
// Partition Utilities
// ============================================================================

/// Renumber community labels to `0..k` in order of first appearance.
///
/// `labels[i]` is the community of node `i`; the returned vector maps every
/// node to its contiguous community id.
pub(crate) fn renumber(labels: &[usize]) -> Vec<usize> {
    let mut seen: IndexSet<usize> = IndexSet::with_capacity(labels.len());
    labels
        .iter()
        .map(|&label| seen.insert_full(label).0)
        .collect()
}

/// Group nodes by their labels into communities.
///
/// Communities are ordered by label, and each lists its nodes in increasing
/// order.
pub(crate) fn group_by_labels(labels: &[usize]) -> Vec<Vec<usize>> {
    let count = labels.iter().copied().max().map_or(0, |max| max + 1);
    let mut comms: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (node, &label) in labels.iter().enumerate() {
        comms[label].push(node);
    }
    comms.retain(|comm| !comm.is_empty());
    comms
}

/// Compose per-level partitions into the top-level community of every
/// original node.
///
/// Level 0 is indexed by original node id; each following level is indexed
/// by the community ids of the level before it. The result is recomputed
/// from scratch on every call.
pub fn compose_mapping(levels: &[Vec<usize>]) -> Vec<(usize, usize)> {
    compose_up_to(levels, levels.len())
        .into_iter()
        .enumerate()
        .collect()
}

/// Compose the first `depth` levels into a node-to-community vector.
pub(crate) fn compose_up_to(levels: &[Vec<usize>], depth: usize) -> Vec<usize> {
    let Some(first) = levels.first() else {
        return Vec::new();
    };
    let mut n2c: Vec<usize> = (0..first.len()).collect();
    for level in levels.iter().take(depth) {
        for comm in n2c.iter_mut() {
            *comm = level[*comm];
        }
    }
    n2c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renumber_follows_first_appearance() {
        assert_eq!(renumber(&[7, 3, 7, 0, 3]), vec![0, 1, 0, 2, 1]);
        assert!(renumber(&[]).is_empty());
    }

    #[test]
    fn group_by_labels_orders_by_label() {
        let groups = group_by_labels(&[1, 0, 1, 3]);
        assert_eq!(groups, vec![vec![1], vec![0, 2], vec![3]]);
    }

    #[test]
    fn compose_walks_every_level() {
        let levels = vec![vec![0, 0, 1, 2, 2], vec![0, 1, 1], vec![0, 0]];
        let mapping = compose_mapping(&levels);
        assert_eq!(mapping, vec![(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)]);
        assert_eq!(compose_up_to(&levels, 1), vec![0, 0, 1, 2, 2]);
        assert_eq!(compose_up_to(&levels, 2), vec![0, 0, 1, 1, 1]);
        assert!(compose_mapping(&[]).is_empty());
    }

    #[test]
    fn seeded_shuffle_is_reproducible() {
        let mut a: Vec<usize> = (0..32).collect();
        let mut b = a.clone();
        shuffle_nodes(&mut build_rng(7), &mut a);
        shuffle_nodes(&mut build_rng(7), &mut b);
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..32).collect::<Vec<_>>());
    }
}
