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

//! Compact adjacency representation used by the optimizer.
//!
//! A [`CompactGraph`] stores the neighborhood of every node as a contiguous
//! slice of a flat neighbor array, addressed through a cumulative degree
//! sequence. A self-loop occupies one slot in its node's list; every other
//! undirected edge occupies one slot at each endpoint.

use std::io::{Read, Write};
use std::ops::Range;

use petgraph::graph::UnGraph;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::error::{LouvainError, Result};

/// Whether edge weights supplied with a graph should be honored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightMode {
    Weighted,
    #[default]
    Unweighted,
}

// ========================
// Compact Graph
// ========================

/// Immutable-between-levels adjacency structure.
#[derive(Clone, Debug)]
pub struct CompactGraph {
    /// Cumulative degree: `degrees[i]` is the end of node `i`'s neighbor slice
    degrees: Vec<u64>,
    /// Flat neighbor ids
    links: Vec<usize>,
    /// Weights parallel to `links`, empty when every weight is 1
    weights: Vec<f64>,
    /// Per-node mass
    node_weights: Vec<f64>,
    weighted_degrees: Vec<f64>,
    self_loops: Vec<f64>,
    total_weight: f64,
    sum_node_weights: f64,
}

impl CompactGraph {
    /// Build a graph from the three logical sequences of the interop format.
    ///
    /// The node count is the length of `degree_seq`. `weights` is ignored in
    /// [`WeightMode::Unweighted`] mode.
    ///
    /// # Errors
    /// Returns [`LouvainError::MalformedGraph`] when the degree sequence is
    /// decreasing or does not cover `neighbor_ids`, when a neighbor id falls
    /// outside `[0, node_count)`, or when the weights do not line up with the
    /// neighbor ids.
    pub fn new(
        degree_seq: Vec<u64>,
        neighbor_ids: Vec<i32>,
        weights: Vec<f64>,
        mode: WeightMode,
    ) -> Result<Self> {
        let node_count = degree_seq.len();
        Self::with_node_count(node_count, degree_seq, neighbor_ids, weights, mode)
    }

    /// Same as [`CompactGraph::new`], with an explicitly declared node count
    /// that the degree sequence must agree with.
    pub fn with_node_count(
        node_count: usize,
        degree_seq: Vec<u64>,
        neighbor_ids: Vec<i32>,
        weights: Vec<f64>,
        mode: WeightMode,
    ) -> Result<Self> {
        if degree_seq.len() != node_count {
            return Err(LouvainError::malformed(format!(
                "degree sequence has {} entries for {} nodes",
                degree_seq.len(),
                node_count
            )));
        }
        if let Some(pos) = degree_seq.windows(2).position(|w| w[1] < w[0]) {
            return Err(LouvainError::malformed(format!(
                "cumulative degree decreases at node {}",
                pos + 1
            )));
        }
        let declared = degree_seq.last().copied().unwrap_or(0);
        if declared != neighbor_ids.len() as u64 {
            return Err(LouvainError::malformed(format!(
                "degree sequence declares {} neighbor slots but {} were given",
                declared,
                neighbor_ids.len()
            )));
        }

        let mut links = Vec::with_capacity(neighbor_ids.len());
        for (slot, &id) in neighbor_ids.iter().enumerate() {
            if id < 0 || id as usize >= node_count {
                return Err(LouvainError::malformed(format!(
                    "neighbor id {id} at slot {slot} is outside [0, {node_count})"
                )));
            }
            links.push(id as usize);
        }

        let weights = match mode {
            WeightMode::Unweighted => Vec::new(),
            WeightMode::Weighted => {
                if weights.len() != links.len() {
                    return Err(LouvainError::malformed(format!(
                        "{} weights given for {} neighbor slots",
                        weights.len(),
                        links.len()
                    )));
                }
                if let Some(slot) = weights.iter().position(|w| !w.is_finite() || *w < 0.0) {
                    return Err(LouvainError::malformed(format!(
                        "weight {} at slot {slot} is not a finite non-negative number",
                        weights[slot]
                    )));
                }
                weights
            }
        };

        Ok(Self::from_trusted(
            degree_seq,
            links,
            weights,
            vec![1.0; node_count],
        ))
    }

    /// Assemble a graph whose invariants the caller already guarantees.
    pub(crate) fn from_trusted(
        degrees: Vec<u64>,
        links: Vec<usize>,
        weights: Vec<f64>,
        node_weights: Vec<f64>,
    ) -> Self {
        let mut graph = CompactGraph {
            degrees,
            links,
            weights,
            node_weights,
            weighted_degrees: Vec::new(),
            self_loops: Vec::new(),
            total_weight: 0.0,
            sum_node_weights: 0.0,
        };
        graph.refresh_totals();
        graph
    }

    fn refresh_totals(&mut self) {
        let weighted_degrees: Vec<f64> = (0..self.node_count())
            .map(|node| {
                let range = self.slot_range(node);
                if self.weights.is_empty() {
                    range.len() as f64
                } else {
                    self.weights[range].iter().sum()
                }
            })
            .collect();
        self.self_loops = (0..self.node_count())
            .map(|node| {
                self.neighbors(node)
                    .filter(|&(neighbor, _)| neighbor == node)
                    .map(|(_, weight)| weight)
                    .sum()
            })
            .collect();
        self.total_weight = weighted_degrees.iter().sum();
        self.sum_node_weights = self.node_weights.iter().sum();
        self.weighted_degrees = weighted_degrees;
    }

    /// Replace the default unit node weights.
    pub fn with_node_weights(mut self, node_weights: Vec<f64>) -> Result<Self> {
        if node_weights.len() != self.node_count() {
            return Err(LouvainError::malformed(format!(
                "{} node weights given for {} nodes",
                node_weights.len(),
                self.node_count()
            )));
        }
        if let Some(node) = node_weights.iter().position(|w| !w.is_finite() || *w < 0.0) {
            return Err(LouvainError::malformed(format!(
                "node weight {} of node {node} is not a finite non-negative number",
                node_weights[node]
            )));
        }
        self.node_weights = node_weights;
        self.refresh_totals();
        Ok(self)
    }

    /// Build a compact graph from an undirected petgraph graph.
    ///
    /// # Arguments
    /// * `graph` - The input graph; node indices become compact node ids
    /// * `weight_fn` - Extracts the weight of an edge payload
    ///
    /// # Returns
    /// * A weighted `CompactGraph`
    /// * `MalformedGraph` if any edge weight is negative or not finite
    pub fn from_petgraph<N, E, F>(graph: &UnGraph<N, E>, mut weight_fn: F) -> Result<Self>
    where
        F: FnMut(&E) -> f64,
    {
        let mut edges = EdgeList::with_nodes(graph.node_count());
        for edge in graph.edge_references() {
            let weight = weight_fn(edge.weight());
            edges.add_edge(edge.source().index(), edge.target().index(), weight)?;
        }
        Ok(edges.to_compact(WeightMode::Weighted))
    }

    #[inline]
    fn slot_range(&self, node: usize) -> Range<usize> {
        let start = if node == 0 {
            0
        } else {
            self.degrees[node - 1] as usize
        };
        start..self.degrees[node] as usize
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.degrees.len()
    }

    /// Number of neighbor slots (each undirected edge counts twice, a
    /// self-loop once).
    #[inline]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    #[inline]
    pub fn is_weighted(&self) -> bool {
        !self.weights.is_empty()
    }

    /// Sum of all weighted degrees.
    #[inline]
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    #[inline]
    pub fn sum_node_weights(&self) -> f64 {
        self.sum_node_weights
    }

    #[inline]
    pub fn node_weight(&self, node: usize) -> f64 {
        self.node_weights[node]
    }

    pub fn node_weights(&self) -> &[f64] {
        &self.node_weights
    }

    pub fn cumulative_degrees(&self) -> &[u64] {
        &self.degrees
    }

    pub fn neighbor_ids(&self) -> &[usize] {
        &self.links
    }

    /// Edge weights parallel to [`CompactGraph::neighbor_ids`]; empty for an
    /// unweighted graph.
    pub fn edge_weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of neighbor slots of `node`.
    #[inline]
    pub fn degree(&self, node: usize) -> usize {
        self.slot_range(node).len()
    }

    /// Sum of the weights of `node`'s neighbor slots.
    #[inline]
    pub fn weighted_degree(&self, node: usize) -> f64 {
        self.weighted_degrees[node]
    }

    /// Total weight of the slots of `node` that point back at `node`.
    #[inline]
    pub fn self_loop_weight(&self, node: usize) -> f64 {
        self.self_loops[node]
    }

    /// Iterate over `(neighbor, weight)` pairs of `node`.
    pub fn neighbors(&self, node: usize) -> Neighbors<'_> {
        let range = self.slot_range(node);
        let weights = if self.weights.is_empty() {
            None
        } else {
            Some(self.weights[range.clone()].iter())
        };
        Neighbors {
            ids: self.links[range].iter(),
            weights,
        }
    }

    /// Largest edge weight in the graph (1 for an unweighted graph).
    pub fn max_edge_weight(&self) -> f64 {
        if self.weights.is_empty() {
            return 1.0;
        }
        self.weights.iter().copied().fold(0.0, f64::max)
    }

    /// Give every node lacking one a self-loop of weight zero.
    ///
    /// Weights are materialized if the graph was unweighted. Nodes that
    /// already carry a self-loop are left untouched, so calling this twice
    /// changes nothing the second time.
    ///
    /// Returns the number of self-loops added.
    pub fn add_self_loops(&mut self) -> usize {
        let node_count = self.node_count();
        let mut degrees = Vec::with_capacity(node_count);
        let mut links = Vec::with_capacity(self.links.len() + node_count);
        let mut weights = Vec::with_capacity(self.links.len() + node_count);
        let mut added = 0;

        for node in 0..node_count {
            let range = self.slot_range(node);
            let has_loop = self.links[range.clone()].contains(&node);
            links.extend_from_slice(&self.links[range.clone()]);
            if self.weights.is_empty() {
                weights.extend(std::iter::repeat(1.0).take(range.len()));
            } else {
                weights.extend_from_slice(&self.weights[range]);
            }
            if !has_loop {
                links.push(node);
                weights.push(0.0);
                added += 1;
            }
            degrees.push(links.len() as u64);
        }

        if added > 0 {
            self.degrees = degrees;
            self.links = links;
            self.weights = weights;
            self.refresh_totals();
        }
        added
    }

    /// Rewrite every slot weight through `f(node, neighbor, weight)`.
    ///
    /// The closure sees the graph as it was before the rewrite. The result is
    /// always a weighted graph.
    pub(crate) fn reweight<F>(&mut self, mut f: F)
    where
        F: FnMut(&CompactGraph, usize, usize, f64) -> f64,
    {
        let mut weights = Vec::with_capacity(self.links.len());
        for node in 0..self.node_count() {
            for (neighbor, weight) in self.neighbors(node) {
                weights.push(f(self, node, neighbor, weight));
            }
        }
        self.weights = weights;
        self.refresh_totals();
    }

    // ========================
    // Binary interop format
    // ========================

    /// Write the structure in the binary layout: an `i32` node count, one
    /// `u64` cumulative degree per node, then one `i32` per neighbor slot, all
    /// little-endian. Weights go to a separate stream, see
    /// [`CompactGraph::write_weights`].
    pub fn write_binary<W: Write>(&self, out: &mut W) -> Result<()> {
        let node_count = i32::try_from(self.node_count()).map_err(|_| {
            LouvainError::malformed("node count does not fit the binary format")
        })?;
        out.write_all(&node_count.to_le_bytes())?;
        for &degree in &self.degrees {
            out.write_all(&degree.to_le_bytes())?;
        }
        for &link in &self.links {
            // ids are below node_count, which fits in i32
            out.write_all(&(link as i32).to_le_bytes())?;
        }
        Ok(())
    }

    /// Write one little-endian `f64` per neighbor slot.
    pub fn write_weights<W: Write>(&self, out: &mut W) -> Result<()> {
        for node in 0..self.node_count() {
            for (_, weight) in self.neighbors(node) {
                out.write_all(&weight.to_le_bytes())?;
            }
        }
        Ok(())
    }

    /// Read a graph written by [`CompactGraph::write_binary`], optionally with
    /// its weight stream. Without a weight stream the graph is unweighted.
    pub fn read_binary<R: Read>(input: &mut R, weights: Option<&mut dyn Read>) -> Result<Self> {
        let node_count = read_i32(input)?;
        let node_count = usize::try_from(node_count)
            .map_err(|_| LouvainError::malformed(format!("negative node count {node_count}")))?;

        // sizes come from the stream, so buffers grow only as data arrives
        let mut degree_seq = Vec::new();
        for _ in 0..node_count {
            degree_seq.push(read_u64(input)?);
        }
        let slots = degree_seq.last().copied().unwrap_or(0);

        let mut neighbor_ids = Vec::new();
        for _ in 0..slots {
            neighbor_ids.push(read_i32(input)?);
        }

        let (weight_seq, mode) = match weights {
            Some(stream) => {
                let mut weight_seq = Vec::new();
                for _ in 0..neighbor_ids.len() {
                    weight_seq.push(read_f64(stream)?);
                }
                (weight_seq, WeightMode::Weighted)
            }
            None => (Vec::new(), WeightMode::Unweighted),
        };

        Self::with_node_count(node_count, degree_seq, neighbor_ids, weight_seq, mode)
    }
}

fn read_i32<R: Read + ?Sized>(input: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_u64<R: Read + ?Sized>(input: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64<R: Read + ?Sized>(input: &mut R) -> Result<f64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Iterator over the `(neighbor, weight)` pairs of one node.
///
/// Clones are independent cursors, so a neighborhood can be walked any
/// number of times.
#[derive(Clone, Debug)]
pub struct Neighbors<'a> {
    ids: std::slice::Iter<'a, usize>,
    weights: Option<std::slice::Iter<'a, f64>>,
}

impl Iterator for Neighbors<'_> {
    type Item = (usize, f64);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let &id = self.ids.next()?;
        let weight = match self.weights.as_mut() {
            Some(weights) => weights.next().copied().unwrap_or(1.0),
            None => 1.0,
        };
        Some((id, weight))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl ExactSizeIterator for Neighbors<'_> {}

// ========================
// Edge list builder
// ========================

/// Growable adjacency lists used to assemble a [`CompactGraph`] edge by edge.
#[derive(Clone, Debug, Default)]
pub struct EdgeList {
    links: Vec<Vec<(usize, f64)>>,
}

impl EdgeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `node_count` isolated nodes.
    pub fn with_nodes(node_count: usize) -> Self {
        EdgeList {
            links: vec![Vec::new(); node_count],
        }
    }

    pub fn node_count(&self) -> usize {
        self.links.len()
    }

    /// Add an undirected edge, growing the node range to cover both ends.
    ///
    /// A self-loop is stored once; any other edge is stored at both ends.
    pub fn add_edge(&mut self, src: usize, dst: usize, weight: f64) -> Result<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(LouvainError::malformed(format!(
                "edge ({src}, {dst}) has weight {weight}, expected a finite non-negative number"
            )));
        }
        let needed = src.max(dst) + 1;
        if self.links.len() < needed {
            self.links.resize(needed, Vec::new());
        }
        self.links[src].push((dst, weight));
        if src != dst {
            self.links[dst].push((src, weight));
        }
        Ok(())
    }

    /// Merge parallel edges and sort every neighbor list.
    ///
    /// Weighted mode sums the weights of merged edges; unweighted mode keeps
    /// a single edge.
    pub fn clean(&mut self, mode: WeightMode) {
        for list in &mut self.links {
            list.sort_by_key(|&(neighbor, _)| neighbor);
            let mut merged: Vec<(usize, f64)> = Vec::with_capacity(list.len());
            for &(neighbor, weight) in list.iter() {
                match merged.last_mut() {
                    Some(last) if last.0 == neighbor => {
                        if mode == WeightMode::Weighted {
                            last.1 += weight;
                        }
                    }
                    _ => merged.push((neighbor, weight)),
                }
            }
            *list = merged;
        }
    }

    /// Flatten into the cumulative-degree representation.
    pub fn to_compact(&self, mode: WeightMode) -> CompactGraph {
        let mut degrees = Vec::with_capacity(self.links.len());
        let slots: usize = self.links.iter().map(Vec::len).sum();
        let mut links = Vec::with_capacity(slots);
        let mut weights = Vec::new();
        if mode == WeightMode::Weighted {
            weights.reserve(slots);
        }

        for list in &self.links {
            for &(neighbor, weight) in list {
                links.push(neighbor);
                if mode == WeightMode::Weighted {
                    weights.push(weight);
                }
            }
            degrees.push(links.len() as u64);
        }

        let node_count = self.links.len();
        CompactGraph::from_trusted(degrees, links, weights, vec![1.0; node_count])
    }
}
