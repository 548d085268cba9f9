// Licensed under the Apache License, Version 2.0 (the "License"); you may
// not use this file except in compliance with the License. You may obtain
// a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations
// under the License.

//! Community detection by multi-level local moving.
//!
//! [`louvain`] holds the optimizer and [`quality`] the objectives it can
//! maximize. [`Communities`] wraps both behind an edge-by-edge interface.

mod common;
pub mod louvain;
pub mod quality;

pub use common::compose_mapping;

use tracing::debug;

use crate::config::LouvainConfig;
use crate::error::{LouvainError, Result};
use crate::graph::{EdgeList, WeightMode};
use louvain::Hierarchy;
use quality::QualitySpec;

/// Accumulates edges, then detects communities over them.
///
/// Any change to the edges or the configuration discards the previous
/// result.
#[derive(Clone, Debug, Default)]
pub struct Communities {
    edges: EdgeList,
    node_weights: Option<Vec<f64>>,
    config: LouvainConfig,
    result: Option<Hierarchy>,
}

impl Communities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LouvainConfig) -> Self {
        Communities {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &LouvainConfig {
        &self.config
    }

    /// Add an undirected edge. Node ids grow on demand.
    pub fn add_edge(&mut self, src: usize, dst: usize, weight: f64) -> Result<()> {
        self.edges.add_edge(src, dst, weight)?;
        self.result = None;
        Ok(())
    }

    /// Per-node masses, checked against the node count at calculation time.
    pub fn set_node_weights(&mut self, node_weights: Vec<f64>) {
        self.node_weights = Some(node_weights);
        self.result = None;
    }

    pub fn set_quality(&mut self, quality: QualitySpec) {
        self.config.quality = quality;
        self.result = None;
    }

    /// Select the objective by numeric id.
    pub fn set_quality_id(&mut self, id: u32) -> Result<()> {
        self.set_quality(QualitySpec::from_id(id)?);
        Ok(())
    }

    /// # Errors
    /// `InvalidParameter` unless the Owsinski-Zadrozny criterion is selected.
    pub fn set_alpha(&mut self, alpha: f64) -> Result<()> {
        let quality = self.config.quality.with_alpha(alpha)?;
        self.set_quality(quality);
        Ok(())
    }

    /// # Errors
    /// `InvalidParameter` unless the Shi-Malik criterion is selected.
    pub fn set_kmin(&mut self, kmin: usize) -> Result<()> {
        let quality = self.config.quality.with_kmin(kmin)?;
        self.set_quality(quality);
        Ok(())
    }

    pub fn set_precision(&mut self, precision: f64) {
        self.config.precision = precision;
        self.result = None;
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.config.seed = seed;
        self.result = None;
    }

    pub fn set_max_passes(&mut self, max_passes: Option<usize>) {
        self.config.max_passes = max_passes;
        self.result = None;
    }

    /// Merge parallel edges, build the graph and run the optimizer.
    ///
    /// # Returns
    /// * The quality of the final partition
    pub fn calculate(&mut self, mode: WeightMode) -> Result<f64> {
        self.config.validate()?;
        let mut edges = self.edges.clone();
        edges.clean(mode);
        let mut graph = edges.to_compact(mode);
        if let Some(node_weights) = &self.node_weights {
            graph = graph.with_node_weights(node_weights.clone())?;
        }
        debug!(
            nodes = graph.node_count(),
            links = graph.link_count(),
            ?mode,
            "graph assembled"
        );

        let hierarchy = louvain::run(graph, &self.config)?;
        let quality = hierarchy.final_quality();
        self.result = Some(hierarchy);
        Ok(quality)
    }

    /// # Errors
    /// `NotComputed` before a successful [`Communities::calculate`].
    pub fn hierarchy(&self) -> Result<&Hierarchy> {
        self.result.as_ref().ok_or(LouvainError::NotComputed)
    }

    /// Top-level community of every node.
    pub fn mapping(&self) -> Result<Vec<(usize, usize)>> {
        Ok(self.hierarchy()?.mapping())
    }

    pub fn quality(&self) -> Result<f64> {
        Ok(self.hierarchy()?.final_quality())
    }
}
