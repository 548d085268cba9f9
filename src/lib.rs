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

//! Multi-level Louvain community detection over a family of interchangeable
//! quality functions.
//!
//! ```no_run
//! use generic_louvain::{Communities, QualitySpec, WeightMode};
//!
//! let mut communities = Communities::new();
//! communities.add_edge(0, 1, 1.0)?;
//! communities.add_edge(1, 2, 1.0)?;
//! communities.set_quality(QualitySpec::ZahnCondorcet);
//! let quality = communities.calculate(WeightMode::Unweighted)?;
//! for (node, community) in communities.mapping()? {
//!     println!("{node} {community}");
//! }
//! # let _ = quality;
//! # Ok::<(), generic_louvain::LouvainError>(())
//! ```

pub mod community;
pub mod config;
pub mod error;
pub mod graph;

pub use community::louvain::{run, Hierarchy, LevelDriver, LocalOptimizer};
pub use community::quality::{
    CommunityState, GraphConstants, Objective, QualityFunction, QualitySpec,
};
pub use community::{compose_mapping, Communities};
pub use config::LouvainConfig;
pub use error::{LouvainError, Result};
pub use graph::{CompactGraph, EdgeList, Neighbors, WeightMode};
