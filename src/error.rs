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

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LouvainError>;

/// Errors returned by graph construction and community detection.
#[derive(Debug, Error)]
pub enum LouvainError {
    /// Degree sequence, neighbor ids or weights are structurally inconsistent.
    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    /// A quality parameter was set on the wrong objective, or is out of range.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },

    /// Reading or writing the binary graph format failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Results were requested before any computation ran.
    #[error("communities have not been computed yet")]
    NotComputed,
}

impl LouvainError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        LouvainError::MalformedGraph(message.into())
    }

    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        LouvainError::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}
