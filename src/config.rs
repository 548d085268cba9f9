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

use serde::{Deserialize, Serialize};

use crate::community::quality::QualitySpec;
use crate::error::{LouvainError, Result};

/// Objective selection and stopping rules for a run.
///
/// Every field has a default, so a partial JSON document such as
/// `{"quality": {"kind": "shi_malik", "kmin": 3}}` is a complete
/// configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LouvainConfig {
    pub quality: QualitySpec,
    /// Minimum relative quality increase for another pass.
    pub precision: f64,
    pub seed: u64,
    /// Optional ceiling on passes per level.
    pub max_passes: Option<usize>,
}

impl Default for LouvainConfig {
    fn default() -> Self {
        LouvainConfig {
            quality: QualitySpec::Modularity,
            precision: 1e-6,
            seed: 0,
            max_passes: None,
        }
    }
}

impl LouvainConfig {
    pub fn with_quality(mut self, quality: QualitySpec) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_passes(mut self, max_passes: Option<usize>) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Check the stopping rules.
    ///
    /// Objective parameters are not rejected here; they are clamped when the
    /// run starts.
    pub fn validate(&self) -> Result<()> {
        if !self.precision.is_finite() || self.precision < 0.0 {
            return Err(LouvainError::invalid(
                "precision",
                format!("{} is not a finite non-negative number", self.precision),
            ));
        }
        if self.max_passes == Some(0) {
            return Err(LouvainError::invalid(
                "max_passes",
                "at least one pass is required",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_fill_in_defaults() {
        let config: LouvainConfig =
            serde_json::from_str(r#"{"quality": {"kind": "shi_malik", "kmin": 3}}"#).unwrap();
        assert_eq!(config.quality, QualitySpec::ShiMalik { kmin: 3 });
        assert_eq!(config.precision, 1e-6);
        assert_eq!(config.seed, 0);
        assert_eq!(config.max_passes, None);

        let config: LouvainConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LouvainConfig::default());
    }

    #[test]
    fn variant_parameters_default_when_omitted() {
        let config: LouvainConfig =
            serde_json::from_str(r#"{"quality": {"kind": "owsinski_zadrozny"}, "seed": 9}"#)
                .unwrap();
        assert_eq!(config.quality, QualitySpec::OwsinskiZadrozny { alpha: 0.5 });
        assert_eq!(config.seed, 9);
    }

    #[test]
    fn serializes_with_tagged_quality() {
        let config = LouvainConfig::default().with_quality(QualitySpec::BalancedModularity);
        let json = serde_json::to_value(config).unwrap();
        assert_eq!(json["quality"]["kind"], "balanced_modularity");
        let back: LouvainConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn validate_rejects_bad_stopping_rules() {
        assert!(LouvainConfig::default().validate().is_ok());
        assert!(LouvainConfig::default()
            .with_precision(-1.0)
            .validate()
            .is_err());
        assert!(LouvainConfig::default()
            .with_precision(f64::NAN)
            .validate()
            .is_err());
        let err = LouvainConfig::default()
            .with_max_passes(Some(0))
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            LouvainError::InvalidParameter {
                name: "max_passes",
                ..
            }
        ));
    }
}
