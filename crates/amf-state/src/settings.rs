//! Caller-side forest settings.
//!
//! The forest holds no rebalancing configuration of its own. These settings
//! are loaded once by the embedding application and a `RebalanceConfig` is
//! copied out of them for every mutating call.
//!
//! ```yaml
//! rebalance:
//!   split_threshold: 64
//!   merge_threshold: 8
//! bloom:
//!   bits: 4096
//!   salts: [1, 7, 13]
//! ```

use std::path::Path;

use amf_crypto::BloomFilter;
use serde::Deserialize;

use crate::error::{ForestError, ForestResult};
use crate::rebalance::RebalanceConfig;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BloomSettings {
    #[serde(default = "default_bloom_bits")]
    pub bits: usize,
    #[serde(default = "default_bloom_salts")]
    pub salts: Vec<u32>,
}

fn default_bloom_bits() -> usize {
    1024
}

fn default_bloom_salts() -> Vec<u32> {
    vec![0x9e37_79b9, 0x85eb_ca6b, 0xc2b2_ae35]
}

impl Default for BloomSettings {
    fn default() -> Self {
        BloomSettings {
            bits: default_bloom_bits(),
            salts: default_bloom_salts(),
        }
    }
}

impl BloomSettings {
    pub fn build(&self) -> BloomFilter {
        BloomFilter::new(self.bits, self.salts.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ForestSettings {
    #[serde(default)]
    pub rebalance: RebalanceConfig,
    #[serde(default)]
    pub bloom: BloomSettings,
}

impl ForestSettings {
    pub fn from_yaml_str(text: &str) -> ForestResult<Self> {
        let settings: ForestSettings =
            serde_yaml::from_str(text).map_err(|e| ForestError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ForestResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ForestError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> ForestResult<()> {
        if self.bloom.bits == 0 {
            return Err(ForestError::Config("bloom.bits must be > 0".into()));
        }
        if self.bloom.salts.is_empty() {
            return Err(ForestError::Config("bloom.salts must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_valid() {
        let settings = ForestSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.rebalance, RebalanceConfig::new(100, 10));
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let settings = ForestSettings::from_yaml_str("rebalance:\n  split_threshold: 5\n  merge_threshold: 2\n").unwrap();
        assert_eq!(settings.rebalance.split_threshold, 5);
        assert_eq!(settings.bloom, BloomSettings::default());
    }

    #[test]
    fn test_rejects_empty_salts() {
        let err = ForestSettings::from_yaml_str("bloom:\n  salts: []\n").unwrap_err();
        assert!(matches!(err, ForestError::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        assert!(ForestSettings::from_yaml_str("rebalance: [1, 2").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bloom:\n  bits: 64\n  salts: [3]").unwrap();
        let settings = ForestSettings::from_yaml_file(file.path()).unwrap();
        assert_eq!(settings.bloom.bits, 64);
        assert_eq!(settings.bloom.build().size(), 64);
    }

    #[test]
    fn test_missing_file() {
        let err = ForestSettings::from_yaml_file("/nonexistent/amf.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/amf.yaml"));
    }
}
