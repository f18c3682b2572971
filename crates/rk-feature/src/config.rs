//! Evaluation configuration
//!
//! Settings that control how a history reacts to failing features. Can be
//! serialized and loaded from RON files.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What to do when a boolean target no longer exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnresolvedTargetPolicy {
    /// The node fails and its geometry is missing
    #[default]
    FailNode,
    /// The node is skipped and the history passes through unchanged
    SkipNode,
}

/// History evaluation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Handling of boolean targets that cannot be resolved
    pub unresolved_targets: UnresolvedTargetPolicy,
    /// Whether features forward visualization hints to the kernel
    pub visualize: bool,
    /// Stop the pass at the first failed node instead of continuing
    pub stop_on_failure: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self::strict()
    }
}

impl EvaluationConfig {
    /// Missing targets fail their node
    pub fn strict() -> Self {
        Self {
            unresolved_targets: UnresolvedTargetPolicy::FailNode,
            visualize: true,
            stop_on_failure: false,
        }
    }

    /// Missing targets turn their node into a no-op
    pub fn lenient() -> Self {
        Self {
            unresolved_targets: UnresolvedTargetPolicy::SkipNode,
            ..Self::strict()
        }
    }

    /// Parse from RON text
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        ron::from_str(text).map_err(|e| ConfigError::Deserialize(e.to_string()))
    }

    /// Serialize to pretty RON text
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Load from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_ron(&content)
    }
}

/// Configuration errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_strict() {
        let config = EvaluationConfig::default();
        assert_eq!(config.unresolved_targets, UnresolvedTargetPolicy::FailNode);
        assert!(config.visualize);
        assert!(!config.stop_on_failure);
    }

    #[test]
    fn test_ron_round_trip() {
        let config = EvaluationConfig::lenient();
        let text = config.to_ron().unwrap();
        assert_eq!(EvaluationConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = EvaluationConfig::from_ron("(visualize: false)").unwrap();
        assert!(!config.visualize);
        assert_eq!(config.unresolved_targets, UnresolvedTargetPolicy::FailNode);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"(unresolved_targets: SkipNode, stop_on_failure: true)")
            .unwrap();

        let config = EvaluationConfig::load(file.path()).unwrap();
        assert_eq!(config.unresolved_targets, UnresolvedTargetPolicy::SkipNode);
        assert!(config.stop_on_failure);
        assert!(config.visualize);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = EvaluationConfig::load("/nonexistent/evaluation.ron");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
