//! Session files
//!
//! A session is a RON document naming the features to evaluate, in order,
//! together with evaluation settings and an optional log filter.

use std::path::Path;

use rk_feature::{EvaluationConfig, FeatureRegistry, HistoryResult, Overrides, PartHistory};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session loading errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse session: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Failed to serialize session: {0}")]
    Serialize(#[from] ron::Error),
}

/// One history node as written in a session file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureNodeConfig {
    pub short_name: String,
    #[serde(default)]
    pub overrides: Overrides,
    #[serde(default)]
    pub suppressed: bool,
}

impl FeatureNodeConfig {
    pub fn new(short_name: impl Into<String>, overrides: Overrides) -> Self {
        Self {
            short_name: short_name.into(),
            overrides,
            suppressed: false,
        }
    }
}

/// Contents of a session file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Fallback tracing filter when `RUST_LOG` is unset
    pub log_filter: Option<String>,
    pub evaluation: EvaluationConfig,
    pub features: Vec<FeatureNodeConfig>,
}

impl SessionConfig {
    /// Parse a session from RON text
    pub fn from_ron(text: &str) -> Result<Self, SessionError> {
        Ok(ron::from_str(text)?)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, SessionError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Load a session file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Built-in session used when no file is given
    pub fn demo() -> Self {
        let object = |value: serde_json::Value| value.as_object().cloned().unwrap_or_default();
        Self {
            log_filter: None,
            evaluation: EvaluationConfig::default(),
            features: vec![
                FeatureNodeConfig::new("P.S", object(serde_json::json!({ "radius": 10 }))),
                FeatureNodeConfig::new(
                    "P.CU",
                    object(serde_json::json!({ "transform": { "position": [12, 0, 0] } })),
                ),
                FeatureNodeConfig::new(
                    "P.CY",
                    object(serde_json::json!({
                        "height": 30,
                        "boolean": { "targets": ["P.S1", "P.CU1"], "operation": "UNION" }
                    })),
                ),
            ],
        }
    }

    /// Build a history from the session's nodes
    pub fn build_history(&self, registry: &FeatureRegistry) -> HistoryResult<PartHistory> {
        let mut history = PartHistory::with_config(self.evaluation.clone());
        for node in &self.features {
            let id = history.add_from_registry(registry, &node.short_name, node.overrides.clone())?;
            if node.suppressed {
                history.set_suppressed(&id, true)?;
            }
        }
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_feature::UnresolvedTargetPolicy;
    use std::io::Write;

    const SESSION: &str = r#"(
        log_filter: Some("rk_feature=debug"),
        evaluation: (unresolved_targets: SkipNode),
        features: [
            (short_name: "P.S", overrides: {"radius": 10}),
            (short_name: "P.CU", suppressed: true),
        ],
    )"#;

    #[test]
    fn test_parse_session() {
        let session = SessionConfig::from_ron(SESSION).unwrap();
        assert_eq!(session.log_filter.as_deref(), Some("rk_feature=debug"));
        assert_eq!(
            session.evaluation.unresolved_targets,
            UnresolvedTargetPolicy::SkipNode
        );
        assert!(session.evaluation.visualize);
        assert_eq!(session.features.len(), 2);
        assert_eq!(
            session.features[0].overrides.get("radius").and_then(|v| v.as_f64()),
            Some(10.0)
        );
        assert!(session.features[1].suppressed);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SESSION.as_bytes()).unwrap();

        let session = SessionConfig::load(file.path()).unwrap();
        assert_eq!(session.features[1].short_name, "P.CU");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = SessionConfig::load("/nonexistent/session.ron");
        assert!(matches!(result, Err(SessionError::Io(_))));
    }

    #[test]
    fn test_unknown_feature_fails_build() {
        let session = SessionConfig {
            features: vec![FeatureNodeConfig::new("X.NOPE", Overrides::new())],
            ..SessionConfig::default()
        };
        let registry = FeatureRegistry::with_builtins().unwrap();
        assert!(session.build_history(&registry).is_err());
    }

    #[tokio::test]
    async fn test_demo_session_evaluates_cleanly() {
        let registry = FeatureRegistry::with_builtins().unwrap();
        let mut history = SessionConfig::demo().build_history(&registry).unwrap();
        let kernel = rk_feature::MemoryKernel::new();

        let report = history.evaluate(&kernel).await;
        assert!(report.is_clean());
        assert_eq!(report.solid_count, 1);
        assert!(history.solids().contains("P.CY1"));
    }

    #[test]
    fn test_demo_survives_ron() {
        let demo = SessionConfig::demo();
        let text = demo.to_ron().unwrap();
        let parsed = SessionConfig::from_ron(&text).unwrap();
        assert_eq!(parsed.features.len(), demo.features.len());
        assert_eq!(parsed.features[2].short_name, "P.CY");
    }
}
