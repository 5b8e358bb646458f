use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How far a write propagates before returning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecalcMode {
    /// Recompute only the cells that read the written cell directly.
    /// Cells further down a chain keep their cached value until re-read.
    #[default]
    DirectDependents,
    /// Recompute every downstream cell in dependency order
    Transitive,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub recalc_mode: RecalcMode,
    /// Maximum nesting of cell-reference re-evaluation
    pub max_depth: usize,
    /// Name of the sheet a new engine starts with
    pub default_sheet: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recalc_mode: RecalcMode::DirectDependents,
            max_depth: 256,
            default_sheet: "Sheet1".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        if self.default_sheet.trim().is_empty() {
            return Err(ConfigError::Invalid("default_sheet must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.recalc_mode, RecalcMode::DirectDependents);
        assert_eq!(config.max_depth, 256);
        assert_eq!(config.default_sheet, "Sheet1");
    }

    #[test]
    fn test_from_json_partial() {
        let config = EngineConfig::from_json(r#"{"recalc_mode": "transitive"}"#).unwrap();
        assert_eq!(config.recalc_mode, RecalcMode::Transitive);
        assert_eq!(config.max_depth, 256);
    }

    #[test]
    fn test_from_json_full() {
        let config = EngineConfig::from_json(
            r#"{"recalc_mode": "direct_dependents", "max_depth": 32, "default_sheet": "Data"}"#,
        )
        .unwrap();
        assert_eq!(
            config,
            EngineConfig {
                recalc_mode: RecalcMode::DirectDependents,
                max_depth: 32,
                default_sheet: "Data".to_string(),
            }
        );
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"max_depth": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"recalc_mode": "sometimes"}"#),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"default_sheet": " "}"#),
            Err(ConfigError::Invalid(_))
        ));
    }
}
