/// Configuration module for opforge.
///
/// Handles loading, validating, and providing default configuration
/// values for a pipeline instance.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analyzer::{CriticalFileMatcher, DEFAULT_CRITICAL_GLOBS};
use crate::synth::content::DEFAULT_INSTRUCTION_PREFIXES;

// ── Default value functions ──────────────────────────────────────────

fn default_workspace_root() -> String {
    ".".to_string()
}

fn default_critical_globs() -> Vec<String> {
    DEFAULT_CRITICAL_GLOBS
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn default_instruction_prefixes() -> Vec<String> {
    DEFAULT_INSTRUCTION_PREFIXES
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

// ── Config struct ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Root used to resolve relative operation targets and back the
    /// filesystem oracle.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,

    /// Globs for files whose mutation is always High risk.
    #[serde(default = "default_critical_globs")]
    pub critical_globs: Vec<String>,

    /// Comment markers stripped from synthesized content when followed
    /// by a colon (`// REPLACE: ...`).
    #[serde(default = "default_instruction_prefixes")]
    pub instruction_prefixes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            critical_globs: default_critical_globs(),
            instruction_prefixes: default_instruction_prefixes(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"opforge.json"`.
    /// If the file does not exist, returns a default config and
    /// generates a template for the default path.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "opforge.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == "opforge.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }
            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.workspace_root.is_empty(),
            "workspace_root must not be empty"
        );
        anyhow::ensure!(
            !self.critical_globs.is_empty(),
            "at least one critical glob must be specified"
        );
        CriticalFileMatcher::from_patterns(&self.critical_globs).context("invalid critical glob")?;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.workspace_root, ".");
        assert!(config.critical_globs.iter().any(|g| g == "package.json"));
        assert!(config.instruction_prefixes.iter().any(|p| p == "REPLACE"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"workspace_root": "/tmp/project"}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.workspace_root, "/tmp/project");
        // Other fields should have defaults
        assert!(!config.critical_globs.is_empty());
        assert!(!config.instruction_prefixes.is_empty());
    }

    #[test]
    fn test_validate_empty_root() {
        let mut config = Config::default();
        config.workspace_root = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_glob() {
        let mut config = Config::default();
        config.critical_globs = vec!["{unclosed".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.workspace_root, config.workspace_root);
        assert_eq!(parsed.critical_globs, config.critical_globs);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opforge.json");
        let path_str = path.to_str().unwrap();

        let mut config = Config::default();
        config.workspace_root = "/work".to_string();
        config.save(path_str).unwrap();

        let loaded = Config::load(path_str).unwrap();
        assert_eq!(loaded.workspace_root, "/work");
    }
}
