//! Enforcer configuration
//!
//! Loaded from TOML, optionally overridden from `TESSERA_*` environment
//! variables, then validated before an enforcer is built from it.

use crate::errors::{Result, TesseraError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "TESSERA_";

/// Top-level enforcer configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnforcerConfig {
    /// Where the model text comes from
    #[serde(default)]
    pub model: ModelSource,
    /// Which storage backend holds the policy
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Model text location: exactly one of `path` or `text`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSource {
    /// Path to a model file
    pub path: Option<PathBuf>,
    /// Inline model text
    pub text: Option<String>,
}

/// Supported storage backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process memory only
    #[default]
    Memory,
    /// CSV policy lines (`p, alice, data1, read`)
    File,
    /// Whole-snapshot JSON document
    Json,
}

impl std::str::FromStr for StorageBackend {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "json" => Ok(Self::Json),
            other => Err(TesseraError::configuration(format!(
                "unknown storage backend `{other}`"
            ))),
        }
    }
}

/// Storage section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Backend kind
    #[serde(default)]
    pub backend: StorageBackend,
    /// Backend file, required by `file` and `json`
    pub path: Option<PathBuf>,
    /// Write every mutation through to the backend
    #[serde(default = "default_auto_save")]
    pub auto_save: bool,
}

fn default_auto_save() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: None,
            auto_save: default_auto_save(),
        }
    }
}

impl EnforcerConfig {
    /// Configuration with an inline model and in-memory storage
    pub fn with_model_text(text: impl Into<String>) -> Self {
        Self {
            model: ModelSource {
                path: None,
                text: Some(text.into()),
            },
            storage: StorageConfig::default(),
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    ///
    /// Relative model and storage paths are resolved against the directory
    /// holding the configuration file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            TesseraError::configuration(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        tracing::info!(path = %path.display(), "Loaded enforcer configuration");
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for slot in [&mut self.model.path, &mut self.storage.path] {
            if let Some(p) = slot.as_mut() {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
        }
    }

    /// Apply `TESSERA_*` environment overrides
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply overrides from an explicit variable list
    pub fn merge_with_vars<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "MODEL_PATH" => {
                    self.model.path = Some(PathBuf::from(value));
                    self.model.text = None;
                }
                "STORAGE_BACKEND" => self.storage.backend = value.parse()?,
                "STORAGE_PATH" => self.storage.path = Some(PathBuf::from(value)),
                "AUTO_SAVE" => {
                    self.storage.auto_save = value.parse().map_err(|_| {
                        TesseraError::configuration(format!(
                            "{ENV_PREFIX}AUTO_SAVE must be `true` or `false`, got `{value}`"
                        ))
                    })?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        match (&self.model.path, &self.model.text) {
            (Some(_), Some(_)) => {
                return Err(TesseraError::configuration(
                    "model section must set only one of `path` or `text`",
                ))
            }
            (None, None) => {
                return Err(TesseraError::configuration(
                    "model section must set `path` or `text`",
                ))
            }
            _ => {}
        }
        if self.storage.backend != StorageBackend::Memory && self.storage.path.is_none() {
            return Err(TesseraError::configuration(format!(
                "storage backend {:?} requires a `path`",
                self.storage.backend
            )));
        }
        Ok(())
    }

    /// Model text, reading the model file when configured by path
    pub fn model_text(&self) -> Result<String> {
        self.validate()?;
        match (&self.model.text, &self.model.path) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => fs::read_to_string(path).map_err(|e| {
                TesseraError::configuration(format!(
                    "Failed to read model file {}: {e}",
                    path.display()
                ))
            }),
            (None, None) => Err(TesseraError::configuration("no model configured")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn test_defaults_to_memory_with_auto_save() {
        let config = EnforcerConfig::from_toml_str("[model]\ntext = \"m\"\n").unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.storage.auto_save);
        config.validate().unwrap();
    }

    #[test]
    fn test_file_backend_requires_path() {
        let config = EnforcerConfig::from_toml_str(
            "[model]\ntext = \"m\"\n[storage]\nbackend = \"file\"\n",
        )
        .unwrap();
        assert_matches!(config.validate(), Err(TesseraError::Configuration { .. }));
    }

    #[test]
    fn test_model_needs_exactly_one_source() {
        let both = EnforcerConfig::from_toml_str(
            "[model]\ntext = \"m\"\npath = \"model.conf\"\n",
        )
        .unwrap();
        assert_matches!(both.validate(), Err(TesseraError::Configuration { .. }));
        assert_matches!(
            EnforcerConfig::default().validate(),
            Err(TesseraError::Configuration { .. })
        );
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert_matches!(
            EnforcerConfig::from_toml_str("[model]\ntext = \"m\"\ncolour = 1\n"),
            Err(TesseraError::Configuration { .. })
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EnforcerConfig::with_model_text("m");
        config
            .merge_with_vars(vec![
                ("TESSERA_STORAGE_BACKEND".to_string(), "json".to_string()),
                ("TESSERA_STORAGE_PATH".to_string(), "/tmp/p.json".to_string()),
                ("TESSERA_AUTO_SAVE".to_string(), "false".to_string()),
                ("HOME".to_string(), "/root".to_string()),
            ])
            .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/p.json")));
        assert!(!config.storage.auto_save);

        assert_matches!(
            config.merge_with_vars(vec![("TESSERA_AUTO_SAVE".into(), "maybe".into())]),
            Err(TesseraError::Configuration { .. })
        );
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.conf"), "model body").unwrap();
        let config_path = dir.path().join("tessera.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            "[model]\npath = \"model.conf\"\n[storage]\nbackend = \"file\"\npath = \"policy.csv\""
        )
        .unwrap();

        let config = EnforcerConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.storage.path, Some(dir.path().join("policy.csv")));
        assert_eq!(config.model_text().unwrap(), "model body");
    }
}
