//! Client settings.
//!
//! Loaded from `docpipe.toml`, with a `.env` file in the same directory loaded first.
//!
//! ## Environment Variables
//!
//! - `DOCPIPE_PROJECT_ID` - project the pipelines run against
//! - `DOCPIPE_DATABASE_ID` - database within the project
//! - `DOCPIPE_IGNORE_UNDEFINED_PROPERTIES` - `true`/`false`

use std::path::Path;

use anyhow::Context;
use docpipe_core::{DatabaseId, SerializerSettings};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::protocol::ExplainMode;

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "docpipe.toml";

pub const ENV_PROJECT_ID: &str = "DOCPIPE_PROJECT_ID";
pub const ENV_DATABASE_ID: &str = "DOCPIPE_DATABASE_ID";
pub const ENV_IGNORE_UNDEFINED: &str = "DOCPIPE_IGNORE_UNDEFINED_PROPERTIES";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub project_id: String,
    #[serde(default = "default_database_id")]
    pub database_id: String,
    /// Skip undefined values instead of rejecting them.
    #[serde(default)]
    pub ignore_undefined_properties: bool,
    /// Explain mode applied to every execution unless overridden per call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<ExplainMode>,
    /// Longest pipeline the client will send.
    #[serde(default = "default_max_stages")]
    pub max_stages: usize,
}

fn default_database_id() -> String {
    DatabaseId::DEFAULT_DATABASE.to_string()
}

fn default_max_stages() -> usize {
    1000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            database_id: default_database_id(),
            ignore_undefined_properties: false,
            explain: None,
            max_stages: default_max_stages(),
        }
    }
}

impl Settings {
    /// Settings for the default database of a project
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    pub fn with_database(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = database_id.into();
        self
    }

    pub fn ignore_undefined_properties(mut self, ignore: bool) -> Self {
        self.ignore_undefined_properties = ignore;
        self
    }

    /// Load settings from a directory.
    ///
    /// Loads `.env` from the same directory first, then applies environment overrides.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let env_path = dir.join(".env");
        if env_path.exists() {
            let _ = dotenvy::from_path(&env_path);
        }

        let config_path = dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            anyhow::bail!("Configuration file not found: {}", config_path.display());
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let mut settings: Settings = toml::from_str(&content)
            .with_context(|| format!("parsing {}", config_path.display()))?;

        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> ClientResult<Self> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| ClientError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml_string(&self) -> ClientResult<String> {
        toml::to_string_pretty(self).map_err(|e| ClientError::Config(e.to_string()))
    }

    /// Save settings to a directory
    pub fn save(&self, dir: &Path) -> anyhow::Result<()> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, self.to_toml_string()?)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(project) = std::env::var(ENV_PROJECT_ID) {
            if !project.is_empty() {
                self.project_id = project;
            }
        }

        if let Ok(database) = std::env::var(ENV_DATABASE_ID) {
            if !database.is_empty() {
                self.database_id = database;
            }
        }

        if let Ok(flag) = std::env::var(ENV_IGNORE_UNDEFINED) {
            if let Ok(ignore) = flag.parse::<bool>() {
                self.ignore_undefined_properties = ignore;
            }
        }
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.project_id.is_empty() {
            return Err(ClientError::Config("project_id must be set".to_string()));
        }
        if self.database_id.is_empty() {
            return Err(ClientError::Config("database_id must not be empty".to_string()));
        }
        if self.max_stages == 0 {
            return Err(ClientError::Config("max_stages must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn database(&self) -> DatabaseId {
        DatabaseId::new(&self.project_id, &self.database_id)
    }

    pub fn serializer_settings(&self) -> SerializerSettings {
        SerializerSettings {
            ignore_undefined_properties: self.ignore_undefined_properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_serialization() {
        let settings = Settings::new("my-project").with_database("analytics");
        let toml_str = settings.to_toml_string().unwrap();
        assert!(toml_str.contains("project_id = \"my-project\""));
        assert!(toml_str.contains("database_id = \"analytics\""));
        assert!(toml_str.contains("max_stages = 1000"));

        let parsed = Settings::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_defaults_from_minimal_toml() {
        let settings = Settings::from_toml_str("project_id = \"p\"").unwrap();
        assert_eq!(settings.database_id, "(default)");
        assert!(!settings.ignore_undefined_properties);
        assert_eq!(settings.explain, None);
        assert_eq!(settings.database().resource_name(), "projects/p/databases/(default)");
    }

    #[test]
    fn test_explain_mode_parses() {
        let settings = Settings::from_toml_str("project_id = \"p\"\nexplain = \"analyze\"").unwrap();
        assert_eq!(settings.explain, Some(ExplainMode::Analyze));
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            Settings::from_toml_str("database_id = \"x\""),
            Err(ClientError::Config(_))
        ));
        assert!(Settings::from_toml_str("project_id = \"p\"\nmax_stages = 0").is_err());
    }
}
