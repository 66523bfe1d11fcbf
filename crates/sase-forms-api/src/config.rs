//! Server configuration

use sase_forms::{ExportOptions, FormatError, SlugPolicy, SubmissionPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "FORMS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sase-forms/server.json";
pub const DEFAULT_JWT_SECRET: &str = "sase-forms-secret-key-change-in-production";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("export: {0}")]
    Export(#[from] FormatError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub auth: AuthConfig,
    pub responses: ResponsesConfig,
    pub submissions: SubmissionsConfig,
    pub export: ExportOptions,
    pub slugs: SlugConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
            auth: AuthConfig::default(),
            responses: ResponsesConfig::default(),
            submissions: SubmissionsConfig::default(),
            export: ExportOptions::default(),
            slugs: SlugConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { jwt_secret: DEFAULT_JWT_SECRET.into(), token_ttl_hours: 8 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponsesConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for ResponsesConfig {
    fn default() -> Self {
        Self {
            default_page_size: sase_forms::application::responses::DEFAULT_PAGE_SIZE,
            max_page_size: sase_forms::application::responses::MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionsConfig {
    pub enforce_required: bool,
}

impl Default for SubmissionsConfig {
    fn default() -> Self {
        Self { enforce_required: true }
    }
}

impl SubmissionsConfig {
    pub fn policy(&self) -> SubmissionPolicy {
        SubmissionPolicy { enforce_required: self.enforce_required }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlugConfig {
    pub length: usize,
    pub max_attempts: u32,
}

impl Default for SlugConfig {
    fn default() -> Self {
        Self {
            length: sase_forms::application::publishing::DEFAULT_SLUG_LENGTH,
            max_attempts: sase_forms::application::publishing::DEFAULT_SLUG_ATTEMPTS,
        }
    }
}

impl SlugConfig {
    pub fn policy(&self) -> SlugPolicy {
        SlugPolicy::new(self.length, self.max_attempts)
    }
}

impl ServerConfig {
    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.export.validate()?;
        Ok(())
    }

    /// Loads the file named by `FORMS_CONFIG`, falling back to defaults, then
    /// applies environment overrides.
    pub fn from_env() -> Self {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path, error = %e, "Config not loaded, using defaults");
            Self::default()
        });
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// `FORMS_BIND_ADDR` and `FORMS_JWT_SECRET` win over the file.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("FORMS_BIND_ADDR").filter(|v| !v.is_empty()) {
            self.bind_addr = addr;
        }
        if let Some(secret) = lookup("FORMS_JWT_SECRET").filter(|v| !v.is_empty()) {
            self.auth.jwt_secret = secret;
        }
    }
}
