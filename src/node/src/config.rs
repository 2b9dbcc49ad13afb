//! CLI configuration loading and validation

use anyhow::{Context, Result};
use poamflow_authz::{AuthorityModel, RoleDefinition, RoleTable};
use poamflow_workflow::ServiceConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete `poamflow.toml` configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub store: StoreSection,

    /// Replaces the built-in DoD role table when present
    #[serde(default)]
    pub authority: Option<AuthoritySection>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NodeSection {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_true")]
    pub colored_logs: bool,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            colored_logs: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoreSection {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default)]
    pub database_url: Option<String>,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AuthoritySection {
    pub roles: Vec<RoleDefinition>,
}

// Default value functions
fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_backend() -> StoreBackend { StoreBackend::Memory }

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl NodeConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read configuration file {}", path.as_ref().display())
        })?;

        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse configuration file")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.node.log_level.to_ascii_lowercase().as_str()) {
            anyhow::bail!(
                "Log level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.node.log_level
            );
        }

        if self.service.enable_audit && self.service.audit_capacity == 0 {
            anyhow::bail!("Audit capacity must be greater than zero when audit is enabled");
        }

        if self.store.backend == StoreBackend::Postgres
            && self
                .store
                .database_url
                .as_deref()
                .map_or(true, |url| url.trim().is_empty())
        {
            anyhow::bail!("Postgres backend requires store.database_url");
        }

        if let Some(authority) = &self.authority {
            RoleTable::new(authority.roles.clone())
                .validate()
                .context("Invalid [authority] role table")?;
        }

        Ok(())
    }

    /// Role table in effect: the configured one, else the DoD default
    pub fn role_table(&self) -> RoleTable {
        match &self.authority {
            Some(authority) => RoleTable::new(authority.roles.clone()),
            None => RoleTable::dod_default(),
        }
    }

    /// Build the authority model from the role table in effect
    pub fn authority_model(&self) -> Result<AuthorityModel> {
        AuthorityModel::new(self.role_table()).context("Failed to build authority model")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = NodeConfig::from_toml_str("").unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.service.enable_audit);
        config.validate().unwrap();
    }

    #[test]
    fn test_postgres_requires_url() {
        let config = NodeConfig::from_toml_str(
            r#"
            [store]
            backend = "postgres"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = NodeConfig::from_toml_str(
            r#"
            [store]
            backend = "postgres"
            database_url = "postgresql://localhost/poamflow"
            "#,
        )
        .unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let config = NodeConfig::from_toml_str(
            r#"
            [node]
            log_level = "loud"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
