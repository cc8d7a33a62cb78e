//! Configuration model.

use crate::core::diagnostics::{Boundaries, Dialect};
use crate::core::scripts::ScriptCatalog;
use crate::session::PoolConfig;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the default connection context.
pub const CONTEXT_ENV: &str = "DBTASKS_CONTEXT";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection pool settings.
    pub pool: PoolConfig,
    /// Message classification settings.
    pub diagnostics: DiagnosticsConfig,
    /// Default connection context tag passed with every statement.
    pub context: String,
    /// Named scripts for `run_scripts`.
    pub scripts: ScriptCatalog,
}

/// Diagnostics configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Severity scale of the server.
    pub dialect: Dialect,
    /// Overrides the dialect's error boundary.
    pub error_severity: Option<u8>,
    /// Overrides the dialect's notice boundary.
    pub notice_severity: Option<u8>,
}

impl DiagnosticsConfig {
    /// Effective boundaries: the dialect preset with any overrides applied.
    pub fn boundaries(&self) -> Boundaries {
        let preset = Boundaries::for_dialect(self.dialect);
        Boundaries::new(
            self.error_severity.unwrap_or(preset.error),
            self.notice_severity.unwrap_or(preset.notice),
        )
    }
}

impl Config {
    /// Replace the connection context when an override is present.
    pub fn with_context_override(mut self, context: Option<String>) -> Self {
        if let Some(context) = context {
            self.context = context;
        }
        self
    }
}

/// Get the configuration directory path.
fn dirs_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dbtasks")
}

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs_config_path().join("config.toml")
}

/// Load configuration from the default location, falling back to defaults.
pub fn load_config() -> Result<Config> {
    let config_path = default_config_path();

    let config = if config_path.exists() {
        read_config(&config_path)?
    } else {
        Config::default()
    };

    Ok(config.with_context_override(std::env::var(CONTEXT_ENV).ok()))
}

/// Load configuration from a specific file.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let config = read_config(path)?;
    Ok(config.with_context_override(std::env::var(CONTEXT_ENV).ok()))
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pool.max_connections, 10);
        assert_eq!(config.pool.acquire_timeout_secs, 30);
        assert_eq!(config.diagnostics.dialect, Dialect::Mssql);
        assert_eq!(config.diagnostics.boundaries(), Boundaries::new(11, 0));
        assert!(config.context.is_empty());
        assert!(config.scripts.is_empty());
    }

    #[test]
    fn test_partial_file() {
        let config: Config = toml::from_str(
            r#"
            context = "batch-7"

            [pool]
            max_connections = 2

            [diagnostics]
            dialect = "postgres"
            notice_severity = 17
            "#,
        )
        .unwrap();

        assert_eq!(config.pool.max_connections, 2);
        assert_eq!(config.pool.acquire_timeout_secs, 30);
        assert_eq!(config.context, "batch-7");
        assert_eq!(config.diagnostics.boundaries(), Boundaries::new(21, 17));
    }

    #[test]
    fn test_context_override() {
        let config = Config::default().with_context_override(Some("cli".to_string()));
        assert_eq!(config.context, "cli");

        let config = config.with_context_override(None);
        assert_eq!(config.context, "cli");
    }
}
