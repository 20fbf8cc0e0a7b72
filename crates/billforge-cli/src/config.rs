//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use billforge_auditor::AuditConfig;
use billforge_generator::GeneratorConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Oracle connection
    #[serde(default)]
    pub oracle: OracleSettings,

    /// Generation defaults
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Audit thresholds
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Global CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,

    /// Artifact directory (defaults to `~/.billforge/artifacts`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,

    /// JSON benchmark table replacing the built-in one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark_table: Option<PathBuf>,
}

/// Oracle connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSettings {
    /// Use the oracle at all; stubs and deterministic rules otherwise
    #[serde(default)]
    pub enabled: bool,

    /// Ollama endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Transport attempts per call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

impl From<crate::cli::CliFormat> for OutputFormat {
    fn from(format: crate::cli::CliFormat) -> Self {
        match format {
            crate::cli::CliFormat::Table => OutputFormat::Table,
            crate::cli::CliFormat::Json => OutputFormat::Json,
            crate::cli::CliFormat::Quiet => OutputFormat::Quiet,
        }
    }
}

fn home_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
    Ok(home.join(".billforge"))
}

impl Config {
    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        Ok(home_dir()?.join("config.toml"))
    }

    /// Load configuration from `path`, or the default path, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::path()?,
        };

        let config = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            toml::from_str(&contents)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check the embedded generator and audit sections.
    pub fn validate(&self) -> Result<()> {
        self.generator
            .validate()
            .map_err(|e| CliError::Config(format!("generator: {}", e)))?;
        self.audit
            .validate()
            .map_err(|e| CliError::Config(format!("audit: {}", e)))?;
        Ok(())
    }

    /// Artifact directory to use.
    pub fn store_dir(&self) -> Result<PathBuf> {
        match &self.settings.store_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(home_dir()?.join("artifacts")),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
            store_dir: None,
            benchmark_table: None,
        }
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            model: default_model(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3".to_string()
}

fn default_max_retries() -> u32 {
    2
}
