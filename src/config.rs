//! CLI configuration management
//!
//! Settings come from, in increasing priority: built-in defaults, the
//! TOML file at `<config_dir>/image-upload/config.toml`, then
//! `IMAGE_UPLOAD_*` environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_API_URL: &str = "IMAGE_UPLOAD_API_URL";
pub const ENV_TOKEN: &str = "IMAGE_UPLOAD_TOKEN";
pub const ENV_REGION: &str = "IMAGE_UPLOAD_REGION";
pub const ENV_TIMEOUT: &str = "IMAGE_UPLOAD_TIMEOUT";
pub const ENV_VERBOSE: &str = "IMAGE_UPLOAD_VERBOSE";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CliConfig {
    /// Base URL of the images API
    pub api_url: String,

    /// Personal access token sent as a bearer token
    pub token: Option<String>,

    /// Region used when `--region` is not given
    pub region: Option<String>,

    /// Timeout for API operations, in seconds
    pub timeout: u64,

    /// Log at debug level unless RUST_LOG says otherwise
    pub verbose: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.linode.com/v4".to_string(),
            token: None,
            region: None,
            timeout: 30,
            verbose: false,
        }
    }
}

impl CliConfig {
    /// Load configuration from a file. A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(Some(config))
    }

    /// Default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot determine config directory"))?;
        Ok(config_dir.join("image-upload").join("config.toml"))
    }

    /// Create a new builder for constructing configuration
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for CLI configuration with validation and priority chain support.
///
/// Each `with_*` step only fills values that are still unset, so calling
/// the steps highest-priority first keeps the right value.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    api_url: Option<String>,
    token: Option<String>,
    region: Option<String>,
    timeout: Option<u64>,
    verbose: Option<bool>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply environment variable overrides. Invalid values are skipped.
    pub fn with_env_overrides(mut self) -> Self {
        if self.api_url.is_none() {
            if let Ok(url) = std::env::var(ENV_API_URL) {
                if Self::validate_url(&url).is_ok() {
                    self.api_url = Some(url);
                }
            }
        }

        if self.token.is_none() {
            if let Ok(token) = std::env::var(ENV_TOKEN) {
                if !token.trim().is_empty() {
                    self.token = Some(token.trim().to_string());
                }
            }
        }

        if self.region.is_none() {
            if let Ok(region) = std::env::var(ENV_REGION) {
                if !region.trim().is_empty() {
                    self.region = Some(region.trim().to_string());
                }
            }
        }

        if self.timeout.is_none() {
            if let Ok(timeout) = std::env::var(ENV_TIMEOUT) {
                if let Ok(timeout) = timeout.parse() {
                    if Self::validate_timeout(timeout).is_ok() {
                        self.timeout = Some(timeout);
                    }
                }
            }
        }

        if self.verbose.is_none() {
            if let Ok(verbose) = std::env::var(ENV_VERBOSE) {
                self.verbose = Some(verbose.to_lowercase() == "true" || verbose == "1");
            }
        }

        self
    }

    /// Fill unset values from the config file at `path`, if it exists.
    pub fn with_config_file(self, path: &Path) -> Result<Self> {
        let Some(config) = CliConfig::load_from(path)? else {
            return Ok(self);
        };

        Ok(Self {
            api_url: self.api_url.or(Some(config.api_url)),
            token: self.token.or(config.token),
            region: self.region.or(config.region),
            timeout: self.timeout.or(Some(config.timeout)),
            verbose: self.verbose.or(Some(config.verbose)),
        })
    }

    /// Fill unset values from the default config file location.
    pub fn with_default_config_file(self) -> Result<Self> {
        match CliConfig::config_path() {
            Ok(path) => self.with_config_file(&path),
            Err(_) => Ok(self),
        }
    }

    /// Build the final configuration with validation
    pub fn build(self) -> Result<CliConfig> {
        let defaults = CliConfig::default();

        let api_url = self.api_url.unwrap_or(defaults.api_url);
        let timeout = self.timeout.unwrap_or(defaults.timeout);

        Self::validate_url(&api_url)?;
        Self::validate_timeout(timeout)?;

        Ok(CliConfig {
            api_url,
            token: self.token.or(defaults.token),
            region: self.region.or(defaults.region),
            timeout,
            verbose: self.verbose.unwrap_or(defaults.verbose),
        })
    }

    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(anyhow::anyhow!("API URL cannot be empty"));
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(anyhow::anyhow!("API URL must start with http:// or https://"));
        }

        Ok(())
    }

    fn validate_timeout(timeout: u64) -> Result<()> {
        if timeout == 0 {
            return Err(anyhow::anyhow!("Timeout must be greater than 0"));
        }

        if timeout > 300 {
            return Err(anyhow::anyhow!(
                "Timeout must be less than or equal to 300 seconds"
            ));
        }

        Ok(())
    }
}
