use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use url::Url;

use crate::logging::LoggingConfig;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub preview: PreviewConfig,
    pub llm: LLMConfig,
    pub output: OutputDefaults,
    pub logging: LoggingConfig,
}

/// Location of the config-generation backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    pub request_timeout_seconds: u64,
}

/// Preview surface settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Origin the controller runs under; previews from any other origin cannot be scripted
    pub controller_origin: String,
    pub proxy_path: String,
}

/// Refinement service settings forwarded with prepare-page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
}

/// Defaults merged into every generated scraper configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDefaults {
    pub output_format: String,
    pub output_dir: String,
    pub stealth_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = get_data_directory();

        Self {
            service: ServiceConfig {
                base_url: "http://localhost:8000".to_string(),
                request_timeout_seconds: 120,
            },
            preview: PreviewConfig {
                controller_origin: "http://localhost:8000".to_string(),
                proxy_path: "/preview".to_string(),
            },
            llm: LLMConfig {
                provider: "anthropic".to_string(),
                model: "claude-3-haiku-20240307".to_string(),
                api_key: None,
            },
            output: OutputDefaults {
                output_format: "json".to_string(),
                output_dir: "output".to_string(),
                stealth_mode: true,
            },
            logging: LoggingConfig {
                log_directory: data_dir.join("logs"),
                ..LoggingConfig::default()
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from default locations
    pub async fn load() -> Result<Self> {
        let config_path = get_config_path();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path).await?
        } else {
            info!("No configuration file found, using defaults");
            let config = Self::default();
            config.save_to_file(&config_path).await?;
            config
        };

        ConfigOverrides::apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to a specific file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.service.base_url)
            .map_err(|e| anyhow::anyhow!("service.base_url is not a valid URL: {}", e))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(anyhow::anyhow!("service.base_url must use http or https"));
        }

        if self.service.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("service.request_timeout_seconds must be > 0"));
        }

        Url::parse(&self.preview.controller_origin)
            .map_err(|e| anyhow::anyhow!("preview.controller_origin is not a valid URL: {}", e))?;

        if !self.preview.proxy_path.starts_with('/') {
            return Err(anyhow::anyhow!("preview.proxy_path must start with '/'"));
        }

        if self.output.output_format.trim().is_empty() {
            return Err(anyhow::anyhow!("output.output_format must not be empty"));
        }

        Ok(())
    }
}

/// Get the default data directory
fn get_data_directory() -> PathBuf {
    directories::ProjectDirs::from("com", "selectorstudio", "studio")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("data"))
}

/// Get the configuration file path
pub fn get_config_path() -> PathBuf {
    directories::ProjectDirs::from("com", "selectorstudio", "studio")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("config.toml"))
}

/// Environment-based configuration overrides
pub struct ConfigOverrides;

impl ConfigOverrides {
    /// Apply environment variable overrides to configuration
    pub fn apply(config: &mut AppConfig) {
        Self::apply_from(config, |key| std::env::var(key).ok());
    }

    fn apply_from<F>(config: &mut AppConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup("SST_SERVICE_URL") {
            config.service.base_url = base_url;
        }

        if let Some(timeout) = lookup("SST_REQUEST_TIMEOUT").and_then(|v| v.parse::<u64>().ok()) {
            config.service.request_timeout_seconds = timeout;
        }

        if let Some(origin) = lookup("SST_CONTROLLER_ORIGIN") {
            config.preview.controller_origin = origin;
        }

        if let Some(provider) = lookup("SST_LLM_PROVIDER") {
            config.llm.provider = provider;
        }

        if let Some(model) = lookup("SST_LLM_MODEL") {
            config.llm.model = model;
        }

        // Either provider's key works, matching the refinement service
        if let Some(key) = lookup("ANTHROPIC_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            config.llm.api_key.get_or_insert(key);
        }

        if let Some(log_level) = lookup("SST_LOG_LEVEL") {
            config.logging.level = log_level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.output.output_format, "json");
    }

    #[test]
    fn test_validation_rejects_bad_proxy_path() {
        let mut config = AppConfig::default();
        config.preview.proxy_path = "preview".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("SST_SERVICE_URL", "https://studio.internal:9000"),
            ("SST_REQUEST_TIMEOUT", "15"),
            ("SST_REQUEST_TIMEOUT_IGNORED", "x"),
            ("OPENAI_API_KEY", "sk-test"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        ConfigOverrides::apply_from(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.service.base_url, "https://studio.internal:9000");
        assert_eq!(config.service.request_timeout_seconds, 15);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.service.base_url = "http://127.0.0.1:8123".to_string();
        config.save_to_file(&path).await.unwrap();

        let loaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(loaded, config);
    }
}
