//! Calls to the config-generation backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

pub mod http_client;

pub use http_client::HttpConfigService;

use crate::dsl::ScraperConfig;
use crate::error::StudioResult;
use crate::store::Selection;

/// Body of `prepare-page`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparePageRequest {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_api_key: Option<String>,
}

/// Result of `generate-config`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedConfig {
    pub yaml_config: String,
    /// Raw per-name results; decoded by the validation client
    #[serde(default)]
    pub validation_results: serde_json::Value,
}

/// Result of `save-config`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SavedConfig {
    pub download_url: String,
    pub filename: String,
}

/// Result of `run-scraper`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScraperRun {
    pub output_path: String,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// External services used by the controller
#[async_trait]
pub trait ConfigService: Send + Sync {
    /// Ask the backend to fetch the page and capture its headers
    async fn prepare_page(&self, request: &PreparePageRequest) -> StudioResult<()>;

    /// Same-origin address of the proxied preview of `url`
    fn preview_url(&self, url: &Url) -> StudioResult<Url>;

    async fn generate_config(
        &self,
        url: &str,
        selections: &BTreeMap<String, Selection>,
    ) -> StudioResult<GeneratedConfig>;

    async fn validate_selectors(&self, url: &str, config: &ScraperConfig) -> StudioResult<serde_json::Value>;

    async fn save_config(&self, config_yaml: &str) -> StudioResult<SavedConfig>;

    async fn run_scraper(&self, config_yaml: &str) -> StudioResult<ScraperRun>;
}
