use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{ConfigService, GeneratedConfig, PreparePageRequest, SavedConfig, ScraperRun};
use crate::config::{PreviewConfig, ServiceConfig};
use crate::dsl::ScraperConfig;
use crate::error::{StudioError, StudioResult};
use crate::logging::{LogContext, PerformanceLogger, RequestIdGenerator};
use crate::store::Selection;

/// `ConfigService` backed by the HTTP API of the config-generation server
pub struct HttpConfigService {
    client: Client,
    base_url: Url,
    proxy_path: String,
}

impl HttpConfigService {
    pub fn new(service: &ServiceConfig, preview: &PreviewConfig) -> StudioResult<Self> {
        let mut base_url = Url::parse(&service.base_url)
            .map_err(|e| StudioError::config(format!("invalid service url: {}", e)))?;
        // Relative joins must keep any path prefix of the base
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(service.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StudioError::config(format!("failed to build HTTP client: {}", e)))?;

        info!("Config service client initialized for {}", base_url);

        Ok(Self {
            client,
            base_url,
            proxy_path: preview.proxy_path.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, name: &str) -> StudioResult<Url> {
        self.base_url
            .join(&format!("api/{}", name))
            .map_err(|e| StudioError::config(format!("invalid endpoint {}: {}", name, e)))
    }

    /// POST a JSON body and decode the JSON response; failures go through `on_error`
    async fn post_json<B, T>(&self, name: &str, body: &B, on_error: fn(String) -> StudioError) -> StudioResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let endpoint = self.endpoint(name)?;
        let request_id = RequestIdGenerator::generate();
        let perf = PerformanceLogger::new(
            LogContext::new("service", name)
                .with_request_id(request_id.clone())
                .with_url(endpoint.as_str()),
        );

        debug!("POST {}", endpoint);
        let result = self.send(endpoint, &request_id, body, on_error).await;

        match &result {
            Ok(_) => perf.finish("Service call completed"),
            Err(e) => perf.finish_with_error("Service call failed", e),
        }
        result
    }

    async fn send<B, T>(
        &self,
        endpoint: Url,
        request_id: &str,
        body: &B,
        on_error: fn(String) -> StudioError,
    ) -> StudioResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(endpoint)
            .header("X-Request-Id", request_id)
            .json(body)
            .send()
            .await
            .map_err(|e| on_error(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| on_error(e.to_string()))?;

        if !status.is_success() {
            return Err(on_error(format!("{}: {}", status, text.trim())));
        }

        serde_json::from_str(&text).map_err(|e| on_error(format!("unexpected response: {}", e)))
    }
}

#[async_trait]
impl ConfigService for HttpConfigService {
    async fn prepare_page(&self, request: &PreparePageRequest) -> StudioResult<()> {
        let _: serde_json::Value = self
            .post_json("prepare-page", request, StudioError::preparation)
            .await?;
        Ok(())
    }

    fn preview_url(&self, url: &Url) -> StudioResult<Url> {
        let mut preview = self
            .base_url
            .join(self.proxy_path.trim_start_matches('/'))
            .map_err(|e| StudioError::config(format!("invalid preview path: {}", e)))?;
        preview.query_pairs_mut().clear().append_pair("url", url.as_str());
        Ok(preview)
    }

    async fn generate_config(
        &self,
        url: &str,
        selections: &BTreeMap<String, Selection>,
    ) -> StudioResult<GeneratedConfig> {
        let body = json!({ "url": url, "selections": selections });
        self.post_json("generate-config", &body, StudioError::generation).await
    }

    async fn validate_selectors(&self, url: &str, config: &ScraperConfig) -> StudioResult<serde_json::Value> {
        let body = json!({ "url": url, "config": config });
        self.post_json("validate-selectors", &body, StudioError::validation).await
    }

    async fn save_config(&self, config_yaml: &str) -> StudioResult<SavedConfig> {
        let body = json!({ "config": config_yaml });
        self.post_json("save-config", &body, StudioError::save).await
    }

    async fn run_scraper(&self, config_yaml: &str) -> StudioResult<ScraperRun> {
        let body = json!({ "config_yaml": config_yaml });
        self.post_json("run-scraper", &body, StudioError::scraper_run).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer a single HTTP request with `status` and `body`; returns the base url
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|line| {
                            let lower = line.to_ascii_lowercase();
                            lower.strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        format!("http://{}", addr)
    }

    fn service(base_url: &str) -> HttpConfigService {
        let mut config = AppConfig::default();
        config.service.base_url = base_url.to_string();
        HttpConfigService::new(&config.service, &config.preview).unwrap()
    }

    #[test]
    fn test_base_path_prefix_is_kept() {
        let service = service("http://host.example/studio");

        assert_eq!(
            service.endpoint("prepare-page").unwrap().as_str(),
            "http://host.example/studio/api/prepare-page"
        );

        let target = Url::parse("https://shop.example/").unwrap();
        let preview = service.preview_url(&target).unwrap();
        assert_eq!(preview.path(), "/studio/preview");
        assert_eq!(preview.query(), Some("url=https%3A%2F%2Fshop.example%2F"));
    }

    #[test]
    fn test_endpoints_and_preview_url() {
        let service = service("http://localhost:8000");

        assert_eq!(
            service.endpoint("validate-selectors").unwrap().as_str(),
            "http://localhost:8000/api/validate-selectors"
        );

        let target = Url::parse("https://shop.example/list?page=2").unwrap();
        let preview = service.preview_url(&target).unwrap();
        assert_eq!(preview.path(), "/preview");
        assert_eq!(
            preview.query_pairs().find(|(k, _)| k == "url").map(|(_, v)| v.into_owned()),
            Some("https://shop.example/list?page=2".to_string())
        );
    }

    #[tokio::test]
    async fn test_save_config_decodes_response() {
        let base = serve_once("200 OK", r#"{"success":true,"filename":"shop_example_config.yaml","download_url":"/download/tmp1.yaml"}"#).await;

        let saved = service(&base).save_config("url: https://shop.example\n").await.unwrap();
        assert_eq!(saved.filename, "shop_example_config.yaml");
        assert_eq!(saved.download_url, "/download/tmp1.yaml");
    }

    #[tokio::test]
    async fn test_error_status_carries_body_text() {
        let base = serve_once("500 Internal Server Error", r#"{"error":"Error generating configuration: boom"}"#).await;

        let err = service(&base)
            .generate_config("https://shop.example", &BTreeMap::new())
            .await
            .unwrap_err();

        match err {
            StudioError::Generation { message } => assert!(message.contains("boom")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_prepare_page_accepts_success_body() {
        let base = serve_once("200 OK", r#"{"success":true,"message":"Page prepared successfully"}"#).await;

        let request = PreparePageRequest {
            url: "https://shop.example".to_string(),
            llm_provider: Some("anthropic".to_string()),
            llm_model: None,
            llm_api_key: None,
        };
        assert!(service(&base).prepare_page(&request).await.is_ok());
    }
}
