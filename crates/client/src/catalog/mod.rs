//! HTTP client for the remote master-data endpoints.
//!
//! ### Endpoints (relative to the configured base path)
//! - `version`: bare version token (plain text or a JSON string literal)
//! - `master-catalog`: `{ "MasterBookInfoMap": { "<Table>": { "Hash": "..." } } }`
//! - `<Table>.json`: array of row objects
//!
//! Every request carries the configured timeout. There is no retry: transport
//! failures, non-2xx statuses, and undecodable bodies surface as errors.

pub mod parse;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use masterbook_core::{AppConfig, Error};
use reqwest::{Client, header};

use crate::source::{Catalog, MasterSource, Row, Version};

pub use parse::{parse_catalog, parse_table, parse_version};

/// Path of the catalog endpoint under the base URL.
const CATALOG_PATH: &str = "master-catalog";

/// Path of the version endpoint under the base URL.
const VERSION_PATH: &str = "version";

/// Configuration for the catalog client.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Base path of the master-data endpoints.
    pub base_url: String,
    /// User agent string (default: "masterbook/0.1")
    pub user_agent: String,
    /// Request timeout (default: 20s)
    pub timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let app = AppConfig::default();
        Self { base_url: app.base_url.clone(), user_agent: app.user_agent.clone(), timeout: app.timeout() }
    }
}

impl From<&AppConfig> for CatalogConfig {
    fn from(config: &AppConfig) -> Self {
        Self { base_url: config.base_url.clone(), user_agent: config.user_agent.clone(), timeout: config.timeout() }
    }
}

/// Plain-fetch client for versions, catalogs, and tables.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Client,
    base_url: String,
}

impl CatalogClient {
    /// Create a new client with the given configuration.
    pub fn new(config: CatalogConfig) -> Result<Self, Error> {
        url::Url::parse(&config.base_url).map_err(|e| Error::InvalidInput(format!("invalid base_url: {e}")))?;

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, base_url: config.base_url.trim_end_matches('/').to_string() })
    }

    /// URL of a table endpoint.
    pub fn table_url(&self, name: &str) -> Result<String, Error> {
        if name.is_empty() || name.contains(['/', '?', '#']) || name.contains("..") {
            return Err(Error::InvalidInput(format!("invalid table name: {name:?}")));
        }
        Ok(format!("{}/{name}.json", self.base_url))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, Error> {
        let start = Instant::now();

        let response = self
            .http
            .get(url)
            .header(header::ACCEPT, "application/json, text/plain;q=0.9")
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpError(format!("{url}: status {}", status.as_u16())));
        }

        let bytes = response.bytes().await.map_err(|e| transport_error(url, e))?;

        tracing::debug!("fetched {} in {}ms ({} bytes)", url, start.elapsed().as_millis(), bytes.len());

        Ok(bytes.to_vec())
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(url.to_string())
    } else {
        Error::HttpError(format!("{url}: network error: {err}"))
    }
}

#[async_trait]
impl MasterSource for CatalogClient {
    async fn fetch_version(&self) -> Result<Version, Error> {
        let body = self.get(&self.endpoint(VERSION_PATH)).await?;
        parse_version(&body)
    }

    async fn fetch_catalog(&self) -> Result<Catalog, Error> {
        let body = self.get(&self.endpoint(CATALOG_PATH)).await?;
        parse_catalog(&body)
    }

    async fn fetch_table(&self, name: &str) -> Result<Vec<Row>, Error> {
        let url = self.table_url(name)?;
        let body = self.get(&url).await?;
        parse_table(name, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer every connection on a local port with one canned response.
    async fn serve(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut request = [0u8; 2048];
                let _ = stream.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        format!("http://{addr}/master")
    }

    fn client(base_url: &str) -> CatalogClient {
        CatalogClient::new(CatalogConfig { base_url: base_url.into(), ..Default::default() }).unwrap()
    }

    #[test]
    fn test_catalog_config_from_app_config() {
        let app = AppConfig { timeout_ms: 1500, ..Default::default() };
        let config = CatalogConfig::from(&app);
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.user_agent, "masterbook/0.1");
    }

    #[test]
    fn test_new_rejects_relative_base() {
        let result = CatalogClient::new(CatalogConfig { base_url: "not a url".into(), ..Default::default() });
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_endpoint_urls() {
        let client = client("https://cdn.example.com/master/");
        assert_eq!(client.endpoint(VERSION_PATH), "https://cdn.example.com/master/version");
        assert_eq!(client.endpoint(CATALOG_PATH), "https://cdn.example.com/master/master-catalog");
        assert_eq!(client.table_url("CharacterMB").unwrap(), "https://cdn.example.com/master/CharacterMB.json");
    }

    #[test]
    fn test_table_url_rejects_path_tricks() {
        let client = client("https://cdn.example.com/master");
        for name in ["", "../secret", "a/b", "x?y=1"] {
            assert!(matches!(client.table_url(name), Err(Error::InvalidInput(_))), "accepted {name:?}");
        }
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_transport_error() {
        let client = CatalogClient::new(CatalogConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout: Duration::from_millis(500),
            ..Default::default()
        })
        .unwrap();
        let err = client.fetch_version().await.unwrap_err();
        assert!(err.is_transport(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_non_success_status_is_http_error() {
        let client = client(&serve("503 Service Unavailable", "").await);

        let err = client.fetch_version().await.unwrap_err();
        assert!(matches!(&err, Error::HttpError(msg) if msg.contains("status 503")), "unexpected error: {err}");
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_undecodable_catalog_is_malformed_body() {
        let client = client(&serve("200 OK", r#"{"Tables": []}"#).await);

        let err = client.fetch_catalog().await.unwrap_err();
        assert!(matches!(err, Error::MalformedBody(_)), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_fetch_catalog_and_table_over_http() {
        let base = serve("200 OK", r#"{"MasterBookInfoMap": {"CharacterMB": {"Hash": "c1", "Size": 10}}}"#).await;
        let catalog = client(&base).fetch_catalog().await.unwrap();
        assert_eq!(catalog.hash("CharacterMB"), Some("c1"));

        let base = serve("200 OK", r#"[{"Id": 1}, {"Id": 2}]"#).await;
        let rows = client(&base).fetch_table("CharacterMB").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["Id"], 2);
    }
}
