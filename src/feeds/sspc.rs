use crate::error::{Error, Result};
use crate::feeds::traits::FeedSource;
use crate::feeds::types::FeedParams;
use crate::models::FeedDocument;
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Parse a raw feed body. Invalid UTF-8 is replaced rather than rejected.
pub fn parse_document(body: &[u8]) -> Result<FeedDocument> {
    let text = String::from_utf8_lossy(body);
    serde_json::from_str(&text).map_err(|e| {
        warn!("Feed parse error: {}", e);
        Error::Feed(format!("Failed to parse JSON file. Possibly invalid JSON ({})", e))
    })
}

/// SSPC JSON feed fetched over HTTP
pub struct SspcFeed {
    client: Client,
    params: FeedParams,
}

impl SspcFeed {
    /// Create a feed client for the given URL with default parameters
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_params(FeedParams::new(url))
    }

    /// Create a feed client with custom parameters
    pub fn with_params(params: FeedParams) -> Result<Self> {
        let client = Client::builder()
            .timeout(params.timeout())
            .user_agent(params.user_agent.clone())
            .build()
            .map_err(|e| Error::Feed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, params })
    }

    pub fn url(&self) -> &str {
        &self.params.url
    }
}

#[async_trait]
impl FeedSource for SspcFeed {
    async fn fetch(&self) -> Result<FeedDocument> {
        info!("Fetching SSPC feed");
        debug!("Fetching URL: {}", self.params.url);

        let response = self
            .client
            .get(&self.params.url)
            .send()
            .await
            .map_err(|e| Error::Feed(format!("Failed to obtain JSON: {}", e)))?;

        if !response.status().is_success() {
            warn!("Feed returned status: {}", response.status());
            return Err(Error::Feed(format!(
                "Failed to obtain JSON: server returned {}",
                response.status()
            )));
        }

        let body = response.bytes().await?;
        debug!("Downloaded {} bytes of JSON", body.len());

        let document = parse_document(&body)?;
        info!("Parsed {} properties from feed", document.property.len());
        Ok(document)
    }

    fn source_name(&self) -> &'static str {
        "SSPC"
    }
}

/// SSPC JSON feed read from a local file
pub struct SspcFile {
    path: PathBuf,
}

impl SspcFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FeedSource for SspcFile {
    async fn fetch(&self) -> Result<FeedDocument> {
        info!("Reading SSPC feed from {}", self.path.display());
        let body = tokio::fs::read(&self.path).await?;
        let document = parse_document(&body)?;
        info!("Parsed {} properties from feed", document.property.len());
        Ok(document)
    }

    fn source_name(&self) -> &'static str {
        "SSPC"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_invalid_json_is_a_feed_error() {
        let err = parse_document(b"{ not json").unwrap_err();
        assert!(err.to_string().contains("Possibly invalid JSON"));
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let mut body = br#"{"property":[{"id":"1","address":"Caf"#.to_vec();
        body.push(0xe9);
        body.extend_from_slice(br#" Row"}]}"#);

        let doc = parse_document(&body).unwrap();
        assert_eq!(doc.property.len(), 1);
        assert!(doc.property[0].address.as_deref().unwrap().starts_with("Caf"));
    }

    #[tokio::test]
    async fn test_fetch_from_server() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/feed.json");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({ "property": [{ "id": 7, "address": "1 Bridge St" }] }));
            })
            .await;

        let feed = SspcFeed::new(server.url("/feed.json")).unwrap();
        assert_eq!(feed.url(), server.url("/feed.json"));
        let doc = feed.fetch().await.unwrap();

        mock.assert_async().await;
        assert_eq!(doc.property[0].id, "7");
        assert_eq!(feed.source_name(), "SSPC");
    }

    #[tokio::test]
    async fn test_error_status_aborts() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/feed.json");
                then.status(503);
            })
            .await;

        let feed = SspcFeed::new(server.url("/feed.json")).unwrap();
        assert!(matches!(feed.fetch().await, Err(Error::Feed(_))));
    }

    #[tokio::test]
    async fn test_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        tokio::fs::write(&path, r#"{"property":[{"id":"A1"},{"id":"A2"}]}"#)
            .await
            .unwrap();

        let doc = SspcFile::new(&path).fetch().await.unwrap();
        assert_eq!(doc.property.len(), 2);
    }
}
