use crate::error::Result;
use crate::models::FeedDocument;
use async_trait::async_trait;

/// Common trait for listing feeds
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the current feed document
    async fn fetch(&self) -> Result<FeedDocument>;

    /// Get the name of the feed format
    fn source_name(&self) -> &'static str;
}
