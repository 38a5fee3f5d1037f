use crate::config::FeedConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters for requesting a feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedParams {
    /// Feed document URL
    pub url: String,
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl FeedParams {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn from_config(url: impl Into<String>, config: &FeedConfig) -> Self {
        Self {
            url: url.into(),
            timeout_secs: config.timeout_secs,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FeedParams {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: 120,
            user_agent: concat!("sspc-import/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
