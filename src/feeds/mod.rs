pub mod sspc;
pub mod traits;
pub mod types;

pub use sspc::{parse_document, SspcFeed, SspcFile};
pub use traits::FeedSource;
pub use types::FeedParams;
