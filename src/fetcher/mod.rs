pub mod client;
pub mod decode;
pub mod errors;
pub mod types;

pub use client::{HttpFetcher, fetch};
pub use errors::FetchError;
pub use types::{Charset, FetchPolicy, PageResponse};

use async_trait::async_trait;
use url::Url;

/// Retrieves one page. The scheduler only talks to this seam, so runs can be
/// driven by the HTTP client or by a test double.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<PageResponse, FetchError>;
}
