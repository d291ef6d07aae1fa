use crate::fetcher::{
    PageFetcher, decode::decode_response, errors::FetchError, types::FetchPolicy,
    types::PageResponse,
};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Listing pages are far smaller; anything above this is not a chart.
const MAX_BODY_SIZE: u64 = 5 * 1024 * 1024;
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// reqwest-backed fetcher. One instance is shared by every target of a run.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(policy: &FetchPolicy) -> Result<Self, reqwest::Error> {
        let client = ClientBuilder::new()
            .connect_timeout(policy.timeout.min(MAX_CONNECT_TIMEOUT))
            .timeout(policy.timeout)
            .user_agent(policy.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(10))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::ACCEPT,
                    reqwest::header::HeaderValue::from_static(
                        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                    ),
                );
                headers
            })
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<PageResponse, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        if let Some(content_length) = response.content_length()
            && content_length > MAX_BODY_SIZE
        {
            return Err(FetchError::BodyTooLarge(content_length));
        }

        let final_url = response.url().clone();
        let content_type = match response.headers().get(reqwest::header::CONTENT_TYPE) {
            Some(value) => value.to_str().unwrap_or("text/html").to_string(),
            None => "text/html".to_string(),
        };

        let body_bytes = response
            .bytes()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        // Content-Length may be missing or wrong for compressed bodies
        if body_bytes.len() as u64 > MAX_BODY_SIZE {
            return Err(FetchError::BodyTooLarge(body_bytes.len() as u64));
        }

        debug!(status = %status, bytes = body_bytes.len(), "fetched page");
        Ok(decode_response(final_url, status, &body_bytes, &content_type))
    }
}

/// One-shot fetch of `url` under `policy`: a single round trip, no retries.
pub async fn fetch(url: &str, policy: &FetchPolicy) -> Result<PageResponse, FetchError> {
    let parsed_url = Url::parse(url)?;
    let fetcher = HttpFetcher::new(policy).map_err(FetchError::from_reqwest_error)?;
    fetcher.fetch(&parsed_url).await
}
