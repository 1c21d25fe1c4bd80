pub mod api_sports;
pub mod college_football_data;
pub mod odds_api;

use crate::error::ProviderError;
use std::time::Duration;

/// User agent sent to scraped sites
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Client for JSON APIs
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Client for scraped pages
pub fn browser_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(BROWSER_USER_AGENT)
        .build()
}

/// Send a request and return the body of a successful response.
/// Transport failures and non-2xx statuses are `Unavailable`.
pub async fn fetch_text(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<String, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::unavailable(
            provider,
            format!("HTTP {}", status),
        ));
    }

    response
        .text()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, e))
}
