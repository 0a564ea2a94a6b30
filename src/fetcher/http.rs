//! Retrying HTTP helper shared by all API bindings.
//!
//! One client instance is reused for every request; retries, status
//! checking and JSON decoding live here so the API bindings only describe
//! endpoints. A body that fails to decode counts as a failed attempt and
//! is retried like a transport error, since the upstream occasionally
//! serves truncated or placeholder bodies under load.

use crate::fetcher::retry::{retry, RetryPolicy};
use crate::fetcher::{FetcherError, FetcherResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Request timeout for a single attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client wrapper with retry, status and decode handling.
#[derive(Debug, Clone)]
pub struct RetryingHttpClient {
    client: Client,
}

impl RetryingHttpClient {
    /// Create a client with the default timeout.
    pub fn new() -> FetcherResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetcherError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// POST a JSON body and decode a JSON response, retrying per `policy`.
    pub async fn post_json<B, T>(&self, url: &str, body: &B, policy: RetryPolicy) -> FetcherResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        retry(policy, url, |attempt| {
            debug!(url, attempt, "POST");
            let request = self.client.post(url).json(body);
            execute(request)
        })
        .await
    }

    /// GET and decode a JSON response, retrying per `policy`.
    pub async fn get_json<T>(&self, url: &str, policy: RetryPolicy) -> FetcherResult<T>
    where
        T: DeserializeOwned,
    {
        retry(policy, url, |attempt| {
            debug!(url, attempt, "GET");
            let request = self.client.get(url);
            execute(request)
        })
        .await
    }
}

/// Send one request and decode the body; every failure mode maps onto a
/// retryable [`FetcherError`] variant.
async fn execute<T>(request: reqwest::RequestBuilder) -> FetcherResult<T>
where
    T: DeserializeOwned,
{
    let response = request
        .send()
        .await
        .map_err(|e| FetcherError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetcherError::Http(format!("unexpected status {status}")));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| FetcherError::Parse(e.to_string()))
}
