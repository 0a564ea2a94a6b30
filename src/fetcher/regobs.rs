//! Bindings for the Regobs search endpoint and the Varsom region summary
//! endpoint.
//!
//! The search endpoint is queried with POST bodies carrying a language key
//! and an observation time range; warnings are one GET per region per date
//! window.

use crate::downloader::config::{batch_retry_policy, count_retry_policy};
use crate::fetcher::http::RetryingHttpClient;
use crate::fetcher::retry::RetryPolicy;
use crate::fetcher::{FetcherResult, ObsTimeRange, ObservationApi, WarningApi};
use crate::{Observation, Warning};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default base URL of the Regobs search API.
pub const SEARCH_URL: &str = "https://api.regobs.no/v4/Search";

/// Default base URL of the Varsom avalanche region summary API.
pub const WARNING_URL: &str =
    "https://api01.nve.no/hydrology/forecast/avalanche/v6.3.0/api/AvalancheWarningByRegion/Simple";

/// Language key sent with every query (1 = Norwegian).
const LANG_KEY: u32 = 1;

/// API client for both the search and the forecast endpoints.
pub struct RegobsApi {
    http: RetryingHttpClient,
    search_url: String,
    warning_url: String,
    count_policy: RetryPolicy,
    batch_policy: RetryPolicy,
}

impl RegobsApi {
    /// Client against the production endpoints with default retry budgets.
    pub fn new() -> FetcherResult<Self> {
        Ok(Self::with_base_urls(
            RetryingHttpClient::new()?,
            SEARCH_URL,
            WARNING_URL,
        ))
    }

    /// Client against custom base URLs, for staging or tests.
    pub fn with_base_urls(
        http: RetryingHttpClient,
        search_url: impl Into<String>,
        warning_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            search_url: search_url.into(),
            warning_url: warning_url.into(),
            count_policy: count_retry_policy(),
            batch_policy: batch_retry_policy(),
        }
    }

    /// Override the retry budgets.
    pub fn with_policies(mut self, count: RetryPolicy, batch: RetryPolicy) -> Self {
        self.count_policy = count;
        self.batch_policy = batch;
        self
    }

    fn search_body(&self, range: &ObsTimeRange, page: Option<(u64, u64)>) -> SearchBody {
        SearchBody {
            lang_key: LANG_KEY,
            from_dt_obs_time: range.from.to_rfc3339(),
            to_dt_obs_time: range.to.to_rfc3339(),
            number_of_records: page.map(|(_, limit)| limit),
            offset: page.map(|(offset, _)| offset),
        }
    }
}

#[async_trait]
impl ObservationApi for RegobsApi {
    async fn count(&self, range: &ObsTimeRange) -> FetcherResult<u64> {
        let url = format!("{}/Count", self.search_url);
        let body = self.search_body(range, None);
        // A body without TotalMatches fails to decode and is retried like
        // any other malformed response.
        let response: CountResponse = self.http.post_json(&url, &body, self.count_policy).await?;
        Ok(response.total_matches)
    }

    async fn fetch_page(
        &self,
        range: &ObsTimeRange,
        offset: u64,
        limit: u64,
    ) -> FetcherResult<Vec<Observation>> {
        let body = self.search_body(range, Some((offset, limit)));
        self.http
            .post_json(&self.search_url, &body, self.batch_policy)
            .await
    }
}

#[async_trait]
impl WarningApi for RegobsApi {
    async fn region_warnings(
        &self,
        region_id: u32,
        from: NaiveDate,
        to: NaiveDate,
    ) -> FetcherResult<Vec<Warning>> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.warning_url, region_id, LANG_KEY, from, to
        );
        self.http.get_json(&url, self.batch_policy).await
    }
}

/// POST body of count and search queries.
#[derive(Debug, Serialize)]
struct SearchBody {
    #[serde(rename = "LangKey")]
    lang_key: u32,
    #[serde(rename = "FromDtObsTime")]
    from_dt_obs_time: String,
    #[serde(rename = "ToDtObsTime")]
    to_dt_obs_time: String,
    #[serde(rename = "NumberOfRecords", skip_serializing_if = "Option::is_none")]
    number_of_records: Option<u64>,
    #[serde(rename = "Offset", skip_serializing_if = "Option::is_none")]
    offset: Option<u64>,
}

/// Response of the count query.
#[derive(Debug, Deserialize)]
struct CountResponse {
    #[serde(rename = "TotalMatches")]
    total_matches: u64,
}
