//! Ladder API client
//!
//! HTTP implementation of [`LadderSource`] against the public ladder API and,
//! for deep scans, the authenticated API. Requests are paced by a client-side
//! quota; HTTP 429 responses are retried after the server's `Retry-After`.

use crate::error::SourceError;
use crate::source::{decode_ladder_page, decode_leagues, LadderPage, LadderSource};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use ladder_common::config::ApiSettings;
use ladder_common::{LadderMode, League};
use reqwest::header::{HeaderMap, AUTHORIZATION, RETRY_AFTER};
use reqwest::{StatusCode, Url};
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;

/// Wait applied to a 429 without a usable `Retry-After`
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Ladder API client
pub struct PoeLadderClient {
    http_client: reqwest::Client,
    public_base_url: Url,
    authenticated_base_url: Url,
    access_token: Option<String>,
    max_rate_limit_retries: u32,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl PoeLadderClient {
    pub fn new(api: &ApiSettings) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(api.user_agent())
            .timeout(api.request_timeout())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SourceError::NetworkError(e.to_string()))?;

        let requests_per_second = NonZeroU32::new(api.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(requests_per_second));

        Ok(Self {
            http_client,
            public_base_url: parse_base_url(&api.public_base_url)?,
            authenticated_base_url: parse_base_url(&api.authenticated_base_url)?,
            access_token: api
                .access_token
                .clone()
                .filter(|token| !token.trim().is_empty()),
            max_rate_limit_retries: api.max_rate_limit_retries,
            rate_limiter,
        })
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// URL of one ladder page
    pub fn ladder_url(
        &self,
        league_id: &str,
        limit: u32,
        offset: u32,
        mode: LadderMode,
    ) -> Result<Url, SourceError> {
        let (base, segments): (&Url, [&str; 3]) = match mode {
            LadderMode::Public => (&self.public_base_url, ["ladders", league_id, ""]),
            LadderMode::Authenticated => (&self.authenticated_base_url, ["league", league_id, "ladder"]),
        };

        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::ParseError(format!("cannot-be-a-base URL: {}", base)))?
            .pop_if_empty()
            .extend(segments.iter().filter(|s| !s.is_empty()));
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        Ok(url)
    }

    fn leagues_url(&self) -> Result<Url, SourceError> {
        let (base, segment) = if self.access_token.is_some() {
            (&self.authenticated_base_url, "league")
        } else {
            (&self.public_base_url, "leagues")
        };

        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::ParseError(format!("cannot-be-a-base URL: {}", base)))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    /// GET a JSON document, honouring the quota and 429 back-off
    async fn get_json(&self, url: Url, authenticated: bool) -> Result<Value, SourceError> {
        let bearer = if authenticated {
            Some(self.access_token.as_deref().ok_or(SourceError::Unauthorized)?)
        } else {
            None
        };

        let mut retries = 0;
        loop {
            self.rate_limiter.until_ready().await;

            tracing::debug!(url = %url, authenticated, "Querying ladder API");

            let mut request = self.http_client.get(url.clone());
            if let Some(token) = bearer {
                request = request.header(AUTHORIZATION, format!("Bearer {}", token));
            }

            let response = request
                .send()
                .await
                .map_err(|e| SourceError::NetworkError(e.to_string()))?;

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if retries >= self.max_rate_limit_retries {
                    return Err(SourceError::RateLimited { retries });
                }
                let wait = retry_after(response.headers());
                tracing::warn!(wait_secs = wait.as_secs(), retries, "Rate limit hit, backing off");
                tokio::time::sleep(wait).await;
                retries += 1;
                continue;
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(SourceError::Unauthorized);
            }

            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(SourceError::ApiError(status.as_u16(), error_text));
            }

            return response
                .json::<Value>()
                .await
                .map_err(|e| SourceError::ParseError(e.to_string()));
        }
    }
}

#[async_trait]
impl LadderSource for PoeLadderClient {
    async fn fetch_leagues(&self) -> Result<Vec<League>, SourceError> {
        let url = self.leagues_url()?;
        let body = self.get_json(url, self.access_token.is_some()).await?;
        let leagues = decode_leagues(body)?;

        tracing::info!(leagues = leagues.len(), "Retrieved league list");
        Ok(leagues)
    }

    async fn fetch_ladder_page(
        &self,
        league_id: &str,
        limit: u32,
        offset: u32,
        mode: LadderMode,
    ) -> Result<LadderPage, SourceError> {
        let url = self.ladder_url(league_id, limit, offset, mode)?;
        let body = self.get_json(url, mode.is_deep()).await?;
        decode_ladder_page(body)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, SourceError> {
    Url::parse(raw).map_err(|e| SourceError::ParseError(format!("invalid base URL '{}': {}", raw, e)))
}

/// Parse `Retry-After` (delta-seconds form); one extra second of margin
fn retry_after(headers: &HeaderMap) -> Duration {
    let secs = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    Duration::from_secs(secs + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn client(token: Option<&str>) -> PoeLadderClient {
        let api = ApiSettings {
            access_token: token.map(str::to_string),
            ..ApiSettings::default()
        };
        PoeLadderClient::new(&api).unwrap()
    }

    #[test]
    fn test_public_ladder_url_encodes_league() {
        let url = client(None)
            .ladder_url("Settlers (PL123)", 200, 400, LadderMode::Public)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.pathofexile.com/api/ladders/Settlers%20(PL123)?limit=200&offset=400"
        );
    }

    #[test]
    fn test_authenticated_ladder_url() {
        let url = client(Some("token"))
            .ladder_url("Standard", 200, 0, LadderMode::Authenticated)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.pathofexile.com/league/Standard/ladder?limit=200&offset=0"
        );
    }

    #[test]
    fn test_leagues_url_depends_on_token() {
        assert_eq!(
            client(None).leagues_url().unwrap().as_str(),
            "https://www.pathofexile.com/api/leagues"
        );
        assert_eq!(
            client(Some("token")).leagues_url().unwrap().as_str(),
            "https://api.pathofexile.com/league"
        );
    }

    #[test]
    fn test_blank_token_is_ignored() {
        assert!(!client(Some("  ")).has_access_token());
        assert!(client(Some("abc")).has_access_token());
    }

    #[tokio::test]
    async fn test_deep_page_without_token_is_unauthorized() {
        let result = client(None)
            .fetch_ladder_page("Standard", 200, 0, LadderMode::Authenticated)
            .await;
        assert!(matches!(result, Err(SourceError::Unauthorized)));
    }

    #[test]
    fn test_retry_after_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), Duration::from_secs(6));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(retry_after(&headers), Duration::from_secs(13));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), Duration::from_secs(6));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let api = ApiSettings {
            public_base_url: "not a url".to_string(),
            ..ApiSettings::default()
        };
        assert!(matches!(PoeLadderClient::new(&api), Err(SourceError::ParseError(_))));
    }
}
