//! Lichess game export client.
//!
//! Calls `GET /api/games/user/{username}` and decodes the NDJSON body into
//! [`RawGame`] records. Every request first waits on the shared
//! [`RateLimiter`].

use super::{GameSource, RateLimiter};
use crate::config::LichessConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use chess_archive_core::{LICHESS_KIND, RawGame};
use metrics::{counter, histogram};
use std::time::Duration;

/// Longest slice of an error body kept in [`Error::Api`].
const MAX_ERROR_BODY: usize = 512;

/// Lichess API client.
#[derive(Debug, Clone)]
pub struct LichessClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    limiter: RateLimiter,
}

impl LichessClient {
    /// Create a client from configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - API key, base URL and rate ceiling
    /// * `timeout` - Per-request timeout
    /// * `limiter` - Shared limiter pacing all outbound requests
    pub fn new(config: &LichessConfig, timeout: Duration, limiter: RateLimiter) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("chess-archive/", env!("CARGO_PKG_VERSION")))
            .build()?;

        tracing::info!(
            base_url = %config.base_url,
            rate_limit = config.requests_per_sec,
            "Lichess client initialized"
        );

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            limiter,
        })
    }

    /// Build the export URL.
    ///
    /// Lichess treats `since` as inclusive, so the exclusive watermark is
    /// shifted by one millisecond. Games are requested oldest first.
    fn games_url(&self, username: &str, since: i64, max: usize) -> String {
        let mut url = format!(
            "{}/api/games/user/{}?max={}&sort=dateAsc&pgnInJson=true&opening=true&clocks=false&evals=false",
            self.base_url, username, max
        );
        if since > 0 {
            url.push_str(&format!("&since={}", since + 1));
        }
        url
    }
}

/// Decode an NDJSON export body, skipping blank separator lines.
fn parse_ndjson(body: &str) -> Result<Vec<RawGame>> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| RawGame::decode(LICHESS_KIND, line).map_err(Error::from))
        .collect()
}

#[async_trait]
impl GameSource for LichessClient {
    fn name(&self) -> &'static str {
        "lichess"
    }

    async fn list_games(&self, username: &str, since: i64, max: usize) -> Result<Vec<RawGame>> {
        let url = self.games_url(username, since, max);

        let waited = self.limiter.acquire().await;
        histogram!("source_rate_limit_wait_seconds").record(waited.as_secs_f64());

        tracing::debug!(%url, "listing games");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/x-ndjson")
            .send()
            .await?;

        let status = response.status();
        counter!("source_requests_total", "status" => status.as_u16().to_string()).increment(1);

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let games = parse_ndjson(&body)?;

        tracing::info!(
            username,
            since,
            count = games.len(),
            "listed games from Lichess"
        );

        Ok(games)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> LichessClient {
        let config = LichessConfig {
            api_key: "lip_test".to_string(),
            username: "alice".to_string(),
            user_id: "alice".to_string(),
            requests_per_sec: 20,
            base_url: "https://lichess.org".to_string(),
        };
        LichessClient::new(&config, Duration::from_secs(5), RateLimiter::new(20)).unwrap()
    }

    #[test]
    fn test_games_url_first_run_has_no_since() {
        let url = client().games_url("alice", 0, 10);
        assert!(url.starts_with("https://lichess.org/api/games/user/alice?"));
        assert!(url.contains("max=10"));
        assert!(url.contains("sort=dateAsc"));
        assert!(url.contains("pgnInJson=true"));
        assert!(!url.contains("since="));
    }

    #[test]
    fn test_games_url_since_is_exclusive() {
        let url = client().games_url("alice", 1_514_505_150_384, 10);
        assert!(url.ends_with("&since=1514505150385"));
    }

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let body = concat!(
            r#"{"id":"a","createdAt":1,"players":{}}"#,
            "\n\n",
            r#"{"id":"b","createdAt":2,"players":{}}"#,
            "\n"
        );
        let games = parse_ndjson(body).unwrap();
        assert_eq!(games.len(), 2);
        assert!(matches!(&games[1], RawGame::Lichess(g) if g.id == "b"));
    }

    #[test]
    fn test_parse_ndjson_empty_body() {
        assert!(parse_ndjson("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_ndjson_malformed_line() {
        let body = "{\"id\":\"a\"}\n{oops\n";
        assert!(matches!(
            parse_ndjson(body),
            Err(Error::Core(chess_archive_core::Error::Json(_)))
        ));
    }

    #[test]
    fn test_source_name() {
        assert_eq!(client().name(), "lichess");
    }
}
