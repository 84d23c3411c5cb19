//! Retrying HTTP GET used to acquire source pages.
//!
//! [`RetryingFetcher`] issues a plain GET per attempt and treats only
//! `200 OK` as success. Transport errors and every other status are retried
//! through [`medallion_core::retry::retry`] with the configured backoff
//! schedule. When the attempts run out the caller receives
//! [`PipelineError::Fetch`] and is expected to skip that unit of work.
//!
//! The fetcher holds no per-request state and can be shared by reference
//! between concurrent callers.
//!
//! ```text
//! GET ──200──▶ Payload
//!  │
//!  └─other/err──▶ sleep(backoff[n]) ──▶ GET … ──exhausted──▶ PipelineError::Fetch
//! ```

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::StatusCode;

use medallion_core::retry::{retry, Clock, RetryPolicy};
use medallion_core::PipelineError;

use crate::config::FetchConfig;

/// [`Clock`] backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Body and metadata of a successful GET.
#[derive(Debug, Clone)]
pub struct Payload {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl Payload {
    /// Body decoded as UTF-8. A body that is not valid UTF-8 is a decode error.
    pub fn text(&self) -> medallion_core::Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| PipelineError::decode(&self.url, e))
    }
}

pub struct RetryingFetcher<C: Clock = TokioClock> {
    client: reqwest::Client,
    policy: RetryPolicy,
    clock: C,
}

impl RetryingFetcher<TokioClock> {
    /// Build a fetcher from `[fetch]` settings.
    ///
    /// `max_retries` is the total number of GET attempts. The fetcher also
    /// waits out the backoff after the final failure before giving up.
    pub fn from_config(config: &FetchConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid fetch.user_agent")?,
        );
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        let policy =
            RetryPolicy::new(config.max_retries, config.backoff()).with_backoff_after_last(true);
        Ok(Self::new(client, policy, TokioClock))
    }
}

impl<C: Clock> RetryingFetcher<C> {
    pub fn new(client: reqwest::Client, policy: RetryPolicy, clock: C) -> Self {
        Self {
            client,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET `url` with extra `headers`, retrying until a `200 OK` arrives or
    /// the policy's attempts are exhausted.
    pub async fn fetch(&self, url: &str, headers: &HeaderMap) -> medallion_core::Result<Payload> {
        self.fetch_with_retries(url, headers, self.policy.max_attempts)
            .await
    }

    /// [`fetch`](Self::fetch) with `max_retries` total attempts in place of
    /// the policy's. The backoff schedule is unchanged.
    pub async fn fetch_with_retries(
        &self,
        url: &str,
        headers: &HeaderMap,
        max_retries: u32,
    ) -> medallion_core::Result<Payload> {
        let policy = RetryPolicy {
            max_attempts: max_retries,
            ..self.policy.clone()
        };
        let outcome = retry(
            &policy,
            &self.clock,
            |_: &String| true,
            |attempt| async move {
                let result = self.attempt(url, headers).await;
                if let Err(message) = &result {
                    tracing::warn!(
                        "Fetch attempt {}/{} for {} failed: {}",
                        attempt + 1,
                        max_retries,
                        url,
                        message
                    );
                }
                result
            },
        )
        .await;

        outcome.map_err(|e| PipelineError::Fetch {
            url: url.to_string(),
            attempts: e.attempts,
            message: e.last,
        })
    }

    async fn attempt(&self, url: &str, headers: &HeaderMap) -> Result<Payload, String> {
        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(format!("HTTP {}", status));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| e.to_string())?;

        Ok(Payload {
            url: url.to_string(),
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medallion_core::retry::RecordingClock;

    #[test]
    fn test_from_config_policy() {
        let fetcher = RetryingFetcher::from_config(&FetchConfig::default()).unwrap();
        assert_eq!(fetcher.policy().max_attempts, 5);
        assert!(fetcher.policy().backoff_after_last);
        assert_eq!(fetcher.policy().delay_for(7), Duration::from_secs(16));
    }

    #[test]
    fn test_invalid_user_agent_rejected() {
        let config = FetchConfig {
            user_agent: "bad\nagent".to_string(),
            ..FetchConfig::default()
        };
        assert!(RetryingFetcher::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_host_exhausts_attempts() {
        let clock = RecordingClock::new();
        let policy = RetryPolicy::new(
            3,
            vec![Duration::from_secs(1), Duration::from_secs(2)],
        )
        .with_backoff_after_last(true);
        let fetcher = RetryingFetcher::new(reqwest::Client::new(), policy, clock);

        // Port 9 (discard) is closed on loopback in test environments.
        let err = fetcher
            .fetch("http://127.0.0.1:9/", &HeaderMap::new())
            .await
            .unwrap_err();
        match err {
            PipelineError::Fetch { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            fetcher.clock.sleeps(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(2)
            ]
        );
    }

    #[tokio::test]
    async fn test_per_call_attempts_override_policy() {
        let clock = RecordingClock::new();
        let policy = RetryPolicy::new(5, vec![Duration::from_millis(10)]).with_backoff_after_last(true);
        let fetcher = RetryingFetcher::new(reqwest::Client::new(), policy, clock);

        let err = fetcher
            .fetch_with_retries("http://127.0.0.1:9/", &HeaderMap::new(), 2)
            .await
            .unwrap_err();
        match err {
            PipelineError::Fetch { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fetcher.clock.sleeps().len(), 2);
        assert_eq!(fetcher.policy().max_attempts, 5);
    }

    #[test]
    fn test_payload_text_rejects_invalid_utf8() {
        let payload = Payload {
            url: "http://x/".into(),
            status: 200,
            content_type: None,
            body: Bytes::from_static(&[0xff, 0xfe]),
        };
        assert!(matches!(payload.text(), Err(PipelineError::Decode { .. })));
    }
}
