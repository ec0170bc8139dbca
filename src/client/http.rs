//! HTTP Client
//!
//! Bearer-authenticated JSON POSTs with a fixed per-request timeout.

use crate::error::{FolioError, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Bodies echoed into errors are cut to this many bytes
const MAX_ERROR_BODY: usize = 500;

/// Shared outbound HTTP client
#[derive(Debug, Clone)]
pub struct HttpClient {
    /// Inner reqwest client
    client: Client,
}

impl HttpClient {
    /// Create a client whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| FolioError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// POST `body` as JSON with a bearer token and decode a 2xx JSON reply.
    ///
    /// Exactly one request is made; callers own any retry policy.
    pub async fn post_json<T, R>(&self, url: &str, body: &T, api_key: &str) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| FolioError::Config(format!("Invalid API key format: {}", e)))?,
        );

        let resp = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if status.is_success() {
            return serde_json::from_str(&text).map_err(|e| {
                FolioError::Response(format!(
                    "Failed to parse response: {}. Body: {}",
                    e,
                    truncate(&text)
                ))
            });
        }

        Err(classify_failure(status, &text))
    }
}

/// Map a non-2xx upstream reply onto an error variant
pub fn classify_failure(status: StatusCode, body: &str) -> FolioError {
    if is_rate_limit_error(status.as_u16(), body) {
        return FolioError::UpstreamRateLimited {
            status: status.as_u16(),
        };
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return FolioError::Auth {
            status: status.as_u16(),
        };
    }

    FolioError::Upstream {
        status: status.as_u16(),
        body: truncate(body).to_string(),
    }
}

/// Detect if a response indicates a rate limit or quota error
pub fn is_rate_limit_error(status: u16, body: &str) -> bool {
    if status == 429 {
        return true;
    }

    // Some providers return 400 or 403 with rate limit messages
    let lower_body = body.to_lowercase();
    lower_body.contains("rate limit")
        || lower_body.contains("rate_limit")
        || lower_body.contains("too many requests")
        || lower_body.contains("quota exceeded")
}

fn truncate(body: &str) -> &str {
    if body.len() <= MAX_ERROR_BODY {
        return body;
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_is_rate_limit_error() {
        assert!(is_rate_limit_error(429, ""));
        assert!(is_rate_limit_error(400, "rate limit exceeded"));
        assert!(is_rate_limit_error(403, "Too Many Requests"));
        assert!(!is_rate_limit_error(200, "success"));
        assert!(!is_rate_limit_error(500, "internal error"));
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, ""),
            FolioError::UpstreamRateLimited { status: 429 }
        ));
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, "bad key"),
            FolioError::Auth { status: 401 }
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_GATEWAY, "upstream down"),
            FolioError::Upstream { status: 502, .. }
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "é".repeat(400);
        let cut = truncate(&long);
        assert!(cut.len() <= MAX_ERROR_BODY);
        assert!(cut.chars().all(|c| c == 'é'));
    }

    #[tokio::test]
    async fn test_post_json_sends_bearer_and_decodes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/echo")
            .match_header("authorization", "Bearer secret")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_body(r#"{"ok": true}"#)
            .create_async()
            .await;

        let client = HttpClient::new(Duration::from_secs(5)).unwrap();
        let reply: Value = client
            .post_json(&format!("{}/echo", server.url()), &json!({"a": 1}), "secret")
            .await
            .unwrap();

        assert_eq!(reply["ok"], true);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_post_json_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/broken")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let client = HttpClient::new(Duration::from_secs(5)).unwrap();
        let err = client
            .post_json::<_, Value>(&format!("{}/broken", server.url()), &json!({}), "k")
            .await
            .unwrap_err();

        assert!(matches!(err, FolioError::Response(_)));
    }
}
