//! Key-Rotating Dispatcher
//!
//! Sends a completion request, rotating through the key pool on failure.

use crate::api::{CompletionRequest, CompletionResponse};
use crate::client::HttpClient;
use crate::error::{FolioError, Result};
use crate::rotation::KeyPool;
use std::sync::Arc;

/// Result of a single dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The completion text and how many attempts it took
    Success { content: String, attempts: usize },

    /// Every key failed; carries the last failure reason
    Exhausted { last_error: String, attempts: usize },
}

impl DispatchOutcome {
    pub fn attempts(&self) -> usize {
        match self {
            DispatchOutcome::Success { attempts, .. } => *attempts,
            DispatchOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success { .. })
    }

    /// Turn exhaustion into the service-failure error surfaced to callers
    pub fn into_result(self) -> Result<String> {
        match self {
            DispatchOutcome::Success { content, .. } => Ok(content),
            DispatchOutcome::Exhausted {
                last_error,
                attempts,
            } => Err(FolioError::KeysExhausted {
                attempts,
                last_error,
            }),
        }
    }
}

/// Dispatches completion requests across a shared key pool
pub struct Dispatcher {
    pool: Arc<KeyPool>,
    http: HttpClient,
    endpoint: String,
}

impl Dispatcher {
    pub fn new(pool: Arc<KeyPool>, http: HttpClient, endpoint: impl Into<String>) -> Self {
        Self {
            pool,
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn pool(&self) -> &Arc<KeyPool> {
        &self.pool
    }

    /// Try each key at most once, starting from the pool's current cursor
    pub async fn dispatch(&self, request: &CompletionRequest) -> DispatchOutcome {
        let pool_size = self.pool.len();
        let mut last_error = String::new();

        for attempt in 1..=pool_size {
            let (index, key) = self.pool.current();
            key.record_attempt();

            match self.attempt(request, key.value()).await {
                Ok(content) => {
                    tracing::debug!(
                        key_index = index + 1,
                        pool_size,
                        attempt,
                        "completion succeeded"
                    );
                    return DispatchOutcome::Success {
                        content,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    key.record_failure();
                    tracing::warn!(
                        key_index = index + 1,
                        pool_size,
                        attempt,
                        reason = failure_reason(&e),
                        error = %e,
                        "completion attempt failed"
                    );
                    last_error = e.to_string();

                    if attempt < pool_size {
                        let next = self.pool.rotate();
                        tracing::info!("Rotating to API key {}/{}", next + 1, pool_size);
                    }
                }
            }
        }

        let stats = self.pool.stats();
        tracing::error!(
            pool_size,
            rotations = stats.rotations,
            total_attempts = stats.total_attempts,
            total_failures = stats.total_failures,
            last_error = %last_error,
            "all API keys exhausted"
        );
        DispatchOutcome::Exhausted {
            last_error,
            attempts: pool_size,
        }
    }

    async fn attempt(&self, request: &CompletionRequest, api_key: &str) -> Result<String> {
        let response: CompletionResponse =
            self.http.post_json(&self.endpoint, request, api_key).await?;

        response.content().map(str::to_string).ok_or_else(|| {
            FolioError::Response("completion had no choices[0].message.content".to_string())
        })
    }
}

/// Short label for the kind of failure, for log filtering
fn failure_reason(err: &FolioError) -> &'static str {
    match err {
        FolioError::UpstreamRateLimited { .. } => "rate_limited",
        FolioError::Auth { .. } => "auth",
        FolioError::Upstream { .. } => "upstream_status",
        FolioError::Timeout(_) => "timeout",
        FolioError::Request(_) => "transport",
        FolioError::Response(_) => "malformed_body",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Message;
    use mockito::{Matcher, Server};
    use std::io::Write;
    use std::time::Duration;

    const OK_BODY: &str = r#"{
        "id": "cmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Hi there" } }]
    }"#;

    fn request() -> CompletionRequest {
        CompletionRequest::new("mistral-small-latest", vec![Message::user("hello")])
    }

    fn dispatcher(server: &Server, keys: &[&str]) -> Dispatcher {
        let pool = Arc::new(KeyPool::new(keys.iter().map(|k| k.to_string()).collect()).unwrap());
        let http = HttpClient::new(Duration::from_secs(5)).unwrap();
        Dispatcher::new(pool, http, format!("{}/v1/chat/completions", server.url()))
    }

    #[tokio::test]
    async fn test_first_key_succeeds() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer k1")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "mistral-small-latest",
                "max_tokens": 500
            })))
            .with_status(200)
            .with_body(OK_BODY)
            .expect(1)
            .create_async()
            .await;

        let d = dispatcher(&server, &["k1", "k2"]);
        let outcome = d.dispatch(&request()).await;

        assert_eq!(
            outcome,
            DispatchOutcome::Success {
                content: "Hi there".to_string(),
                attempts: 1
            }
        );
        assert_eq!(d.pool().cursor(), 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rotates_until_last_key_succeeds() {
        let mut server = Server::new_async().await;
        let _k1 = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer k1")
            .with_status(429)
            .with_body(r#"{"message": "rate limit exceeded"}"#)
            .create_async()
            .await;
        let _k2 = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer k2")
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;
        let _k3 = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer k3")
            .with_status(200)
            .with_body(OK_BODY)
            .create_async()
            .await;

        let d = dispatcher(&server, &["k1", "k2", "k3"]);
        let outcome = d.dispatch(&request()).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(d.pool().rotations(), 2);
        assert_eq!(d.pool().cursor(), 2);
    }

    #[tokio::test]
    async fn test_cursor_persists_across_dispatches() {
        let mut server = Server::new_async().await;
        let _k1 = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer k1")
            .with_status(500)
            .create_async()
            .await;
        let k2 = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer k2")
            .with_status(200)
            .with_body(OK_BODY)
            .expect(2)
            .create_async()
            .await;

        let d = dispatcher(&server, &["k1", "k2"]);
        assert!(d.dispatch(&request()).await.is_success());

        // Second call starts from k2, so it succeeds without touching k1 again
        let second = d.dispatch(&request()).await;
        assert_eq!(second.attempts(), 1);
        assert_eq!(d.pool().rotations(), 1);
        k2.assert_async().await;
    }

    #[tokio::test]
    async fn test_all_keys_fail() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .expect(3)
            .create_async()
            .await;

        let d = dispatcher(&server, &["k1", "k2", "k3"]);
        let outcome = d.dispatch(&request()).await;

        match &outcome {
            DispatchOutcome::Exhausted {
                last_error,
                attempts,
            } => {
                assert_eq!(*attempts, 3);
                assert!(last_error.contains("503"));
                assert!(last_error.contains("overloaded"));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        // No rotation after the final failure
        assert_eq!(d.pool().rotations(), 2);
        assert_eq!(d.pool().stats().total_failures, 3);
        mock.assert_async().await;

        assert!(matches!(
            outcome.into_result(),
            Err(FolioError::KeysExhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_content_counts_as_failure() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let d = dispatcher(&server, &["only"]);
        let outcome = d.dispatch(&request()).await;

        assert_eq!(outcome.attempts(), 1);
        assert!(!outcome.is_success());
        assert_eq!(d.pool().cursor(), 0);
    }

    #[tokio::test]
    async fn test_transport_error_counts_as_failure() {
        let pool = Arc::new(KeyPool::new(vec!["a".to_string(), "b".to_string()]).unwrap());
        let http = HttpClient::new(Duration::from_secs(1)).unwrap();
        // Port 9 (discard) on localhost is closed in test environments
        let d = Dispatcher::new(pool, http, "http://127.0.0.1:9/v1/chat/completions");

        let outcome = d.dispatch(&request()).await;
        assert_eq!(outcome.attempts(), 2);
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_stalled_key_times_out_then_rotates() {
        let mut server = Server::new_async().await;
        let _k1 = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer k1")
            .with_status(200)
            .with_chunked_body(|w| {
                w.write_all(b"{\"choices\": [")?;
                std::thread::sleep(Duration::from_secs(3));
                w.write_all(b"]}")
            })
            .create_async()
            .await;
        let k2 = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer k2")
            .with_status(200)
            .with_body(OK_BODY)
            .expect(1)
            .create_async()
            .await;

        let pool = Arc::new(KeyPool::new(vec!["k1".to_string(), "k2".to_string()]).unwrap());
        let http = HttpClient::new(Duration::from_secs(1)).unwrap();
        let d = Dispatcher::new(pool, http, format!("{}/v1/chat/completions", server.url()));

        let outcome = d.dispatch(&request()).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Success {
                content: "Hi there".to_string(),
                attempts: 2
            }
        );
        assert_eq!(d.pool().cursor(), 1);
        assert_eq!(d.pool().stats().total_failures, 1);
        k2.assert_async().await;

        let err = d.attempt(&request(), "k1").await.unwrap_err();
        assert_eq!(failure_reason(&err), "timeout");
    }

    #[test]
    fn test_failure_reason_labels() {
        assert_eq!(
            failure_reason(&FolioError::UpstreamRateLimited { status: 429 }),
            "rate_limited"
        );
        assert_eq!(failure_reason(&FolioError::Timeout("t".into())), "timeout");
        assert_eq!(
            failure_reason(&FolioError::Response("r".into())),
            "malformed_body"
        );
    }
}
