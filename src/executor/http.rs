//! HTTP job executor.
//!
//! Performs one HTTP request described entirely by the job's data map:
//! `url` and `method` select the target, `body` (optional) is sent as the
//! request body, and every `header.<name>` entry becomes a request header.

use async_trait::async_trait;
use reqwest::{Client, Method};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::{ExecutionOutcome, JobExecutor};

/// Data map keys recognized by the HTTP executor.
const KEY_URL: &str = "url";
const KEY_METHOD: &str = "method";
const KEY_BODY: &str = "body";
const HEADER_PREFIX: &str = "header.";

/// Tuning knobs for the HTTP executor.
#[derive(Debug, Clone)]
pub struct HttpExecutorConfig {
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Total request timeout, including the response body.
    pub request_timeout: Duration,
    /// When true, a completed exchange with a 4xx/5xx status is recorded as
    /// a failure. When false (the default), any completed exchange counts as
    /// success and the status code is only reported in the message.
    pub fail_on_http_error: bool,
}

impl Default for HttpExecutorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            fail_on_http_error: false,
        }
    }
}

/// Executor for `http` jobs.
pub struct HttpJobExecutor {
    client: Client,
    fail_on_http_error: bool,
}

impl HttpJobExecutor {
    pub fn new(config: HttpExecutorConfig) -> Self {
        let client = match Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "failed to build http client, falling back to default timeouts");
                Client::default()
            }
        };
        Self {
            client,
            fail_on_http_error: config.fail_on_http_error,
        }
    }
}

impl Default for HttpJobExecutor {
    fn default() -> Self {
        Self::new(HttpExecutorConfig::default())
    }
}

/// Parse the method string case-insensitively. Anything unrecognized,
/// including an empty string, falls back to GET.
fn parse_method(raw: &str) -> Method {
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes()).unwrap_or(Method::GET)
}

/// Collect `header.<name>` entries from the data map, with the prefix
/// stripped.
fn extract_headers(data: &HashMap<String, String>) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = data
        .iter()
        .filter_map(|(k, v)| {
            k.strip_prefix(HEADER_PREFIX)
                .filter(|name| !name.is_empty())
                .map(|name| (name.to_string(), v.clone()))
        })
        .collect();
    headers.sort();
    headers
}

#[async_trait]
impl JobExecutor for HttpJobExecutor {
    async fn execute(&self, data: &HashMap<String, String>) -> ExecutionOutcome {
        let url = match data.get(KEY_URL).filter(|u| !u.is_empty()) {
            Some(url) => url,
            None => {
                warn!("http job is missing the 'url' entry, skipping");
                return ExecutionOutcome::Misconfigured("missing 'url' entry".to_string());
            }
        };

        // Both url and method must be present for the request to happen at
        // all; a missing method means no network call, same as a missing url.
        let method = match data.get(KEY_METHOD) {
            Some(raw) => parse_method(raw),
            None => {
                warn!("http job is missing the 'method' entry, skipping");
                return ExecutionOutcome::Misconfigured("missing 'method' entry".to_string());
            }
        };

        let mut request = self.client.request(method.clone(), url);
        for (name, value) in extract_headers(data) {
            request = request.header(name, value);
        }
        if let Some(body) = data.get(KEY_BODY).filter(|b| !b.is_empty()) {
            request = request.body(body.clone());
        }

        debug!(%method, url, "dispatching http request");
        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if self.fail_on_http_error && (status.is_client_error() || status.is_server_error())
                {
                    ExecutionOutcome::failure(format!("{} {} -> {}", method, url, status))
                } else {
                    // The response body is the recorded message.
                    let body = response.text().await.unwrap_or_else(|e| {
                        format!("{} (failed to read body: {})", status, e)
                    });
                    ExecutionOutcome::success(body)
                }
            }
            Err(err) => ExecutionOutcome::failure(format!("{} {} failed: {}", method, url, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn spawn_target() -> std::net::SocketAddr {
        use axum::{http::StatusCode, routing::get, Router};

        let router = Router::new()
            .route("/greet", get(|| async { "hello from target" }))
            .route(
                "/broken",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "it broke") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    #[test]
    fn test_parse_method_is_case_insensitive() {
        assert_eq!(parse_method("get"), Method::GET);
        assert_eq!(parse_method("Post"), Method::POST);
        assert_eq!(parse_method("DELETE"), Method::DELETE);
    }

    #[test]
    fn test_unrecognized_method_falls_back_to_get() {
        assert_eq!(parse_method(""), Method::GET);
        assert_eq!(parse_method("GE T"), Method::GET);
        assert_eq!(parse_method("fetch!"), Method::GET);
    }

    #[test]
    fn test_extract_headers_strips_prefix() {
        let data = data(&[
            ("url", "http://localhost"),
            ("header.Authorization", "Bearer tok"),
            ("header.X-Custom", "1"),
            ("body", "ignored"),
        ]);

        let headers = extract_headers(&data);
        assert_eq!(
            headers,
            vec![
                ("Authorization".to_string(), "Bearer tok".to_string()),
                ("X-Custom".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_extract_headers_ignores_bare_prefix() {
        let data = data(&[("header.", "value")]);
        assert!(extract_headers(&data).is_empty());
    }

    #[tokio::test]
    async fn test_missing_url_is_misconfigured() {
        let executor = HttpJobExecutor::default();
        let outcome = executor.execute(&data(&[("method", "GET")])).await;
        assert!(matches!(outcome, ExecutionOutcome::Misconfigured(_)));
    }

    #[tokio::test]
    async fn test_empty_url_is_misconfigured() {
        let executor = HttpJobExecutor::default();
        let outcome = executor.execute(&data(&[("url", "")])).await;
        assert!(matches!(outcome, ExecutionOutcome::Misconfigured(_)));
    }

    #[tokio::test]
    async fn test_missing_method_is_misconfigured_without_network_call() {
        let executor = HttpJobExecutor::default();
        // Reserved TEST-NET-1 address: any attempted request would hang until
        // the connect timeout, so a prompt Misconfigured proves nothing was
        // sent.
        let started = std::time::Instant::now();
        let outcome = executor
            .execute(&data(&[("url", "http://192.0.2.1:9/")]))
            .await;
        assert!(matches!(outcome, ExecutionOutcome::Misconfigured(_)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_garbled_method_still_sends_as_get() {
        let addr = spawn_target().await;
        let executor = HttpJobExecutor::default();
        let outcome = executor
            .execute(&data(&[
                ("url", &format!("http://{}/greet", addr)),
                ("method", "bad method"),
            ]))
            .await;
        assert_eq!(outcome, ExecutionOutcome::success("hello from target"));
    }

    #[tokio::test]
    async fn test_unreachable_host_completes_as_failure() {
        let executor = HttpJobExecutor::new(HttpExecutorConfig {
            connect_timeout: Duration::from_millis(200),
            request_timeout: Duration::from_millis(500),
            fail_on_http_error: false,
        });
        // Reserved TEST-NET-1 address; nothing listens there.
        let outcome = executor
            .execute(&data(&[("url", "http://192.0.2.1:9/"), ("method", "GET")]))
            .await;
        match outcome {
            ExecutionOutcome::Completed { succeeded, message } => {
                assert!(!succeeded);
                assert!(message.contains("failed"));
            }
            other => panic!("expected completed failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_response_body_becomes_the_success_message() {
        let addr = spawn_target().await;
        let executor = HttpJobExecutor::default();
        let outcome = executor
            .execute(&data(&[
                ("url", &format!("http://{}/greet", addr)),
                ("method", "GET"),
            ]))
            .await;
        assert_eq!(outcome, ExecutionOutcome::success("hello from target"));
    }

    #[tokio::test]
    async fn test_server_error_succeeds_by_default_with_body_message() {
        let addr = spawn_target().await;
        let executor = HttpJobExecutor::default();
        let outcome = executor
            .execute(&data(&[
                ("url", &format!("http://{}/broken", addr)),
                ("method", "GET"),
            ]))
            .await;
        assert_eq!(outcome, ExecutionOutcome::success("it broke"));
    }

    #[tokio::test]
    async fn test_fail_on_http_error_flips_server_error_to_failure() {
        let addr = spawn_target().await;
        let executor = HttpJobExecutor::new(HttpExecutorConfig {
            fail_on_http_error: true,
            ..HttpExecutorConfig::default()
        });
        let outcome = executor
            .execute(&data(&[
                ("url", &format!("http://{}/broken", addr)),
                ("method", "GET"),
            ]))
            .await;
        match outcome {
            ExecutionOutcome::Completed { succeeded, message } => {
                assert!(!succeeded);
                assert!(message.contains("500"));
            }
            other => panic!("expected completed failure, got {:?}", other),
        }
    }
}
