//! HTTP executor for queued requests.

use crate::{classify_status, parse_retry_after, parse_success_body, ExecutorError, ExecutorResult};
use async_trait::async_trait;
use queue_config_and_utils::{Config, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use queue_protocol_types::Request;
use reqwest::Client;
use sequential_queue::{FailureKind, NetworkExecutor, RequestOutcome};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Base URL for the API.
    pub api_base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Bearer token sent with every request.
    pub auth_token: Option<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            auth_token: None,
        }
    }
}

impl ExecutorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_base_url: config.api_base_url.clone(),
            timeout_secs: config.request_timeout_secs,
            auth_token: config.auth_token.clone(),
        }
    }
}

/// Sends queued requests over HTTP.
pub struct HttpExecutor {
    base_url: Url,
    client: Client,
    auth_token: Option<String>,
}

impl HttpExecutor {
    /// Create a new executor.
    pub fn new(config: ExecutorConfig) -> ExecutorResult<Self> {
        let base_url = Url::parse(&config.api_base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ExecutorError::Config(format!(
                "API base URL cannot be a base: {}",
                config.api_base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        info!(api_base_url = %base_url, timeout_secs = config.timeout_secs, "HTTP executor ready");

        Ok(Self {
            base_url,
            client,
            auth_token: config.auth_token,
        })
    }

    /// URL a command is posted to.
    pub fn endpoint(&self, command: &str) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("api").push(command);
        }
        url
    }

    async fn try_send(&self, request: &Request) -> Result<RequestOutcome, reqwest::Error> {
        let url = self.endpoint(&request.command);

        debug!(
            url = %url,
            request_id = %request.id,
            command = %request.command,
            "Sending request"
        );

        let mut builder = self.client.post(url).json(&request.data);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            return Ok(RequestOutcome::Success(parse_success_body(&body)));
        }

        let failure = classify_status(status, retry_after, &body);
        warn!(
            request_id = %request.id,
            command = %request.command,
            status = status.as_u16(),
            error = %failure,
            "Request rejected"
        );
        Ok(RequestOutcome::Failure(failure))
    }
}

/// Map a transport error onto the failure taxonomy.
fn classify_transport_error(err: &reqwest::Error) -> FailureKind {
    if err.is_connect() {
        FailureKind::Offline(err.to_string())
    } else if err.is_builder() {
        FailureKind::Terminal(err.to_string())
    } else {
        FailureKind::Transient(err.to_string())
    }
}

#[async_trait]
impl NetworkExecutor for HttpExecutor {
    async fn send(&self, request: &Request) -> RequestOutcome {
        match self.try_send(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let failure = classify_transport_error(&e);
                warn!(
                    request_id = %request.id,
                    command = %request.command,
                    error = %failure,
                    "Request send failed"
                );
                RequestOutcome::Failure(failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and return the raw request it received.
    async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    fn executor(base: &str) -> HttpExecutor {
        HttpExecutor::new(ExecutorConfig {
            api_base_url: base.to_string(),
            timeout_secs: 5,
            auth_token: Some("token-123".to_string()),
        })
        .unwrap()
    }

    #[test]
    fn test_executor_config_default() {
        let config = ExecutorConfig::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_endpoint_appends_api_command() {
        let exec = executor("https://api.example.com");
        assert_eq!(
            exec.endpoint("ReconnectApp").as_str(),
            "https://api.example.com/api/ReconnectApp"
        );

        let exec = executor("https://api.example.com/v2/");
        assert_eq!(
            exec.endpoint("OpenReport").as_str(),
            "https://api.example.com/v2/api/OpenReport"
        );
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        let err = HttpExecutor::new(ExecutorConfig {
            api_base_url: "mailto:someone@example.com".to_string(),
            ..Default::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, ExecutorError::Config(_)));

        let err = HttpExecutor::new(ExecutorConfig {
            api_base_url: "::nope".to_string(),
            ..Default::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, ExecutorError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_success_posts_payload_with_auth() {
        let body = r#"{"jsonCode":200,"updates":[{"key":"session","method":"set","value":"abc"}]}"#;
        let (base, server) = serve_once(format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ))
        .await;

        let request = Request::new("OpenReport").with_json(json!({"reportID": 42}));
        let outcome = executor(&base).send(&request).await;

        let response = match outcome {
            RequestOutcome::Success(response) => response,
            other => panic!("expected success, got {other:?}"),
        };
        assert_eq!(response.payload["jsonCode"], 200);
        assert_eq!(response.updates.len(), 1);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/OpenReport HTTP/1.1"));
        assert!(raw.to_lowercase().contains("authorization: bearer token-123"));
        assert!(raw.contains(r#"{"reportID":42}"#));
    }

    #[tokio::test]
    async fn test_rate_limit_reads_retry_after() {
        let (base, _server) = serve_once(
            "HTTP/1.1 429 Too Many Requests\r\nRetry-After: 3\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                .to_string(),
        )
        .await;

        let outcome = executor(&base).send(&Request::new("AddComment")).await;
        assert_eq!(
            outcome,
            RequestOutcome::Failure(FailureKind::RateLimited {
                retry_after: Some(Duration::from_secs(3)),
                message: "HTTP 429 Too Many Requests".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let (base, _server) = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                .to_string(),
        )
        .await;

        let outcome = executor(&base).send(&Request::new("AddComment")).await;
        assert!(matches!(
            outcome,
            RequestOutcome::Failure(FailureKind::Transient(_))
        ));
    }

    #[tokio::test]
    async fn test_refused_connection_is_offline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let outcome = executor(&format!("http://{}", addr))
            .send(&Request::new("AddComment"))
            .await;
        assert!(matches!(
            outcome,
            RequestOutcome::Failure(FailureKind::Offline(_))
        ));
    }
}
