//! Transports carrying sink requests
//!
//! Sinks build an [`OutboundRequest`] and hand it to a [`Transport`]. The
//! binary picks one transport per run: [`HttpTransport`] sends requests with
//! reqwest, [`LogTransport`] logs them for `--dry` runs and reports itself as
//! not live so sinks relax their configuration checks. Tests use
//! [`RecordingTransport`] to inspect what would have been sent.

use crate::error::SinkError;
use log::{debug, info};
use reqwest::{Client, Method};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

/// Future returned by [`Transport::send`]
pub type SendFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<serde_json::Value>, SinkError>> + Send + 'a>>;

/// One outbound HTTP call a sink wants to make
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub bearer_token: Option<String>,
    pub body: Option<serde_json::Value>,
}

impl OutboundRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            bearer_token: None,
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, url).json(body)
    }

    pub fn patch(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::PATCH, url).json(body)
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(mut self, token: Option<&str>) -> Self {
        self.bearer_token = token.map(str::to_string);
        self
    }
}

/// Carrier for outbound requests
///
/// Swapping the live transport for the log transport is how dry runs work;
/// sinks and the dispatcher are unaware of the difference.
pub trait Transport: Send + Sync {
    /// Perform the request, returning the JSON response body if there is one
    fn send<'a>(&'a self, request: &'a OutboundRequest) -> SendFuture<'a>;

    /// Whether requests reach the external service
    fn is_live(&self) -> bool {
        true
    }
}

/// Live transport backed by reqwest
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vax-notify/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send<'a>(&'a self, request: &'a OutboundRequest) -> SendFuture<'a> {
        Box::pin(async move {
            debug!("{} {}", request.method, request.url);

            let mut builder = self.client.request(request.method.clone(), &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            if let Some(token) = &request.bearer_token {
                builder = builder.bearer_auth(token);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await?;
            let status = response.status();
            let text = response.text().await?;

            if !status.is_success() {
                return Err(SinkError::Status {
                    url: request.url.clone(),
                    status: status.as_u16(),
                    body: text,
                });
            }

            // Some endpoints answer with an empty or non-JSON body.
            Ok(serde_json::from_str(&text).ok())
        })
    }
}

/// Dry-run transport that logs every request instead of sending it
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl Transport for LogTransport {
    fn send<'a>(&'a self, request: &'a OutboundRequest) -> SendFuture<'a> {
        Box::pin(async move {
            match &request.body {
                Some(body) => {
                    let rendered = match body.get("body").and_then(|value| value.as_str()) {
                        Some(markdown) => markdown.to_string(),
                        None => serde_json::to_string_pretty(body)
                            .unwrap_or_else(|_| body.to_string()),
                    };
                    info!("[dry] {} {}\n{}", request.method, request.url, rendered);
                }
                None => info!("[dry] {} {}", request.method, request.url),
            }
            Ok(None)
        })
    }

    fn is_live(&self) -> bool {
        false
    }
}

/// Transport that records requests, for tests
///
/// Reports itself as live so sinks behave as they would in production.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<OutboundRequest>>,
    failure: Option<String>,
    response: Option<serde_json::Value>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose every request fails with the given message
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Transport that answers every request with the given JSON body
    pub fn with_response(response: serde_json::Value) -> Self {
        Self {
            response: Some(response),
            ..Self::default()
        }
    }

    /// Requests sent so far, in order
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Transport for RecordingTransport {
    fn send<'a>(&'a self, request: &'a OutboundRequest) -> SendFuture<'a> {
        Box::pin(async move {
            self.requests
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(request.clone());

            match &self.failure {
                Some(message) => Err(SinkError::NotificationFailed(message.clone())),
                None => Ok(self.response.clone()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builders() {
        let request = OutboundRequest::patch("https://api.example/issues/1", json!({"body": "x"}))
            .header("Accept", "application/vnd.github+json")
            .bearer(Some("secret"));

        assert_eq!(request.method, Method::PATCH);
        assert_eq!(request.body, Some(json!({"body": "x"})));
        assert_eq!(request.bearer_token.as_deref(), Some("secret"));
        assert_eq!(request.headers.len(), 1);

        let get = OutboundRequest::get("https://hooks.example/deploy").bearer(None);
        assert_eq!(get.method, Method::GET);
        assert!(get.body.is_none());
        assert!(get.bearer_token.is_none());
    }

    #[tokio::test]
    async fn test_log_transport_is_not_live() {
        let transport = LogTransport;
        let request = OutboundRequest::post("https://example.invalid", json!({"a": 1}));

        assert!(!transport.is_live());
        assert_eq!(transport.send(&request).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_recording_transport_records_and_fails() {
        let transport = RecordingTransport::failing("offline");
        let request = OutboundRequest::get("https://example.invalid");

        let result = transport.send(&request).await;

        assert!(matches!(result, Err(SinkError::NotificationFailed(msg)) if msg == "offline"));
        assert_eq!(transport.requests(), vec![request]);
        assert!(transport.is_live());
    }

    #[tokio::test]
    async fn test_recording_transport_response() {
        let transport = RecordingTransport::with_response(json!({"job": {"state": "PENDING"}}));
        let response = transport
            .send(&OutboundRequest::get("https://example.invalid"))
            .await
            .unwrap();

        assert_eq!(response, Some(json!({"job": {"state": "PENDING"}})));
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(Duration::from_secs(5)).is_ok());
    }
}
