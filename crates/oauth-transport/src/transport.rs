//! The base transport that actually puts requests on the wire.
//!
//! Provides the [`Transport`] trait, an implementation for
//! [`reqwest::Client`], and a [`MockTransport`] for testing.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use reqwest::{Method, Request, Response, Url};

use crate::error::{OAuthError, Result};

/// Trait for sending a single HTTP request.
///
/// Implementations must return the response as received; status codes are
/// not errors at this layer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the response.
    async fn send(&self, request: Request) -> Result<Response>;
}

/// Shared transport for use across async contexts.
pub type SharedTransport = Arc<dyn Transport>;

#[async_trait]
impl Transport for reqwest::Client {
    async fn send(&self, request: Request) -> Result<Response> {
        Ok(self.execute(request).await?)
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: Request) -> Result<Response> {
        (**self).send(request).await
    }
}

// ============================================================================
// MockTransport (for testing)
// ============================================================================

/// A request as seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    /// Buffered body bytes; `None` for empty or streaming bodies.
    pub body: Option<Vec<u8>>,
}

impl RecordedRequest {
    /// Get a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug)]
enum Scripted {
    Response { status: u16, body: String },
    Error(OAuthError),
}

/// Mock transport for testing.
///
/// Records every request and answers with queued responses. When the queue
/// is empty it answers `200` with an empty body.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Scripted>>,
    request_log: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn push_response(&self, status: u16, body: impl Into<String>) {
        self.responses.lock().push_back(Scripted::Response {
            status,
            body: body.into(),
        });
    }

    /// Queue a failure.
    pub fn push_error(&self, error: OAuthError) {
        self.responses.lock().push_back(Scripted::Error(error));
    }

    /// Get all requests that were sent through this transport.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.request_log.lock().clone()
    }

    /// Get the number of requests sent.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        self.request_log.lock().push(RecordedRequest {
            method: request.method().clone(),
            url: request.url().clone(),
            headers: request.headers().clone(),
            body: request
                .body()
                .and_then(|b| b.as_bytes())
                .map(|b| b.to_vec()),
        });

        let next = self.responses.lock().pop_front();
        let (status, body) = match next {
            Some(Scripted::Response { status, body }) => (status, body),
            Some(Scripted::Error(e)) => return Err(e),
            None => (200, String::new()),
        };

        let response = http::Response::builder()
            .status(status)
            .body(body)
            .map_err(|e| OAuthError::Backend(format!("MockTransport: {}", e)))?;
        Ok(Response::from(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(url: &str) -> Request {
        Request::new(Method::GET, Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_mock_default_response() {
        let mock = MockTransport::new();
        let response = mock.send(get("http://example.com/a")).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "");
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_scripted_responses() {
        let mock = MockTransport::new();
        mock.push_response(401, "unauthorized");
        mock.push_error(OAuthError::Network("connection reset".to_string()));

        let response = mock.send(get("http://example.com/a")).await.unwrap();
        assert_eq!(response.status(), 401);
        assert_eq!(response.text().await.unwrap(), "unauthorized");

        let err = mock.send(get("http://example.com/b")).await.unwrap_err();
        assert_eq!(err, OAuthError::Network("connection reset".to_string()));

        let urls: Vec<_> = mock
            .requests()
            .into_iter()
            .map(|r| r.url.to_string())
            .collect();
        assert_eq!(urls, vec!["http://example.com/a", "http://example.com/b"]);
    }

    #[tokio::test]
    async fn test_mock_records_headers_and_body() {
        let mock = MockTransport::new();
        let mut request = Request::new(Method::POST, Url::parse("http://example.com").unwrap());
        request
            .headers_mut()
            .insert("x-trace", "abc".parse().unwrap());
        *request.body_mut() = Some("payload".into());

        mock.send(request).await.unwrap();

        let recorded = &mock.requests()[0];
        assert_eq!(recorded.method, Method::POST);
        assert_eq!(recorded.header("x-trace"), Some("abc"));
        assert_eq!(recorded.body.as_deref(), Some(b"payload".as_slice()));
    }

    #[tokio::test]
    async fn test_reqwest_client_maps_connection_errors() {
        let client = reqwest::Client::new();
        // Port 9 (discard) on localhost is closed in test environments.
        let err = Transport::send(&client, get("http://127.0.0.1:9/"))
            .await
            .unwrap_err();
        assert!(err.is_network_error());
    }
}
