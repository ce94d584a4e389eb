//! HTTP remote store implementation.
//!
//! This module provides an HTTP-based remote store for the sync engine.
//! The actual HTTP client is abstracted via a trait to allow different
//! implementations (reqwest, hyper, etc.).

use crate::error::{SyncError, SyncResult};
use crate::store::RemoteStore;
use async_trait::async_trait;
use confirmsync_protocol::{BulkUpdateRequest, BulkUpdateResponse, FetchResponse, FieldAnnotation};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Why an HTTP request produced no usable response body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpFailure {
    /// No response arrived (refused, reset, DNS failure, client timeout).
    #[error("{0}")]
    Unreachable(String),

    /// The server answered with a non-success status.
    #[error("status {status}: {message}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },
}

impl HttpFailure {
    /// Creates a status failure.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Clients own
/// their deadlines: a request that takes too long should end in
/// [`HttpFailure::Unreachable`].
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a GET request and returns the response body.
    async fn get(&self, url: &str) -> Result<Vec<u8>, HttpFailure>;

    /// Sends a POST request with a JSON body and returns the response body.
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, HttpFailure>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based remote store.
///
/// Uses JSON request/response bodies against
/// `{base_url}/sites/{site_id}/field-confirmations`.
pub struct HttpRemoteStore<C: HttpClient> {
    /// Base URL of the API (e.g., "https://api.example.com").
    base_url: String,
    /// HTTP client implementation.
    client: C,
    /// Whether the last request reached the server.
    connected: AtomicBool,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpRemoteStore<C> {
    /// Creates a new HTTP remote store.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns true if the client is healthy and the last request got through.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    fn annotations_url(&self, site_id: &str) -> String {
        format!("{}/sites/{}/field-confirmations", self.base_url, site_id)
    }

    fn record_outcome<T>(&self, outcome: Result<T, HttpFailure>) -> SyncResult<T> {
        let failure = match outcome {
            Ok(body) => {
                self.connected.store(true, Ordering::SeqCst);
                *self.last_error.write() = None;
                return Ok(body);
            }
            Err(failure) => failure,
        };

        *self.last_error.write() = Some(failure.to_string());
        match failure {
            HttpFailure::Unreachable(message) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(SyncError::transport_retryable(message))
            }
            // The server answered, so the connection itself is fine.
            HttpFailure::Status { status, message } => {
                self.connected.store(true, Ordering::SeqCst);
                if status >= 500 {
                    Err(SyncError::ServerError(message))
                } else {
                    Err(SyncError::Rejected { status, message })
                }
            }
        }
    }

    fn check_healthy(&self) -> SyncResult<()> {
        if self.client.is_healthy() {
            Ok(())
        } else {
            Err(SyncError::NotConnected)
        }
    }
}

#[async_trait]
impl<C: HttpClient> RemoteStore for HttpRemoteStore<C> {
    async fn fetch(&self, site_id: &str) -> SyncResult<Vec<FieldAnnotation>> {
        self.check_healthy()?;

        let url = self.annotations_url(site_id);
        let body = self.record_outcome(self.client.get(&url).await)?;

        let response = FetchResponse::decode(&body)
            .map_err(|e| SyncError::Protocol(format!("Failed to decode response: {}", e)))?;
        Ok(response.annotations)
    }

    async fn bulk_update(
        &self,
        site_id: &str,
        annotations: Vec<FieldAnnotation>,
    ) -> SyncResult<BulkUpdateResponse> {
        self.check_healthy()?;

        let body = BulkUpdateRequest::new(annotations)
            .encode()
            .map_err(|e| SyncError::Protocol(format!("Failed to encode request: {}", e)))?;

        let url = format!("{}/bulk", self.annotations_url(site_id));
        let response_body = self.record_outcome(self.client.post(&url, body).await)?;

        BulkUpdateResponse::decode(&response_body)
            .map_err(|e| SyncError::Protocol(format!("Failed to decode response: {}", e)))
    }
}

/// Trait for servers that can handle loopback requests.
///
/// Errors carry the status code the server would have answered with.
pub trait LoopbackServer: Send + Sync {
    /// Handles a GET request and returns the response body.
    fn handle_get(&self, path: &str) -> Result<Vec<u8>, HttpFailure>;

    /// Handles a POST request and returns the response body.
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, HttpFailure>;
}

/// A loopback HTTP client that routes requests directly to an in-process server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    fn path_of(url: &str) -> &str {
        url.find("/sites/").map(|i| &url[i..]).unwrap_or(url)
    }
}

#[async_trait]
impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    async fn get(&self, url: &str) -> Result<Vec<u8>, HttpFailure> {
        self.server.handle_get(Self::path_of(url))
    }

    async fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, HttpFailure> {
        self.server.handle_post(Self::path_of(url), &body)
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confirmsync_protocol::FlagName;
    use confirmsync_testkit::{bulk_count_body, confirmed, fetch_body, fetch_body_bare};
    use parking_lot::Mutex;

    struct TestClient {
        response: RwLock<Option<Result<Vec<u8>, HttpFailure>>>,
        requests: Mutex<Vec<(String, Option<Vec<u8>>)>>,
        healthy: AtomicBool,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                response: RwLock::new(None),
                requests: Mutex::new(Vec::new()),
                healthy: AtomicBool::new(true),
            }
        }

        fn set_response(&self, resp: Vec<u8>) {
            *self.response.write() = Some(Ok(resp));
        }

        fn set_failure(&self, failure: HttpFailure) {
            *self.response.write() = Some(Err(failure));
        }

        fn set_healthy(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
        }

        fn reply(&self) -> Result<Vec<u8>, HttpFailure> {
            self.response
                .read()
                .clone()
                .unwrap_or_else(|| Err(HttpFailure::Unreachable("No response set".into())))
        }
    }

    #[async_trait]
    impl HttpClient for TestClient {
        async fn get(&self, url: &str) -> Result<Vec<u8>, HttpFailure> {
            self.requests.lock().push((url.to_string(), None));
            self.reply()
        }

        async fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, HttpFailure> {
            self.requests.lock().push((url.to_string(), Some(body)));
            self.reply()
        }

        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn store_creation() {
        let store = HttpRemoteStore::new("https://api.example.com/", TestClient::new());
        assert_eq!(store.base_url(), "https://api.example.com");
        assert!(store.is_connected());
    }

    #[tokio::test]
    async fn store_unhealthy_client() {
        let client = TestClient::new();
        client.set_healthy(false);
        let store = HttpRemoteStore::new("https://api.example.com", client);

        assert!(!store.is_connected());
        assert!(matches!(store.fetch("site-1").await, Err(SyncError::NotConnected)));
    }

    #[tokio::test]
    async fn store_fetch() {
        let client = TestClient::new();
        client.set_response(
            FetchResponse::new(vec![FieldAnnotation::pre_filled("website")])
                .encode()
                .unwrap(),
        );
        let store = HttpRemoteStore::new("https://api.example.com", client);

        let annotations = store.fetch("site-1").await.unwrap();
        assert_eq!(annotations, vec![FieldAnnotation::pre_filled("website")]);

        let requests = store.client.requests.lock();
        assert_eq!(
            requests[0].0,
            "https://api.example.com/sites/site-1/field-confirmations"
        );
    }

    #[tokio::test]
    async fn store_bulk_update() {
        let confirmed = FieldAnnotation::pre_filled("website")
            .toggle(FlagName::Confirmed)
            .into_annotation();
        let client = TestClient::new();
        client.set_response(
            BulkUpdateResponse::new(vec![confirmed.clone()])
                .encode()
                .unwrap(),
        );
        let store = HttpRemoteStore::new("https://api.example.com", client);

        let response = store
            .bulk_update("site-1", vec![confirmed.clone()])
            .await
            .unwrap();
        assert_eq!(response.updated_count, 1);

        let requests = store.client.requests.lock();
        let (url, body) = &requests[0];
        assert!(url.ends_with("/sites/site-1/field-confirmations/bulk"));
        let sent = BulkUpdateRequest::decode(body.as_deref().unwrap()).unwrap();
        assert_eq!(sent.annotations, vec![confirmed]);
    }

    #[tokio::test]
    async fn store_failure_marks_disconnected() {
        let store = HttpRemoteStore::new("https://api.example.com", TestClient::new());

        let err = store.fetch("site-1").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!store.is_connected());
        assert_eq!(store.last_error().as_deref(), Some("No response set"));

        store
            .client
            .set_response(FetchResponse::default().encode().unwrap());
        store.fetch("site-1").await.unwrap();
        assert!(store.is_connected());
        assert!(store.last_error().is_none());
    }

    #[tokio::test]
    async fn store_accepts_bare_array_and_count_only_bodies() {
        let client = TestClient::new();
        client.set_response(fetch_body_bare(&[confirmed("website")]));
        let store = HttpRemoteStore::new("https://api.example.com", client);
        assert_eq!(store.fetch("site-1").await.unwrap(), vec![confirmed("website")]);

        store.client.set_response(fetch_body(&[]));
        assert!(store.fetch("site-1").await.unwrap().is_empty());

        store.client.set_response(bulk_count_body(2));
        let response = store
            .bulk_update("site-1", vec![confirmed("website"), confirmed("phone")])
            .await
            .unwrap();
        assert_eq!(response.updated_count, 2);
        assert!(response.annotations.is_empty());
    }

    #[tokio::test]
    async fn client_error_status_is_not_retryable() {
        let client = TestClient::new();
        client.set_failure(HttpFailure::status(400, "invalid request: Empty field name"));
        let store = HttpRemoteStore::new("https://api.example.com", client);

        let err = store.bulk_update("site-1", vec![]).await.unwrap_err();
        assert!(matches!(err, SyncError::Rejected { status: 400, .. }));
        assert!(!err.is_retryable());
        // The server answered, so the store still counts as connected.
        assert!(store.is_connected());
        assert_eq!(
            store.last_error().as_deref(),
            Some("status 400: invalid request: Empty field name")
        );
    }

    #[tokio::test]
    async fn server_error_status_is_retryable() {
        let client = TestClient::new();
        client.set_failure(HttpFailure::status(503, "unavailable"));
        let store = HttpRemoteStore::new("https://api.example.com", client);

        let err = store.fetch("site-1").await.unwrap_err();
        assert!(matches!(err, SyncError::ServerError(ref m) if m == "unavailable"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn store_rejects_garbage_body() {
        let client = TestClient::new();
        client.set_response(b"<html>502</html>".to_vec());
        let store = HttpRemoteStore::new("https://api.example.com", client);

        let err = store.bulk_update("site-1", vec![]).await.unwrap_err();
        assert!(matches!(err, SyncError::Protocol(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn loopback_forwards_status() {
        let client = LoopbackClient::new(NullServer);
        let err = client
            .get("memory://api/sites/s1/field-confirmations")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            HttpFailure::status(404, "/sites/s1/field-confirmations")
        );
    }

    #[test]
    fn loopback_path_extraction() {
        type Client = LoopbackClient<NullServer>;
        assert_eq!(
            Client::path_of("memory://api/sites/s1/field-confirmations"),
            "/sites/s1/field-confirmations"
        );
        assert_eq!(Client::path_of("/other"), "/other");
    }

    struct NullServer;

    impl LoopbackServer for NullServer {
        fn handle_get(&self, path: &str) -> Result<Vec<u8>, HttpFailure> {
            Err(HttpFailure::status(404, path))
        }

        fn handle_post(&self, path: &str, _body: &[u8]) -> Result<Vec<u8>, HttpFailure> {
            Err(HttpFailure::status(404, path))
        }
    }
}
