//! Annotation server and path routing.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use crate::store::AnnotationStore;
use confirmsync_protocol::{
    BulkUpdateRequest, BulkUpdateResponse, FetchResponse, ProtocolResult,
};
use std::sync::Arc;

const SITES_PREFIX: &str = "/sites/";
const ANNOTATIONS_SEGMENT: &str = "field-confirmations";

/// A parsed request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/sites/{site_id}/field-confirmations`
    Annotations {
        /// Site the request targets.
        site_id: String,
    },
    /// `/sites/{site_id}/field-confirmations/bulk`
    BulkUpdate {
        /// Site the request targets.
        site_id: String,
    },
}

impl Route {
    /// Parses a request path, ignoring any query string.
    pub fn parse(path: &str) -> Option<Route> {
        let path = path.split('?').next().unwrap_or(path);
        let rest = path.strip_prefix(SITES_PREFIX)?;
        let mut segments = rest.trim_end_matches('/').split('/');

        let site_id = segments.next().filter(|s| !s.is_empty())?.to_string();
        if segments.next()? != ANNOTATIONS_SEGMENT {
            return None;
        }
        match (segments.next(), segments.next()) {
            (None, _) => Some(Route::Annotations { site_id }),
            (Some("bulk"), None) => Some(Route::BulkUpdate { site_id }),
            _ => None,
        }
    }
}

/// The annotation server.
///
/// This server plays the remote store for ConfirmSync clients. It keeps the
/// authoritative annotations of every site and serves fetch and bulk update
/// requests.
///
/// # Example
///
/// ```
/// use confirmsync_server::{AnnotationServer, ServerConfig};
///
/// let server = AnnotationServer::new(ServerConfig::default());
///
/// // In a real application, you would expose HTTP endpoints
/// // that call server.handle_get() and server.handle_post()
/// let body = server.handle_get("/sites/site-1/field-confirmations").unwrap();
/// assert!(!body.is_empty());
/// ```
pub struct AnnotationServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl AnnotationServer {
    /// Creates a new annotation server.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, Arc::new(AnnotationStore::new()))
    }

    /// Creates an annotation server over an existing store.
    pub fn with_store(config: ServerConfig, store: Arc<AnnotationStore>) -> Self {
        let context = Arc::new(HandlerContext::new(config, store));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Handles a fetch of every annotation of a site.
    pub fn handle_fetch(&self, site_id: &str) -> Result<FetchResponse, String> {
        self.handler.handle_fetch(site_id).map_err(|e| e.to_string())
    }

    /// Handles a bulk update.
    pub fn handle_bulk_update(
        &self,
        site_id: &str,
        request: BulkUpdateRequest,
    ) -> Result<BulkUpdateResponse, String> {
        self.handler
            .handle_bulk_update(site_id, request)
            .map_err(|e| e.to_string())
    }

    /// Routes a GET request and returns the JSON response body.
    ///
    /// Errors map to a status code through [`ServerError::status_code`].
    pub fn handle_get(&self, path: &str) -> ServerResult<Vec<u8>> {
        match Route::parse(path) {
            Some(Route::Annotations { site_id }) => {
                encode_response(self.handler.handle_fetch(&site_id)?.encode())
            }
            _ => Err(ServerError::NotFound(format!("GET {}", path))),
        }
    }

    /// Routes a POST request and returns the JSON response body.
    pub fn handle_post(&self, path: &str, body: &[u8]) -> ServerResult<Vec<u8>> {
        match Route::parse(path) {
            Some(Route::BulkUpdate { site_id }) => {
                let request = BulkUpdateRequest::decode(body)?;
                encode_response(self.handler.handle_bulk_update(&site_id, request)?.encode())
            }
            _ => Err(ServerError::NotFound(format!("POST {}", path))),
        }
    }

    /// Returns the shared annotation store.
    pub fn store(&self) -> &Arc<AnnotationStore> {
        &self.context.store
    }

    /// Returns the number of annotations stored for a site.
    pub fn annotation_count(&self, site_id: &str) -> usize {
        self.context.store.annotation_count(site_id)
    }
}

/// A response that cannot be encoded is the server's fault, not the client's.
fn encode_response(encoded: ProtocolResult<Vec<u8>>) -> ServerResult<Vec<u8>> {
    encoded.map_err(|e| ServerError::Internal(format!("Failed to encode response: {}", e)))
}
