//! Request handlers for annotation endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::AnnotationStore;
use confirmsync_protocol::{BulkUpdateRequest, BulkUpdateResponse, FetchResponse};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Annotation store (shared across all handlers).
    pub store: Arc<AnnotationStore>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, store: Arc<AnnotationStore>) -> Self {
        Self { config, store }
    }
}

/// Handler for annotation requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles a fetch of every annotation of a site.
    pub fn handle_fetch(&self, site_id: &str) -> ServerResult<FetchResponse> {
        validate_site_id(site_id)?;
        Ok(FetchResponse::new(self.context.store.fetch(site_id)))
    }

    /// Handles a bulk update.
    pub fn handle_bulk_update(
        &self,
        site_id: &str,
        request: BulkUpdateRequest,
    ) -> ServerResult<BulkUpdateResponse> {
        validate_site_id(site_id)?;

        let max = self.context.config.max_bulk_size;
        if request.annotations.len() > max as usize {
            return Err(ServerError::InvalidRequest(format!(
                "Too many annotations: {} > {}",
                request.annotations.len(),
                max
            )));
        }

        let mut seen = HashSet::new();
        for annotation in &request.annotations {
            if annotation.field_name.trim().is_empty() {
                return Err(ServerError::InvalidRequest("Empty field name".into()));
            }
            if !seen.insert(annotation.field_name.as_str()) {
                return Err(ServerError::InvalidRequest(format!(
                    "Duplicate field in batch: {}",
                    annotation.field_name
                )));
            }
        }

        let stored = self.context.store.upsert(
            site_id,
            request.annotations,
            self.context.config.allow_pre_filled_reset,
        );
        debug!(site_id, count = stored.len(), "bulk update stored");
        Ok(BulkUpdateResponse::new(stored))
    }
}

fn validate_site_id(site_id: &str) -> ServerResult<()> {
    if site_id.trim().is_empty() {
        return Err(ServerError::InvalidRequest("Empty site id".into()));
    }
    Ok(())
}
