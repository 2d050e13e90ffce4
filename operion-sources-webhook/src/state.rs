//! Shared state handed to every axum handler.

use std::sync::Arc;

use operion_sources_core::callback::SourceEventCallback;
use operion_sources_core::repository::WebhookSourceRepository;
use operion_sources_core::validation::SchemaValidator;

pub struct WebhookServerState {
    pub repository: Arc<dyn WebhookSourceRepository>,
    pub validator: Arc<SchemaValidator>,
    pub callback: SourceEventCallback,
    /// Body cap in bytes, configurable; defaults to 1 MiB.
    pub max_body_bytes: usize,
}

impl WebhookServerState {
    pub fn new(
        repository: Arc<dyn WebhookSourceRepository>,
        validator: Arc<SchemaValidator>,
        callback: SourceEventCallback,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            repository,
            validator,
            callback,
            max_body_bytes,
        }
    }
}
