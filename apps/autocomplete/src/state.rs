use std::sync::Arc;

use crate::suggest::SuggestionService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the cache, the record store and the generator; see `suggest::service`.
    pub suggestions: Arc<SuggestionService>,
}
