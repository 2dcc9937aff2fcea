//! Axum route handlers for the Autocomplete API.

use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::state::AppState;
use crate::suggest::models::{SuggestionRequest, SuggestionResult};

/// Longer inputs are pasted text, not something being typed.
const MAX_QUERY_CHARS: usize = 500;

/// POST /api/v1/autocomplete
///
/// Returns ranked suggestions for one resume-builder field. Dependency
/// failures degrade the result; they never produce an error response.
pub async fn handle_autocomplete(
    State(state): State<AppState>,
    Json(request): Json<SuggestionRequest>,
) -> Result<Json<SuggestionResult>, AppError> {
    if request.query.chars().count() > MAX_QUERY_CHARS {
        return Err(AppError::Validation(format!(
            "query cannot exceed {MAX_QUERY_CHARS} characters"
        )));
    }

    Ok(Json(state.suggestions.get_suggestions(&request).await))
}
