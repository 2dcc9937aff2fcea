// Resume autocomplete: cache → structured lookup → generator, merged per field.
// All model calls go through llm_client via `LlmSuggestionGenerator`.

pub mod cache;
pub mod enhancer;
pub mod field;
pub mod generator;
pub mod handlers;
pub mod lookup;
pub mod merge;
pub mod models;
pub mod prompts;
pub mod service;

#[cfg(test)]
pub mod testing;

pub use service::{SuggestionService, SuggestionSettings};
