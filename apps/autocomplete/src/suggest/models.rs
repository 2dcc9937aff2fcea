use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::suggest::field::FieldKind;

/// Auxiliary signals sent by the form (current job title, experience level,
/// industry, chosen skills). Opaque to the structured lookup.
pub type SuggestionContext = Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub field: FieldKind,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub context: SuggestionContext,
}

#[cfg(test)]
impl SuggestionRequest {
    pub fn new(field: FieldKind, query: impl Into<String>) -> Self {
        Self {
            field,
            query: query.into(),
            context: SuggestionContext::new(),
        }
    }

    pub fn with_context(mut self, context: SuggestionContext) -> Self {
        self.context = context;
        self
    }
}

/// Which tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    Structured,
    Merged,
    /// Nothing usable from any tier.
    #[serde(alias = "degraded")]
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionResult {
    pub suggestions: Vec<String>,
    pub source: SuggestionSource,
    pub confidence: u8,
    pub latency_ms: u64,
}

/// Output of a generative collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSuggestions {
    pub suggestions: Vec<String>,
    pub confidence: u8,
}

/// Value stored under a fingerprint key, in Redis (as JSON) or in process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub suggestions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self {
            key: key.into(),
            suggestions,
            created_at: Utc::now(),
        }
    }

    /// Lazy expiry: an entry older than `ttl` counts as absent.
    pub fn is_fresh(&self, ttl: std::time::Duration, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        match age.to_std() {
            Ok(age) => age < ttl,
            // created_at in the future (clock skew between writers)
            Err(_) => true,
        }
    }
}

/// Reads the first non-empty string under any of `keys`.
pub fn context_text<'a>(context: &'a SuggestionContext, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| context.get(*k).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Reads a list of strings under any of `keys`. Accepts a JSON array or a
/// comma-separated string.
pub fn context_list(context: &SuggestionContext, keys: &[&str]) -> Vec<String> {
    for key in keys {
        match context.get(*key) {
            Some(Value::Array(items)) => {
                return items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            Some(Value::String(s)) if !s.trim().is_empty() => {
                return s
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect();
            }
            _ => {}
        }
    }
    Vec::new()
}
