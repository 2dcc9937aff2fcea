//! Structured lookup: fast, bounded matches against existing job records.
//!
//! One `FieldLookup` strategy per field kind, registered in `StructuredLookup`.
//! The registry owns the shared contract: queries under two characters never
//! reach the record store, failures become empty results, and output is at
//! most eight case-insensitively distinct strings in store ranking order.
//!
//! Records are read from the `jobs` table:
//! `title, company, location, skills, is_active, views, applications_count, created_at`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, warn};

use crate::suggest::field::FieldKind;
use crate::suggest::merge::dedup_case_insensitive;
use crate::suggest::models::SuggestionContext;

/// Maximum number of structured matches per request.
pub const MAX_STRUCTURED_RESULTS: usize = 8;
/// Queries shorter than this (in characters, after trimming) skip the store.
pub const MIN_QUERY_CHARS: usize = 2;
/// Rows scanned for skills; each row may hold many skills.
const SKILLS_ROW_LIMIT: i64 = 20;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

// ────────────────────────────────────────────────────────────────────────────
// Record store
// ────────────────────────────────────────────────────────────────────────────

/// Read-only queries over active job records. `needle` is the raw user text;
/// implementations match it case-insensitively as a substring.
#[async_trait]
pub trait JobRecordStore: Send + Sync {
    /// Case-insensitively distinct titles, most viewed first.
    async fn titles_by_views(&self, needle: &str, limit: i64) -> Result<Vec<String>, LookupError>;
    /// Case-insensitively distinct company names, most applied-to first.
    async fn companies_by_applications(
        &self,
        needle: &str,
        limit: i64,
    ) -> Result<Vec<String>, LookupError>;
    /// Case-insensitively distinct locations, most recently posted first.
    async fn locations_by_recency(
        &self,
        needle: &str,
        limit: i64,
    ) -> Result<Vec<String>, LookupError>;
    /// Raw `skills` column values of rows whose skills text contains the needle.
    async fn skills_texts(&self, needle: &str, limit: i64) -> Result<Vec<String>, LookupError>;
}

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Builds an ILIKE containment pattern, escaping LIKE metacharacters.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// Distinct values are grouped case-insensitively; the representative spelling
// is MIN(column), ranked by the best row of its group.
const TITLES_BY_VIEWS_SQL: &str = r#"
    SELECT MIN(title) FROM jobs
    WHERE is_active AND title ILIKE $1
    GROUP BY lower(title)
    ORDER BY MAX(views) DESC
    LIMIT $2
"#;

const COMPANIES_BY_APPLICATIONS_SQL: &str = r#"
    SELECT MIN(company) FROM jobs
    WHERE is_active AND company IS NOT NULL AND company ILIKE $1
    GROUP BY lower(company)
    ORDER BY MAX(applications_count) DESC
    LIMIT $2
"#;

const LOCATIONS_BY_RECENCY_SQL: &str = r#"
    SELECT MIN(location) FROM jobs
    WHERE is_active AND location IS NOT NULL AND location ILIKE $1
    GROUP BY lower(location)
    ORDER BY MAX(created_at) DESC
    LIMIT $2
"#;

impl PgJobStore {
    async fn distinct_ranked(
        &self,
        sql: &str,
        needle: &str,
        limit: i64,
    ) -> Result<Vec<String>, LookupError> {
        let rows = sqlx::query_scalar::<_, String>(sql)
            .bind(contains_pattern(needle))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl JobRecordStore for PgJobStore {
    async fn titles_by_views(&self, needle: &str, limit: i64) -> Result<Vec<String>, LookupError> {
        self.distinct_ranked(TITLES_BY_VIEWS_SQL, needle, limit).await
    }

    async fn companies_by_applications(
        &self,
        needle: &str,
        limit: i64,
    ) -> Result<Vec<String>, LookupError> {
        self.distinct_ranked(COMPANIES_BY_APPLICATIONS_SQL, needle, limit)
            .await
    }

    async fn locations_by_recency(
        &self,
        needle: &str,
        limit: i64,
    ) -> Result<Vec<String>, LookupError> {
        self.distinct_ranked(LOCATIONS_BY_RECENCY_SQL, needle, limit)
            .await
    }

    async fn skills_texts(&self, needle: &str, limit: i64) -> Result<Vec<String>, LookupError> {
        let rows = sqlx::query_scalar::<_, String>(
            r#"
            SELECT skills FROM jobs
            WHERE is_active AND skills IS NOT NULL AND skills ILIKE $1
            LIMIT $2
            "#,
        )
        .bind(contains_pattern(needle))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Skills column encoding
// ────────────────────────────────────────────────────────────────────────────

/// Stored skills come in two encodings: a JSON array (`["Java","Go"]`) or a
/// comma-separated string (`Java, Go`). Known data-quality issue in the jobs
/// table; both must be read.
#[derive(Debug, Clone, PartialEq)]
pub enum SkillsField {
    JsonArray(Vec<String>),
    CommaSeparated(Vec<String>),
}

impl SkillsField {
    pub fn into_skills(self) -> Vec<String> {
        match self {
            SkillsField::JsonArray(skills) | SkillsField::CommaSeparated(skills) => skills,
        }
    }
}

/// Tries JSON first; anything that is not a JSON array is split on commas.
/// Non-string array items are skipped.
pub fn parse_skills_field(raw: &str) -> SkillsField {
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) {
        return SkillsField::JsonArray(
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        );
    }
    SkillsField::CommaSeparated(
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Strategies
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait FieldLookup: Send + Sync {
    async fn lookup(
        &self,
        query: &str,
        context: &SuggestionContext,
    ) -> Result<Vec<String>, LookupError>;
}

pub struct JobTitleLookup(pub Arc<dyn JobRecordStore>);

#[async_trait]
impl FieldLookup for JobTitleLookup {
    async fn lookup(&self, query: &str, _: &SuggestionContext) -> Result<Vec<String>, LookupError> {
        self.0
            .titles_by_views(query, MAX_STRUCTURED_RESULTS as i64)
            .await
    }
}

pub struct CompanyLookup(pub Arc<dyn JobRecordStore>);

#[async_trait]
impl FieldLookup for CompanyLookup {
    async fn lookup(&self, query: &str, _: &SuggestionContext) -> Result<Vec<String>, LookupError> {
        self.0
            .companies_by_applications(query, MAX_STRUCTURED_RESULTS as i64)
            .await
    }
}

pub struct LocationLookup(pub Arc<dyn JobRecordStore>);

#[async_trait]
impl FieldLookup for LocationLookup {
    async fn lookup(&self, query: &str, _: &SuggestionContext) -> Result<Vec<String>, LookupError> {
        self.0
            .locations_by_recency(query, MAX_STRUCTURED_RESULTS as i64)
            .await
    }
}

pub struct SkillsLookup(pub Arc<dyn JobRecordStore>);

#[async_trait]
impl FieldLookup for SkillsLookup {
    async fn lookup(&self, query: &str, _: &SuggestionContext) -> Result<Vec<String>, LookupError> {
        let needle = query.to_lowercase();
        let rows = self.0.skills_texts(query, SKILLS_ROW_LIMIT).await?;

        let matching = rows
            .iter()
            .flat_map(|raw| parse_skills_field(raw).into_skills())
            .filter(|skill| skill.to_lowercase().contains(&needle));

        Ok(dedup_case_insensitive(matching, MAX_STRUCTURED_RESULTS))
    }
}

/// Summary and project fields have no structured analogue in the job records.
pub struct NoStructuredData;

#[async_trait]
impl FieldLookup for NoStructuredData {
    async fn lookup(&self, _: &str, _: &SuggestionContext) -> Result<Vec<String>, LookupError> {
        Ok(Vec::new())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Registry
// ────────────────────────────────────────────────────────────────────────────

pub struct StructuredLookup {
    strategies: HashMap<FieldKind, Arc<dyn FieldLookup>>,
}

impl StructuredLookup {
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Registers the job-record strategy for every field kind.
    pub fn for_job_store(store: Arc<dyn JobRecordStore>) -> Self {
        let mut lookup = Self::empty();
        lookup.register(FieldKind::JobTitle, Arc::new(JobTitleLookup(store.clone())));
        lookup.register(FieldKind::Company, Arc::new(CompanyLookup(store.clone())));
        lookup.register(FieldKind::Location, Arc::new(LocationLookup(store.clone())));
        lookup.register(FieldKind::Skills, Arc::new(SkillsLookup(store)));
        lookup.register(FieldKind::Summary, Arc::new(NoStructuredData));
        lookup.register(FieldKind::Project, Arc::new(NoStructuredData));
        lookup
    }

    pub fn register(&mut self, field: FieldKind, strategy: Arc<dyn FieldLookup>) {
        self.strategies.insert(field, strategy);
    }

    /// Never fails: errors are logged and yield an empty list.
    pub async fn lookup(
        &self,
        field: FieldKind,
        query: &str,
        context: &SuggestionContext,
    ) -> Vec<String> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Vec::new();
        }

        let Some(strategy) = self.strategies.get(&field) else {
            debug!("No structured lookup registered for {field}");
            return Vec::new();
        };

        match strategy.lookup(query, context).await {
            Ok(found) => dedup_case_insensitive(found, MAX_STRUCTURED_RESULTS),
            Err(e) => {
                warn!("Structured lookup failed for {field}: {e}");
                Vec::new()
            }
        }
    }
}
