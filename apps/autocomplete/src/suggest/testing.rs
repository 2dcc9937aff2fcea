//! In-memory fakes for the record store, key-value store and generators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm_client::LlmError;
use crate::suggest::cache::{CacheError, KeyValueStore};
use crate::suggest::field::FieldKind;
use crate::suggest::generator::{GenerationError, SuggestionGenerator};
use crate::suggest::lookup::{JobRecordStore, LookupError};
use crate::suggest::models::{GeneratedSuggestions, SuggestionContext};

// ────────────────────────────────────────────────────────────────────────────
// Job records
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct JobRecord {
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub skills: Option<String>,
    pub is_active: bool,
    pub views: i64,
    pub applications_count: i64,
    /// Stand-in for `created_at`; larger is newer.
    pub posted: i64,
}

impl JobRecord {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            company: None,
            location: None,
            skills: None,
            is_active: true,
            views: 0,
            applications_count: 0,
            posted: 0,
        }
    }

    pub fn company(mut self, company: &str) -> Self {
        self.company = Some(company.to_string());
        self
    }

    pub fn location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn skills(mut self, skills: &str) -> Self {
        self.skills = Some(skills.to_string());
        self
    }

    pub fn views(mut self, views: i64) -> Self {
        self.views = views;
        self
    }

    pub fn applications(mut self, count: i64) -> Self {
        self.applications_count = count;
        self
    }

    pub fn posted(mut self, posted: i64) -> Self {
        self.posted = posted;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Mirrors the SQL of `PgJobStore`: active rows, case-insensitive containment,
/// grouped by the lowercased column (MIN spelling kept) and ordered by the max
/// of the rank column.
pub struct FakeJobStore {
    jobs: Vec<JobRecord>,
    queries: AtomicUsize,
}

impl FakeJobStore {
    pub fn new(jobs: Vec<JobRecord>) -> Self {
        Self {
            jobs,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn distinct_ranked(
        &self,
        needle: &str,
        limit: i64,
        column: impl Fn(&JobRecord) -> Option<&String>,
        rank: impl Fn(&JobRecord) -> i64,
    ) -> Vec<String> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let needle = needle.to_lowercase();

        // (group key, MIN spelling, MAX rank)
        let mut best: Vec<(String, String, i64)> = Vec::new();
        for job in self.jobs.iter().filter(|j| j.is_active) {
            let Some(value) = column(job) else { continue };
            let group = value.to_lowercase();
            if !group.contains(&needle) {
                continue;
            }
            match best.iter_mut().find(|(g, _, _)| *g == group) {
                Some((_, spelling, r)) => {
                    if value.as_str() < spelling.as_str() {
                        *spelling = value.clone();
                    }
                    *r = (*r).max(rank(job));
                }
                None => best.push((group, value.clone(), rank(job))),
            }
        }
        best.sort_by(|a, b| b.2.cmp(&a.2));
        best.into_iter()
            .take(limit as usize)
            .map(|(_, spelling, _)| spelling)
            .collect()
    }
}

#[async_trait]
impl JobRecordStore for FakeJobStore {
    async fn titles_by_views(&self, needle: &str, limit: i64) -> Result<Vec<String>, LookupError> {
        Ok(self.distinct_ranked(needle, limit, |j| Some(&j.title), |j| j.views))
    }

    async fn companies_by_applications(
        &self,
        needle: &str,
        limit: i64,
    ) -> Result<Vec<String>, LookupError> {
        Ok(self.distinct_ranked(needle, limit, |j| j.company.as_ref(), |j| j.applications_count))
    }

    async fn locations_by_recency(
        &self,
        needle: &str,
        limit: i64,
    ) -> Result<Vec<String>, LookupError> {
        Ok(self.distinct_ranked(needle, limit, |j| j.location.as_ref(), |j| j.posted))
    }

    async fn skills_texts(&self, needle: &str, limit: i64) -> Result<Vec<String>, LookupError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let needle = needle.to_lowercase();
        Ok(self
            .jobs
            .iter()
            .filter(|j| j.is_active)
            .filter_map(|j| j.skills.clone())
            .filter(|s| s.to_lowercase().contains(&needle))
            .take(limit as usize)
            .collect())
    }
}

/// Every query fails as if the database were unreachable.
pub struct FailingJobStore;

#[async_trait]
impl JobRecordStore for FailingJobStore {
    async fn titles_by_views(&self, _: &str, _: i64) -> Result<Vec<String>, LookupError> {
        Err(LookupError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn companies_by_applications(&self, _: &str, _: i64) -> Result<Vec<String>, LookupError> {
        Err(LookupError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn locations_by_recency(&self, _: &str, _: i64) -> Result<Vec<String>, LookupError> {
        Err(LookupError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn skills_texts(&self, _: &str, _: i64) -> Result<Vec<String>, LookupError> {
        Err(LookupError::Database(sqlx::Error::PoolClosed))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Key-value stores
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryKv {
    values: Mutex<HashMap<String, (String, Option<u64>)>>,
}

impl InMemoryKv {
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), None));
    }

    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        self.values.lock().unwrap().get(key).and_then(|(_, ttl)| *ttl)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.values.lock().unwrap().get(key).map(|(v, _)| v.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), Some(ttl_secs)));
        Ok(())
    }
}

/// A store that always times out.
pub struct FailingKv;

#[async_trait]
impl KeyValueStore for FailingKv {
    async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Timeout(Duration::from_millis(250)))
    }

    async fn set_ex(&self, _: &str, _: &str, _: u64) -> Result<(), CacheError> {
        Err(CacheError::Timeout(Duration::from_millis(250)))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generators
// ────────────────────────────────────────────────────────────────────────────

pub struct FixedGenerator {
    suggestions: Vec<String>,
    confidence: u8,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FixedGenerator {
    pub fn new(suggestions: &[&str], confidence: u8) -> Self {
        Self {
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
            confidence,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SuggestionGenerator for FixedGenerator {
    async fn generate(
        &self,
        _: FieldKind,
        _: &str,
        _: &SuggestionContext,
    ) -> Result<GeneratedSuggestions, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(GeneratedSuggestions {
            suggestions: self.suggestions.clone(),
            confidence: self.confidence,
        })
    }
}

#[derive(Default)]
pub struct FailingGenerator {
    calls: AtomicUsize,
}

impl FailingGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SuggestionGenerator for FailingGenerator {
    async fn generate(
        &self,
        _: FieldKind,
        _: &str,
        _: &SuggestionContext,
    ) -> Result<GeneratedSuggestions, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GenerationError::Llm(LlmError::Api {
            status: 529,
            message: "overloaded".to_string(),
        }))
    }
}

pub struct PanickingGenerator;

#[async_trait]
impl SuggestionGenerator for PanickingGenerator {
    async fn generate(
        &self,
        field: FieldKind,
        _: &str,
        _: &SuggestionContext,
    ) -> Result<GeneratedSuggestions, GenerationError> {
        panic!("generator bug for {field}")
    }
}
