//! Suggestion orchestrator: cache, structured lookup and generator combined
//! into one ranked, deduplicated list.
//!
//! Flow per request (strictly in this order):
//! 1. fresh cache entry → return it (`structured`, 85)
//! 2. structured lookup
//! 3. plenty of structured matches for a short query → cache, queue a
//!    background enhancement, return (`structured`, 80)
//! 4. generator → merge structured-first (`merged` or `structured`, generator confidence)
//! 5. generator failed → structured only (`structured` 70, or `fallback` 30)
//! 6. non-empty results are cached before returning
//!
//! `get_suggestions` never fails.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::suggest::cache::{cache_key, SuggestionCache};
use crate::suggest::enhancer::{EnhancementJob, EnhancementQueue};
use crate::suggest::generator::SuggestionGenerator;
use crate::suggest::lookup::StructuredLookup;
use crate::suggest::merge::merge_tiers;
use crate::suggest::models::{SuggestionRequest, SuggestionResult, SuggestionSource};

const CACHE_HIT_CONFIDENCE: u8 = 85;
const SHORT_CIRCUIT_CONFIDENCE: u8 = 80;
const STRUCTURED_ONLY_CONFIDENCE: u8 = 70;
const FALLBACK_CONFIDENCE: u8 = 30;

/// Tunables of the orchestrator. Defaults mirror the production behaviour.
#[derive(Debug, Clone)]
pub struct SuggestionSettings {
    pub cache_ttl: Duration,
    pub memory_cache_capacity: usize,
    /// Structured matches needed before the generator is deferred.
    pub short_circuit_min_results: usize,
    /// Longest query (in characters) eligible for the short-circuit.
    pub short_circuit_max_query_chars: usize,
    pub enhancement_queue_capacity: usize,
    pub enhancement_concurrency: usize,
}

impl Default for SuggestionSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            memory_cache_capacity: 1000,
            short_circuit_min_results: 3,
            short_circuit_max_query_chars: 5,
            enhancement_queue_capacity: 64,
            enhancement_concurrency: 4,
        }
    }
}

pub struct SuggestionService {
    cache: Arc<SuggestionCache>,
    lookup: StructuredLookup,
    generator: Arc<dyn SuggestionGenerator>,
    enhancer: EnhancementQueue,
    settings: SuggestionSettings,
}

impl SuggestionService {
    /// Must be called inside a Tokio runtime: starts the enhancement supervisor.
    pub fn new(
        cache: Arc<SuggestionCache>,
        lookup: StructuredLookup,
        generator: Arc<dyn SuggestionGenerator>,
        settings: SuggestionSettings,
    ) -> Self {
        let (enhancer, _supervisor) = EnhancementQueue::start(
            generator.clone(),
            cache.clone(),
            settings.enhancement_queue_capacity,
            settings.enhancement_concurrency,
        );
        Self {
            cache,
            lookup,
            generator,
            enhancer,
            settings,
        }
    }

    #[cfg(test)]
    pub fn enhancer(&self) -> &EnhancementQueue {
        &self.enhancer
    }

    pub async fn get_suggestions(&self, request: &SuggestionRequest) -> SuggestionResult {
        let started = Instant::now();
        let field = request.field;
        let key = cache_key(field, &request.query, &request.context);

        if let Some(cached) = self.cache.get(&key).await {
            debug!("Cache hit for {key}");
            return finish(cached, SuggestionSource::Structured, CACHE_HIT_CONFIDENCE, started);
        }

        let structured = self
            .lookup
            .lookup(field, &request.query, &request.context)
            .await;

        if self.should_short_circuit(structured.len(), &request.query) {
            self.cache.set(&key, structured.clone()).await;
            self.enhancer.enqueue(EnhancementJob {
                key,
                field,
                query: request.query.clone(),
                context: request.context.clone(),
                structured: structured.clone(),
            });
            return finish(
                structured,
                SuggestionSource::Structured,
                SHORT_CIRCUIT_CONFIDENCE,
                started,
            );
        }

        let (suggestions, source, confidence) = match self
            .generator
            .generate(field, &request.query, &request.context)
            .await
        {
            Ok(generated) => {
                let merged = merge_tiers(&structured, &generated.suggestions, field.max_suggestions());
                if merged.suggestions.is_empty() {
                    (Vec::new(), SuggestionSource::Fallback, FALLBACK_CONFIDENCE)
                } else {
                    let source = if merged.added > 0 {
                        SuggestionSource::Merged
                    } else {
                        SuggestionSource::Structured
                    };
                    (merged.suggestions, source, generated.confidence.min(100))
                }
            }
            Err(e) => {
                warn!(
                    "Generator failed for {field} (query {:?}), using structured results: {e}",
                    request.query.chars().take(50).collect::<String>()
                );
                if structured.is_empty() {
                    (structured, SuggestionSource::Fallback, FALLBACK_CONFIDENCE)
                } else {
                    (structured, SuggestionSource::Structured, STRUCTURED_ONLY_CONFIDENCE)
                }
            }
        };

        if !suggestions.is_empty() {
            self.cache.set(&key, suggestions.clone()).await;
        }

        finish(suggestions, source, confidence, started)
    }

    fn should_short_circuit(&self, structured_count: usize, query: &str) -> bool {
        structured_count >= self.settings.short_circuit_min_results
            && query.trim().chars().count() <= self.settings.short_circuit_max_query_chars
    }
}

fn finish(
    suggestions: Vec<String>,
    source: SuggestionSource,
    confidence: u8,
    started: Instant,
) -> SuggestionResult {
    SuggestionResult {
        suggestions,
        source,
        confidence,
        latency_ms: started.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggest::cache::MemoryStore;
    use crate::suggest::enhancer::EnhancementOutcome;
    use crate::suggest::field::FieldKind;
    use crate::suggest::generator::CuratedSuggestionGenerator;
    use crate::suggest::testing::{
        FailingGenerator, FailingJobStore, FailingKv, FakeJobStore, FixedGenerator, JobRecord,
    };
    use serde_json::json;
    use std::collections::HashSet;

    fn service_with(
        store: Arc<dyn crate::suggest::lookup::JobRecordStore>,
        generator: Arc<dyn SuggestionGenerator>,
    ) -> SuggestionService {
        let settings = SuggestionSettings::default();
        let cache = Arc::new(SuggestionCache::local_only(
            MemoryStore::new(settings.memory_cache_capacity),
            settings.cache_ttl,
        ));
        SuggestionService::new(cache, StructuredLookup::for_job_store(store), generator, settings)
    }

    fn tech_companies() -> Arc<FakeJobStore> {
        Arc::new(FakeJobStore::new(vec![
            JobRecord::titled("Nurse").company("HealthTech Systems").applications(3),
            JobRecord::titled("Engineer").company("TechCorp Solutions").applications(90),
        ]))
    }

    fn three_en_titles() -> Arc<FakeJobStore> {
        Arc::new(FakeJobStore::new(vec![
            JobRecord::titled("Engineer").views(30),
            JobRecord::titled("Content Writer").views(20),
            JobRecord::titled("Gardener").views(10),
        ]))
    }

    async fn next_outcome(
        rx: &mut tokio::sync::broadcast::Receiver<EnhancementOutcome>,
    ) -> EnhancementOutcome {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("outcome within timeout")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_merges_structured_first() {
        let generator = Arc::new(FixedGenerator::new(&["techcorp solutions", "Technova"], 77));
        let service = service_with(tech_companies(), generator);

        let result = service
            .get_suggestions(&SuggestionRequest::new(FieldKind::Company, "tech"))
            .await;

        assert_eq!(
            result.suggestions,
            vec!["TechCorp Solutions", "HealthTech Systems", "Technova"]
        );
        assert_eq!(result.source, SuggestionSource::Merged);
        assert_eq!(result.confidence, 77);
    }

    #[tokio::test]
    async fn test_generator_adding_nothing_tags_structured() {
        let generator = Arc::new(FixedGenerator::new(&["HEALTHTECH SYSTEMS"], 60));
        let service = service_with(tech_companies(), generator);

        let result = service
            .get_suggestions(&SuggestionRequest::new(FieldKind::Company, "tech"))
            .await;

        assert_eq!(result.suggestions, vec!["TechCorp Solutions", "HealthTech Systems"]);
        assert_eq!(result.source, SuggestionSource::Structured);
        assert_eq!(result.confidence, 60);
    }

    #[tokio::test]
    async fn test_generator_failure_returns_exact_structured_list() {
        let store = tech_companies();
        let service = service_with(store.clone(), Arc::new(FailingGenerator::default()));
        let expected = StructuredLookup::for_job_store(store)
            .lookup(FieldKind::Company, "tech", &Default::default())
            .await;

        let result = service
            .get_suggestions(&SuggestionRequest::new(FieldKind::Company, "tech"))
            .await;

        assert_eq!(result.suggestions, expected);
        assert_eq!(result.source, SuggestionSource::Structured);
        assert_eq!(result.confidence, 70);
    }

    #[tokio::test]
    async fn test_total_failure_is_well_formed() {
        let service = service_with(Arc::new(FailingJobStore), Arc::new(FailingGenerator::default()));

        let result = service
            .get_suggestions(&SuggestionRequest::new(FieldKind::Skills, "rust"))
            .await;

        assert!(result.suggestions.is_empty());
        assert_eq!(result.source, SuggestionSource::Fallback);
        assert_eq!(result.confidence, 30);
    }

    #[tokio::test]
    async fn test_empty_generation_with_no_structured_is_fallback() {
        let service = service_with(
            Arc::new(FakeJobStore::new(vec![])),
            Arc::new(FixedGenerator::new(&[], 85)),
        );
        let result = service
            .get_suggestions(&SuggestionRequest::new(FieldKind::Project, "chat"))
            .await;

        assert!(result.suggestions.is_empty());
        assert_eq!(result.source, SuggestionSource::Fallback);
        assert_eq!(result.confidence, 30);
    }

    #[tokio::test]
    async fn test_empty_results_are_not_cached() {
        let generator = Arc::new(FailingGenerator::default());
        let service = service_with(Arc::new(FakeJobStore::new(vec![])), generator.clone());
        let request = SuggestionRequest::new(FieldKind::Summary, "seasoned");

        service.get_suggestions(&request).await;
        service.get_suggestions(&request).await;

        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let store = tech_companies();
        let generator = Arc::new(FixedGenerator::new(&["Technova"], 77));
        let service = service_with(store.clone(), generator.clone());
        let request = SuggestionRequest::new(FieldKind::Company, "techco");

        let first = service.get_suggestions(&request).await;
        let queries_after_first = store.query_count();
        let second = service.get_suggestions(&request).await;

        assert_eq!(first.suggestions, second.suggestions);
        assert_eq!(second.source, SuggestionSource::Structured);
        assert_eq!(second.confidence, 85);
        assert_eq!(store.query_count(), queries_after_first);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_key_ignores_query_case() {
        let generator = Arc::new(FixedGenerator::new(&["Technova"], 77));
        let service = service_with(tech_companies(), generator.clone());

        service
            .get_suggestions(&SuggestionRequest::new(FieldKind::Company, "TechCo"))
            .await;
        let second = service
            .get_suggestions(&SuggestionRequest::new(FieldKind::Company, "techco"))
            .await;

        assert_eq!(second.confidence, 85);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_short_circuit_then_background_upgrade() {
        let generator = Arc::new(FixedGenerator::new(&["engineer", "Entry Level Analyst"], 85));
        let service = service_with(three_en_titles(), generator.clone());
        let mut outcomes = service.enhancer().subscribe();
        let request = SuggestionRequest::new(FieldKind::JobTitle, "en");

        let first = service.get_suggestions(&request).await;
        assert_eq!(first.suggestions, vec!["Engineer", "Content Writer", "Gardener"]);
        assert_eq!(first.source, SuggestionSource::Structured);
        assert_eq!(first.confidence, 80);

        let outcome = next_outcome(&mut outcomes).await;
        assert!(matches!(outcome, EnhancementOutcome::Enhanced { added: 1, .. }));

        let second = service.get_suggestions(&request).await;
        assert_eq!(
            second.suggestions,
            vec!["Engineer", "Content Writer", "Gardener", "Entry Level Analyst"]
        );
        assert_eq!(second.source, SuggestionSource::Structured);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_background_failure_keeps_structured_cache() {
        let service = service_with(three_en_titles(), Arc::new(FailingGenerator::default()));
        let mut outcomes = service.enhancer().subscribe();
        let request = SuggestionRequest::new(FieldKind::JobTitle, "en");

        let first = service.get_suggestions(&request).await;
        assert!(matches!(
            next_outcome(&mut outcomes).await,
            EnhancementOutcome::Failed { .. }
        ));

        let second = service.get_suggestions(&request).await;
        assert_eq!(second.suggestions, first.suggestions);
        assert_eq!(second.confidence, 85);
    }

    #[tokio::test]
    async fn test_long_query_does_not_short_circuit() {
        let store = Arc::new(FakeJobStore::new(vec![
            JobRecord::titled("Senior Engineer"),
            JobRecord::titled("Staff Engineer"),
            JobRecord::titled("Lead Engineer"),
        ]));
        let generator = Arc::new(FixedGenerator::new(&["Principal Engineer"], 85));
        let service = service_with(store, generator.clone());

        let result = service
            .get_suggestions(&SuggestionRequest::new(FieldKind::JobTitle, "engineer"))
            .await;

        assert_eq!(generator.calls(), 1);
        assert_eq!(result.source, SuggestionSource::Merged);
        assert_eq!(result.suggestions.len(), 4);
    }

    #[tokio::test]
    async fn test_few_structured_results_do_not_short_circuit() {
        let generator = Arc::new(FixedGenerator::new(&["Technova"], 85));
        let service = service_with(tech_companies(), generator.clone());

        let result = service
            .get_suggestions(&SuggestionRequest::new(FieldKind::Company, "tech"))
            .await;

        assert_eq!(generator.calls(), 1);
        assert_eq!(result.source, SuggestionSource::Merged);
    }

    #[tokio::test]
    async fn test_configured_thresholds_are_honoured() {
        let settings = SuggestionSettings {
            short_circuit_min_results: 2,
            ..SuggestionSettings::default()
        };
        let cache = Arc::new(SuggestionCache::local_only(MemoryStore::new(10), settings.cache_ttl));
        let generator = Arc::new(FixedGenerator::new(&["x"], 85));
        let service = SuggestionService::new(
            cache,
            StructuredLookup::for_job_store(tech_companies()),
            generator,
            settings,
        );

        let result = service
            .get_suggestions(&SuggestionRequest::new(FieldKind::Company, "tech"))
            .await;
        assert_eq!(result.confidence, 80);
    }

    #[tokio::test]
    async fn test_caps_and_uniqueness_hold_for_every_field() {
        let many: Vec<String> = (0..30)
            .map(|i| format!("Suggestion {}", i % 15))
            .chain((0..30).map(|i| format!("SUGGESTION {i}")))
            .collect();
        let many: Vec<&str> = many.iter().map(String::as_str).collect();
        let generator = Arc::new(FixedGenerator::new(&many, 85));
        let service = service_with(Arc::new(FakeJobStore::new(vec![])), generator);

        for field in FieldKind::ALL {
            let result = service
                .get_suggestions(&SuggestionRequest::new(field, "suggestion words"))
                .await;
            assert!(result.suggestions.len() <= field.max_suggestions());
            let unique: HashSet<String> =
                result.suggestions.iter().map(|s| s.to_lowercase()).collect();
            assert_eq!(unique.len(), result.suggestions.len());
        }
    }

    #[tokio::test]
    async fn test_summary_capped_at_eight() {
        let generator = Arc::new(FixedGenerator::new(
            &["a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8", "a9", "a10"],
            85,
        ));
        let service = service_with(Arc::new(FakeJobStore::new(vec![])), generator);
        let result = service
            .get_suggestions(&SuggestionRequest::new(FieldKind::Summary, "experienced"))
            .await;
        assert_eq!(result.suggestions.len(), 8);
    }

    #[tokio::test]
    async fn test_remote_cache_outage_is_invisible() {
        let settings = SuggestionSettings::default();
        let cache = Arc::new(SuggestionCache::new(
            Some(Arc::new(FailingKv)),
            MemoryStore::new(10),
            settings.cache_ttl,
        ));
        let generator = Arc::new(FixedGenerator::new(&["Technova"], 85));
        let service = SuggestionService::new(
            cache,
            StructuredLookup::for_job_store(tech_companies()),
            generator.clone(),
            settings,
        );
        let request = SuggestionRequest::new(FieldKind::Company, "tech");

        service.get_suggestions(&request).await;
        let second = service.get_suggestions(&request).await;

        assert_eq!(second.confidence, 85);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_context_changes_the_cache_key() {
        let generator = Arc::new(FixedGenerator::new(&["Technova"], 85));
        let service = service_with(tech_companies(), generator.clone());
        let with_ctx = SuggestionRequest::new(FieldKind::Company, "tech")
            .with_context(json!({"industry": "Health"}).as_object().cloned().unwrap());

        service
            .get_suggestions(&SuggestionRequest::new(FieldKind::Company, "tech"))
            .await;
        service.get_suggestions(&with_ctx).await;

        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_curated_generator_end_to_end() {
        let service = service_with(
            Arc::new(FakeJobStore::new(vec![])),
            Arc::new(CuratedSuggestionGenerator),
        );
        let result = service
            .get_suggestions(&SuggestionRequest::new(FieldKind::Location, "india"))
            .await;
        assert_eq!(result.source, SuggestionSource::Merged);
        assert_eq!(result.confidence, 40);
        assert!(result.suggestions.iter().all(|s| s.contains("India")));
    }
}
