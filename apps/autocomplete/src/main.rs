mod config;
mod db;
mod errors;
mod llm_client;
mod routes;
mod state;
mod suggest;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::suggest::cache::{MemoryStore, RedisStore, SuggestionCache};
use crate::suggest::generator::{
    CuratedSuggestionGenerator, LlmSuggestionGenerator, ResilientGenerator, SuggestionGenerator,
};
use crate::suggest::lookup::{PgJobStore, StructuredLookup};
use crate::suggest::SuggestionService;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Autocomplete API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let lookup = StructuredLookup::for_job_store(Arc::new(PgJobStore::new(db)));

    // Initialize cache: Redis when configured, in-process LRU always
    let settings = config.suggestions.clone();
    let memory = MemoryStore::new(settings.memory_cache_capacity);
    let cache = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Redis client initialized");
            let redis = RedisStore::new(client, config.redis_timeout)
                .with_retry_after(config.redis_retry_after);
            SuggestionCache::new(Some(Arc::new(redis)), memory, settings.cache_ttl)
        }
        None => {
            warn!("REDIS_URL not set, using in-process cache only");
            SuggestionCache::local_only(memory, settings.cache_ttl)
        }
    };
    let cache = Arc::new(cache);

    // Initialize generator: LLM when a key is configured, curated lists otherwise
    let primary: Option<Arc<dyn SuggestionGenerator>> = match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone(), config.llm_timeout)?;
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Some(Arc::new(LlmSuggestionGenerator::new(llm)))
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set, generative suggestions use curated lists");
            None
        }
    };
    let generator = Arc::new(ResilientGenerator::new(
        primary,
        Arc::new(CuratedSuggestionGenerator),
    ));

    info!(
        "Suggestion settings: ttl={}s short_circuit=(>={} results, <={} chars)",
        settings.cache_ttl.as_secs(),
        settings.short_circuit_min_results,
        settings.short_circuit_max_query_chars
    );

    let state = AppState {
        suggestions: Arc::new(SuggestionService::new(cache, lookup, generator, settings)),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
