//! Background enhancement: upgrades a cached structured result with generated
//! suggestions after the interactive request has already returned.
//!
//! Jobs go through a bounded queue drained by one supervisor task. Each job runs
//! in its own task (at most `concurrency` at a time); its outcome, including a
//! panic, is logged and published on a broadcast channel that tests subscribe
//! to. No retries. The cache write races with any concurrent request for the
//! same key: last write wins.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::suggest::cache::SuggestionCache;
use crate::suggest::field::FieldKind;
use crate::suggest::generator::SuggestionGenerator;
use crate::suggest::merge::merge_tiers;
use crate::suggest::models::SuggestionContext;

const OUTCOME_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct EnhancementJob {
    pub key: String,
    pub field: FieldKind,
    pub query: String,
    pub context: SuggestionContext,
    /// Result already returned to the caller; stays first in the merged list.
    pub structured: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnhancementOutcome {
    Enhanced { key: String, added: usize },
    Failed { key: String, error: String },
}

#[cfg(test)]
impl EnhancementOutcome {
    pub fn key(&self) -> &str {
        match self {
            EnhancementOutcome::Enhanced { key, .. } | EnhancementOutcome::Failed { key, .. } => key,
        }
    }
}

/// Handle for submitting jobs. Cloning shares the same queue.
#[derive(Clone)]
pub struct EnhancementQueue {
    sender: mpsc::Sender<EnhancementJob>,
    #[cfg(test)]
    outcomes: broadcast::Sender<EnhancementOutcome>,
}

impl EnhancementQueue {
    /// Spawns the supervisor. It exits once every queue handle is dropped.
    pub fn start(
        generator: Arc<dyn SuggestionGenerator>,
        cache: Arc<SuggestionCache>,
        capacity: usize,
        concurrency: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (outcomes, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);

        let supervisor = tokio::spawn(supervise(
            receiver,
            generator,
            cache,
            Arc::new(Semaphore::new(concurrency.max(1))),
            outcomes.clone(),
        ));

        let queue = Self {
            sender,
            #[cfg(test)]
            outcomes,
        };
        (queue, supervisor)
    }

    /// Never waits. Returns `false` if the job was dropped because the queue is
    /// full or the supervisor has stopped.
    pub fn enqueue(&self, job: EnhancementJob) -> bool {
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!("Enhancement queue full, dropping job for {}", job.key);
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!("Enhancement queue closed, dropping job for {}", job.key);
                false
            }
        }
    }

    #[cfg(test)]
    pub fn subscribe(&self) -> broadcast::Receiver<EnhancementOutcome> {
        self.outcomes.subscribe()
    }
}

async fn supervise(
    mut receiver: mpsc::Receiver<EnhancementJob>,
    generator: Arc<dyn SuggestionGenerator>,
    cache: Arc<SuggestionCache>,
    permits: Arc<Semaphore>,
    outcomes: broadcast::Sender<EnhancementOutcome>,
) {
    while let Some(job) = receiver.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let generator = generator.clone();
        let cache = cache.clone();
        let outcomes = outcomes.clone();

        tokio::spawn(async move {
            let key = job.key.clone();
            let outcome = match tokio::spawn(run_job(job, generator, cache)).await {
                Ok(outcome) => outcome,
                Err(e) => EnhancementOutcome::Failed {
                    key,
                    error: format!("enhancement task aborted: {e}"),
                },
            };
            drop(permit);

            match &outcome {
                EnhancementOutcome::Enhanced { key, added } => {
                    debug!("Background enhancement added {added} suggestions for {key}")
                }
                EnhancementOutcome::Failed { key, error } => {
                    warn!("Background enhancement failed for {key}: {error}")
                }
            }
            // No subscribers is the normal case outside tests.
            let _ = outcomes.send(outcome);
        });
    }
    debug!("Enhancement queue closed, supervisor exiting");
}

async fn run_job(
    job: EnhancementJob,
    generator: Arc<dyn SuggestionGenerator>,
    cache: Arc<SuggestionCache>,
) -> EnhancementOutcome {
    match generator.generate(job.field, &job.query, &job.context).await {
        Ok(generated) => {
            let merged = merge_tiers(
                &job.structured,
                &generated.suggestions,
                job.field.max_suggestions(),
            );
            cache.set(&job.key, merged.suggestions).await;
            EnhancementOutcome::Enhanced {
                key: job.key,
                added: merged.added,
            }
        }
        Err(e) => EnhancementOutcome::Failed {
            key: job.key,
            error: e.to_string(),
        },
    }
}
