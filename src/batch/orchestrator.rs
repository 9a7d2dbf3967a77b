//! Batch Orchestrator
//!
//! Splits a unit of work into contiguous fixed-size batches and runs them in
//! order. Each batch is looked up in the result cache first; misses go through
//! the keyed mutex and the retrier, and the result is cached. A failed batch is
//! logged and skipped; the run still ends with `complete`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::batch::{ProgressSink, StreamEvent};
use crate::cache::SharedCache;
use crate::error::{RelayError, Result};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::sync::KeyedMutex;

const EMPTY_ITEMS: &str = "Items must be a non-empty array";

// == Batch Processor ==
/// The remote work behind one kind of batch run.
#[async_trait]
pub trait BatchProcessor: Send + Sync {
    type Item: Send + Sync;
    type Output: Clone + Send + Sync + 'static;

    /// Plural noun used in progress messages.
    fn label(&self) -> &'static str;

    /// Checks the whole input before any batch starts.
    fn validate(&self, _items: &[Self::Item]) -> Result<()> {
        Ok(())
    }

    /// Cache and mutex key of a batch.
    fn batch_key(&self, batch: &[Self::Item]) -> String;

    async fn process(&self, batch: &[Self::Item]) -> Result<Vec<Self::Output>>;
}

/// Outcome counts of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total_items: usize,
    pub total_batches: usize,
    pub processed_items: usize,
    pub cached_batches: usize,
    pub failed_batches: usize,
}

// == Batch Orchestrator ==
pub struct BatchOrchestrator<O> {
    cache: SharedCache<Vec<O>>,
    mutex: Arc<KeyedMutex>,
    retry: RetryPolicy,
    rate_limit_delay: Duration,
}

impl<O> BatchOrchestrator<O>
where
    O: Clone + Send + Sync + 'static,
{
    pub fn new(
        cache: SharedCache<Vec<O>>,
        mutex: Arc<KeyedMutex>,
        retry: RetryPolicy,
        rate_limit_delay: Duration,
    ) -> Self {
        Self {
            cache,
            mutex,
            retry,
            rate_limit_delay,
        }
    }

    pub fn cache(&self) -> &SharedCache<Vec<O>> {
        &self.cache
    }

    // == Run ==
    /// Processes `items` in batches of `batch_size`, reporting to `sink`.
    ///
    /// Input that cannot start a run (empty, zero batch size, failed
    /// validation) emits a single `error` event and returns the error. Once
    /// `started` is emitted the run always ends with `complete`.
    pub async fn run<P>(
        &self,
        processor: &P,
        items: &[P::Item],
        batch_size: usize,
        sink: &dyn ProgressSink<O>,
    ) -> Result<BatchSummary>
    where
        P: BatchProcessor<Output = O>,
    {
        if items.is_empty() {
            return reject(sink, RelayError::InvalidRequest(EMPTY_ITEMS.to_string())).await;
        }
        if batch_size == 0 {
            return reject(
                sink,
                RelayError::InvalidRequest("Batch size must be at least 1".to_string()),
            )
            .await;
        }
        if let Err(err) = processor.validate(items) {
            return reject(sink, err).await;
        }

        let batches: Vec<&[P::Item]> = items.chunks(batch_size).collect();
        let mut summary = BatchSummary {
            total_items: items.len(),
            total_batches: batches.len(),
            ..BatchSummary::default()
        };
        let label = processor.label();

        info!(
            total = summary.total_items,
            batches = summary.total_batches,
            batch_size,
            label,
            "batch run started"
        );
        sink.emit(StreamEvent::Started {
            total: summary.total_items,
        })
        .await;

        for (index, batch) in batches.iter().enumerate() {
            let batch_number = index + 1;
            let key = processor.batch_key(batch);

            let cached = self.cache.write().await.get(&key);
            if let Some(results) = cached {
                debug!(batch_number, key = %key, "batch served from cache");
                summary.cached_batches += 1;
                summary.processed_items += results.len();
                let message = format!(
                    "Processed {} of {} {} (cached)",
                    summary.processed_items, summary.total_items, label
                );
                self.emit_batch(sink, &summary, batch_number, message, results)
                    .await;
                continue;
            }

            match self.compute(processor, batch, &key).await {
                Ok(results) => {
                    summary.processed_items += results.len();
                    let message = format!(
                        "Processed {} of {} {}",
                        summary.processed_items, summary.total_items, label
                    );
                    self.emit_batch(sink, &summary, batch_number, message, results)
                        .await;
                }
                Err(err) => {
                    error!(
                        batch_number,
                        total_batches = summary.total_batches,
                        error = %err,
                        "batch failed, continuing"
                    );
                    summary.failed_batches += 1;
                    sink.emit(StreamEvent::Progress {
                        current: summary.processed_items,
                        total: summary.total_items,
                        message: format!(
                            "Batch {} of {} failed; processed {} of {} {}",
                            batch_number,
                            summary.total_batches,
                            summary.processed_items,
                            summary.total_items,
                            label
                        ),
                    })
                    .await;
                }
            }

            // Failed batches still spent provider calls, so they wait too
            if batch_number < summary.total_batches && !self.rate_limit_delay.is_zero() {
                debug!(
                    delay_ms = self.rate_limit_delay.as_millis() as u64,
                    "waiting before next batch"
                );
                tokio::time::sleep(self.rate_limit_delay).await;
            }
        }

        info!(
            processed = summary.processed_items,
            cached = summary.cached_batches,
            failed = summary.failed_batches,
            "batch run complete"
        );
        sink.emit(StreamEvent::Complete { success: true }).await;
        Ok(summary)
    }

    /// Cache miss path: one computation per key, retried, then cached.
    /// Empty results are cached too, so waiters never recompute them.
    async fn compute<P>(&self, processor: &P, batch: &[P::Item], key: &str) -> Result<Vec<O>>
    where
        P: BatchProcessor<Output = O>,
    {
        let cache = &self.cache;
        let retry = self.retry;

        self.mutex
            .with_mutex(
                key,
                move || async move {
                    let hit = cache.write().await.get(key);
                    hit
                },
                move || async move {
                    let results = retry_with_backoff(retry, move || processor.process(batch)).await?;
                    cache.write().await.set(key, results.clone(), None);
                    Ok(results)
                },
            )
            .await
    }

    async fn emit_batch(
        &self,
        sink: &dyn ProgressSink<O>,
        summary: &BatchSummary,
        batch_number: usize,
        message: String,
        results: Vec<O>,
    ) {
        sink.emit(StreamEvent::Progress {
            current: summary.processed_items,
            total: summary.total_items,
            message,
        })
        .await;
        sink.emit(StreamEvent::Batch {
            batch_number,
            total_batches: summary.total_batches,
            data: results,
        })
        .await;
    }
}

async fn reject<O>(sink: &dyn ProgressSink<O>, err: RelayError) -> Result<BatchSummary> {
    error!(error = %err, "batch run rejected");
    sink.emit(StreamEvent::Error {
        message: err.to_string(),
    })
    .await;
    Err(err)
}
