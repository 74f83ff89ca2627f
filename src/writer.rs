//! BatchWriter: inserts chunk records into the store in fixed-size sub-batches,
//! retrying transient failures with exponential backoff and full jitter (spec §4.7).

use crate::config::WriterConfig;
use crate::error::PipelineError;
use crate::model::ChunkRecord;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// The store-side sink the writer inserts into; the real vector/search index is
/// treated as an insert-only collaborator (spec §1 Out of scope).
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn insert_batch(
        &self,
        dataset_id: &str,
        document_id: &str,
        records: &[ChunkRecord],
    ) -> Result<(), PipelineError>;
}

#[derive(Debug, Clone, Default)]
pub struct WriteOutcome {
    pub added_count: usize,
    pub failed_count: usize,
    pub processing_errors: Vec<String>,
    pub chunks_returned: Vec<ChunkRecord>,
}

impl WriteOutcome {
    pub fn total_requested(&self) -> usize {
        self.added_count + self.failed_count
    }
}

pub struct BatchWriter<'a> {
    store: &'a dyn ChunkStore,
    config: WriterConfig,
}

impl<'a> BatchWriter<'a> {
    pub fn new(store: &'a dyn ChunkStore, config: WriterConfig) -> Self {
        Self { store, config }
    }

    /// Dynamic sub-batch sizing (spec §4.7 ADDED note): `≤10` → 5, `≤50` → 10, else 20,
    /// used when the caller has not pinned `sub_batch_size`.
    fn sub_batch_size(&self, total: usize) -> usize {
        self.config.sub_batch_size.unwrap_or_else(|| {
            if total <= 10 {
                5
            } else if total <= 50 {
                10
            } else {
                20
            }
        })
    }

    pub async fn write(
        &self,
        dataset_id: &str,
        document_id: &str,
        records: Vec<ChunkRecord>,
    ) -> WriteOutcome {
        let batch_size = self.sub_batch_size(records.len()).max(1);
        let mut outcome = WriteOutcome::default();

        for (sub_batch_index, sub_batch) in records.chunks(batch_size).enumerate() {
            match self
                .insert_with_retry(dataset_id, document_id, sub_batch, sub_batch_index)
                .await
            {
                Ok(()) => {
                    outcome.added_count += sub_batch.len();
                    outcome.chunks_returned.extend_from_slice(sub_batch);
                }
                Err(e) => {
                    outcome.failed_count += sub_batch.len();
                    outcome
                        .processing_errors
                        .push(format!("Batch {} failed: {e}", sub_batch_index + 1));
                }
            }
        }

        outcome
    }

    async fn insert_with_retry(
        &self,
        dataset_id: &str,
        document_id: &str,
        sub_batch: &[ChunkRecord],
        sub_batch_index: usize,
    ) -> Result<(), PipelineError> {
        let mut attempt = 0u32;

        loop {
            match self.store.insert_batch(dataset_id, document_id, sub_batch).await {
                Ok(()) => {
                    if attempt > 0 {
                        info!(sub_batch_index, attempt, "sub-batch insert succeeded after retry");
                    }
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = backoff_delay(attempt, self.config.backoff_base_ms, self.config.backoff_cap_ms);
                    warn!(
                        sub_batch_index,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying sub-batch insert after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(PipelineError::StoreFailure {
                        sub_batch_index,
                        detail: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Exponential backoff with full jitter: `delay ~ Uniform(0, min(cap, base * 2^attempt))`.
fn backoff_delay(attempt: u32, base_ms: u64, cap_ms: u64) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << attempt.min(16));
    let upper = exp.min(cap_ms).max(1);
    let jittered = rand::thread_rng().gen_range(0..=upper);
    Duration::from_millis(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FlakyStore {
        fail_sub_batches: Vec<usize>,
        calls: AtomicUsize,
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ChunkStore for FlakyStore {
        async fn insert_batch(
            &self,
            _dataset_id: &str,
            _document_id: &str,
            records: &[ChunkRecord],
        ) -> Result<(), PipelineError> {
            let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(records.len());
            if self.fail_sub_batches.contains(&call_index) {
                return Err(PipelineError::TransientRemote {
                    endpoint: "chunk-store".into(),
                    detail: "simulated failure".into(),
                });
            }
            Ok(())
        }
    }

    fn sample_records(n: usize) -> Vec<ChunkRecord> {
        (0..n)
            .map(|i| ChunkRecord {
                id: format!("id{i}"),
                doc_id: "doc1".into(),
                dataset_id: "ds1".into(),
                tenant_id: "t1".into(),
                content: format!("chunk {i}"),
                content_tokens_coarse: vec![],
                content_tokens_fine: vec![],
                keywords: vec![],
                keyword_tokens: vec![],
                questions: vec![],
                question_tokens: vec![],
                positions: None,
                top_of_first_position: None,
                page_numbers: vec![],
                vector_field_name: "q_4_vec".into(),
                vector: vec![0.0; 4],
                doc_name: "doc.md".into(),
                created_at: chrono::Utc::now(),
                created_ts: 0,
            })
            .collect()
    }

    #[tokio::test]
    async fn added_plus_failed_equals_total_requested() {
        let store = FlakyStore {
            fail_sub_batches: vec![1],
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        };
        let config = WriterConfig {
            sub_batch_size: Some(10),
            max_retries: 0,
            backoff_base_ms: 1,
            backoff_cap_ms: 2,
        };
        let writer = BatchWriter::new(&store, config);
        let outcome = writer.write("ds1", "doc1", sample_records(25)).await;

        assert_eq!(outcome.added_count, 20);
        assert_eq!(outcome.failed_count, 5);
        assert_eq!(outcome.total_requested(), 25);
        assert_eq!(outcome.processing_errors, vec!["Batch 2 failed: store sub-batch 1 failed: transient remote error calling chunk-store: simulated failure"]);
    }

    #[tokio::test]
    async fn retries_transient_failures_up_to_max_retries() {
        let store = FlakyStore {
            fail_sub_batches: vec![0],
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        };
        let config = WriterConfig {
            sub_batch_size: Some(5),
            max_retries: 2,
            backoff_base_ms: 1,
            backoff_cap_ms: 2,
        };
        let writer = BatchWriter::new(&store, config);
        let outcome = writer.write("ds1", "doc1", sample_records(5)).await;

        assert_eq!(outcome.added_count, 5);
        assert_eq!(outcome.failed_count, 0);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dynamic_sub_batch_size_matches_spec_thresholds() {
        struct NoopStore;
        #[async_trait]
        impl ChunkStore for NoopStore {
            async fn insert_batch(
                &self,
                _: &str,
                _: &str,
                _: &[ChunkRecord],
            ) -> Result<(), PipelineError> {
                Ok(())
            }
        }
        let store = NoopStore;
        let writer = BatchWriter::new(&store, WriterConfig::default());
        assert_eq!(writer.sub_batch_size(10), 5);
        assert_eq!(writer.sub_batch_size(50), 10);
        assert_eq!(writer.sub_batch_size(51), 20);
    }
}
