//! End-to-end scenario 4: 25 chunks, batch_size=10, sub-batch #2 fails ->
//! {added=20, failed=5}, chunks 1-10 and 21-25 reach the store.

use async_trait::async_trait;
use chrono::Utc;
use chunk_materialize::config::WriterConfig;
use chunk_materialize::model::ChunkRecord;
use chunk_materialize::writer::{BatchWriter, ChunkStore};
use chunk_materialize::PipelineError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

struct RecordingStore {
    calls: AtomicUsize,
    persisted: Mutex<Vec<String>>,
}

#[async_trait]
impl ChunkStore for RecordingStore {
    async fn insert_batch(
        &self,
        _dataset_id: &str,
        _document_id: &str,
        records: &[ChunkRecord],
    ) -> Result<(), PipelineError> {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
        if call_index == 1 {
            return Err(PipelineError::TransientRemote {
                endpoint: "chunk-store".into(),
                detail: "simulated outage".into(),
            });
        }
        self.persisted
            .lock()
            .unwrap()
            .extend(records.iter().map(|r| r.id.clone()));
        Ok(())
    }
}

fn sample_records(n: usize) -> Vec<ChunkRecord> {
    (0..n)
        .map(|i| ChunkRecord {
            id: format!("chunk-{i}"),
            doc_id: "doc1".into(),
            dataset_id: "ds1".into(),
            tenant_id: "t1".into(),
            content: format!("content {i}"),
            content_tokens_coarse: vec![],
            content_tokens_fine: vec![],
            keywords: vec![],
            keyword_tokens: vec![],
            questions: vec![],
            question_tokens: vec![],
            positions: None,
            top_of_first_position: None,
            page_numbers: vec![],
            vector_field_name: "q_2_vec".into(),
            vector: vec![0.0, 0.0],
            doc_name: "doc.md".into(),
            created_at: Utc::now(),
            created_ts: 0,
        })
        .collect()
}

#[tokio::test]
async fn sub_batch_two_failure_leaves_remaining_batches_intact() {
    let store = RecordingStore {
        calls: AtomicUsize::new(0),
        persisted: Mutex::new(Vec::new()),
    };
    let config = WriterConfig {
        sub_batch_size: Some(10),
        max_retries: 0,
        backoff_base_ms: 1,
        backoff_cap_ms: 1,
    };
    let writer = BatchWriter::new(&store, config);
    let outcome = writer.write("ds1", "doc1", sample_records(25)).await;

    assert_eq!(outcome.added_count, 20);
    assert_eq!(outcome.failed_count, 5);
    assert_eq!(outcome.processing_errors.len(), 1);
    assert!(outcome.processing_errors[0].starts_with("Batch 2 failed:"));

    let persisted = store.persisted.lock().unwrap();
    for i in 0..10 {
        assert!(persisted.contains(&format!("chunk-{i}")));
    }
    for i in 20..25 {
        assert!(persisted.contains(&format!("chunk-{i}")));
    }
    for i in 10..20 {
        assert!(!persisted.contains(&format!("chunk-{i}")));
    }
}
