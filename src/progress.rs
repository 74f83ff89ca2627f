//! ProgressReporter: writes stage/progress updates back to the document store.
//! Best-effort — a failed write is logged and swallowed, never propagated (spec §4.9).

use crate::model::{ProgressUpdate, RunState};
use async_trait::async_trait;
use tracing::warn;

/// The document-store side of progress reporting; separated from `MetadataStoreClient`
/// so the orchestrator can report progress without depending on the full client.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn write_progress(&self, update: &ProgressUpdate) -> Result<(), anyhow::Error>;
}

pub struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self { sink }
    }

    /// Reports a stage transition. Never returns an error to the caller; a write
    /// failure is logged at `warn` and otherwise ignored so a flaky metadata store
    /// cannot fail an otherwise-successful document.
    pub async fn report(
        &self,
        doc_id: &str,
        progress: f32,
        progress_msg: impl Into<String>,
        status: impl Into<String>,
        run: RunState,
        chunk_num: u32,
        process_duration: f64,
    ) {
        let update = ProgressUpdate {
            doc_id: doc_id.to_string(),
            progress: progress.clamp(0.0, 1.0),
            progress_msg: progress_msg.into(),
            status: status.into(),
            run,
            chunk_num,
            process_duration,
        };

        if let Err(e) = self.sink.write_progress(&update).await {
            warn!(doc_id, error = %e, "progress update failed to persist, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct RecordingSink {
        received: Mutex<Vec<ProgressUpdate>>,
        fail_count: AtomicUsize,
    }

    #[async_trait]
    impl ProgressSink for RecordingSink {
        async fn write_progress(&self, update: &ProgressUpdate) -> Result<(), anyhow::Error> {
            if self.fail_count.load(Ordering::SeqCst) > 0 {
                self.fail_count.fetch_sub(1, Ordering::SeqCst);
                return Err(anyhow::anyhow!("simulated store outage"));
            }
            self.received.lock().unwrap().push(update.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn report_clamps_progress_into_unit_range() {
        let sink = RecordingSink {
            received: Mutex::new(Vec::new()),
            fail_count: AtomicUsize::new(0),
        };
        let reporter = ProgressReporter::new(&sink);
        reporter
            .report("doc1", 1.4, "parsing", "running", RunState::Running, 0, 1.2)
            .await;
        let received = sink.received.lock().unwrap();
        assert_eq!(received[0].progress, 1.0);
    }

    #[tokio::test]
    async fn report_swallows_sink_failures() {
        let sink = RecordingSink {
            received: Mutex::new(Vec::new()),
            fail_count: AtomicUsize::new(1),
        };
        let reporter = ProgressReporter::new(&sink);
        // Should not panic even though the sink returns an error.
        reporter
            .report("doc1", 0.5, "chunking", "running", RunState::Running, 0, 0.1)
            .await;
        assert!(sink.received.lock().unwrap().is_empty());
    }
}
