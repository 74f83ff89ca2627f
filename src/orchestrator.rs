//! PipelineOrchestrator: drives one document through the full state machine
//! `received -> fetching -> parsing -> images_uploaded -> chunking -> embedding -> writing
//! -> finalized | failed` (spec §4.8).

use crate::assembler::ChunkAssembler;
use crate::cache::SplitterCache;
use crate::clients::{ApiTokenStore, ParseServiceClient};
use crate::config::EffectiveConfig;
use crate::embedding::{blend, EmbeddingClient};
use crate::error::PipelineError;
use crate::image_sink::{ImageSink, ObjectStore};
use crate::markdown::MarkdownSplitter;
use crate::model::{
    Chunk, ChunkRecord, Document, LayoutRecord, PipelineOutcome, ProcessingStats, RunState, TenantCtx,
};
use crate::position::PositionResolver;
use crate::progress::ProgressReporter;
use crate::spreadsheet::SpreadsheetSplitter;
use crate::tokenizer::Tokenizer;
use crate::validator::Validator;
use crate::writer::{BatchWriter, ChunkStore};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Per-document cancellation handle, derived from a process-wide shutdown broadcast
/// (spec §5: "plain `Arc<AtomicBool>` plus a `tokio::sync::Notify`").
#[derive(Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PipelineOrchestrator {
    pub parse_client: Arc<dyn ParseServiceClient>,
    pub embedding_client: Arc<dyn EmbeddingClient>,
    pub chunk_store: Arc<dyn ChunkStore>,
    pub object_store: Arc<dyn ObjectStore>,
    pub token_store: Arc<dyn ApiTokenStore>,
    pub progress: Arc<ProgressReporterHandle>,
    pub tokenizer: Arc<Tokenizer>,
    /// Explicit LRU keyed by `EffectiveConfig::content_hash` (spec §9), shared across
    /// documents so repeated configurations reuse one splitter instance.
    pub markdown_splitter_cache: Arc<SplitterCache<MarkdownSplitter>>,
    pub temp_root: PathBuf,
}

/// Owns the progress sink so `ProgressReporter` (which borrows) can be constructed
/// fresh per report call without threading a lifetime through the orchestrator.
pub struct ProgressReporterHandle {
    sink: Arc<dyn crate::progress::ProgressSink>,
}

impl ProgressReporterHandle {
    pub fn new(sink: Arc<dyn crate::progress::ProgressSink>) -> Self {
        Self { sink }
    }

    async fn report(
        &self,
        doc_id: &str,
        progress: f32,
        msg: impl Into<String>,
        status: impl Into<String>,
        run: RunState,
        chunk_num: u32,
        process_duration: f64,
    ) {
        let reporter = ProgressReporter::new(self.sink.as_ref());
        reporter
            .report(doc_id, progress, msg, status, run, chunk_num, process_duration)
            .await;
    }
}

impl PipelineOrchestrator {
    /// Progress allocation table (spec §4.8): fetch 0.0-0.2, parse 0.2-0.6,
    /// images 0.6-0.7, chunk 0.7-0.8, embed+write 0.8-0.95, finalize 0.95-1.0.
    const FETCH_START: f32 = 0.0;
    const PARSE_START: f32 = 0.2;
    const IMAGES_START: f32 = 0.6;
    const CHUNK_START: f32 = 0.7;
    const EMBED_WRITE_START: f32 = 0.8;
    const FINALIZE_START: f32 = 0.95;

    pub async fn run_document(
        &self,
        doc: &Document,
        tenant: &TenantCtx,
        config: &EffectiveConfig,
        cancel: &CancellationToken,
    ) -> PipelineOutcome {
        let started_at = Instant::now();
        let temp_dir = self.temp_root.join(format!("doc-{}", doc.doc_id));
        let result = self.run_inner(doc, tenant, config, cancel, &temp_dir, started_at).await;

        if config.cleanup_temp_files {
            let _ = std::fs::remove_dir_all(&temp_dir);
        }

        result
    }

    async fn run_inner(
        &self,
        doc: &Document,
        tenant: &TenantCtx,
        config: &EffectiveConfig,
        cancel: &CancellationToken,
        temp_dir: &PathBuf,
        started_at: Instant,
    ) -> PipelineOutcome {
        std::fs::create_dir_all(temp_dir).ok();

        self.progress
            .report(&doc.doc_id, Self::FETCH_START, "received", "running", RunState::Running, 0, 0.0)
            .await;

        if cancel.is_cancelled() {
            return self.fail(doc, started_at, "cancelled before starting").await;
        }

        // Bootstrap a tenant API token before the first external call (spec §6, §9).
        let api_token = match &tenant.api_token {
            Some(token) => token.clone(),
            None => match self.token_store.get_or_create_api_token(&tenant.tenant_id).await {
                Ok(token) => token,
                Err(e) => {
                    return self
                        .fail(doc, started_at, &format!("failed to resolve tenant api token: {e}"))
                        .await
                }
            },
        };

        let chunks = if doc.file_type.is_spreadsheet() {
            match self.chunk_spreadsheet(doc, config).await {
                Ok(chunks) => chunks,
                Err(e) => return self.fail(doc, started_at, &e.to_string()).await,
            }
        } else {
            match self.chunk_markdown(doc, config, temp_dir, cancel, &api_token).await {
                Ok(chunks) => chunks,
                Err(e) => return self.fail(doc, started_at, &e.to_string()).await,
            }
        };

        self.progress
            .report(
                &doc.doc_id,
                Self::CHUNK_START,
                "chunking",
                "running",
                RunState::Running,
                0,
                started_at.elapsed().as_secs_f64(),
            )
            .await;

        if let Err(e) = Validator::new(&config.validation).validate(&chunks) {
            return self.fail(doc, started_at, &e.to_string()).await;
        }

        if cancel.is_cancelled() {
            return self.fail(doc, started_at, "cancelled before embedding").await;
        }

        self.progress
            .report(
                &doc.doc_id,
                Self::EMBED_WRITE_START,
                "embedding",
                "running",
                RunState::Running,
                0,
                started_at.elapsed().as_secs_f64(),
            )
            .await;

        let (records, embedding_cost, mut processing_errors) =
            self.embed_chunks(doc, &chunks, config).await;

        self.progress
            .report(
                &doc.doc_id,
                Self::EMBED_WRITE_START,
                "writing",
                "running",
                RunState::Running,
                records.len() as u32,
                started_at.elapsed().as_secs_f64(),
            )
            .await;

        let writer = BatchWriter::new(self.chunk_store.as_ref(), config.writer.clone());
        let outcome = writer.write(&doc.dataset_id, &doc.doc_id, records).await;
        processing_errors.extend(outcome.processing_errors.iter().cloned());

        let process_duration = started_at.elapsed().as_secs_f64();
        let stats = ProcessingStats {
            total_requested: outcome.total_requested(),
            batch_size_used: config.writer.sub_batch_size.unwrap_or(10),
            batches_processed: outcome.total_requested().div_ceil(config.writer.sub_batch_size.unwrap_or(10).max(1)),
            embedding_cost,
            processing_errors,
        };

        self.progress
            .report(
                &doc.doc_id,
                1.0,
                "finalized",
                "done",
                RunState::Done,
                outcome.added_count as u32,
                process_duration,
            )
            .await;

        info!(doc_id = %doc.doc_id, added = outcome.added_count, failed = outcome.failed_count, "document finalized");

        PipelineOutcome {
            success: true,
            error: None,
            chunk_num: outcome.added_count as u32,
            process_duration,
            processing_stats: stats,
        }
    }

    async fn chunk_spreadsheet(
        &self,
        doc: &Document,
        config: &EffectiveConfig,
    ) -> Result<Vec<Chunk>, PipelineError> {
        let bytes = std::fs::read(&doc.file_location).map_err(PipelineError::Io)?;
        SpreadsheetSplitter::new().split(&bytes, &config.excel)
    }

    async fn chunk_markdown(
        &self,
        doc: &Document,
        config: &EffectiveConfig,
        temp_dir: &PathBuf,
        cancel: &CancellationToken,
        api_token: &str,
    ) -> Result<Vec<Chunk>, PipelineError> {
        self.progress
            .report(&doc.doc_id, Self::PARSE_START, "parsing", "running", RunState::Running, 0, 0.0)
            .await;

        if cancel.is_cancelled() {
            return Err(PipelineError::Integrity("cancelled during parsing".into()));
        }

        let (md_content, layout) = if config.dev_mode {
            let path = temp_dir.join("content.md");
            let content = std::fs::read_to_string(&path).map_err(PipelineError::Io)?;
            (content, LayoutRecord::default())
        } else {
            let parsed = self
                .parse_client
                .parse(&doc.doc_id, &doc.file_location, api_token)
                .await?;
            (parsed.md_content, parsed.layout)
        };

        self.progress
            .report(
                &doc.doc_id,
                Self::IMAGES_START,
                "images_uploaded",
                "running",
                RunState::Running,
                0,
                0.0,
            )
            .await;

        let image_sink = ImageSink::new(self.object_store.as_ref());
        let md_content = image_sink.materialize(&doc.dataset_id, &doc.doc_id, &md_content).await;

        let splitter = self
            .markdown_splitter_cache
            .get_or_insert_with(config.content_hash(), || MarkdownSplitter::new(Tokenizer::new()));
        let mut chunks = splitter.split(&md_content, &config.chunking)?;

        if !layout.blocks.is_empty() {
            let resolver = PositionResolver::new();
            for chunk in &mut chunks {
                chunk.positions = resolver.resolve(&layout, &chunk.content);
            }
        }

        Ok(chunks)
    }

    /// Embeds chunks in `EmbeddingConfig.max_batch_size`-sized batches. Per spec §4.5/§7:
    /// the orchestrator assembles a flat `[doc_name_i, text_i, ...]` input list for each
    /// batch and calls `encode` once per batch. If a batch's encode call fails, the whole
    /// batch is aborted — its chunks are dropped from the output and the failure is
    /// recorded in `processing_errors` — while earlier and later batches are unaffected
    /// (spec §8: a single transient embedding hiccup must not discard the whole document).
    async fn embed_chunks(
        &self,
        doc: &Document,
        chunks: &[Chunk],
        config: &EffectiveConfig,
    ) -> (Vec<ChunkRecord>, u64, Vec<String>) {
        let batch_size = config.embedding.max_batch_size.max(1);
        let assembler = ChunkAssembler::new(&self.tokenizer);
        let created_at = chrono::Utc::now();

        let mut records = Vec::with_capacity(chunks.len());
        let mut embedding_cost = 0u64;
        let mut processing_errors = Vec::new();

        for (batch_index, batch) in chunks.chunks(batch_size).enumerate() {
            let mut flat_texts = Vec::with_capacity(batch.len() * 2);
            for chunk in batch {
                flat_texts.push(doc.name.clone());
                flat_texts.push(if chunk.questions.is_empty() {
                    chunk.content.clone()
                } else {
                    chunk.questions.join("\n")
                });
            }

            match self.embedding_client.encode(&flat_texts).await {
                Ok((vectors, cost)) => {
                    embedding_cost += cost;
                    for (i, chunk) in batch.iter().enumerate() {
                        let vector = blend(&vectors[2 * i], &vectors[2 * i + 1]);
                        records.push(assembler.assemble(chunk, doc, vector, created_at));
                    }
                }
                Err(e) => {
                    let failure = PipelineError::EmbeddingFailure {
                        batch_index,
                        detail: e.to_string(),
                    };
                    warn!(doc_id = %doc.doc_id, batch_index, error = %failure, "embedding batch failed, skipping batch");
                    processing_errors.push(failure.to_string());
                }
            }
        }

        (records, embedding_cost, processing_errors)
    }

    async fn fail(&self, doc: &Document, started_at: Instant, message: &str) -> PipelineOutcome {
        let process_duration = started_at.elapsed().as_secs_f64();
        error!(doc_id = %doc.doc_id, error = message, "document failed");
        self.progress
            .report(&doc.doc_id, 1.0, message, "failed", RunState::Failed, 0, process_duration)
            .await;
        PipelineOutcome {
            success: false,
            error: Some(message.to_string()),
            chunk_num: 0,
            process_duration,
            processing_stats: ProcessingStats::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_token_starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }
}
