//! Core data model: documents, layout records, in-flight chunks and persisted chunk records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A position tuple `(page_1_based, left, right, top, bottom)` in integer layout coordinates.
pub type PositionTuple = (u32, i64, i64, i64, i64);

/// Recognized file types routed by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Markdown,
    Pdf,
    Docx,
    Xlsx,
    Xls,
    Csv,
    Other,
}

impl FileType {
    /// Whether this file type is routed to the spreadsheet path rather than the parse service.
    pub fn is_spreadsheet(&self) -> bool {
        matches!(self, FileType::Xlsx | FileType::Xls | FileType::Csv)
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" => FileType::Markdown,
            "pdf" => FileType::Pdf,
            "docx" | "doc" => FileType::Docx,
            "xlsx" | "xlsm" | "ods" => FileType::Xlsx,
            "xls" => FileType::Xls,
            "csv" => FileType::Csv,
            _ => FileType::Other,
        }
    }
}

/// Processing status recorded on the document, mirroring the source's `run` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Unstarted,
    Running,
    Cancelled,
    Done,
    Failed,
}

/// Document input, created externally and referenced read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub tenant_id: String,
    pub dataset_id: String,
    pub name: String,
    pub file_location: String,
    pub file_type: FileType,
    pub parser_config: serde_json::Value,

    #[serde(default)]
    pub progress: f32,
    #[serde(default)]
    pub progress_msg: String,
    #[serde(default = "default_run_state")]
    pub run: RunState,
    #[serde(default)]
    pub chunk_num: u32,
    #[serde(default)]
    pub process_duration: f64,
}

fn default_run_state() -> RunState {
    RunState::Unstarted
}

/// Tenant context threaded through the pipeline; carries the auto-minted API token (§9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantCtx {
    pub tenant_id: String,
    pub api_token: Option<String>,
}

/// A layout block produced by the parse service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutBlock {
    pub page_index: u32,
    pub bbox: (i64, i64, i64, i64),
    pub block_type: BlockType,
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Text,
    Title,
    Table,
    Image,
    Formula,
}

/// An ordered sequence of layout blocks for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutRecord {
    pub blocks: Vec<LayoutBlock>,
}

/// An in-flight chunk produced by a splitter, prior to assembly.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub content: String,
    pub important_keywords: Vec<String>,
    pub questions: Vec<String>,
    pub positions: Option<Vec<PositionTuple>>,
    pub source_index: usize,
    pub oversized: bool,
    /// Advanced-strategy metadata: chunk index, type tag, token count, heading path.
    pub metadata: MetadataMap,
}

impl Chunk {
    pub fn new(content: impl Into<String>, source_index: usize) -> Self {
        Self {
            content: content.into(),
            source_index,
            ..Default::default()
        }
    }
}

/// A fully assembled, persisted chunk record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub doc_id: String,
    pub dataset_id: String,
    pub tenant_id: String,
    pub content: String,
    pub content_tokens_coarse: Vec<String>,
    pub content_tokens_fine: Vec<String>,
    pub keywords: Vec<String>,
    pub keyword_tokens: Vec<String>,
    pub questions: Vec<String>,
    pub question_tokens: Vec<String>,
    pub positions: Option<Vec<PositionTuple>>,
    pub top_of_first_position: Option<i64>,
    pub page_numbers: Vec<u32>,
    /// Keyed by `q_{dim}_vec` per spec §4.5; stored alongside as a flat field here.
    pub vector_field_name: String,
    pub vector: Vec<f32>,
    pub doc_name: String,
    pub created_at: DateTime<Utc>,
    pub created_ts: i64,
}

/// Outcome envelope returned by the orchestrator for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub chunk_num: u32,
    pub process_duration: f64,
    pub processing_stats: ProcessingStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total_requested: usize,
    pub batch_size_used: usize,
    pub batches_processed: usize,
    pub embedding_cost: u64,
    pub processing_errors: Vec<String>,
}

/// Metadata written by ProgressReporter on every stage transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub doc_id: String,
    pub progress: f32,
    pub progress_msg: String,
    pub status: String,
    pub run: RunState,
    pub chunk_num: u32,
    pub process_duration: f64,
}

/// A sparse map of arbitrary per-document metadata (parser_config overrides, etc).
pub type MetadataMap = HashMap<String, serde_json::Value>;
