//! ChunkAssembler: builds the persisted ChunkRecord from an in-flight Chunk plus its
//! resolved vector and positions (spec §4.6).

use crate::embedding::vector_field_name;
use crate::model::{Chunk, ChunkRecord, Document};
use crate::tokenizer::Tokenizer;
use chrono::{DateTime, Utc};
use xxhash_rust::xxh64::xxh64;

pub struct ChunkAssembler<'a> {
    tokenizer: &'a Tokenizer,
}

impl<'a> ChunkAssembler<'a> {
    pub fn new(tokenizer: &'a Tokenizer) -> Self {
        Self { tokenizer }
    }

    /// `created_at` is taken once per batch by the caller so records within a batch
    /// stay temporally coherent (spec §4.6).
    pub fn assemble(
        &self,
        chunk: &Chunk,
        doc: &Document,
        vector: Vec<f32>,
        created_at: DateTime<Utc>,
    ) -> ChunkRecord {
        let id = stable_chunk_id(&chunk.content, &doc.doc_id, chunk.source_index);

        let (content_coarse, content_fine) = self.tokenizer.tokenize_fields(&chunk.content);

        let keywords = trim_and_drop_empty(&chunk.important_keywords);
        let keyword_tokens = self.tokenizer.fine(&self.tokenizer.coarse(&keywords.join(" ")));

        let questions = trim_and_drop_empty(&chunk.questions);
        let question_tokens = self.tokenizer.fine(&self.tokenizer.coarse(&questions.join(" ")));

        let positions = chunk.positions.clone();
        let top_of_first_position = positions.as_ref().and_then(|p| p.first()).map(|t| t.3);
        let page_numbers = positions
            .as_ref()
            .map(|p| {
                let mut seen = std::collections::BTreeSet::new();
                p.iter()
                    .map(|t| t.0)
                    .filter(|page| seen.insert(*page))
                    .collect()
            })
            .unwrap_or_default();

        ChunkRecord {
            id,
            doc_id: doc.doc_id.clone(),
            dataset_id: doc.dataset_id.clone(),
            tenant_id: doc.tenant_id.clone(),
            content: chunk.content.clone(),
            content_tokens_coarse: content_coarse,
            content_tokens_fine: content_fine,
            keywords,
            keyword_tokens,
            questions,
            question_tokens,
            positions,
            top_of_first_position,
            page_numbers,
            vector_field_name: vector_field_name(vector.len()),
            vector,
            doc_name: doc.name.clone(),
            created_at,
            created_ts: created_at.timestamp(),
        }
    }
}

/// `id = stable_hash(content ‖ doc_id ‖ source_index)` — deterministic under retry
/// so reruns produce the same set of ids (spec §3, §8).
pub fn stable_chunk_id(content: &str, doc_id: &str, source_index: usize) -> String {
    let mut payload = String::with_capacity(content.len() + doc_id.len() + 20);
    payload.push_str(content);
    payload.push_str(doc_id);
    payload.push_str(&source_index.to_string());
    format!("{:016x}", xxh64(payload.as_bytes(), 0))
}

fn trim_and_drop_empty(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileType;

    fn sample_doc() -> Document {
        Document {
            doc_id: "doc1".to_string(),
            tenant_id: "tenant1".to_string(),
            dataset_id: "dataset1".to_string(),
            name: "report.md".to_string(),
            file_location: "s3://bucket/report.md".to_string(),
            file_type: FileType::Markdown,
            parser_config: serde_json::json!({}),
            progress: 0.0,
            progress_msg: String::new(),
            run: crate::model::RunState::Unstarted,
            chunk_num: 0,
            process_duration: 0.0,
        }
    }

    #[test]
    fn id_is_deterministic_under_retry() {
        let id1 = stable_chunk_id("hello world", "doc1", 3);
        let id2 = stable_chunk_id("hello world", "doc1", 3);
        assert_eq!(id1, id2);
    }

    #[test]
    fn id_changes_with_source_index() {
        let id1 = stable_chunk_id("hello world", "doc1", 3);
        let id2 = stable_chunk_id("hello world", "doc1", 4);
        assert_ne!(id1, id2);
    }

    #[test]
    fn assemble_drops_empty_keywords_and_trims() {
        let tokenizer = Tokenizer::new();
        let assembler = ChunkAssembler::new(&tokenizer);
        let mut chunk = Chunk::new("some content", 0);
        chunk.important_keywords = vec![" keyword ".to_string(), "".to_string(), "  ".to_string()];
        let record = assembler.assemble(&chunk, &sample_doc(), vec![0.1, 0.2], Utc::now());
        assert_eq!(record.keywords, vec!["keyword".to_string()]);
    }

    #[test]
    fn assemble_derives_positions_summary() {
        let tokenizer = Tokenizer::new();
        let assembler = ChunkAssembler::new(&tokenizer);
        let mut chunk = Chunk::new("content", 0);
        chunk.positions = Some(vec![(1, 10, 200, 50, 80), (2, 10, 200, 100, 160)]);
        let record = assembler.assemble(&chunk, &sample_doc(), vec![0.1], Utc::now());
        assert_eq!(record.top_of_first_position, Some(50));
        assert_eq!(record.page_numbers, vec![1, 2]);
    }
}
