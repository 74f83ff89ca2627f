//! `basic` strategy: isolate HTML table blocks as atomic chunks, concatenate the
//! remaining paragraphs greedily up to the target token budget.

use super::block::{parse_blocks, BlockKind};
use crate::config::ChunkingConfig;
use crate::error::PipelineResult;
use crate::model::Chunk;
use crate::tokenizer::Tokenizer;

pub fn split(
    markdown: &str,
    config: &ChunkingConfig,
    tokenizer: &Tokenizer,
) -> PipelineResult<Vec<Chunk>> {
    let blocks = parse_blocks(markdown);
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_tokens = 0u32;

    let flush = |buffer: &mut String, buffer_tokens: &mut u32, chunks: &mut Vec<Chunk>| {
        if !buffer.trim().is_empty() {
            chunks.push(Chunk::new(buffer.trim().to_string(), chunks.len()));
        }
        buffer.clear();
        *buffer_tokens = 0;
    };

    for block in blocks {
        if block.kind == BlockKind::Table {
            flush(&mut buffer, &mut buffer_tokens, &mut chunks);
            chunks.push(Chunk::new(block.text, chunks.len()));
            continue;
        }

        let block_tokens = tokenizer.count(&block.text) as u32;
        if buffer_tokens > 0 && buffer_tokens + block_tokens > config.chunk_token_num {
            flush(&mut buffer, &mut buffer_tokens, &mut chunks);
        }
        if !buffer.is_empty() {
            buffer.push_str("\n\n");
        }
        buffer.push_str(&block.text);
        buffer_tokens += block_tokens;
    }
    flush(&mut buffer, &mut buffer_tokens, &mut chunks);

    merge_undersized_trailing_chunk(&mut chunks, config.min_chunk_tokens, tokenizer);
    Ok(chunks)
}

/// Spec §4.2 edge case: no trailing chunk below `min_chunk_tokens` unless it is the
/// only chunk.
pub(super) fn merge_undersized_trailing_chunk(
    chunks: &mut Vec<Chunk>,
    min_chunk_tokens: u32,
    tokenizer: &Tokenizer,
) {
    if chunks.len() < 2 {
        return;
    }
    let last = chunks.last().unwrap();
    if tokenizer.count(&last.content) < min_chunk_tokens as usize {
        let last = chunks.pop().unwrap();
        let prev = chunks.last_mut().unwrap();
        prev.content.push_str("\n\n");
        prev.content.push_str(&last.content);
    }
}
