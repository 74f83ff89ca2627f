//! `advanced` strategy: `smart` plus trailing-token overlap between consecutive
//! chunks (paragraph boundary only, never inside a table or code fence) plus
//! per-chunk metadata (index, type tag, token count, heading path).

use super::smart;
use crate::config::ChunkingConfig;
use crate::error::PipelineResult;
use crate::model::Chunk;
use crate::tokenizer::Tokenizer;

pub fn split(
    markdown: &str,
    config: &ChunkingConfig,
    tokenizer: &Tokenizer,
) -> PipelineResult<Vec<Chunk>> {
    let mut chunks = smart::split(markdown, config, tokenizer)?;

    let overlap_target_tokens =
        (config.overlap_ratio * config.chunk_token_num as f32).round() as usize;

    if overlap_target_tokens > 0 {
        apply_overlap(&mut chunks, overlap_target_tokens, tokenizer);
    }

    attach_metadata(&mut chunks, tokenizer);
    Ok(chunks)
}

/// Re-include the trailing `overlap_target_tokens` tokens of chunk N at the head of
/// chunk N+1, skipped when the previous chunk is a table or fenced code block.
fn apply_overlap(chunks: &mut [Chunk], overlap_target_tokens: usize, tokenizer: &Tokenizer) {
    for i in (1..chunks.len()).rev() {
        let prev_content = chunks[i - 1].content.clone();
        if is_atomic_block(&prev_content) {
            continue;
        }
        let trailing = trailing_tokens_text(&prev_content, overlap_target_tokens, tokenizer);
        if trailing.is_empty() {
            continue;
        }
        let current = &mut chunks[i];
        current.content = format!("{trailing}\n\n{}", current.content);
    }
}

fn is_atomic_block(content: &str) -> bool {
    let trimmed = content.trim_start();
    trimmed.starts_with("<table") || trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Best-effort: take the trailing paragraph(s) of `content` whose combined token
/// count is closest to (without far exceeding) `target_tokens`.
fn trailing_tokens_text(content: &str, target_tokens: usize, tokenizer: &Tokenizer) -> String {
    let paragraphs: Vec<&str> = content.split("\n\n").collect();
    let mut collected = Vec::new();
    let mut tokens_so_far = 0usize;

    for paragraph in paragraphs.iter().rev() {
        let paragraph_tokens = tokenizer.count(paragraph);
        if tokens_so_far > 0 && tokens_so_far + paragraph_tokens > target_tokens {
            break;
        }
        collected.push(*paragraph);
        tokens_so_far += paragraph_tokens;
        if tokens_so_far >= target_tokens {
            break;
        }
    }
    collected.reverse();
    collected.join("\n\n")
}

fn attach_metadata(chunks: &mut [Chunk], tokenizer: &Tokenizer) {
    let mut heading_path: Vec<String> = Vec::new();

    for (index, chunk) in chunks.iter_mut().enumerate() {
        if let Some(first_line) = chunk.content.lines().next() {
            if let Some(level) = heading_level(first_line) {
                heading_path.truncate(level.saturating_sub(1) as usize);
                heading_path.push(first_line.trim_start_matches('#').trim().to_string());
            }
        }

        let type_tag = if chunk.content.contains("<table") {
            "table"
        } else if chunk.content.contains("```") {
            "code"
        } else {
            "text"
        };

        chunk.metadata.insert(
            "chunk_index".to_string(),
            serde_json::Value::from(index),
        );
        chunk.metadata.insert(
            "type_tag".to_string(),
            serde_json::Value::from(type_tag),
        );
        chunk.metadata.insert(
            "token_count".to_string(),
            serde_json::Value::from(tokenizer.count(&chunk.content)),
        );
        chunk.metadata.insert(
            "heading_path".to_string(),
            serde_json::Value::from(heading_path.clone()),
        );
    }
}

fn heading_level(line: &str) -> Option<u8> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes >= 1 && hashes <= 6 && line.as_bytes().get(hashes) == Some(&b' ') {
        Some(hashes as u8)
    } else {
        None
    }
}
