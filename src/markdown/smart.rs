//! `smart` strategy: AST-aware, token-budgeted splitting. Opens a new chunk at a
//! configured heading level or when the next block would overflow the target; a
//! block whose own token count exceeds `max` is emitted alone and flagged oversized.

use super::basic::merge_undersized_trailing_chunk;
use super::block::{parse_blocks, Block, BlockKind};
use crate::config::ChunkingConfig;
use crate::error::PipelineResult;
use crate::model::Chunk;
use crate::tokenizer::Tokenizer;

struct Builder {
    blocks: Vec<Block>,
    tokens: u32,
}

impl Builder {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            tokens: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn push(&mut self, block: Block, block_tokens: u32) {
        self.tokens += block_tokens;
        self.blocks.push(block);
    }

    fn render(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

pub fn split(
    markdown: &str,
    config: &ChunkingConfig,
    tokenizer: &Tokenizer,
) -> PipelineResult<Vec<Chunk>> {
    let blocks = parse_blocks(markdown);
    let max_tokens = config.chunk_token_num_max();
    let mut chunks = Vec::new();
    let mut current = Builder::new();

    let flush = |current: &mut Builder, chunks: &mut Vec<Chunk>| {
        if !current.is_empty() {
            chunks.push(Chunk::new(current.render(), chunks.len()));
            *current = Builder::new();
        }
    };

    for block in blocks {
        let block_tokens = tokenizer.count(&block.text) as u32;
        let is_split_heading = matches!(block.kind, BlockKind::Heading(level)
            if config.split_at_heading_levels.contains(&level));

        // Spec §4.2 edge case: consecutive headings without body are merged into
        // the following block rather than each opening their own chunk.
        let current_is_heading_only = current.blocks.len() == 1
            && matches!(current.blocks[0].kind, BlockKind::Heading(_));

        if is_split_heading && !current.is_empty() && !current_is_heading_only {
            flush(&mut current, &mut chunks);
        }

        if block_tokens > max_tokens {
            flush(&mut current, &mut chunks);
            let mut chunk = Chunk::new(block.text.clone(), chunks.len());
            chunk.oversized = true;
            chunks.push(chunk);
            continue;
        }

        if !current.is_empty()
            && !current_is_heading_only
            && current.tokens + block_tokens > config.chunk_token_num
        {
            flush(&mut current, &mut chunks);
        }

        current.push(block, block_tokens);
    }
    flush(&mut current, &mut chunks);

    merge_undersized_trailing_chunk(&mut chunks, config.min_chunk_tokens, tokenizer);
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_then_two_paragraphs_split_into_two_chunks() {
        let heading = "# Title";
        let para1 = "word ".repeat(120);
        let para2 = "word ".repeat(90);
        let md = format!("{heading}\n\n{para1}\n\n{para2}");

        let tokenizer = Tokenizer::new();
        let config = ChunkingConfig {
            chunk_token_num: 150,
            min_chunk_tokens: 20,
            split_at_heading_levels: vec![1],
            ..Default::default()
        };
        let chunks = split(&md, &config, &tokenizer).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.contains("Title"));
        assert!(chunks[0].content.contains(para1.trim()));
        assert!(chunks[1].content.contains(para2.trim()));
    }

    #[test]
    fn oversized_table_is_emitted_alone_and_flagged() {
        let table_row = "<tr><td>cell cell cell cell cell</td></tr>\n".repeat(150);
        let md = format!("<table>\n{table_row}</table>");

        let tokenizer = Tokenizer::new();
        let config = ChunkingConfig {
            chunk_token_num: 150,
            min_chunk_tokens: 20,
            ..Default::default()
        };
        // force max well below the table's token count
        let mut narrow_config = config.clone();
        narrow_config.chunk_token_num = 50;

        let chunks = split(&md, &narrow_config, &tokenizer).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].oversized);
        assert!(chunks[0].content.starts_with("<table>"));
    }

    #[test]
    fn block_exceeding_max_but_within_config_target_still_flags_only_when_over_max() {
        let tokenizer = Tokenizer::new();
        let config = ChunkingConfig {
            chunk_token_num: 500,
            min_chunk_tokens: 10,
            ..Default::default()
        };
        let small_md = "A short paragraph.";
        let chunks = split(small_md, &config, &tokenizer).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(!chunks[0].oversized);
    }
}
