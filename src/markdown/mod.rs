//! MarkdownSplitter: splits Markdown into token-bounded chunks preserving tables,
//! code and headings (spec §4.2). Dispatches on `ChunkingConfig::strategy`.

mod advanced;
mod basic;
mod block;
mod smart;
mod strict_regex;

pub use block::{Block, BlockKind};

use crate::config::{ChunkingConfig, ChunkingStrategy};
use crate::error::{PipelineError, PipelineResult};
use crate::model::Chunk;
use crate::tokenizer::Tokenizer;

/// Splits Markdown documents according to the configured strategy. Stateless beyond
/// its tokenizer handle, so one instance is safely shared (and cached, see `crate::cache`)
/// across documents with the same effective configuration.
pub struct MarkdownSplitter {
    tokenizer: Tokenizer,
}

impl MarkdownSplitter {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }

    pub fn split(&self, markdown: &str, config: &ChunkingConfig) -> PipelineResult<Vec<Chunk>> {
        match config.strategy {
            ChunkingStrategy::Basic => basic::split(markdown, config, &self.tokenizer),
            ChunkingStrategy::Smart => smart::split(markdown, config, &self.tokenizer),
            ChunkingStrategy::Advanced => advanced::split(markdown, config, &self.tokenizer),
            ChunkingStrategy::StrictRegex => {
                let pattern = config.regex_pattern.as_deref().ok_or_else(|| {
                    PipelineError::Validation(
                        "chunking.regex_pattern is required for strategy=strict_regex".into(),
                    )
                })?;
                strict_regex::split(markdown, pattern)
            }
        }
    }
}

/// Collapse whitespace and drop Markdown punctuation, used by the round-trip test and
/// by `PositionResolver` (spec §4.4) to compare text on equal footing.
pub fn normalize_for_comparison(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '#' | '*' | '_' | '`' | '>' | '|' | '-'))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_markdown_punctuation() {
        let normalized = normalize_for_comparison("# Heading\n\nSome **bold** text.");
        assert_eq!(normalized, "Heading Some bold text.");
    }
}
