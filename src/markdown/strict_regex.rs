//! `strict_regex` strategy: splits on an operator-supplied regex, disregarding the
//! token budget entirely. Empty segments are dropped.

use crate::error::{PipelineError, PipelineResult};
use crate::model::Chunk;
use regex::Regex;

pub fn split(markdown: &str, pattern: &str) -> PipelineResult<Vec<Chunk>> {
    let re = Regex::new(pattern)
        .map_err(|e| PipelineError::Validation(format!("invalid regex_pattern: {e}")))?;

    let chunks = re
        .split(markdown)
        .map(|segment| segment.trim())
        .filter(|segment| !segment.is_empty())
        .enumerate()
        .map(|(index, segment)| Chunk::new(segment.to_string(), index))
        .collect();

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_pattern_and_drops_empty_segments() {
        let md = "one\n---\ntwo\n---\n\n---\nthree";
        let chunks = split(md, r"(?m)^---$").unwrap();
        let contents: Vec<_> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn invalid_pattern_is_a_validation_error() {
        let result = split("text", r"(unclosed");
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }
}
