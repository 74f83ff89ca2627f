//! Token count estimation and coarse/fine tokenization (spec §4.1).
//!
//! Counts are backed by a BPE encoder so the budget used by the splitters matches
//! what an embedding model actually bills. `fine` further splits each coarse token
//! on non-alphanumeric boundaries, mirroring the donor's coarse/fine search-field split
//! (`content_ltks` vs `content_sm_ltks`).

use tiktoken_rs::{cl100k_base, CoreBPE};

pub struct Tokenizer {
    bpe: CoreBPE,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            bpe: cl100k_base().expect("cl100k_base encoder tables are bundled with tiktoken-rs"),
        }
    }

    /// Amortized O(n) in code points; used as the single budget unit throughout splitting.
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_ordinary(text).len()
    }

    /// Coarse tokens, stored as space-joined strings for search indexing.
    pub fn coarse(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        self.bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|id| self.bpe.decode(vec![id]).unwrap_or_default())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Fine (sub-)tokens: each coarse token split on non-alphanumeric boundaries.
    pub fn fine(&self, coarse_tokens: &[String]) -> Vec<String> {
        coarse_tokens
            .iter()
            .flat_map(|token| {
                token
                    .split(|c: char| !c.is_alphanumeric())
                    .map(|s| s.to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Convenience: coarse-then-fine over raw text, as used when assembling search fields.
    pub fn tokenize_fields(&self, text: &str) -> (Vec<String>, Vec<String>) {
        let coarse = self.coarse(text);
        let fine = self.fine(&coarse);
        (coarse, fine)
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_is_zero_for_empty_text() {
        let tokenizer = Tokenizer::new();
        assert_eq!(tokenizer.count(""), 0);
    }

    #[test]
    fn count_is_stable_across_calls() {
        let tokenizer = Tokenizer::new();
        let text = "The quick brown fox jumps over the lazy dog.";
        assert_eq!(tokenizer.count(text), tokenizer.count(text));
    }

    #[test]
    fn longer_text_has_more_tokens() {
        let tokenizer = Tokenizer::new();
        let short = "Hello world.";
        let long = "Hello world. ".repeat(20);
        assert!(tokenizer.count(&long) > tokenizer.count(short));
    }

    #[test]
    fn fine_splits_on_non_alphanumeric_boundaries() {
        let tokenizer = Tokenizer::new();
        let fine = tokenizer.fine(&["hello-world".to_string(), "foo_bar".to_string()]);
        assert!(fine.contains(&"hello".to_string()));
        assert!(fine.contains(&"world".to_string()));
    }
}
