//! Validator: pre-flight checks applied to a chunk request before anything is
//! persisted or embedded (spec §4.2). On failure the pipeline has taken no action.

use crate::config::ValidationConfig;
use crate::error::PipelineError;
use crate::model::Chunk;

const MAX_ERRORS_REPORTED: usize = 10;

pub struct Validator<'a> {
    config: &'a ValidationConfig,
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a ValidationConfig) -> Self {
        Self { config }
    }

    /// Validates a batch of in-flight chunks. Returns the first `MAX_ERRORS_REPORTED`
    /// violations joined into a single `PipelineError::Validation`, or `Ok(())`.
    pub fn validate(&self, chunks: &[Chunk]) -> Result<(), PipelineError> {
        if chunks.is_empty() {
            return Err(PipelineError::Validation("chunk list must not be empty".into()));
        }
        if chunks.len() > self.config.max_chunks_per_request {
            return Err(PipelineError::Validation(format!(
                "Too many chunks. Maximum allowed: {}, received: {}",
                self.config.max_chunks_per_request,
                chunks.len()
            )));
        }

        let mut errors = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            if let Err(e) = self.validate_one(chunk, index) {
                errors.push(e);
                if errors.len() >= MAX_ERRORS_REPORTED {
                    break;
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Validation(errors.join("; ")))
        }
    }

    fn validate_one(&self, chunk: &Chunk, index: usize) -> Result<(), String> {
        let trimmed = chunk.content.trim();
        if trimmed.is_empty() {
            return Err(format!("chunk[{index}]: content must not be empty"));
        }
        let content_length = chunk.content.chars().count();
        if content_length > self.config.max_content_length {
            return Err(format!(
                "chunk[{index}]: content length {} exceeds max_content_length of {}",
                content_length,
                self.config.max_content_length
            ));
        }

        if let Some(positions) = &chunk.positions {
            for (pos_index, (page, left, right, top, bottom)) in positions.iter().enumerate() {
                if *page == 0 {
                    return Err(format!(
                        "chunk[{index}].positions[{pos_index}]: page must be a positive, 1-based integer"
                    ));
                }
                if *left < 0 || *right < 0 || *top < 0 || *bottom < 0 {
                    return Err(format!(
                        "chunk[{index}].positions[{pos_index}]: coordinates must be non-negative"
                    ));
                }
            }
        }

        Ok(())
    }
}
