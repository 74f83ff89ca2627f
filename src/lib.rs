//! Chunk materialization pipeline for a retrieval-augmented knowledge base.
//!
//! Splits parsed documents and spreadsheets into token-bounded, positioned, embedded
//! chunks and persists them with bounded concurrency and partial-failure tolerance.
//!
//! # Example
//!
//! ```rust,no_run
//! use chunk_materialize::config::RawConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RawConfig::default();
//!     config.validate()?;
//!     Ok(())
//! }
//! ```

pub mod assembler;
pub mod cache;
pub mod clients;
pub mod config;
pub mod embedding;
pub mod error;
pub mod image_sink;
pub mod markdown;
pub mod model;
pub mod orchestrator;
pub mod position;
pub mod progress;
pub mod spreadsheet;
pub mod tokenizer;
pub mod validator;
pub mod writer;

pub use assembler::{stable_chunk_id, ChunkAssembler};
pub use config::{EffectiveConfig, RawConfig};
pub use error::{PipelineError, PipelineResult};
pub use model::{Chunk, ChunkRecord, Document, PipelineOutcome};
pub use orchestrator::{CancellationToken, PipelineOrchestrator};
pub use validator::Validator;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.starts_with(char::is_numeric));
    }
}
