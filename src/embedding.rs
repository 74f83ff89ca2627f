//! EmbeddingClient: batches (doc-name, text) pairs into model calls (spec §4.5).

use crate::config::EmbeddingConfig;
use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Weight given to the doc-name embedding in the blended chunk vector.
pub const DOC_NAME_WEIGHT: f32 = 0.1;
pub const CONTENT_WEIGHT: f32 = 1.0 - DOC_NAME_WEIGHT;

/// Returns the vector-storage field name for a given embedding dimension, so a
/// dataset can host multiple embedding models without key collisions.
pub fn vector_field_name(dim: usize) -> String {
    format!("q_{dim}_vec")
}

/// Blend a doc-name embedding and a content/questions embedding per spec §4.5.
pub fn blend(doc_name_vec: &[f32], content_vec: &[f32]) -> Vec<f32> {
    debug_assert_eq!(doc_name_vec.len(), content_vec.len());
    doc_name_vec
        .iter()
        .zip(content_vec.iter())
        .map(|(a, b)| DOC_NAME_WEIGHT * a + CONTENT_WEIGHT * b)
        .collect()
}

/// Exposes `encode([text]) -> ([vector], cost_tokens)`. One implementation per
/// embedding endpoint; the orchestrator holds a single process-wide, thread-safe
/// handle shared across documents (spec §5).
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn encode(&self, texts: &[String]) -> PipelineResult<(Vec<Vec<f32>>, u64)>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponseData {
    data: Vec<EmbeddingDataEntry>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDataEntry {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct UsageInfo {
    #[serde(default)]
    total_tokens: u64,
}

/// A pooled HTTP client bound to one embedding endpoint (spec §5: "one pooled client
/// per endpoint").
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl HttpEmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(PipelineError::Http)?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{base}/embeddings")
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn encode(&self, texts: &[String]) -> PipelineResult<(Vec<Vec<f32>>, u64)> {
        let endpoint = self.endpoint();
        debug!(endpoint = %endpoint, batch_size = texts.len(), "calling embedding endpoint");

        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };

        let response = self.client.post(&endpoint).json(&request).send().await;
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "embedding request failed");
                return Err(PipelineError::TransientRemote {
                    endpoint,
                    detail: e.to_string(),
                });
            }
        };

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::PermanentRemote {
                endpoint,
                detail: format!("{status}: {body}"),
            });
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::TransientRemote {
                endpoint,
                detail: format!("{status}: {body}"),
            });
        }

        let parsed: EmbeddingResponseData = response.json().await.map_err(|e| {
            PipelineError::TransientRemote {
                endpoint: endpoint.clone(),
                detail: format!("malformed embedding response: {e}"),
            }
        })?;

        let vectors = parsed.data.into_iter().map(|entry| entry.embedding).collect();
        let cost = parsed.usage.unwrap_or_default().total_tokens;
        Ok((vectors, cost))
    }
}
