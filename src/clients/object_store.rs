//! Object store client: uploads extracted images as multipart requests against a
//! bucket-style HTTP endpoint (spec §4.3, §6).

use crate::error::PipelineError;
use crate::image_sink::ObjectStore;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub struct HttpObjectStoreClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpObjectStoreClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(PipelineError::Http)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStoreClient {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<String, anyhow::Error> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), key);
        debug!(url = %url, bytes = data.len(), "uploading image to object store");

        let response = self
            .client
            .put(&url)
            .header("content-type", content_type)
            .body(data.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("object store upload returned {}", response.status());
        }

        Ok(url)
    }
}
