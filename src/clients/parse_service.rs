//! Parse service client: submits a document for layout-aware parsing and receives
//! back Markdown content plus a per-page layout record (spec §4.1, §6).

use crate::config::ParseServiceConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::model::LayoutRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub md_content: String,
    pub layout: LayoutRecord,
}

#[async_trait]
pub trait ParseServiceClient: Send + Sync {
    async fn parse(
        &self,
        doc_id: &str,
        file_location: &str,
        api_token: &str,
    ) -> PipelineResult<ParsedDocument>;
}

#[derive(Debug, Serialize)]
struct ParseRequest<'a> {
    doc_id: &'a str,
    file_location: &'a str,
    backend: &'a str,
    parse_method: &'a str,
    lang: &'a str,
    formula_enable: bool,
    table_enable: bool,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    #[serde(default)]
    md_content: Option<String>,
    #[serde(default)]
    layout: LayoutRecord,
}

/// One pooled client per parse-service endpoint (spec §5).
pub struct HttpParseServiceClient {
    client: reqwest::Client,
    config: ParseServiceConfig,
}

impl HttpParseServiceClient {
    pub fn new(config: ParseServiceConfig) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(PipelineError::Http)?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/parse", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ParseServiceClient for HttpParseServiceClient {
    async fn parse(
        &self,
        doc_id: &str,
        file_location: &str,
        api_token: &str,
    ) -> PipelineResult<ParsedDocument> {
        let endpoint = self.endpoint();
        debug!(endpoint = %endpoint, doc_id, "submitting document for parse");

        let request = ParseRequest {
            doc_id,
            file_location,
            backend: &self.config.backend,
            parse_method: &self.config.parse_method,
            lang: &self.config.lang,
            formula_enable: self.config.formula_enable,
            table_enable: self.config.table_enable,
        };

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(api_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(endpoint = %endpoint, doc_id, error = %e, "parse service request failed");
                PipelineError::TransientRemote {
                    endpoint: endpoint.clone(),
                    detail: e.to_string(),
                }
            })?;

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

        let parsed: ParseResponse = response.json().await.map_err(|e| PipelineError::TransientRemote {
            endpoint: endpoint.clone(),
            detail: format!("malformed parse response: {e}"),
        })?;

        let md_content = parsed.md_content.ok_or_else(|| PipelineError::ParseFailure {
            doc_id: doc_id.to_string(),
        })?;

        Ok(ParsedDocument {
            md_content,
            layout: parsed.layout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trims_trailing_slash() {
        let config = ParseServiceConfig {
            base_url: "http://localhost:8008/".to_string(),
            ..ParseServiceConfig::default()
        };
        let client = HttpParseServiceClient::new(config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8008/parse");
    }
}
