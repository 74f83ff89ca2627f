//! Layered configuration: global defaults < per-knowledge-base config < per-document
//! `parser_config`, resolved once at orchestrator entry into a frozen `EffectiveConfig`.

use serde::{Deserialize, Serialize};

/// Splitter strategy for Markdown documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    Basic,
    Smart,
    Advanced,
    StrictRegex,
}

/// Splitter strategy for spreadsheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcelStrategy {
    Html,
    Row,
    Auto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub strategy: ChunkingStrategy,
    pub chunk_token_num: u32,
    pub min_chunk_tokens: u32,
    pub overlap_ratio: f32,
    pub regex_pattern: Option<String>,
    pub split_at_heading_levels: Vec<u8>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::Smart,
            chunk_token_num: 512,
            min_chunk_tokens: 20,
            overlap_ratio: 0.1,
            regex_pattern: None,
            split_at_heading_levels: vec![1, 2],
        }
    }
}

impl ChunkingConfig {
    /// `chunk_token_num_max`: the hard ceiling past which a non-atomic block is still
    /// split; atomic blocks (tables, code fences) may legitimately exceed it.
    pub fn chunk_token_num_max(&self) -> u32 {
        (self.chunk_token_num as f32 * 1.5).round() as u32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcelConfig {
    pub default_strategy: ExcelStrategy,
    pub html_chunk_rows: Option<u32>,
    pub preprocess_merged_cells: bool,
    pub number_formatting: bool,
}

impl Default for ExcelConfig {
    fn default() -> Self {
        Self {
            default_strategy: ExcelStrategy::Auto,
            html_chunk_rows: None,
            preprocess_merged_cells: true,
            number_formatting: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseServiceConfig {
    pub base_url: String,
    pub backend: String,
    pub parse_method: String,
    pub lang: String,
    pub formula_enable: bool,
    pub table_enable: bool,
    pub timeout_secs: u64,
}

impl Default for ParseServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8008".to_string(),
            backend: "pipeline".to_string(),
            parse_method: "auto".to_string(),
            lang: "en".to_string(),
            formula_enable: true,
            table_enable: true,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub api_base: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000/v1".to_string(),
            model: "bge-m3".to_string(),
            timeout_secs: 60,
            max_batch_size: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    pub sub_batch_size: Option<usize>,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            sub_batch_size: None,
            max_retries: 2,
            backoff_base_ms: 250,
            backoff_cap_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub max_chunks_per_request: usize,
    pub max_content_length: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_chunks_per_request: 100,
            max_content_length: 10_000,
        }
    }
}

/// Raw configuration as loaded from defaults, an optional file, and environment overrides.
/// Mirrors the donor's `AgentConfig::from_file` dispatch on file extension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub excel: ExcelConfig,
    #[serde(default)]
    pub parse_service: ParseServiceConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub writer: WriterConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub dev_mode: bool,
    #[serde(default = "default_cleanup_temp_files")]
    pub cleanup_temp_files: bool,
    #[serde(default)]
    pub worker_count: Option<usize>,
}

fn default_cleanup_temp_files() -> bool {
    true
}

impl RawConfig {
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let config = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => return Err(anyhow::anyhow!("unsupported config file format")),
        };
        Ok(config)
    }

    /// Apply `CHUNKPIPE_*` environment overrides recognized at top level.
    pub fn with_env_overrides(mut self) -> Self {
        if std::env::var("CHUNKPIPE_DEV_MODE").as_deref() == Ok("true") {
            self.dev_mode = true;
        }
        if let Ok(url) = std::env::var("CHUNKPIPE_PARSE_SERVICE_URL") {
            self.parse_service.base_url = url;
        }
        if let Ok(url) = std::env::var("CHUNKPIPE_EMBEDDING_API_BASE") {
            self.embedding.api_base = url;
        }
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=0.5).contains(&self.chunking.overlap_ratio) {
            return Err(anyhow::anyhow!(
                "chunking.overlap_ratio must be within [0, 0.5], got {}",
                self.chunking.overlap_ratio
            ));
        }
        if !(50..=2048).contains(&self.chunking.chunk_token_num) {
            return Err(anyhow::anyhow!(
                "chunking.chunk_token_num must be within [50, 2048], got {}",
                self.chunking.chunk_token_num
            ));
        }
        if !(10..=500).contains(&self.chunking.min_chunk_tokens) {
            return Err(anyhow::anyhow!(
                "chunking.min_chunk_tokens must be within [10, 500], got {}",
                self.chunking.min_chunk_tokens
            ));
        }
        Ok(())
    }
}

/// The frozen, per-document configuration value threaded by reference through the
/// pipeline. Built once at orchestrator entry from `global < kb < parser_config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub chunking: ChunkingConfig,
    pub excel: ExcelConfig,
    pub parse_service: ParseServiceConfig,
    pub embedding: EmbeddingConfig,
    pub writer: WriterConfig,
    pub validation: ValidationConfig,
    pub dev_mode: bool,
    pub cleanup_temp_files: bool,
}

impl EffectiveConfig {
    /// Resolve `global_defaults < kb_config < parser_config` into a single frozen value.
    /// `kb_config` and `parser_config` are partial JSON overlays merged over the defaults.
    pub fn resolve(
        global_defaults: &RawConfig,
        kb_config: Option<&serde_json::Value>,
        parser_config: Option<&serde_json::Value>,
    ) -> anyhow::Result<Self> {
        let mut merged = serde_json::to_value(global_defaults)?;
        if let Some(kb) = kb_config {
            merge_json(&mut merged, kb);
        }
        if let Some(parser) = parser_config {
            merge_json(&mut merged, parser);
        }
        let raw: RawConfig = serde_json::from_value(merged)?;
        raw.validate()?;
        Ok(Self {
            chunking: raw.chunking,
            excel: raw.excel,
            parse_service: raw.parse_service,
            embedding: raw.embedding,
            writer: raw.writer,
            validation: raw.validation,
            dev_mode: raw.dev_mode,
            cleanup_temp_files: raw.cleanup_temp_files,
        })
    }

    /// A stable content hash of this value, used to key the splitter-instance cache (§9).
    pub fn content_hash(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        canonical.hash(&mut hasher);
        hasher.finish()
    }
}

/// Shallow recursive merge of `overlay` onto `base`, object fields only.
fn merge_json(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                merge_json(
                    base_map.entry(key.clone()).or_insert(serde_json::Value::Null),
                    value,
                );
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(RawConfig::default().validate().is_ok());
    }

    #[test]
    fn overlap_ratio_out_of_range_fails_validation() {
        let mut config = RawConfig::default();
        config.chunking.overlap_ratio = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn effective_config_layers_kb_over_global_and_parser_over_kb() {
        let global = RawConfig::default();
        let kb = serde_json::json!({"chunking": {"chunk_token_num": 256}});
        let parser = serde_json::json!({"chunking": {"min_chunk_tokens": 30}});
        let effective = EffectiveConfig::resolve(&global, Some(&kb), Some(&parser)).unwrap();
        assert_eq!(effective.chunking.chunk_token_num, 256);
        assert_eq!(effective.chunking.min_chunk_tokens, 30);
    }

    #[test]
    fn content_hash_is_stable_for_equal_configs() {
        let a = EffectiveConfig::resolve(&RawConfig::default(), None, None).unwrap();
        let b = EffectiveConfig::resolve(&RawConfig::default(), None, None).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
    }
}
