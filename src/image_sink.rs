//! ImageSink: uploads base64-embedded images extracted from parsed Markdown to
//! object storage and rewrites the Markdown references in place (spec §4.3).

use async_trait::async_trait;
use base64::Engine;
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

/// One embedded image discovered in parsed Markdown.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub name: String,
    pub data: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<String, anyhow::Error>;
}

pub struct ImageSink<'a> {
    store: &'a dyn ObjectStore,
}

fn image_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"!\[([^\]]*)\]\(data:(image/[a-zA-Z0-9.+-]+);base64,([A-Za-z0-9+/=\s]+)\)"#).unwrap()
    })
}

impl<'a> ImageSink<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Finds every `![alt](data:image/...;base64,...)` reference in `markdown`, uploads
    /// each decoded image under `{dataset_id}/images/{name}`, and returns the rewritten
    /// Markdown with references replaced by the object store's returned URL. A single
    /// image failing to decode or upload is logged and left untouched — not fatal for
    /// the document (spec §4.3).
    pub async fn materialize(&self, dataset_id: &str, doc_id: &str, markdown: &str) -> String {
        let pattern = image_ref_pattern();
        let matches: Vec<_> = pattern.captures_iter(markdown).collect();
        if matches.is_empty() {
            return markdown.to_string();
        }

        let mut rewritten = String::with_capacity(markdown.len());
        let mut last_end = 0;

        for (index, caps) in matches.iter().enumerate() {
            let whole = caps.get(0).unwrap();
            let alt = &caps[1];
            let content_type = caps[2].to_string();
            let base64_data: String = caps[3].chars().filter(|c| !c.is_whitespace()).collect();

            rewritten.push_str(&markdown[last_end..whole.start()]);

            match base64::engine::general_purpose::STANDARD.decode(&base64_data) {
                Ok(bytes) => {
                    let ext = content_type.rsplit('/').next().unwrap_or("png");
                    let name = format!("{doc_id}-{index}.{ext}");
                    let key = format!("{dataset_id}/images/{name}");
                    match self.store.put(&key, &bytes, &content_type).await {
                        Ok(url) => rewritten.push_str(&format!("![{alt}]({url})")),
                        Err(e) => {
                            warn!(doc_id, key, error = %e, "image upload failed, keeping original reference");
                            rewritten.push_str(whole.as_str());
                        }
                    }
                }
                Err(e) => {
                    warn!(doc_id, index, error = %e, "embedded image failed to decode, keeping original reference");
                    rewritten.push_str(whole.as_str());
                }
            }

            last_end = whole.end();
        }
        rewritten.push_str(&markdown[last_end..]);
        rewritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingStore {
        uploaded: Mutex<Vec<String>>,
        fail_keys: Vec<String>,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn put(&self, key: &str, _data: &[u8], _content_type: &str) -> Result<String, anyhow::Error> {
            if self.fail_keys.iter().any(|k| k == key) {
                return Err(anyhow::anyhow!("simulated upload failure"));
            }
            self.uploaded.lock().unwrap().push(key.to_string());
            Ok(format!("https://objects.example/{key}"))
        }
    }

    #[tokio::test]
    async fn rewrites_single_embedded_image() {
        let store = RecordingStore {
            uploaded: Mutex::new(Vec::new()),
            fail_keys: vec![],
        };
        let sink = ImageSink::new(&store);
        let markdown = "before ![a diagram](data:image/png;base64,aGVsbG8=) after";
        let rewritten = sink.materialize("ds1", "doc1", markdown).await;
        assert!(rewritten.contains("https://objects.example/ds1/images/doc1-0.png"));
        assert!(rewritten.starts_with("before !["));
        assert!(rewritten.ends_with(" after"));
        assert_eq!(store.uploaded.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn leaves_markdown_untouched_when_no_images_present() {
        let store = RecordingStore {
            uploaded: Mutex::new(Vec::new()),
            fail_keys: vec![],
        };
        let sink = ImageSink::new(&store);
        let markdown = "# Title\n\nplain text, no images here";
        let rewritten = sink.materialize("ds1", "doc1", markdown).await;
        assert_eq!(rewritten, markdown);
    }

    #[tokio::test]
    async fn keeps_original_reference_when_upload_fails() {
        let store = RecordingStore {
            uploaded: Mutex::new(Vec::new()),
            fail_keys: vec!["ds1/images/doc1-0.png".to_string()],
        };
        let sink = ImageSink::new(&store);
        let markdown = "![a diagram](data:image/png;base64,aGVsbG8=)";
        let rewritten = sink.materialize("ds1", "doc1", markdown).await;
        assert_eq!(rewritten, markdown);
    }
}
