//! Chunk store client: inserts assembled chunk records (spec §4.7, §6). The HTTP
//! implementation targets the owning retrieval service; the SQLite implementation is
//! the reference store used in tests and `dev_mode`.

use crate::error::PipelineError;
use crate::model::ChunkRecord;
use crate::writer::ChunkStore;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::time::Duration;
use tracing::debug;

pub struct HttpChunkStoreClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChunkStoreClient {
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
impl ChunkStore for HttpChunkStoreClient {
    async fn insert_batch(
        &self,
        dataset_id: &str,
        document_id: &str,
        records: &[ChunkRecord],
    ) -> Result<(), PipelineError> {
        let url = format!(
            "{}/datasets/{}/documents/{}/chunks",
            self.base_url.trim_end_matches('/'),
            dataset_id,
            document_id
        );
        debug!(url = %url, count = records.len(), "inserting chunk sub-batch");

        let response = self.client.post(&url).json(records).send().await.map_err(|e| {
            PipelineError::TransientRemote {
                endpoint: url.clone(),
                detail: e.to_string(),
            }
        })?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::PermanentRemote {
                endpoint: url,
                detail: format!("{status}: {body}"),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::TransientRemote {
                endpoint: url,
                detail: format!("{status}: {body}"),
            });
        }
        Ok(())
    }
}

/// Reference chunk store backed by SQLite.
pub struct SqliteChunkStoreClient {
    pool: SqlitePool,
}

impl SqliteChunkStoreClient {
    pub async fn connect(database_url: &str) -> Result<Self, anyhow::Error> {
        let database_url = if database_url.contains('?') {
            database_url.to_string()
        } else {
            format!("{database_url}?mode=rwc")
        };
        let pool = SqlitePool::connect(&database_url).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                doc_id TEXT NOT NULL,
                dataset_id TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                content TEXT NOT NULL,
                vector_field_name TEXT NOT NULL,
                vector BLOB NOT NULL,
                doc_name TEXT NOT NULL,
                created_ts INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    fn serialize_vector(vector: &[f32]) -> Vec<u8> {
        vector.iter().flat_map(|f| f.to_le_bytes()).collect()
    }
}

#[async_trait]
impl ChunkStore for SqliteChunkStoreClient {
    async fn insert_batch(
        &self,
        dataset_id: &str,
        document_id: &str,
        records: &[ChunkRecord],
    ) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await.map_err(PipelineError::Database)?;
        for record in records {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO chunks
                    (id, doc_id, dataset_id, tenant_id, content, vector_field_name, vector, doc_name, created_ts)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.id)
            .bind(document_id)
            .bind(dataset_id)
            .bind(&record.tenant_id)
            .bind(&record.content)
            .bind(&record.vector_field_name)
            .bind(Self::serialize_vector(&record.vector))
            .bind(&record.doc_name)
            .bind(record.created_ts)
            .execute(&mut *tx)
            .await
            .map_err(PipelineError::Database)?;
        }
        tx.commit().await.map_err(PipelineError::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_record(id: &str) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            doc_id: "doc1".to_string(),
            dataset_id: "ds1".to_string(),
            tenant_id: "t1".to_string(),
            content: "hello".to_string(),
            content_tokens_coarse: vec![],
            content_tokens_fine: vec![],
            keywords: vec![],
            keyword_tokens: vec![],
            questions: vec![],
            question_tokens: vec![],
            positions: None,
            top_of_first_position: None,
            page_numbers: vec![],
            vector_field_name: "q_2_vec".to_string(),
            vector: vec![0.1, 0.2],
            doc_name: "doc.md".to_string(),
            created_at: Utc::now(),
            created_ts: 0,
        }
    }

    #[tokio::test]
    async fn inserts_and_replaces_chunks() {
        let store = SqliteChunkStoreClient::connect("sqlite::memory:").await.unwrap();
        let records = vec![sample_record("c1"), sample_record("c2")];
        store.insert_batch("ds1", "doc1", &records).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chunks")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 2);
    }
}
