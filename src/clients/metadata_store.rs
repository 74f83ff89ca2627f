//! Metadata store client: persists per-document progress/status and per-tenant API
//! tokens (spec §4.9, §6, §9). The HTTP implementation talks to the owning service;
//! the SQLite implementation is the reference store used in tests and `dev_mode`.

use crate::model::ProgressUpdate;
use crate::progress::ProgressSink;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sqlx::sqlite::SqlitePool;
use std::time::Duration;
use tracing::{debug, info};

/// Auto-mints a tenant API token per spec §6/§9: `ragflow-` + base64(uuid)[:32].
pub fn mint_api_token() -> String {
    let id = uuid::Uuid::new_v4().to_string();
    let encoded = STANDARD.encode(id.as_bytes());
    let truncated: String = encoded.chars().take(32).collect();
    format!("ragflow-{truncated}")
}

/// Resolves a tenant's API token, minting and persisting one on first use (spec §9's
/// redesign flag: "treat as a one-time bootstrap path ... unique index on `tenant_id`
/// to avoid racing duplicates").
#[async_trait]
pub trait ApiTokenStore: Send + Sync {
    async fn get_or_create_api_token(&self, tenant_id: &str) -> Result<String, anyhow::Error>;
}

pub struct HttpMetadataStoreClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMetadataStoreClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ProgressSink for HttpMetadataStoreClient {
    async fn write_progress(&self, update: &ProgressUpdate) -> Result<(), anyhow::Error> {
        let url = format!(
            "{}/documents/{}/progress",
            self.base_url.trim_end_matches('/'),
            update.doc_id
        );
        debug!(url = %url, progress = update.progress, "writing progress update");
        let response = self.client.put(&url).json(update).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("metadata store returned {}", response.status());
        }
        Ok(())
    }
}

#[derive(serde::Deserialize)]
struct ApiTokenResponse {
    token: String,
}

#[async_trait]
impl ApiTokenStore for HttpMetadataStoreClient {
    async fn get_or_create_api_token(&self, tenant_id: &str) -> Result<String, anyhow::Error> {
        let url = format!(
            "{}/tenants/{}/api_token",
            self.base_url.trim_end_matches('/'),
            tenant_id
        );
        debug!(url = %url, tenant_id, "resolving tenant api token");
        let response = self.client.post(&url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("metadata store returned {}", response.status());
        }
        let body: ApiTokenResponse = response.json().await?;
        Ok(body.token)
    }
}

/// Reference metadata store backed by SQLite, used in dev mode and integration tests
/// in place of the owning service's document store.
pub struct SqliteMetadataStoreClient {
    pool: SqlitePool,
}

impl SqliteMetadataStoreClient {
    pub async fn connect(database_url: &str) -> Result<Self, anyhow::Error> {
        let database_url = if database_url.contains('?') {
            database_url.to_string()
        } else {
            format!("{database_url}?mode=rwc")
        };
        let pool = SqlitePool::connect(&database_url).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS document_progress (
                doc_id TEXT PRIMARY KEY,
                progress REAL NOT NULL,
                progress_msg TEXT NOT NULL,
                status TEXT NOT NULL,
                run TEXT NOT NULL,
                chunk_num INTEGER NOT NULL,
                process_duration REAL NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS api_token (
                tenant_id TEXT PRIMARY KEY,
                token TEXT NOT NULL,
                create_time INTEGER NOT NULL,
                create_date TEXT NOT NULL,
                source TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        info!("initialized SQLite metadata store");
        Ok(Self { pool })
    }
}

#[async_trait]
impl ProgressSink for SqliteMetadataStoreClient {
    async fn write_progress(&self, update: &ProgressUpdate) -> Result<(), anyhow::Error> {
        let run = serde_json::to_string(&update.run)?;
        sqlx::query(
            r#"
            INSERT INTO document_progress (doc_id, progress, progress_msg, status, run, chunk_num, process_duration)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(doc_id) DO UPDATE SET
                progress = excluded.progress,
                progress_msg = excluded.progress_msg,
                status = excluded.status,
                run = excluded.run,
                chunk_num = excluded.chunk_num,
                process_duration = excluded.process_duration
            "#,
        )
        .bind(&update.doc_id)
        .bind(update.progress)
        .bind(&update.progress_msg)
        .bind(&update.status)
        .bind(run)
        .bind(update.chunk_num)
        .bind(update.process_duration)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ApiTokenStore for SqliteMetadataStoreClient {
    /// `INSERT OR IGNORE` races safely on the `tenant_id` primary key: whichever
    /// caller's insert wins, the subsequent `SELECT` returns the persisted winner.
    async fn get_or_create_api_token(&self, tenant_id: &str) -> Result<String, anyhow::Error> {
        let now = chrono::Utc::now();
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO api_token (tenant_id, token, create_time, create_date, source)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(tenant_id)
        .bind(mint_api_token())
        .bind(now.timestamp())
        .bind(now.to_rfc3339())
        .bind("auto")
        .execute(&self.pool)
        .await?;

        let row: (String,) = sqlx::query_as("SELECT token FROM api_token WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}
