//! External interface clients (spec §6): one pooled HTTP client per endpoint, plus a
//! SQLite-backed reference implementation used in tests and `dev_mode`.

pub mod chunk_store;
pub mod metadata_store;
pub mod object_store;
pub mod parse_service;

pub use crate::embedding::HttpEmbeddingClient;
pub use chunk_store::{HttpChunkStoreClient, SqliteChunkStoreClient};
pub use metadata_store::{mint_api_token, ApiTokenStore, HttpMetadataStoreClient, SqliteMetadataStoreClient};
pub use object_store::HttpObjectStoreClient;
pub use parse_service::{HttpParseServiceClient, ParseServiceClient, ParsedDocument};
