//! Storage-client boundary for the wide-column store.
//!
//! The store itself (quorum reads/writes, per-partition write
//! serialization) is an external collaborator; this module only fixes the
//! seam the repositories talk through: typed reads with an explicit
//! not-found sentinel, and an atomic multi-statement batch for every write
//! that spans the denormalized views. Callers cancel an in-flight
//! operation by dropping its future.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

pub mod memory;

pub use memory::MemoryStorage;

#[derive(Error, Debug)]
pub enum StorageError {
    /// Point lookup matched no row. Distinct from a failed query.
    #[error("row not found")]
    NotFound,

    #[error("query failed: {0}")]
    Query(String),

    #[error("batch failed: {0}")]
    Batch(String),
}

/// Row layout shared by `posts_by_uri` and `posts_by_actor`. The two views
/// differ only in key structure, never in content.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRow {
    pub uri: String,
    pub cid: String,
    pub author_did: String,
    pub caption: String,
    pub facets: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
}

/// Row in `images_by_post`, partitioned by `post_uri`, clustered by
/// `image_index` ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRow {
    pub post_uri: String,
    pub image_index: i32,
    pub cid: String,
    pub alt: String,
    pub width: i32,
    pub height: i32,
    pub size: i64,
    pub mime: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRow {
    pub did: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub pronouns: Option<String>,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One statement of a write batch.
#[derive(Debug, Clone)]
pub enum Mutation {
    InsertPostByUri(PostRow),
    InsertPostByActor(PostRow),
    InsertImage(ImageRow),
    DeletePostByUri {
        uri: String,
    },
    /// The timeline clustering key embeds `created_at`, so deletes must
    /// carry the full key.
    DeletePostByActor {
        author_did: String,
        created_at: DateTime<Utc>,
        uri: String,
    },
    DeleteImagesByPost {
        post_uri: String,
    },
    UpsertProfile(ProfileRow),
    DeleteProfile {
        did: String,
    },
}

/// Async seam to the wide-column store.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Apply `mutations` as one logged batch: either every statement takes
    /// effect or none does.
    async fn apply_batch(&self, mutations: Vec<Mutation>) -> Result<(), StorageError>;

    /// Apply a single statement outside a batch.
    async fn apply(&self, mutation: Mutation) -> Result<(), StorageError>;

    /// Point lookup in `posts_by_uri`.
    async fn get_post(&self, uri: &str) -> Result<PostRow, StorageError>;

    /// Multi-key lookup in `posts_by_uri`; absent uris are simply missing
    /// from the result.
    async fn get_posts(&self, uris: &[String]) -> Result<Vec<PostRow>, StorageError>;

    /// Rows from `posts_by_actor` in clustering order (`created_at` DESC,
    /// `uri` ASC), strictly after `cursor` in that order when present.
    async fn select_posts_by_actor(
        &self,
        author_did: &str,
        cursor: Option<(DateTime<Utc>, String)>,
        limit: usize,
    ) -> Result<Vec<PostRow>, StorageError>;

    /// Image rows for one post, ordered by `image_index` ascending.
    async fn select_images(&self, post_uri: &str) -> Result<Vec<ImageRow>, StorageError>;

    async fn get_profile(&self, did: &str) -> Result<ProfileRow, StorageError>;

    /// Like counter for one post; `NotFound` when no counter row exists.
    async fn get_like_count(&self, post_uri: &str) -> Result<i64, StorageError>;

    /// Like counters for many posts; absent uris are missing from the map.
    async fn get_like_counts(
        &self,
        post_uris: &[String],
    ) -> Result<HashMap<String, i64>, StorageError>;

    // Schema hooks used by the migration adapter.
    async fn execute_ddl(&self, ddl: &str) -> Result<(), StorageError>;
    async fn schema_version(&self) -> Result<Option<i64>, StorageError>;
    async fn set_schema_version(&self, version: Option<i64>) -> Result<(), StorageError>;
}
