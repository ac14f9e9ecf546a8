//! In-process implementation of the storage seam.
//!
//! Backs the integration tests and the dev-mode binary. Tables mirror the
//! production layout, including the timeline's clustering order, and the
//! fault hooks let tests force batch failures and degraded image reads.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ImageRow, Mutation, PostRow, ProfileRow, Storage, StorageError};

/// `posts_by_actor` key: partition by author, cluster `created_at` DESC,
/// `uri` ASC. `Reverse` on the timestamp makes ascending map order equal
/// clustering order.
type TimelineKey = (String, Reverse<DateTime<Utc>>, String);

#[derive(Default)]
struct Tables {
    posts_by_uri: HashMap<String, PostRow>,
    posts_by_actor: BTreeMap<TimelineKey, PostRow>,
    images_by_post: BTreeMap<(String, i32), ImageRow>,
    profiles: HashMap<String, ProfileRow>,
    post_interaction_counts: HashMap<String, i64>,
    schema_version: Option<i64>,
    applied_ddl: Vec<String>,
}

#[derive(Default)]
struct Faults {
    next_batch_error: Option<String>,
    image_read_errors: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `apply_batch` fail without applying any statement.
    pub fn fail_next_batch(&self, reason: &str) {
        self.faults().next_batch_error = Some(reason.to_string());
    }

    /// Make image reads for `post_uri` fail until cleared.
    pub fn fail_images_for(&self, post_uri: &str) {
        self.faults().image_read_errors.insert(post_uri.to_string());
    }

    pub fn clear_image_faults(&self) {
        self.faults().image_read_errors.clear();
    }

    /// Seed a like counter. Counter writes are owned by the interactions
    /// pipeline, so the trait exposes no mutation for them.
    pub fn set_like_count(&self, post_uri: &str, likes: i64) {
        self.tables()
            .post_interaction_counts
            .insert(post_uri.to_string(), likes);
    }

    /// DDL statements applied so far, in order.
    pub fn applied_ddl(&self) -> Vec<String> {
        self.tables().applied_ddl.clone()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("storage state poisoned")
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().expect("fault state poisoned")
    }

    fn apply_locked(tables: &mut Tables, mutation: Mutation) {
        match mutation {
            Mutation::InsertPostByUri(row) => {
                tables.posts_by_uri.insert(row.uri.clone(), row);
            }
            Mutation::InsertPostByActor(row) => {
                let key = (row.author_did.clone(), Reverse(row.created_at), row.uri.clone());
                tables.posts_by_actor.insert(key, row);
            }
            Mutation::InsertImage(row) => {
                tables
                    .images_by_post
                    .insert((row.post_uri.clone(), row.image_index), row);
            }
            Mutation::DeletePostByUri { uri } => {
                tables.posts_by_uri.remove(&uri);
            }
            Mutation::DeletePostByActor {
                author_did,
                created_at,
                uri,
            } => {
                tables
                    .posts_by_actor
                    .remove(&(author_did, Reverse(created_at), uri));
            }
            Mutation::DeleteImagesByPost { post_uri } => {
                tables.images_by_post.retain(|(uri, _), _| uri != &post_uri);
            }
            Mutation::UpsertProfile(row) => {
                tables.profiles.insert(row.did.clone(), row);
            }
            Mutation::DeleteProfile { did } => {
                tables.profiles.remove(&did);
            }
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn apply_batch(&self, mutations: Vec<Mutation>) -> Result<(), StorageError> {
        if let Some(reason) = self.faults().next_batch_error.take() {
            return Err(StorageError::Batch(reason));
        }

        let mut tables = self.tables();
        for mutation in mutations {
            Self::apply_locked(&mut tables, mutation);
        }
        Ok(())
    }

    async fn apply(&self, mutation: Mutation) -> Result<(), StorageError> {
        Self::apply_locked(&mut self.tables(), mutation);
        Ok(())
    }

    async fn get_post(&self, uri: &str) -> Result<PostRow, StorageError> {
        self.tables()
            .posts_by_uri
            .get(uri)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn get_posts(&self, uris: &[String]) -> Result<Vec<PostRow>, StorageError> {
        let tables = self.tables();
        Ok(uris
            .iter()
            .filter_map(|uri| tables.posts_by_uri.get(uri).cloned())
            .collect())
    }

    async fn select_posts_by_actor(
        &self,
        author_did: &str,
        cursor: Option<(DateTime<Utc>, String)>,
        limit: usize,
    ) -> Result<Vec<PostRow>, StorageError> {
        let tables = self.tables();
        let rows = tables
            .posts_by_actor
            .iter()
            .filter(|((did, _, _), _)| did == author_did)
            .map(|(_, row)| row)
            .filter(|row| match &cursor {
                // Strictly after the cursor row in clustering order; the
                // boundary row itself is never returned twice.
                Some((created_at, uri)) => {
                    (Reverse(row.created_at), row.uri.as_str())
                        > (Reverse(*created_at), uri.as_str())
                }
                None => true,
            })
            .take(limit)
            .cloned()
            .collect();
        Ok(rows)
    }

    async fn select_images(&self, post_uri: &str) -> Result<Vec<ImageRow>, StorageError> {
        if self.faults().image_read_errors.contains(post_uri) {
            return Err(StorageError::Query(format!(
                "image read failed for {post_uri}"
            )));
        }

        let tables = self.tables();
        Ok(tables
            .images_by_post
            .iter()
            .filter(|((uri, _), _)| uri == post_uri)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn get_profile(&self, did: &str) -> Result<ProfileRow, StorageError> {
        self.tables()
            .profiles
            .get(did)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn get_like_count(&self, post_uri: &str) -> Result<i64, StorageError> {
        self.tables()
            .post_interaction_counts
            .get(post_uri)
            .copied()
            .ok_or(StorageError::NotFound)
    }

    async fn get_like_counts(
        &self,
        post_uris: &[String],
    ) -> Result<HashMap<String, i64>, StorageError> {
        let tables = self.tables();
        Ok(post_uris
            .iter()
            .filter_map(|uri| {
                tables
                    .post_interaction_counts
                    .get(uri)
                    .map(|count| (uri.clone(), *count))
            })
            .collect())
    }

    async fn execute_ddl(&self, ddl: &str) -> Result<(), StorageError> {
        self.tables().applied_ddl.push(ddl.to_string());
        Ok(())
    }

    async fn schema_version(&self) -> Result<Option<i64>, StorageError> {
        Ok(self.tables().schema_version)
    }

    async fn set_schema_version(&self, version: Option<i64>) -> Result<(), StorageError> {
        self.tables().schema_version = version;
        Ok(())
    }
}
