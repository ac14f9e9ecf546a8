//! Read-only access to `post_interaction_counts`.
//!
//! Counter mutations are owned by the interactions pipeline; this service
//! only ever reads them.

use std::collections::HashMap;

use crate::storage::{Storage, StorageError};

/// Like counter for one post; `None` when no counter row exists yet.
pub async fn get_like_count(
    storage: &dyn Storage,
    post_uri: &str,
) -> Result<Option<i64>, StorageError> {
    match storage.get_like_count(post_uri).await {
        Ok(count) => Ok(Some(count)),
        Err(StorageError::NotFound) => Ok(None),
        Err(err) => Err(err),
    }
}

pub async fn get_like_counts(
    storage: &dyn Storage,
    post_uris: &[String],
) -> Result<HashMap<String, i64>, StorageError> {
    storage.get_like_counts(post_uris).await
}
