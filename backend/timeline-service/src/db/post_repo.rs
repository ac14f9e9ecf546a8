//! Repository over the denormalized post tables.
//!
//! This module exclusively owns the invariant that `posts_by_uri` and
//! `posts_by_actor` agree: every create and delete touches both views (and
//! the image rows) inside a single logged batch.

use chrono::Utc;
use tracing::debug;

use crate::models::Post;
use crate::pagination::Cursor;
use crate::storage::{ImageRow, Mutation, PostRow, Storage, StorageError};

/// Write a post to the point-lookup view, the timeline view, and one image
/// row per attachment. `indexed_at` is stamped with the writer's clock,
/// independent of the author-supplied `created_at`.
pub async fn create_post(storage: &dyn Storage, post: &Post) -> Result<(), StorageError> {
    let indexed_at = Utc::now();

    let row = PostRow {
        uri: post.uri.clone(),
        cid: post.cid.clone(),
        author_did: post.author_did.clone(),
        caption: post.caption.clone(),
        facets: post.facets.clone(),
        created_at: post.created_at,
        indexed_at,
    };

    let mut batch = vec![
        Mutation::InsertPostByUri(row.clone()),
        Mutation::InsertPostByActor(row),
    ];

    for (index, image) in post.images.iter().enumerate() {
        batch.push(Mutation::InsertImage(ImageRow {
            post_uri: post.uri.clone(),
            image_index: index as i32,
            cid: image.cid.clone(),
            alt: image.alt.clone(),
            width: image.width,
            height: image.height,
            size: image.size,
            mime: image.mime.clone(),
        }));
    }

    debug!(uri = %post.uri, images = post.images.len(), "writing post fanout batch");
    storage.apply_batch(batch).await
}

/// Delete a post from both views and drop its image rows, atomically.
///
/// The timeline clustering key embeds `created_at`, so the point-lookup row
/// is read first; a missing row surfaces as `NotFound` (a second delete of
/// the same uri reports not-found rather than succeeding silently).
pub async fn delete_post(
    storage: &dyn Storage,
    uri: &str,
    author_did: &str,
) -> Result<(), StorageError> {
    let existing = storage.get_post(uri).await?;

    storage
        .apply_batch(vec![
            Mutation::DeletePostByUri {
                uri: uri.to_string(),
            },
            Mutation::DeletePostByActor {
                author_did: author_did.to_string(),
                created_at: existing.created_at,
                uri: uri.to_string(),
            },
            Mutation::DeleteImagesByPost {
                post_uri: uri.to_string(),
            },
        ])
        .await
}

/// One keyset page of an actor's timeline.
#[derive(Debug)]
pub struct TimelinePage {
    pub rows: Vec<PostRow>,
    pub next_cursor: Option<Cursor>,
}

/// Fetch `limit + 1` rows to detect whether another page exists, truncate
/// to `limit`, and derive the next cursor from the last returned row.
pub async fn list_posts_by_actor(
    storage: &dyn Storage,
    author_did: &str,
    limit: usize,
    cursor: Option<&Cursor>,
) -> Result<TimelinePage, StorageError> {
    let bound = cursor.map(|c| (c.created_at, c.uri.clone()));
    let mut rows = storage
        .select_posts_by_actor(author_did, bound, limit + 1)
        .await?;

    let next_cursor = if rows.len() > limit {
        rows.truncate(limit);
        rows.last().map(|row| Cursor {
            created_at: row.created_at,
            uri: row.uri.clone(),
        })
    } else {
        None
    };

    Ok(TimelinePage { rows, next_cursor })
}
