//! Post service: the RPC-shaped surface over the post tables.
//!
//! Storage failures travel as soft errors inside the response payload so
//! the caller owns retry policy; request validation (malformed uri, bad
//! limit, empty input) fails hard before any storage access. A response
//! carries either a populated result or an error, never both.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, warn};

use crate::db::{counts_repo, post_repo};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{AtUri, Image, Post, PostInteractionCounts};
use crate::pagination::Cursor;
use crate::storage::{ImageRow, PostRow, Storage, StorageError};

/// Upper bound on a single timeline page. Larger requests are caller
/// errors, never silently clamped.
pub const MAX_PAGE_SIZE: usize = 100;

/// A post assembled with its image children. `images_degraded` is set when
/// the image fetch failed and the post was returned without enrichment.
#[derive(Debug, Clone)]
pub struct PostView {
    pub post: Post,
    pub images_degraded: bool,
}

#[derive(Debug, Default)]
pub struct CreatePostResponse {
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct DeletePostResponse {
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct GetPostsResponse {
    /// One entry per requested uri iff it existed; absent uris are simply
    /// missing, not an error.
    pub posts: HashMap<String, PostView>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct PostsByActorPage {
    /// Page rows in timeline order: `created_at` descending, `uri`
    /// ascending on ties.
    pub posts: Vec<PostView>,
    /// Opaque cursor for the next page; `None` at end of stream.
    pub cursor: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct InteractionCountsResponse {
    pub counts: Option<PostInteractionCounts>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct BatchInteractionCountsResponse {
    pub counts: HashMap<String, PostInteractionCounts>,
    pub error: Option<String>,
}

pub struct PostService {
    storage: Arc<dyn Storage>,
}

impl PostService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Create a post across both denormalized views and its image rows.
    /// The author is derived from the uri's authority segment.
    pub async fn create_post(&self, mut post: Post) -> ServiceResult<CreatePostResponse> {
        let aturi = AtUri::parse(&post.uri)?;
        post.author_did = aturi.authority;

        match post_repo::create_post(self.storage.as_ref(), &post).await {
            Ok(()) => Ok(CreatePostResponse::default()),
            Err(err) => {
                error!(uri = %post.uri, %err, "failed to create post");
                Ok(CreatePostResponse {
                    error: Some(err.to_string()),
                })
            }
        }
    }

    pub async fn delete_post(&self, uri: &str) -> ServiceResult<DeletePostResponse> {
        let aturi = AtUri::parse(uri)?;

        match post_repo::delete_post(self.storage.as_ref(), uri, &aturi.authority).await {
            Ok(()) => Ok(DeletePostResponse::default()),
            Err(StorageError::NotFound) => {
                warn!(uri, "post not found");
                Ok(DeletePostResponse {
                    error: Some("post not found".to_string()),
                })
            }
            Err(err) => {
                error!(uri, %err, "failed to delete post");
                Ok(DeletePostResponse {
                    error: Some(err.to_string()),
                })
            }
        }
    }

    pub async fn get_posts(&self, uris: &[String]) -> ServiceResult<GetPostsResponse> {
        if uris.is_empty() {
            return Err(ServiceError::InvalidInput(
                "at least one uri must be specified".to_string(),
            ));
        }

        let rows = match self.storage.get_posts(uris).await {
            Ok(rows) => rows,
            Err(err) => {
                error!(%err, "failed to fetch posts");
                return Ok(GetPostsResponse {
                    posts: HashMap::new(),
                    error: Some(err.to_string()),
                });
            }
        };

        let mut posts = HashMap::with_capacity(rows.len());
        for row in rows {
            let view = self.assemble(row).await;
            posts.insert(view.post.uri.clone(), view);
        }

        Ok(GetPostsResponse { posts, error: None })
    }

    /// One keyset page of an actor's timeline.
    pub async fn get_posts_by_actor(
        &self,
        author_did: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> ServiceResult<PostsByActorPage> {
        if limit < 1 {
            return Err(ServiceError::InvalidInput(
                "limit must be greater than 0".to_string(),
            ));
        }
        if limit > MAX_PAGE_SIZE {
            return Err(ServiceError::InvalidInput(format!(
                "limit must not exceed {MAX_PAGE_SIZE}"
            )));
        }

        let cursor = match cursor
            .filter(|raw| !raw.is_empty())
            .map(Cursor::decode)
            .transpose()
        {
            Ok(cursor) => cursor,
            Err(err) => {
                error!(did = author_did, %err, "invalid cursor");
                return Ok(PostsByActorPage {
                    error: Some("invalid cursor format".to_string()),
                    ..Default::default()
                });
            }
        };

        let page = match post_repo::list_posts_by_actor(
            self.storage.as_ref(),
            author_did,
            limit,
            cursor.as_ref(),
        )
        .await
        {
            Ok(page) => page,
            Err(err) => {
                error!(did = author_did, %err, "failed to list posts by actor");
                return Ok(PostsByActorPage {
                    error: Some(err.to_string()),
                    ..Default::default()
                });
            }
        };

        let mut posts = Vec::with_capacity(page.rows.len());
        for row in page.rows {
            posts.push(self.assemble(row).await);
        }

        Ok(PostsByActorPage {
            posts,
            cursor: page.next_cursor.map(|c| c.encode()),
            error: None,
        })
    }

    pub async fn get_post_interaction_counts(
        &self,
        uri: &str,
    ) -> ServiceResult<InteractionCountsResponse> {
        match counts_repo::get_like_count(self.storage.as_ref(), uri).await {
            Ok(likes) => Ok(InteractionCountsResponse {
                counts: Some(PostInteractionCounts {
                    likes: likes.unwrap_or(0),
                    // Reply counts are not maintained yet.
                    replies: 0,
                }),
                error: None,
            }),
            Err(err) => {
                error!(uri, %err, "failed to fetch interaction counts");
                Ok(InteractionCountsResponse {
                    counts: None,
                    error: Some(err.to_string()),
                })
            }
        }
    }

    /// Counters for many posts; uris without a counter row zero-fill.
    pub async fn get_posts_interaction_counts(
        &self,
        uris: &[String],
    ) -> ServiceResult<BatchInteractionCountsResponse> {
        let found = match counts_repo::get_like_counts(self.storage.as_ref(), uris).await {
            Ok(found) => found,
            Err(err) => {
                error!(%err, "failed to fetch interaction counts");
                return Ok(BatchInteractionCountsResponse {
                    counts: HashMap::new(),
                    error: Some(err.to_string()),
                });
            }
        };

        let counts = uris
            .iter()
            .map(|uri| {
                let likes = found.get(uri).copied().unwrap_or(0);
                (
                    uri.clone(),
                    PostInteractionCounts { likes, replies: 0 },
                )
            })
            .collect();

        Ok(BatchInteractionCountsResponse {
            counts,
            error: None,
        })
    }

    /// Attach image children to one post row. A failed image fetch degrades
    /// this post to empty images instead of failing the whole batch.
    async fn assemble(&self, row: PostRow) -> PostView {
        match self.storage.select_images(&row.uri).await {
            Ok(images) => PostView {
                post: post_from_row(row, images.into_iter().map(image_from_row).collect()),
                images_degraded: false,
            },
            Err(err) => {
                warn!(uri = %row.uri, %err, "failed to fetch images for post");
                PostView {
                    post: post_from_row(row, Vec::new()),
                    images_degraded: true,
                }
            }
        }
    }
}

fn post_from_row(row: PostRow, images: Vec<Image>) -> Post {
    Post {
        uri: row.uri,
        cid: row.cid,
        author_did: row.author_did,
        caption: row.caption,
        facets: row.facets,
        created_at: row.created_at,
        indexed_at: row.indexed_at,
        images,
    }
}

fn image_from_row(row: ImageRow) -> Image {
    Image {
        cid: row.cid,
        alt: row.alt,
        width: row.width,
        height: row.height,
        size: row.size,
        mime: row.mime,
    }
}
