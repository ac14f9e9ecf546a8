//! Write fanout: one create lands in both post views atomically, one
//! delete removes it from both plus the image rows.

mod common;

use common::{harness, sample_post, ts};

use timeline_service::models::Image;

#[tokio::test]
async fn create_post_populates_both_views_and_images() {
    let h = harness();

    let mut post = sample_post("did:plc:alice", "1", ts(10));
    post.images = vec![Image {
        cid: "bafy-img-0".to_string(),
        alt: "a cat".to_string(),
        width: 640,
        height: 480,
        size: 12345,
        mime: "image/jpeg".to_string(),
    }];
    let uri = post.uri.clone();

    let response = h.posts.create_post(post).await.unwrap();
    assert!(response.error.is_none());

    // Point-lookup view.
    let by_uri = h.posts.get_posts(&[uri.clone()]).await.unwrap();
    let view = &by_uri.posts[&uri];
    assert_eq!(view.post.author_did, "did:plc:alice");
    assert_eq!(view.post.images.len(), 1);
    assert_eq!(view.post.images[0].cid, "bafy-img-0");

    // Timeline view.
    let page = h
        .posts
        .get_posts_by_actor("did:plc:alice", 10, None)
        .await
        .unwrap();
    assert_eq!(page.posts.len(), 1);
    assert_eq!(page.posts[0].post.uri, uri);
}

#[tokio::test]
async fn failed_batch_leaves_no_partial_rows() {
    let h = harness();

    h.storage.fail_next_batch("node down");
    let post = sample_post("did:plc:alice", "1", ts(10));
    let uri = post.uri.clone();

    let response = h.posts.create_post(post).await.unwrap();
    assert!(response.error.is_some());

    let by_uri = h.posts.get_posts(&[uri]).await.unwrap();
    assert!(by_uri.posts.is_empty());

    let page = h
        .posts
        .get_posts_by_actor("did:plc:alice", 10, None)
        .await
        .unwrap();
    assert!(page.posts.is_empty());
}

#[tokio::test]
async fn delete_removes_every_row_the_create_wrote() {
    let h = harness();

    let mut post = sample_post("did:plc:alice", "1", ts(10));
    post.images = vec![Image {
        cid: "bafy-img-0".to_string(),
        alt: String::new(),
        width: 100,
        height: 100,
        size: 1,
        mime: "image/png".to_string(),
    }];
    let uri = post.uri.clone();
    h.posts.create_post(post).await.unwrap();

    let response = h.posts.delete_post(&uri).await.unwrap();
    assert!(response.error.is_none());

    assert!(h.posts.get_posts(&[uri.clone()]).await.unwrap().posts.is_empty());
    let page = h
        .posts
        .get_posts_by_actor("did:plc:alice", 10, None)
        .await
        .unwrap();
    assert!(page.posts.is_empty());
}

#[tokio::test]
async fn deleting_a_missing_post_reports_not_found() {
    let h = harness();

    let response = h
        .posts
        .delete_post("at://did:plc:alice/app.murmur.feed.post/missing")
        .await
        .unwrap();
    assert_eq!(response.error.as_deref(), Some("post not found"));
}

#[tokio::test]
async fn writer_stamps_indexed_at() {
    let h = harness();

    let before = chrono::Utc::now();
    let post = sample_post("did:plc:alice", "1", ts(10));
    let uri = post.uri.clone();
    h.posts.create_post(post).await.unwrap();

    let by_uri = h.posts.get_posts(&[uri.clone()]).await.unwrap();
    let indexed_at = by_uri.posts[&uri].post.indexed_at;
    assert!(indexed_at >= before);
}

#[tokio::test]
async fn create_rejects_a_malformed_uri() {
    let h = harness();

    let mut post = sample_post("did:plc:alice", "1", ts(10));
    post.uri = "not-an-at-uri".to_string();

    let err = h.posts.create_post(post).await.unwrap_err();
    assert!(matches!(
        err,
        timeline_service::ServiceError::InvalidInput(_)
    ));
}
