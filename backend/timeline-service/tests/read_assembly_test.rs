//! Read assembly: multi-get with image enrichment, per-post degradation
//! on image failures, and zero-filled interaction counters.

mod common;

use common::{harness, sample_post, ts};

use timeline_service::models::Image;

fn image(n: i32) -> Image {
    Image {
        cid: format!("bafy-img-{n}"),
        alt: String::new(),
        width: 100,
        height: 100,
        size: 1,
        mime: "image/jpeg".to_string(),
    }
}

#[tokio::test]
async fn get_posts_returns_only_existing_uris() {
    let h = harness();
    h.posts
        .create_post(sample_post("did:plc:alice", "1", ts(0)))
        .await
        .unwrap();

    let response = h
        .posts
        .get_posts(&[
            "at://did:plc:alice/app.murmur.feed.post/1".to_string(),
            "at://did:plc:alice/app.murmur.feed.post/missing".to_string(),
        ])
        .await
        .unwrap();

    assert!(response.error.is_none());
    assert_eq!(response.posts.len(), 1);
    assert!(response
        .posts
        .contains_key("at://did:plc:alice/app.murmur.feed.post/1"));
}

#[tokio::test]
async fn get_posts_with_no_uris_is_a_hard_error() {
    let h = harness();
    assert!(h.posts.get_posts(&[]).await.is_err());
}

#[tokio::test]
async fn image_failure_degrades_only_the_affected_post() {
    let h = harness();

    let mut broken = sample_post("did:plc:alice", "1", ts(0));
    broken.images = vec![image(0)];
    let broken_uri = broken.uri.clone();

    let mut intact = sample_post("did:plc:alice", "2", ts(1));
    intact.images = vec![image(1)];
    let intact_uri = intact.uri.clone();

    h.posts.create_post(broken).await.unwrap();
    h.posts.create_post(intact).await.unwrap();

    h.storage.fail_images_for(&broken_uri);

    let response = h
        .posts
        .get_posts(&[broken_uri.clone(), intact_uri.clone()])
        .await
        .unwrap();
    assert!(response.error.is_none());

    let degraded = &response.posts[&broken_uri];
    assert!(degraded.images_degraded);
    assert!(degraded.post.images.is_empty());
    assert_eq!(degraded.post.caption, "post 1");

    let healthy = &response.posts[&intact_uri];
    assert!(!healthy.images_degraded);
    assert_eq!(healthy.post.images.len(), 1);

    // Once the fault clears, the same read is fully enriched again.
    h.storage.clear_image_faults();
    let response = h.posts.get_posts(&[broken_uri.clone()]).await.unwrap();
    let recovered = &response.posts[&broken_uri];
    assert!(!recovered.images_degraded);
    assert_eq!(recovered.post.images.len(), 1);
}

#[tokio::test]
async fn timeline_pages_degrade_per_post_too() {
    let h = harness();

    let mut post = sample_post("did:plc:alice", "1", ts(0));
    post.images = vec![image(0)];
    let uri = post.uri.clone();
    h.posts.create_post(post).await.unwrap();

    h.storage.fail_images_for(&uri);

    let page = h
        .posts
        .get_posts_by_actor("did:plc:alice", 10, None)
        .await
        .unwrap();
    assert!(page.error.is_none());
    assert_eq!(page.posts.len(), 1);
    assert!(page.posts[0].images_degraded);
}

#[tokio::test]
async fn interaction_counts_zero_fill_missing_rows() {
    let h = harness();
    let counted = "at://did:plc:alice/app.murmur.feed.post/1".to_string();
    let uncounted = "at://did:plc:alice/app.murmur.feed.post/2".to_string();

    h.storage.set_like_count(&counted, 7);

    let single = h.posts.get_post_interaction_counts(&counted).await.unwrap();
    let counts = single.counts.unwrap();
    assert_eq!(counts.likes, 7);
    assert_eq!(counts.replies, 0);

    let missing = h
        .posts
        .get_post_interaction_counts(&uncounted)
        .await
        .unwrap();
    assert_eq!(missing.counts.unwrap().likes, 0);

    let batch = h
        .posts
        .get_posts_interaction_counts(&[counted.clone(), uncounted.clone()])
        .await
        .unwrap();
    assert_eq!(batch.counts[&counted].likes, 7);
    assert_eq!(batch.counts[&uncounted].likes, 0);
    assert_eq!(batch.counts[&uncounted].replies, 0);
}

#[tokio::test]
async fn profiles_round_trip_and_report_missing() {
    let h = harness();

    use timeline_service::services::profiles::CreateProfileRequest;

    let response = h
        .profiles
        .create_profile(CreateProfileRequest {
            did: "did:plc:alice".to_string(),
            display_name: Some("Alice".to_string()),
            description: None,
            pronouns: Some("she/her".to_string()),
            avatar: None,
            created_at: Some("2024-01-01T00:00:00Z".to_string()),
        })
        .await
        .unwrap();
    assert!(response.error.is_none());

    let fetched = h.profiles.get_profile("did:plc:alice").await.unwrap();
    let profile = fetched.profile.unwrap();
    assert_eq!(profile.display_name.as_deref(), Some("Alice"));
    assert_eq!(
        profile.created_at,
        "2024-01-01T00:00:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap()
    );

    let missing = h.profiles.get_profile("did:plc:bob").await.unwrap();
    assert!(missing.profile.is_none());
    assert_eq!(missing.error.as_deref(), Some("profile not found"));
}
