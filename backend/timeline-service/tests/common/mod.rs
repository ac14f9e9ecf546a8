#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use timeline_service::models::Post;
use timeline_service::services::{PostService, ProfileService};
use timeline_service::storage::{MemoryStorage, Storage};

pub struct TestHarness {
    pub storage: Arc<MemoryStorage>,
    pub posts: PostService,
    pub profiles: ProfileService,
}

pub fn harness() -> TestHarness {
    let storage = Arc::new(MemoryStorage::new());
    let posts = PostService::new(storage.clone() as Arc<dyn Storage>);
    let profiles = ProfileService::new(storage.clone() as Arc<dyn Storage>);
    TestHarness {
        storage,
        posts,
        profiles,
    }
}

/// A fixed base instant plus `secs`, so tests get deterministic ordering.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn sample_post(did: &str, rkey: &str, created_at: DateTime<Utc>) -> Post {
    Post {
        uri: format!("at://{did}/app.murmur.feed.post/{rkey}"),
        cid: format!("bafy-{rkey}"),
        author_did: String::new(),
        caption: format!("post {rkey}"),
        facets: None,
        created_at,
        indexed_at: created_at,
        images: Vec::new(),
    }
}
