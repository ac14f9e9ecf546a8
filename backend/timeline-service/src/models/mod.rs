use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

/// A parsed AT-URI: `at://<authority>/<collection>/<rkey>`.
///
/// The authority segment is the author's DID; the post tables are keyed off
/// it, so every write path parses the uri before touching storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtUri {
    pub authority: String,
    pub collection: String,
    pub rkey: String,
}

impl AtUri {
    pub fn parse(raw: &str) -> ServiceResult<Self> {
        let rest = raw
            .strip_prefix("at://")
            .ok_or_else(|| ServiceError::InvalidInput(format!("invalid at-uri: {raw}")))?;

        let mut segments = rest.splitn(3, '/');
        let authority = segments.next().unwrap_or_default();
        if authority.is_empty() || !authority.starts_with("did:") {
            return Err(ServiceError::InvalidInput(format!(
                "at-uri authority must be a did: {raw}"
            )));
        }

        Ok(Self {
            authority: authority.to_string(),
            collection: segments.next().unwrap_or_default().to_string(),
            rkey: segments.next().unwrap_or_default().to_string(),
        })
    }
}

/// One image attachment. Lifecycle is bound to the parent post; rows are
/// created and deleted in the same batch as the post itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub cid: String,
    pub alt: String,
    pub width: i32,
    pub height: i32,
    pub size: i64,
    pub mime: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub uri: String,
    pub cid: String,
    pub author_did: String,
    pub caption: String,
    /// Rich-text annotations, carried as an opaque blob.
    pub facets: Option<serde_json::Value>,
    /// Author-supplied timestamp; drives timeline ordering.
    pub created_at: DateTime<Utc>,
    /// Stamped by the writer at ingestion time.
    pub indexed_at: DateTime<Utc>,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub did: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub pronouns: Option<String>,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostInteractionCounts {
    pub likes: i64,
    pub replies: i64,
}

/// Wire shape of an `app.murmur.feed.post` record body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub uri: String,
    #[serde(default)]
    pub cid: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub facets: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<ImageRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub cid: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub width: i32,
    #[serde(default)]
    pub height: i32,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub mime: String,
}

impl From<ImageRecord> for Image {
    fn from(record: ImageRecord) -> Self {
        Image {
            cid: record.cid,
            alt: record.alt,
            width: record.width,
            height: record.height,
            size: record.size,
            mime: record.mime,
        }
    }
}

/// Wire shape of an `app.murmur.actor.profile` record body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pronouns: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Author-supplied creation time; the writer falls back to ingestion
    /// time when this is absent or unparseable.
    #[serde(default)]
    pub created_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_at_uri() {
        let aturi = AtUri::parse("at://did:plc:abc123/app.murmur.feed.post/3kxy").unwrap();
        assert_eq!(aturi.authority, "did:plc:abc123");
        assert_eq!(aturi.collection, "app.murmur.feed.post");
        assert_eq!(aturi.rkey, "3kxy");
    }

    #[test]
    fn rejects_missing_scheme_and_non_did_authority() {
        assert!(AtUri::parse("https://example.com/post/1").is_err());
        assert!(AtUri::parse("at://alice.example/app.murmur.feed.post/1").is_err());
        assert!(AtUri::parse("at://").is_err());
    }

    #[test]
    fn post_record_decodes_with_minimal_fields() {
        let record: PostRecord = serde_json::from_value(serde_json::json!({
            "uri": "at://did:x/app.murmur.feed.post/1",
            "caption": "hi",
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(record.caption, "hi");
        assert!(record.images.is_empty());
        assert!(record.facets.is_none());
    }
}
