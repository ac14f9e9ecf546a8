//! Firehose event schema shared between the relay producer and the
//! timeline-service indexer.
//!
//! Events are JSON on the wire. The relay guarantees per-partition commit
//! order for a given repo (`did`), so consumers can apply commits for one
//! actor sequentially without reordering.

use serde::{Deserialize, Serialize};

/// Record collection NSIDs carried in `RepoCommit::collection`.
pub mod collections {
    pub const POST: &str = "app.murmur.feed.post";
    pub const ACTOR_PROFILE: &str = "app.murmur.actor.profile";
}

/// Operation applied to a record in the source repo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitOperation {
    Create,
    Update,
    Delete,
}

impl CommitOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitOperation::Create => "create",
            CommitOperation::Update => "update",
            CommitOperation::Delete => "delete",
        }
    }
}

/// A single commit against one record in the source repo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoCommit {
    pub operation: CommitOperation,
    /// Record collection NSID, e.g. `app.murmur.feed.post`.
    pub collection: String,
    /// Record key within the collection.
    pub rkey: String,
    /// The record body as written to the repo. Absent for deletes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<serde_json::Value>,
}

/// Envelope for one firehose event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirehoseEvent {
    /// DID of the repo the commit was applied to.
    pub did: String,
    pub commit: RepoCommit,
}

impl FirehoseEvent {
    /// AT-URI of the record this commit touches, derived from the envelope
    /// alone. Deletes carry no record body, so this is the only identity a
    /// consumer can key a delete off.
    pub fn record_uri(&self) -> String {
        format!(
            "at://{}/{}/{}",
            self.did, self.commit.collection, self.commit.rkey
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_round_trips_through_json() {
        let event = FirehoseEvent {
            did: "did:plc:ewvi7nxzyoun6zhxrhs64oiz".to_string(),
            commit: RepoCommit {
                operation: CommitOperation::Create,
                collection: collections::POST.to_string(),
                rkey: "3kabc123".to_string(),
                record: Some(json!({"caption": "hello"})),
            },
        };

        let raw = serde_json::to_string(&event).expect("serialize");
        let parsed: FirehoseEvent = serde_json::from_str(&raw).expect("deserialize");

        assert_eq!(parsed.did, event.did);
        assert_eq!(parsed.commit.operation, CommitOperation::Create);
        assert_eq!(parsed.commit.collection, collections::POST);
        assert_eq!(parsed.commit.record, event.commit.record);
    }

    #[test]
    fn delete_events_omit_the_record_body() {
        let raw = r#"{
            "did": "did:plc:abc",
            "commit": {
                "operation": "delete",
                "collection": "app.murmur.feed.post",
                "rkey": "3kabc123"
            }
        }"#;

        let event: FirehoseEvent = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(event.commit.operation, CommitOperation::Delete);
        assert!(event.commit.record.is_none());
        assert_eq!(
            event.record_uri(),
            "at://did:plc:abc/app.murmur.feed.post/3kabc123"
        );
    }

    #[test]
    fn unknown_operations_are_rejected() {
        let raw = r#"{
            "did": "did:plc:abc",
            "commit": {
                "operation": "upsert",
                "collection": "app.murmur.feed.post",
                "rkey": "3kabc123"
            }
        }"#;

        assert!(serde_json::from_str::<FirehoseEvent>(raw).is_err());
    }
}
