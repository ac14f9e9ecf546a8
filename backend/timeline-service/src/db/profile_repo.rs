//! Repository for the `profiles` table, keyed by actor DID.

use chrono::{DateTime, Utc};

use crate::storage::{Mutation, ProfileRow, Storage, StorageError};

/// Mutable profile fields as supplied by the record author.
#[derive(Debug, Clone, Default)]
pub struct ProfileFields {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub pronouns: Option<String>,
    pub avatar: Option<String>,
}

/// Upsert semantics: an existing row for `did` is overwritten wholesale,
/// last writer wins. `created_at` falls back to ingestion time when absent
/// or unparseable; `indexed_at` and `updated_at` are always stamped now.
pub async fn upsert_profile(
    storage: &dyn Storage,
    did: &str,
    fields: ProfileFields,
    created_at: Option<&str>,
) -> Result<(), StorageError> {
    let now = Utc::now();
    let created_at = created_at
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
        .unwrap_or(now);

    storage
        .apply(Mutation::UpsertProfile(ProfileRow {
            did: did.to_string(),
            display_name: fields.display_name,
            description: fields.description,
            pronouns: fields.pronouns,
            avatar: fields.avatar,
            created_at,
            indexed_at: now,
            updated_at: now,
        }))
        .await
}

pub async fn get_profile(storage: &dyn Storage, did: &str) -> Result<ProfileRow, StorageError> {
    storage.get_profile(did).await
}

/// Unconditional delete; removing a missing profile is not an error.
pub async fn delete_profile(storage: &dyn Storage, did: &str) -> Result<(), StorageError> {
    storage
        .apply(Mutation::DeleteProfile {
            did: did.to_string(),
        })
        .await
}
