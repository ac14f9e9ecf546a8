//! Profile service: upsert / point lookup / delete, keyed by actor DID.
//!
//! Profiles are replaced wholesale on create (last writer wins); there is
//! no field merge and no update path.

use std::sync::Arc;

use tracing::error;

use crate::db::profile_repo::{self, ProfileFields};
use crate::error::{ServiceError, ServiceResult};
use crate::models::Profile;
use crate::storage::{ProfileRow, Storage, StorageError};

#[derive(Debug, Clone, Default)]
pub struct CreateProfileRequest {
    pub did: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub pronouns: Option<String>,
    pub avatar: Option<String>,
    /// Author-supplied RFC3339 timestamp; ingestion time when absent or
    /// unparseable.
    pub created_at: Option<String>,
}

#[derive(Debug, Default)]
pub struct CreateProfileResponse {
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct GetProfileResponse {
    pub profile: Option<Profile>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct DeleteProfileResponse {
    pub error: Option<String>,
}

pub struct ProfileService {
    storage: Arc<dyn Storage>,
}

impl ProfileService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn create_profile(
        &self,
        request: CreateProfileRequest,
    ) -> ServiceResult<CreateProfileResponse> {
        if request.did.is_empty() {
            return Err(ServiceError::InvalidInput(
                "did must not be empty".to_string(),
            ));
        }

        let fields = ProfileFields {
            display_name: request.display_name,
            description: request.description,
            pronouns: request.pronouns,
            avatar: request.avatar,
        };

        match profile_repo::upsert_profile(
            self.storage.as_ref(),
            &request.did,
            fields,
            request.created_at.as_deref(),
        )
        .await
        {
            Ok(()) => Ok(CreateProfileResponse::default()),
            Err(err) => {
                error!(did = %request.did, %err, "failed to create profile");
                Ok(CreateProfileResponse {
                    error: Some(err.to_string()),
                })
            }
        }
    }

    pub async fn get_profile(&self, did: &str) -> ServiceResult<GetProfileResponse> {
        match profile_repo::get_profile(self.storage.as_ref(), did).await {
            Ok(row) => Ok(GetProfileResponse {
                profile: Some(profile_from_row(row)),
                error: None,
            }),
            Err(StorageError::NotFound) => Ok(GetProfileResponse {
                profile: None,
                error: Some("profile not found".to_string()),
            }),
            Err(err) => {
                error!(did, %err, "failed to get profile");
                Ok(GetProfileResponse {
                    profile: None,
                    error: Some(err.to_string()),
                })
            }
        }
    }

    pub async fn delete_profile(&self, did: &str) -> ServiceResult<DeleteProfileResponse> {
        match profile_repo::delete_profile(self.storage.as_ref(), did).await {
            Ok(()) => Ok(DeleteProfileResponse::default()),
            Err(err) => {
                error!(did, %err, "failed to delete profile");
                Ok(DeleteProfileResponse {
                    error: Some(err.to_string()),
                })
            }
        }
    }
}

fn profile_from_row(row: ProfileRow) -> Profile {
    Profile {
        did: row.did,
        display_name: row.display_name,
        description: row.description,
        pronouns: row.pronouns,
        avatar: row.avatar,
        created_at: row.created_at,
        indexed_at: row.indexed_at,
        updated_at: row.updated_at,
    }
}
