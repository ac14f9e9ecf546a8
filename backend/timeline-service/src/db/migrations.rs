//! Schema migration adapter.
//!
//! Ordered up/down DDL pairs applied through the storage client before the
//! service starts serving. The store tracks the current version; rollback
//! steps back exactly one version.

use tracing::info;

use crate::storage::{Storage, StorageError};

pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_posts_by_uri",
        up: "CREATE TABLE IF NOT EXISTS posts_by_uri (
            uri text PRIMARY KEY,
            cid text,
            author_did text,
            caption text,
            facets blob,
            created_at timestamp,
            indexed_at timestamp
        )",
        down: "DROP TABLE IF EXISTS posts_by_uri",
    },
    Migration {
        version: 2,
        name: "create_posts_by_actor",
        up: "CREATE TABLE IF NOT EXISTS posts_by_actor (
            author_did text,
            created_at timestamp,
            uri text,
            cid text,
            caption text,
            facets blob,
            indexed_at timestamp,
            PRIMARY KEY ((author_did), created_at, uri)
        ) WITH CLUSTERING ORDER BY (created_at DESC, uri ASC)",
        down: "DROP TABLE IF EXISTS posts_by_actor",
    },
    Migration {
        version: 3,
        name: "create_images_by_post",
        up: "CREATE TABLE IF NOT EXISTS images_by_post (
            post_uri text,
            image_index int,
            cid text,
            alt text,
            width int,
            height int,
            size bigint,
            mime text,
            PRIMARY KEY ((post_uri), image_index)
        ) WITH CLUSTERING ORDER BY (image_index ASC)",
        down: "DROP TABLE IF EXISTS images_by_post",
    },
    Migration {
        version: 4,
        name: "create_profiles",
        up: "CREATE TABLE IF NOT EXISTS profiles (
            did text PRIMARY KEY,
            display_name text,
            description text,
            pronouns text,
            avatar text,
            created_at timestamp,
            indexed_at timestamp,
            updated_at timestamp
        )",
        down: "DROP TABLE IF EXISTS profiles",
    },
    Migration {
        version: 5,
        name: "create_post_interaction_counts",
        up: "CREATE TABLE IF NOT EXISTS post_interaction_counts (
            post_uri text PRIMARY KEY,
            like_count counter
        )",
        down: "DROP TABLE IF EXISTS post_interaction_counts",
    },
];

/// Apply every migration above the store's current version, in order.
pub async fn run_migrations(storage: &dyn Storage) -> Result<(), StorageError> {
    let current = storage.schema_version().await?.unwrap_or(0);
    info!(current, "running schema migrations");

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        info!(
            version = migration.version,
            name = migration.name,
            "applying migration"
        );
        storage.execute_ddl(migration.up).await?;
        storage.set_schema_version(Some(migration.version)).await?;
    }

    Ok(())
}

/// Roll back the most recently applied migration, if any.
pub async fn rollback_last(storage: &dyn Storage) -> Result<(), StorageError> {
    let Some(current) = storage.schema_version().await? else {
        info!("no migrations applied, nothing to roll back");
        return Ok(());
    };

    let Some(migration) = MIGRATIONS.iter().find(|m| m.version == current) else {
        return Err(StorageError::Query(format!(
            "unknown schema version {current}"
        )));
    };

    info!(
        version = migration.version,
        name = migration.name,
        "rolling back migration"
    );
    storage.execute_ddl(migration.down).await?;

    let previous = MIGRATIONS
        .iter()
        .filter(|m| m.version < current)
        .map(|m| m.version)
        .max();
    storage.set_schema_version(previous).await?;

    Ok(())
}
