//! Persists Murmur posts, profiles, and image attachments in a wide-column
//! store and keeps the denormalized read views consistent; the firehose
//! consumer applies repo commits from the relay into that store.

pub mod config;
pub mod consumers;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod services;
pub mod storage;

pub use config::Config;
pub use error::{ServiceError, ServiceResult};
