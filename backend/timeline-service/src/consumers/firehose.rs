//! Firehose consumer: applies repo commits from the relay into the
//! denormalized post and profile tables.
//!
//! Per-key ordering is a property of the partitioned log, not of this
//! module; events for one repo arrive in commit order and are settled one
//! at a time before the next is pulled.

use std::time::Duration;

use chrono::Utc;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use firehose_events::{collections, CommitOperation, FirehoseEvent};

use crate::config::KafkaConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Post, PostRecord, ProfileRecord};
use crate::services::profiles::CreateProfileRequest;
use crate::services::{PostService, ProfileService};

/// How long in-flight consumer state gets to settle once shutdown begins.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(10);

/// Which write-path handler a `(collection, operation)` pair maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    CreatePost,
    DeletePost,
    CreateProfile,
    DeleteProfile,
}

/// Pure dispatch table over the `(collection, operation)` pair.
///
/// UPDATE is unsupported for both collections: records are replaced by a
/// fresh CREATE, never merged in place. Unknown pairs are an explicit
/// error so upstream schema drift cannot be silently dropped.
pub fn route(collection: &str, operation: CommitOperation) -> ServiceResult<Route> {
    match (collection, operation) {
        (collections::POST, CommitOperation::Create) => Ok(Route::CreatePost),
        (collections::POST, CommitOperation::Delete) => Ok(Route::DeletePost),
        (collections::ACTOR_PROFILE, CommitOperation::Create) => Ok(Route::CreateProfile),
        (collections::ACTOR_PROFILE, CommitOperation::Delete) => Ok(Route::DeleteProfile),
        (collections::POST | collections::ACTOR_PROFILE, CommitOperation::Update) => {
            Err(ServiceError::Unsupported(format!(
                "update is not supported for {collection}"
            )))
        }
        _ => Err(ServiceError::Unsupported(format!(
            "unrecognized commit: collection={collection} operation={}",
            operation.as_str()
        ))),
    }
}

/// Applies decoded firehose events to the write path.
pub struct Dispatcher {
    posts: PostService,
    profiles: ProfileService,
}

impl Dispatcher {
    pub fn new(posts: PostService, profiles: ProfileService) -> Self {
        Self { posts, profiles }
    }

    /// Process one event to completion. Any failure (decode, routing, or a
    /// writer soft-error) comes back as a hard error; the caller owns
    /// halt/retry/skip policy.
    pub async fn dispatch(&self, event: &FirehoseEvent) -> ServiceResult<()> {
        match route(&event.commit.collection, event.commit.operation)? {
            Route::CreatePost => self.create_post(event).await,
            Route::DeletePost => self.delete_post(event).await,
            Route::CreateProfile => self.create_profile(event).await,
            Route::DeleteProfile => self.delete_profile(event).await,
        }
    }

    async fn create_post(&self, event: &FirehoseEvent) -> ServiceResult<()> {
        let record: PostRecord = decode_record(event)?;

        let post = Post {
            uri: record.uri,
            cid: record.cid,
            // Derived from the uri authority by the writer.
            author_did: String::new(),
            caption: record.caption,
            facets: record.facets,
            created_at: record.created_at,
            // Stamped by the writer.
            indexed_at: Utc::now(),
            images: record.images.into_iter().map(Into::into).collect(),
        };

        let response = self.posts.create_post(post).await?;
        fail_on_soft_error("create post", response.error)
    }

    async fn delete_post(&self, event: &FirehoseEvent) -> ServiceResult<()> {
        // Deletes carry no record body; the uri comes from the envelope.
        let response = self.posts.delete_post(&event.record_uri()).await?;
        fail_on_soft_error("delete post", response.error)
    }

    async fn create_profile(&self, event: &FirehoseEvent) -> ServiceResult<()> {
        let record: ProfileRecord = decode_record(event)?;

        let response = self
            .profiles
            .create_profile(CreateProfileRequest {
                did: event.did.clone(),
                display_name: record.display_name,
                description: record.description,
                pronouns: record.pronouns,
                avatar: record.avatar,
                created_at: record.created_at,
            })
            .await?;
        fail_on_soft_error("create profile", response.error)
    }

    async fn delete_profile(&self, event: &FirehoseEvent) -> ServiceResult<()> {
        let response = self.profiles.delete_profile(&event.did).await?;
        fail_on_soft_error("delete profile", response.error)
    }
}

fn decode_record<T: serde::de::DeserializeOwned>(event: &FirehoseEvent) -> ServiceResult<T> {
    let record = event.commit.record.clone().ok_or_else(|| {
        ServiceError::InvalidInput(format!(
            "{} commit has no record body",
            event.commit.collection
        ))
    })?;
    Ok(serde_json::from_value(record)?)
}

/// A writer soft-error means the store was not updated; inside the
/// ingestion path that must fail the event, not be silently accepted.
fn fail_on_soft_error(action: &str, error: Option<String>) -> ServiceResult<()> {
    match error {
        Some(message) => Err(ServiceError::Internal(format!(
            "failed to {action}: {message}"
        ))),
        None => Ok(()),
    }
}

/// Kafka transport around the dispatcher.
pub struct FirehoseConsumer {
    consumer: StreamConsumer,
    dispatcher: Dispatcher,
    topic: String,
}

impl FirehoseConsumer {
    pub fn new(config: &KafkaConfig, dispatcher: Dispatcher) -> ServiceResult<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            // Index the full history when the group has no committed offset.
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "30000")
            .set("max.poll.interval.ms", "300000")
            .create()?;

        consumer.subscribe(&[config.firehose_topic.as_str()])?;

        Ok(Self {
            consumer,
            dispatcher,
            topic: config.firehose_topic.clone(),
        })
    }

    /// Run until `shutdown` flips. A failed event is logged and left
    /// uncommitted so the partition replays it (at-least-once); offsets
    /// are committed only after an event settles successfully.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> ServiceResult<()> {
        info!(topic = %self.topic, "starting firehose consumer");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("shutdown requested, draining firehose consumer");
                    break;
                }
                received = self.consumer.recv() => match received {
                    Ok(message) => {
                        if let Err(err) = self.process(&message).await {
                            error!(
                                partition = message.partition(),
                                offset = message.offset(),
                                %err,
                                "failed to process firehose event"
                            );
                            continue;
                        }

                        if let Err(err) =
                            self.consumer.commit_message(&message, CommitMode::Async)
                        {
                            warn!(%err, "failed to commit offset");
                        }
                    }
                    Err(err) => {
                        error!(%err, "kafka consumer error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        self.close().await;
        Ok(())
    }

    async fn process(&self, message: &BorrowedMessage<'_>) -> ServiceResult<()> {
        let payload = message.payload().ok_or_else(|| {
            ServiceError::InvalidInput("firehose message has no payload".to_string())
        })?;

        let event: FirehoseEvent = serde_json::from_slice(payload)?;
        debug!(
            did = %event.did,
            collection = %event.commit.collection,
            operation = event.commit.operation.as_str(),
            "processing firehose event"
        );

        self.dispatcher.dispatch(&event).await
    }

    /// Bounded drain: flush committed offsets and leave the group, giving
    /// a wedged broker at most `SHUTDOWN_DRAIN` to respond.
    async fn close(&self) {
        let commit = tokio::time::timeout(SHUTDOWN_DRAIN, async {
            match self.consumer.commit_consumer_state(CommitMode::Sync) {
                Ok(()) => {}
                // Nothing consumed since the last commit.
                Err(rdkafka::error::KafkaError::ConsumerCommit(
                    rdkafka::types::RDKafkaErrorCode::NoOffset,
                )) => {}
                Err(err) => warn!(%err, "failed to commit consumer state during shutdown"),
            }
        })
        .await;

        if commit.is_err() {
            warn!(drain = ?SHUTDOWN_DRAIN, "firehose consumer drain timed out");
        }

        self.consumer.unsubscribe();
        info!("firehose consumer stopped");
    }
}
