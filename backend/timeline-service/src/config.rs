//! Environment-driven configuration.
//!
//! Every knob has a local-development default; production deployments are
//! expected to set the storage and broker endpoints explicitly.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub storage: StorageConfig,
    pub kafka: KafkaConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub hosts: Vec<String>,
    pub keyspace: String,
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub firehose_topic: String,
    pub group_id: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let app_env = env_or("APP_ENV", "development");

        let storage_hosts = split_csv(&env_or("STORAGE_HOSTS", "127.0.0.1:9042"));
        let brokers = split_csv(&env_or("KAFKA_BROKERS", "localhost:9092"));

        if app_env == "production" {
            if env::var("STORAGE_HOSTS").is_err() {
                return Err("STORAGE_HOSTS must be set in production".to_string());
            }
            if env::var("KAFKA_BROKERS").is_err() {
                return Err("KAFKA_BROKERS must be set in production".to_string());
            }
        }

        Ok(Self {
            app: AppConfig { env: app_env },
            storage: StorageConfig {
                hosts: storage_hosts,
                keyspace: env_or("STORAGE_KEYSPACE", "murmur"),
            },
            kafka: KafkaConfig {
                brokers,
                firehose_topic: env_or("KAFKA_FIREHOSE_TOPIC", "murmur.firehose"),
                group_id: env_or("KAFKA_CONSUMER_GROUP", "murmur-timeline-indexer"),
            },
        })
    }

    pub fn is_development(&self) -> bool {
        self.app.env != "production"
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
