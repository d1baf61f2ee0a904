use common::postgres::PostgresSettings;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Timeout for start-up operations (connects, pings) in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // NATS configuration
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Stream holding the two feedback queues
    #[serde(default = "default_feedback_stream")]
    pub feedback_stream: String,

    #[serde(default = "default_generation_status_queue")]
    pub generation_status_queue: String,

    #[serde(default = "default_encryption_status_queue")]
    pub encryption_status_queue: String,

    /// Stream holding the two pipeline request queues
    #[serde(default = "default_request_stream")]
    pub request_stream: String,

    #[serde(default = "default_generation_request_queue")]
    pub generation_request_queue: String,

    #[serde(default = "default_encryption_request_queue")]
    pub encryption_request_queue: String,

    #[serde(default = "default_consumer_batch_size")]
    pub consumer_batch_size: usize,

    #[serde(default = "default_consumer_max_wait_secs")]
    pub consumer_max_wait_secs: u64,

    // Postgres configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_pool_size")]
    pub postgres_pool_size: usize,

    // Bundle lifecycle configuration
    /// Global switch for the generation → encryption cross-phase trigger
    #[serde(default = "default_encryption_enabled")]
    pub encryption_enabled: bool,

    /// Environment name carried in encryption requests
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Artifact extension used by the encryption bundle-url convention
    #[serde(default = "default_bundle_extension")]
    pub bundle_extension: String,

    /// Retry-After hint (seconds) returned for accepted generation requests
    #[serde(default = "default_retry_after_secs")]
    pub retry_after_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    30
}

// NATS defaults
fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_feedback_stream() -> String {
    "bundle-feedback".to_string()
}

fn default_generation_status_queue() -> String {
    "bundle-feedback.generation-status".to_string()
}

fn default_encryption_status_queue() -> String {
    "bundle-feedback.encryption-status".to_string()
}

fn default_request_stream() -> String {
    "bundle-requests".to_string()
}

fn default_generation_request_queue() -> String {
    "bundle-requests.generation".to_string()
}

fn default_encryption_request_queue() -> String {
    "bundle-requests.encryption".to_string()
}

fn default_consumer_batch_size() -> usize {
    30
}

fn default_consumer_max_wait_secs() -> u64 {
    5
}

// Postgres defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "bundles".to_string()
}

fn default_postgres_username() -> String {
    "bundle_service".to_string()
}

fn default_postgres_password() -> String {
    "bundle_service".to_string()
}

fn default_postgres_pool_size() -> usize {
    8
}

// Lifecycle defaults
fn default_encryption_enabled() -> bool {
    true
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_bundle_extension() -> String {
    "tar.gz".to_string()
}

fn default_retry_after_secs() -> u64 {
    30
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("BUNDLE"))
            .build()?
            .try_deserialize()
    }

    pub fn postgres_settings(&self) -> PostgresSettings {
        PostgresSettings {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_pool_size,
        }
    }
}
