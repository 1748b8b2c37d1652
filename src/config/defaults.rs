//! Typed default configuration.
//!
//! Compile-time type-checked defaults instead of an embedded defaults file;
//! every field can be overridden from `gateway.toml` or a custom file passed
//! with `--config`.

use std::path::PathBuf;

use super::{
    Config, FailureStoreConfig, HttpApiConfig, MigrationConfig, NotificationConfig,
    ObservabilityConfig, SecurityConfig, TripleStoreConfig, UpdateChannelConfig,
};

pub(crate) fn config() -> Config {
    Config {
        http_api: HttpApiConfig {
            enabled: true,
            port: 8890,
            public_endpoint_enabled: true,
        },
        security: SecurityConfig {
            enabled: false,
            allowed_roles: vec!["admin".to_string()],
        },
        triple_store: TripleStoreConfig {
            data_path: Some(PathBuf::from("data/triplestore")),
            query_timeout_secs: 30,
            batch_size: 1000,
            max_retry: 5,
        },
        update_channel: UpdateChannelConfig {
            capacity: 64,
            concurrency: 1,
            max_redeliveries: 5,
            redelivery_backoff_ms: 500,
        },
        migration: MigrationConfig {
            enabled: false,
            directory: PathBuf::from("data/migrations"),
            default_graph: "urn:graph:default".to_string(),
            poll_interval_secs: 10,
        },
        failure_store: FailureStoreConfig {
            directory: PathBuf::from("data/update-failures"),
        },
        notification: NotificationConfig { endpoint: None },
        observability: ObservabilityConfig {
            metrics_enabled: false,
            metrics_port: 9464,
        },
    }
}
