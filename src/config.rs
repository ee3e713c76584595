//! Configuration for VeriStore
//!
//! Centralized configuration with sensible defaults.

use std::sync::Arc;
use std::time::Duration;

use crate::backoff::{Backoff, UniformBackoff};

/// Per-request options forwarded unchanged to the document store
///
/// The store connection itself (auth, pooling, node discovery) is resolved
/// before a repository is constructed; these are the few knobs that remain
/// per-call.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Optional per-request deadline, interpreted by the store client
    pub timeout: Option<Duration>,
}

/// Main configuration for a repository instance
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    // -------------------------------------------------------------------------
    // Collection Configuration
    // -------------------------------------------------------------------------
    /// Name of the collection this repository reads and writes
    pub collection: String,

    /// Optional document type name recorded alongside writes
    /// (stores that do not distinguish types ignore it)
    pub type_alias: Option<String>,

    // -------------------------------------------------------------------------
    // Behavior Configuration
    // -------------------------------------------------------------------------
    /// Whether `refresh()` (an administrative visibility operation) is
    /// permitted on this repository
    pub refresh_allowed: bool,

    /// Default retry budget for `update()` version conflicts
    pub max_update_retries: u32,

    /// Delay policy between conflict retries
    pub backoff: Arc<dyn Backoff>,

    // -------------------------------------------------------------------------
    // Request Configuration
    // -------------------------------------------------------------------------
    /// Options attached to every store call made by this repository
    pub request_options: RequestOptions,
}

impl RepositoryConfig {
    /// Create a config for the given collection with default settings
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            type_alias: None,
            refresh_allowed: false,
            max_update_retries: 2,
            backoff: Arc::new(UniformBackoff::default()),
            request_options: RequestOptions::default(),
        }
    }

    /// Create a new config builder for the given collection
    pub fn builder(collection: impl Into<String>) -> RepositoryConfigBuilder {
        RepositoryConfigBuilder {
            config: Self::new(collection),
        }
    }
}

/// Builder for RepositoryConfig
pub struct RepositoryConfigBuilder {
    config: RepositoryConfig,
}

impl RepositoryConfigBuilder {
    /// Set the document type name
    pub fn type_alias(mut self, alias: impl Into<String>) -> Self {
        self.config.type_alias = Some(alias.into());
        self
    }

    /// Allow or forbid the `refresh()` administrative operation
    pub fn refresh_allowed(mut self, allowed: bool) -> Self {
        self.config.refresh_allowed = allowed;
        self
    }

    /// Set the default retry budget for `update()` conflicts
    pub fn max_update_retries(mut self, retries: u32) -> Self {
        self.config.max_update_retries = retries;
        self
    }

    /// Set the delay policy between conflict retries
    pub fn backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Set the options attached to every store call
    pub fn request_options(mut self, options: RequestOptions) -> Self {
        self.config.request_options = options;
        self
    }

    pub fn build(self) -> RepositoryConfig {
        self.config
    }
}

/// Configuration for a bulk write session
#[derive(Debug, Clone)]
pub struct BulkConfig {
    /// Number of staged operations that triggers an automatic flush
    pub flush_threshold: usize,

    /// Retry budget for version conflicts resolved within the buffer
    pub update_retries: u32,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            flush_threshold: 1000,
            update_retries: 2,
        }
    }
}

impl BulkConfig {
    /// Create a bulk config with the given flush threshold
    ///
    /// A threshold of zero is clamped to one: every staged operation would
    /// otherwise flush before it could batch with anything.
    pub fn with_threshold(flush_threshold: usize) -> Self {
        Self {
            flush_threshold: flush_threshold.max(1),
            update_retries: Self::default().update_retries,
        }
    }

    /// Set the in-buffer conflict retry budget
    pub fn update_retries(mut self, retries: u32) -> Self {
        self.update_retries = retries;
        self
    }
}
