//! Repository Module
//!
//! Versioned, optimistic-concurrency CRUD over a remote document store.
//!
//! ## Responsibilities
//! - Point reads and writes with version preconditions
//! - Read-modify-write updates with bounded conflict retry
//! - Search entry point producing lazy result cursors
//! - Bulk session entry points with guaranteed flush on scope exit
//!
//! ## Concurrency Model
//!
//! Every method takes `&self`; a repository is shared freely across threads.
//! The store connection is assumed concurrent-safe by its own contract, and
//! the repository itself holds no mutable state. Only store calls and retry
//! backoff sleeps block.

use std::sync::Arc;
use std::thread;

use bytes::Bytes;

use crate::bulk::{BulkReport, BulkSession};
use crate::codec::Codec;
use crate::config::{BulkConfig, RepositoryConfig};
use crate::cursor::SearchCursor;
use crate::error::{Result, StoreError};
use crate::store::{DocumentStore, Version};

/// Versioned document repository
///
/// Wraps a live [`DocumentStore`] and a [`Codec`] for one collection. All
/// conflict handling policy (retry budget, backoff) comes from the
/// [`RepositoryConfig`] supplied at construction; there is exactly one way
/// to build a repository.
pub struct Repository<T> {
    /// Remote store handle (already connected and authenticated)
    store: Arc<dyn DocumentStore>,

    /// Payload codec for the document type
    codec: Arc<dyn Codec<T>>,

    /// Collection, retry, and request configuration
    config: RepositoryConfig,
}

impl<T> Repository<T> {
    /// Create a repository over the given store and codec
    pub fn new(
        store: Arc<dyn DocumentStore>,
        codec: Arc<dyn Codec<T>>,
        config: RepositoryConfig,
    ) -> Self {
        tracing::debug!(
            "Opened repository for collection '{}' (type '{}')",
            config.collection,
            config.type_alias.as_deref().unwrap_or("_doc")
        );
        Self {
            store,
            codec,
            config,
        }
    }

    // =========================================================================
    // Point Operations
    // =========================================================================

    /// Create a document
    ///
    /// Create-only: fails with `CreateConflict` if the id already exists.
    /// The stored document gets version 0.
    pub fn index(&self, id: &str, value: &T) -> Result<Version> {
        self.index_with(id, value, true, None)
    }

    /// Write a document with explicit create/version preconditions
    ///
    /// - `create_only`: reject the write if the id already exists
    /// - `expected_version`: reject the write unless the stored version
    ///   matches (`VersionConflict`)
    pub fn index_with(
        &self,
        id: &str,
        value: &T,
        create_only: bool,
        expected_version: Option<Version>,
    ) -> Result<Version> {
        let payload = self.codec.serialize(value)?;
        self.store.index(
            &self.config.collection,
            id,
            payload,
            create_only,
            expected_version,
            &self.config.request_options,
        )
    }

    /// Read a document and its current version
    ///
    /// Absence is `Ok(None)`, not an error.
    pub fn get(&self, id: &str) -> Result<Option<(T, Version)>> {
        match self
            .store
            .get(&self.config.collection, id, &self.config.request_options)?
        {
            Some((payload, version)) => {
                let value = self.codec.deserialize(&payload)?;
                Ok(Some((value, version)))
            }
            None => Ok(None),
        }
    }

    /// Remove a document
    ///
    /// Idempotent: deleting an absent id succeeds unless the store itself
    /// objects.
    pub fn delete(&self, id: &str) -> Result<()> {
        self.store
            .delete(&self.config.collection, id, &self.config.request_options)
    }

    // =========================================================================
    // Read-Modify-Write
    // =========================================================================

    /// Update a document through a transform, retrying version conflicts
    ///
    /// Uses the retry budget from the repository config. See
    /// [`update_with_retries`](Self::update_with_retries).
    pub fn update<F>(&self, id: &str, transform: F) -> Result<(T, Version)>
    where
        F: FnMut(T) -> T,
    {
        self.update_with_retries(id, self.config.max_update_retries, transform)
    }

    /// Update a document through a transform with an explicit retry budget
    ///
    /// Loop:
    /// 1. Fetch the current value and version; absent is fatal (`NotFound`)
    /// 2. Apply the transform
    /// 3. Write with the fetched version as precondition
    /// 4. On `VersionConflict` with budget left: sleep the configured
    ///    backoff and go to 1; with budget exhausted: `UpdateFailed`
    ///
    /// Any other failure propagates immediately. A success after one or
    /// more retries logs a diagnostic but is otherwise indistinguishable
    /// from a first-attempt success.
    pub fn update_with_retries<F>(
        &self,
        id: &str,
        max_retries: u32,
        mut transform: F,
    ) -> Result<(T, Version)>
    where
        F: FnMut(T) -> T,
    {
        let mut attempt: u32 = 0;

        loop {
            let (current, version) = self.get(id)?.ok_or_else(|| StoreError::NotFound {
                id: id.to_string(),
            })?;

            let next = transform(current);
            let payload = self.codec.serialize(&next)?;

            match self.store.index(
                &self.config.collection,
                id,
                payload,
                false,
                Some(version),
                &self.config.request_options,
            ) {
                Ok(new_version) => {
                    if attempt > 0 {
                        tracing::warn!(
                            "Update of '{}' succeeded after {} attempts",
                            id,
                            attempt + 1
                        );
                    }
                    return Ok((next, new_version));
                }
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let delay = self.config.backoff.delay(attempt);
                    tracing::debug!(
                        "Version conflict on '{}' (attempt {}), backing off {}ms",
                        id,
                        attempt + 1,
                        delay.as_millis()
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(StoreError::UpdateFailed {
                        id: id.to_string(),
                        attempts: attempt + 1,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Run a search and return a lazy cursor over the results
    ///
    /// The query payload is produced by an external builder and passed
    /// through to the store unchanged.
    pub fn search(&self, query: impl Into<Bytes>) -> Result<SearchCursor<T>> {
        let response = self.store.search(
            &self.config.collection,
            query.into(),
            &self.config.request_options,
        )?;
        Ok(SearchCursor::new(response, Arc::clone(&self.codec)))
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Make completed writes visible to subsequent searches
    ///
    /// Gated by configuration: fails with `Unsupported` unless the config
    /// enables it.
    pub fn refresh(&self) -> Result<()> {
        if !self.config.refresh_allowed {
            return Err(StoreError::Unsupported(format!(
                "refresh is disabled for collection '{}'",
                self.config.collection
            )));
        }
        self.store
            .refresh(&self.config.collection, &self.config.request_options)
    }

    // =========================================================================
    // Bulk Sessions
    // =========================================================================

    /// Open a bulk write session with default settings
    pub fn bulk(&self) -> BulkSession<'_, T> {
        self.bulk_with(BulkConfig::default())
    }

    /// Open a bulk write session with explicit settings
    pub fn bulk_with(&self, config: BulkConfig) -> BulkSession<'_, T> {
        BulkSession::new(self, config)
    }

    /// Run a closure against a bulk session, flushing on every exit path
    ///
    /// The session's final flush happens whether the closure completes or
    /// returns an error; buffered writes are never silently dropped. On
    /// success the accumulated per-id report is returned with the closure's
    /// output.
    pub fn with_bulk<R, F>(&self, config: BulkConfig, f: F) -> Result<(R, BulkReport)>
    where
        F: FnOnce(&BulkSession<'_, T>) -> Result<R>,
    {
        let session = self.bulk_with(config);

        match f(&session) {
            Ok(out) => {
                let report = session.close()?;
                Ok((out, report))
            }
            Err(e) => {
                // Abort path: drain what was staged, then surface the
                // closure's error rather than any flush error.
                if let Err(flush_err) = session.close() {
                    tracing::error!(
                        "Final flush after aborted bulk scope failed: {}",
                        flush_err
                    );
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the collection name
    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    /// Get the configuration
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Store handle, shared with bulk sessions
    pub(crate) fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Codec handle, shared with bulk sessions
    pub(crate) fn codec(&self) -> &Arc<dyn Codec<T>> {
        &self.codec
    }
}
