//! In-memory document store
//!
//! HashMap-backed store with per-id versioning, suitable for tests, local
//! development, and benchmarks. Implements the full [`DocumentStore`]
//! contract including ordered batch execution.
//!
//! ## Concurrency:
//! - `collections`: Protected by RwLock (many concurrent readers, exclusive writer)
//! - `bulk_executions`: Atomic counter (lock-free)
//! - All methods use `&self` (no exclusive access needed)

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::config::RequestOptions;
use crate::error::{Result, StoreError};

use super::{BulkOp, BulkOutcome, DocumentStore, RawHit, SearchResponse, Version};

/// One stored document: payload plus current version
type Doc = (Bytes, Version);

/// In-memory implementation of [`DocumentStore`]
///
/// Search does not interpret the query payload: every document in the
/// collection matches, ordered by id with a constant score. That is enough
/// to exercise cursor and decoding paths without a query engine behind it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// collection name -> (document id -> document)
    collections: RwLock<HashMap<String, HashMap<String, Doc>>>,

    /// Number of batch submissions served (atomic, lock-free)
    bulk_executions: AtomicU64,
}

impl MemoryStore {
    /// Create a new, empty store
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Number of documents currently held in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    /// Whether a collection holds no documents
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Current version of a document, if present
    pub fn current_version(&self, collection: &str, id: &str) -> Option<Version> {
        self.collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|(_, version)| *version)
    }

    /// Number of batch submissions this store has served
    pub fn bulk_executions(&self) -> u64 {
        self.bulk_executions.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Apply an index operation against one collection's documents
    ///
    /// Version rules:
    /// - Absent id: a supplied expected version cannot match (there is no
    ///   version to compare), the write is rejected; otherwise creation
    ///   assigns version 0.
    /// - Present id: create-only writes are rejected; an expected version
    ///   must equal the stored one; the new version is stored + 1.
    fn index_locked(
        docs: &mut HashMap<String, Doc>,
        id: &str,
        payload: Bytes,
        create_only: bool,
        expected_version: Option<Version>,
    ) -> Result<Version> {
        let new_version = match docs.get(id) {
            Some((_, stored)) => {
                if create_only {
                    return Err(StoreError::CreateConflict { id: id.to_string() });
                }
                if let Some(expected) = expected_version {
                    if expected != *stored {
                        return Err(StoreError::VersionConflict {
                            id: id.to_string(),
                            expected,
                            actual: Some(*stored),
                        });
                    }
                }
                stored + 1
            }
            None => {
                if let Some(expected) = expected_version {
                    return Err(StoreError::VersionConflict {
                        id: id.to_string(),
                        expected,
                        actual: None,
                    });
                }
                0
            }
        };

        docs.insert(id.to_string(), (payload, new_version));
        Ok(new_version)
    }

    /// Remove a document, reporting the version a successor write would get
    fn delete_locked(docs: &mut HashMap<String, Doc>, id: &str) -> Version {
        match docs.remove(id) {
            Some((_, version)) => version + 1,
            None => 0,
        }
    }
}

impl DocumentStore for MemoryStore {
    fn index(
        &self,
        collection: &str,
        id: &str,
        payload: Bytes,
        create_only: bool,
        expected_version: Option<Version>,
        _opts: &RequestOptions,
    ) -> Result<Version> {
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();
        Self::index_locked(docs, id, payload, create_only, expected_version)
    }

    fn get(
        &self,
        collection: &str,
        id: &str,
        _opts: &RequestOptions,
    ) -> Result<Option<(Bytes, Version)>> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    fn delete(&self, collection: &str, id: &str, _opts: &RequestOptions) -> Result<()> {
        let mut collections = self.collections.write();
        if let Some(docs) = collections.get_mut(collection) {
            Self::delete_locked(docs, id);
        }
        Ok(())
    }

    fn bulk_execute(
        &self,
        collection: &str,
        ops: Vec<BulkOp>,
        _opts: &RequestOptions,
    ) -> Result<Vec<BulkOutcome>> {
        self.bulk_executions.fetch_add(1, Ordering::SeqCst);

        // The whole batch executes under one write lock, so operations in the
        // same batch observe each other's effects in submission order.
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();

        let outcomes = ops
            .into_iter()
            .map(|op| match op {
                BulkOp::Index {
                    id,
                    payload,
                    create_only,
                    expected_version,
                } => match Self::index_locked(docs, &id, payload, create_only, expected_version) {
                    Ok(version) => BulkOutcome::Ok { version },
                    Err(StoreError::VersionConflict { .. })
                    | Err(StoreError::CreateConflict { .. }) => BulkOutcome::Conflict,
                    Err(StoreError::NotFound { .. }) => BulkOutcome::NotFound,
                    Err(e) => BulkOutcome::Error {
                        message: e.to_string(),
                    },
                },
                BulkOp::Delete { id } => BulkOutcome::Ok {
                    version: Self::delete_locked(docs, &id),
                },
            })
            .collect();

        Ok(outcomes)
    }

    fn search(
        &self,
        collection: &str,
        _query: Bytes,
        _opts: &RequestOptions,
    ) -> Result<SearchResponse> {
        let collections = self.collections.read();

        let mut hits: Vec<RawHit> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, (payload, _))| RawHit {
                        id: id.clone(),
                        payload: payload.clone(),
                        score: 1.0,
                    })
                    .collect()
            })
            .unwrap_or_default();

        // HashMap order is arbitrary; stabilize by id
        hits.sort_by(|a, b| a.id.cmp(&b.id));

        let total_hits = hits.len() as u64;
        Ok(SearchResponse { hits, total_hits })
    }

    fn refresh(&self, _collection: &str, _opts: &RequestOptions) -> Result<()> {
        // Writes are immediately visible in memory; nothing to do
        Ok(())
    }
}
