//! Document Store Module
//!
//! Defines the contract with the remote versioned document store.
//!
//! ## Responsibilities
//! - Trait for the store operations the core depends on
//! - Wire-level operation and outcome types for batch execution
//! - Raw search hit and response shapes
//!
//! The connection behind the trait (auth, pooling, node discovery) is out of
//! scope: implementations arrive at the repository already live. The store is
//! assumed safe for concurrent use by its own contract.

mod memory;

pub use memory::MemoryStore;

use bytes::Bytes;

use crate::config::RequestOptions;
use crate::error::Result;

/// Store-assigned document version
///
/// Strictly increases by one on every successful write to an id; undefined
/// after deletion. Creation assigns version 0.
pub type Version = u64;

/// A single operation within a batch request
#[derive(Debug, Clone)]
pub enum BulkOp {
    /// Write a document payload
    Index {
        id: String,
        payload: Bytes,
        /// Reject the write if the id already exists
        create_only: bool,
        /// Reject the write unless the stored version matches
        expected_version: Option<Version>,
    },

    /// Remove a document
    Delete { id: String },
}

impl BulkOp {
    /// Id of the document this operation targets
    pub fn id(&self) -> &str {
        match self {
            BulkOp::Index { id, .. } => id,
            BulkOp::Delete { id } => id,
        }
    }
}

/// Per-operation outcome of a batch request
///
/// Aligned index-for-index with the submitted operations.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOutcome {
    /// The write succeeded with the given new version
    ///
    /// For deletes the version is reported by the store but carries no
    /// meaning; a deleted document has no version.
    Ok { version: Version },

    /// A version or create-only precondition failed
    Conflict,

    /// The target document does not exist
    NotFound,

    /// The store rejected the operation for another reason
    Error { message: String },
}

/// A raw, undecoded search hit
#[derive(Debug, Clone)]
pub struct RawHit {
    /// Document id
    pub id: String,

    /// Raw stored payload (may be empty if the store omitted the source)
    pub payload: Bytes,

    /// Relevance score assigned by the store
    pub score: f32,
}

/// Response to a search request
#[derive(Debug, Clone)]
pub struct SearchResponse {
    /// Matching hits in store order
    pub hits: Vec<RawHit>,

    /// Total matches reported by the store, independent of `hits.len()`
    pub total_hits: u64,
}

/// Contract with the remote versioned document store
///
/// All methods block until the store responds. Implementations must be safe
/// for concurrent callers.
pub trait DocumentStore: Send + Sync {
    /// Write a document, returning its new version
    ///
    /// Fails with `CreateConflict` if `create_only` and the id exists, or
    /// `VersionConflict` if `expected_version` does not match the store.
    fn index(
        &self,
        collection: &str,
        id: &str,
        payload: Bytes,
        create_only: bool,
        expected_version: Option<Version>,
        opts: &RequestOptions,
    ) -> Result<Version>;

    /// Read a document and its current version; `None` if absent
    fn get(
        &self,
        collection: &str,
        id: &str,
        opts: &RequestOptions,
    ) -> Result<Option<(Bytes, Version)>>;

    /// Remove a document; absent ids are not an error
    fn delete(&self, collection: &str, id: &str, opts: &RequestOptions) -> Result<()>;

    /// Execute operations as one ordered batch
    ///
    /// Returns one outcome per operation, aligned index-for-index. A
    /// transport failure of the batch itself fails the whole call.
    fn bulk_execute(
        &self,
        collection: &str,
        ops: Vec<BulkOp>,
        opts: &RequestOptions,
    ) -> Result<Vec<BulkOutcome>>;

    /// Run a search with an opaque query payload
    fn search(
        &self,
        collection: &str,
        query: Bytes,
        opts: &RequestOptions,
    ) -> Result<SearchResponse>;

    /// Make all completed writes visible to subsequent searches
    fn refresh(&self, collection: &str, opts: &RequestOptions) -> Result<()>;
}
