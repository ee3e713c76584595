//! # VeriStore
//!
//! A versioned document repository over a remote document store, with:
//! - Optimistic concurrency control (expected-version write preconditions)
//! - Read-modify-write updates with bounded, randomized-backoff retry
//! - Buffered bulk writes with auto-flush and in-batch conflict resolution
//! - Lazy decoding of search results
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Callers                               │
//! │              (Multiple Concurrent Threads)                   │
//! └───────────┬─────────────────────────────────┬───────────────┘
//!             │                                 │
//! ┌───────────▼───────────┐         ┌───────────▼───────────┐
//! │     Repository<T>     │◄────────│    BulkSession<T>     │
//! │  (point ops, update   │  opens  │  (staged generations, │
//! │   retry loop, search) │         │   batch submission)   │
//! └───────────┬───────────┘         └───────────┬───────────┘
//!             │          ┌──────────┐           │
//!             ├──────────│ Codec<T> │───────────┤
//!             │          └──────────┘           │
//! ┌───────────▼───────────────────────────────────▼───────────┐
//! │                     DocumentStore                           │
//! │        (remote versioned store, already connected)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod backoff;
pub mod codec;
pub mod store;
pub mod cursor;
pub mod bulk;
pub mod repository;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StoreError};
pub use config::{BulkConfig, RepositoryConfig, RequestOptions};
pub use backoff::{Backoff, ExponentialBackoff, UniformBackoff};
pub use codec::{BincodeCodec, Codec};
pub use store::{BulkOp, BulkOutcome, DocumentStore, MemoryStore, RawHit, SearchResponse, Version};
pub use cursor::{Hit, SearchCursor};
pub use bulk::{BulkReport, BulkSession};
pub use repository::Repository;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of VeriStore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
