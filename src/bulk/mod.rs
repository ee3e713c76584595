//! Bulk Write Module
//!
//! Buffered, batched writes with in-batch conflict resolution.
//!
//! ## Responsibilities
//! - Stage operations from any number of concurrent producers
//! - Auto-flush when a generation reaches the configured threshold
//! - Resolve version conflicts inside the batch by refetch + re-stage
//! - Guarantee a final flush on every exit path of the session
//!
//! ## Flush Discipline
//!
//! The pending generation lives behind a mutex held only long enough to
//! append or to swap in a fresh empty generation. The drained snapshot is
//! submitted over the network under a separate submission mutex, so:
//! - stagers never wait for a network round trip (the stager that crosses
//!   the threshold performs the flush itself and is the only one blocked)
//! - at most one submission is in flight per session; flushes triggered
//!   meanwhile queue behind it instead of racing overlapping snapshots

mod buffer;
mod session;

pub use session::{BulkReport, BulkSession};

pub(crate) use buffer::{OpBuffer, PendingOp};
