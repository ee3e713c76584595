//! Pending operation buffer
//!
//! Mutex-protected generation double-buffer: staged operations accumulate
//! in the current generation until a flush swaps in an empty one and takes
//! ownership of the snapshot. No lock is ever held across network I/O.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};

use crate::store::{BulkOp, Version};

/// A staged write operation
///
/// `Update` carries its transform so a batch conflict can recompute the
/// payload against a refetched document; the retry budget rides with it.
pub(crate) enum PendingOp<T> {
    /// Write a pre-serialized payload
    Index {
        id: String,
        payload: Bytes,
        create_only: bool,
        expected_version: Option<Version>,
    },

    /// Optimistic read-modify-write staged for batch submission
    Update {
        id: String,
        payload: Bytes,
        expected_version: Version,
        transform: Arc<dyn Fn(T) -> T + Send + Sync>,
        /// Conflicts this op may still absorb by refetch + re-stage
        retries_left: u32,
        /// Write attempts made so far, including the one in flight
        attempts: u32,
    },

    /// Remove a document
    Delete { id: String },
}

impl<T> PendingOp<T> {
    /// Id of the document this operation targets
    pub(crate) fn id(&self) -> &str {
        match self {
            PendingOp::Index { id, .. } => id,
            PendingOp::Update { id, .. } => id,
            PendingOp::Delete { id } => id,
        }
    }

    /// Wire-level form submitted to the store
    ///
    /// Updates become conditional index operations; the retry bookkeeping
    /// stays behind in the buffer.
    pub(crate) fn to_bulk_op(&self) -> BulkOp {
        match self {
            PendingOp::Index {
                id,
                payload,
                create_only,
                expected_version,
            } => BulkOp::Index {
                id: id.clone(),
                payload: payload.clone(),
                create_only: *create_only,
                expected_version: *expected_version,
            },
            PendingOp::Update {
                id,
                payload,
                expected_version,
                ..
            } => BulkOp::Index {
                id: id.clone(),
                payload: payload.clone(),
                create_only: false,
                expected_version: Some(*expected_version),
            },
            PendingOp::Delete { id } => BulkOp::Delete { id: id.clone() },
        }
    }
}

/// Generation buffer shared by all stagers of one session
pub(crate) struct OpBuffer<T> {
    /// Current generation, in insertion order (swap-only under the lock)
    pending: Mutex<Vec<PendingOp<T>>>,

    /// Serializes batch submissions; never held while `pending` is locked
    /// for staging
    submission: Mutex<()>,

    /// Generation size that triggers an automatic flush
    threshold: usize,
}

impl<T> OpBuffer<T> {
    pub(crate) fn new(threshold: usize) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            submission: Mutex::new(()),
            threshold,
        }
    }

    /// Append to the current generation
    ///
    /// Returns true when the append brought the generation to the flush
    /// threshold; the caller is then responsible for flushing.
    pub(crate) fn stage(&self, op: PendingOp<T>) -> bool {
        let mut pending = self.pending.lock();
        pending.push(op);
        pending.len() >= self.threshold
    }

    /// Append without a threshold check
    ///
    /// Used while a submission is in flight to re-stage conflicted updates
    /// into the next generation; triggering a nested flush from inside the
    /// submission path would deadlock on the submission mutex.
    pub(crate) fn restage(&self, op: PendingOp<T>) {
        self.pending.lock().push(op);
    }

    /// Swap in an empty generation and return the drained snapshot
    pub(crate) fn take_generation(&self) -> Vec<PendingOp<T>> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Acquire the submission slot; at most one holder at a time
    pub(crate) fn lock_submission(&self) -> MutexGuard<'_, ()> {
        self.submission.lock()
    }

    /// Number of operations in the current generation
    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether the current generation is empty
    pub(crate) fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
