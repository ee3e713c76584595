//! Bulk write session
//!
//! Scoped owner of one operation buffer: stages writes, flushes batches,
//! resolves in-batch conflicts, and drains itself on close or drop.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::BulkConfig;
use crate::error::{Result, StoreError};
use crate::repository::Repository;
use crate::store::{BulkOutcome, Version};

use super::{OpBuffer, PendingOp};

/// Per-id outcomes accumulated over all flushes of one session
///
/// Every staged operation lands in exactly one of `successes` or
/// `failures`; a conflicted update that retries is counted once, at its
/// final outcome.
#[derive(Debug, Clone, Default)]
pub struct BulkReport {
    /// Ids written successfully, with their new versions
    pub successes: Vec<(String, Version)>,

    /// Ids that failed, with the failure
    pub failures: Vec<(String, StoreError)>,

    /// Batches submitted
    pub flushes: u64,

    /// Conflicts absorbed by refetch + re-stage
    pub conflicts_retried: u64,
}

impl BulkReport {
    /// Whether every staged operation succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Buffered bulk writer over one repository
///
/// All staging methods take `&self` and are safe for concurrent callers.
/// Staging past the flush threshold submits the buffered generation as one
/// ordered batch; `close()` (or the session's `Drop`) flushes whatever
/// remains, so staged writes are never silently dropped.
pub struct BulkSession<'a, T> {
    repo: &'a Repository<T>,

    /// Staged operations, swapped wholesale at flush
    buffer: OpBuffer<T>,

    /// Outcomes accumulated across flushes
    report: Mutex<BulkReport>,

    /// Conflict retry budget for ops staged via `resolve_update`
    update_retries: u32,

    /// Set by `close()` so `Drop` does not drain twice
    closed: bool,
}

impl<'a, T> BulkSession<'a, T> {
    /// Open a session over the repository with the given settings
    pub(crate) fn new(repo: &'a Repository<T>, config: BulkConfig) -> Self {
        Self {
            repo,
            buffer: OpBuffer::new(config.flush_threshold.max(1)),
            report: Mutex::new(BulkReport::default()),
            update_retries: config.update_retries,
            closed: false,
        }
    }

    // =========================================================================
    // Staging
    // =========================================================================

    /// Stage a create-only write
    pub fn index(&self, id: &str, value: &T) -> Result<()> {
        self.index_with(id, value, true, None)
    }

    /// Stage a write with explicit create/version preconditions
    pub fn index_with(
        &self,
        id: &str,
        value: &T,
        create_only: bool,
        expected_version: Option<Version>,
    ) -> Result<()> {
        let payload = self.repo.codec().serialize(value)?;
        self.stage(PendingOp::Index {
            id: id.to_string(),
            payload,
            create_only,
            expected_version,
        })
    }

    /// Stage a delete
    pub fn delete(&self, id: &str) -> Result<()> {
        self.stage(PendingOp::Delete { id: id.to_string() })
    }

    /// Stage an optimistic read-modify-write without a network round trip
    ///
    /// Applies `transform` to the caller-provided current value and stages
    /// the result conditioned on `expected_version`. If the batch later
    /// reports a version conflict, the session refetches the document,
    /// recomputes the transform, and re-stages for the next flush, up to
    /// the session's configured retry budget. Past the budget the id fails
    /// with `UpdateFailed` in the report.
    pub fn resolve_update<F>(
        &self,
        id: &str,
        expected_version: Version,
        current: T,
        transform: F,
    ) -> Result<()>
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        let transform: Arc<dyn Fn(T) -> T + Send + Sync> = Arc::new(transform);
        let next = transform(current);
        let payload = self.repo.codec().serialize(&next)?;

        self.stage(PendingOp::Update {
            id: id.to_string(),
            payload,
            expected_version,
            transform,
            retries_left: self.update_retries,
            attempts: 1,
        })
    }

    /// Append one operation, flushing if the generation filled up
    fn stage(&self, op: PendingOp<T>) -> Result<()> {
        tracing::trace!("Staging operation for '{}'", op.id());

        // The append holds the buffer lock only for the push; if this
        // append crossed the threshold, this caller performs the flush.
        if self.buffer.stage(op) {
            self.flush()?;
        }
        Ok(())
    }

    // =========================================================================
    // Flushing
    // =========================================================================

    /// Submit the current generation as one ordered batch
    ///
    /// Flushing an empty generation is a no-op. A flush triggered while
    /// another submission is in flight waits its turn; it then drains
    /// whatever generation exists at that point (possibly nothing, if the
    /// earlier flush already took it).
    pub fn flush(&self) -> Result<()> {
        let _submission = self.buffer.lock_submission();

        let generation = self.buffer.take_generation();
        if generation.is_empty() {
            return Ok(());
        }
        self.submit(generation)
    }

    /// Flush repeatedly until nothing is staged
    ///
    /// Conflict retries re-stage into the next generation, so one flush is
    /// not always enough. Terminates because every re-stage spends retry
    /// budget.
    fn drain(&self) -> Result<()> {
        while !self.buffer.is_empty() {
            self.flush()?;
        }
        Ok(())
    }

    /// Submit one drained generation and fold outcomes into the report
    ///
    /// Called with the submission lock held and no buffer lock held: the
    /// batch call and any conflict refetches happen without blocking
    /// stagers.
    fn submit(&self, generation: Vec<PendingOp<T>>) -> Result<()> {
        let ops: Vec<_> = generation.iter().map(PendingOp::to_bulk_op).collect();
        let submitted = ops.len();

        let outcomes = self.repo.store().bulk_execute(
            self.repo.collection(),
            ops,
            &self.repo.config().request_options,
        )?;

        if outcomes.len() != submitted {
            return Err(StoreError::Transport(format!(
                "store returned {} outcomes for {} operations",
                outcomes.len(),
                submitted
            )));
        }

        tracing::debug!(
            "Flushed {} operation(s) to '{}'",
            submitted,
            self.repo.collection()
        );

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        let mut retried = 0u64;

        for (op, outcome) in generation.into_iter().zip(outcomes) {
            match outcome {
                BulkOutcome::Ok { version } => {
                    successes.push((op.id().to_string(), version));
                }
                BulkOutcome::Conflict => match op {
                    PendingOp::Update {
                        id,
                        transform,
                        retries_left,
                        attempts,
                        ..
                    } if retries_left > 0 => {
                        match self.refetch_and_restage(&id, transform, retries_left, attempts) {
                            Ok(()) => retried += 1,
                            Err(e) => failures.push((id, e)),
                        }
                    }
                    PendingOp::Update { id, attempts, .. } => {
                        failures.push((
                            id.clone(),
                            StoreError::UpdateFailed { id, attempts },
                        ));
                    }
                    PendingOp::Index {
                        id,
                        create_only: true,
                        ..
                    } => {
                        failures.push((id.clone(), StoreError::CreateConflict { id }));
                    }
                    PendingOp::Index {
                        id,
                        expected_version,
                        ..
                    } => {
                        failures.push((
                            id.clone(),
                            StoreError::VersionConflict {
                                id,
                                expected: expected_version.unwrap_or(0),
                                actual: None,
                            },
                        ));
                    }
                    PendingOp::Delete { id } => {
                        failures.push((
                            id,
                            StoreError::Transport(
                                "store reported a conflict for a delete".to_string(),
                            ),
                        ));
                    }
                },
                BulkOutcome::NotFound => {
                    let id = op.id().to_string();
                    failures.push((id.clone(), StoreError::NotFound { id }));
                }
                BulkOutcome::Error { message } => {
                    failures.push((op.id().to_string(), StoreError::Transport(message)));
                }
            }
        }

        let mut report = self.report.lock();
        report.flushes += 1;
        report.conflicts_retried += retried;
        report.successes.append(&mut successes);
        report.failures.append(&mut failures);

        Ok(())
    }

    /// Recompute a conflicted update against the store's current state
    ///
    /// The refetch is a point read outside the batch; its failure is the
    /// caller's to record against this id, leaving sibling outcomes alone.
    fn refetch_and_restage(
        &self,
        id: &str,
        transform: Arc<dyn Fn(T) -> T + Send + Sync>,
        retries_left: u32,
        attempts: u32,
    ) -> Result<()> {
        let fetched = self.repo.store().get(
            self.repo.collection(),
            id,
            &self.repo.config().request_options,
        )?;

        let (payload, version) = match fetched {
            Some(doc) => doc,
            // The document vanished between conflict and refetch
            None => {
                return Err(StoreError::NotFound { id: id.to_string() });
            }
        };

        let current = self.repo.codec().deserialize(&payload)?;
        let next = transform(current);
        let payload = self.repo.codec().serialize(&next)?;

        tracing::debug!(
            "Conflict on '{}', re-staged against version {} ({} retries left)",
            id,
            version,
            retries_left - 1
        );

        self.buffer.restage(PendingOp::Update {
            id: id.to_string(),
            payload,
            expected_version: version,
            transform,
            retries_left: retries_left - 1,
            attempts: attempts + 1,
        });

        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Flush everything staged and return the accumulated report
    ///
    /// The final flush loops until conflict retries are either resolved or
    /// out of budget; unresolved ids appear in the report's failures.
    pub fn close(mut self) -> Result<BulkReport> {
        self.closed = true;
        self.drain()?;
        Ok(std::mem::take(&mut *self.report.lock()))
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Number of operations staged in the current generation
    pub fn staged(&self) -> usize {
        self.buffer.len()
    }

    /// Snapshot of the report accumulated so far
    pub fn report(&self) -> BulkReport {
        self.report.lock().clone()
    }
}

impl<T> Drop for BulkSession<'_, T> {
    /// Best-effort drain for sessions dropped without `close()`
    ///
    /// An error here has nowhere to propagate; it is logged and the
    /// remaining operations are lost with it.
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.drain() {
            tracing::error!(
                "Flush on bulk session drop failed, {} staged operation(s) lost: {}",
                self.buffer.len(),
                e
            );
        }
    }
}
