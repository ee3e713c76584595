//! Tests for Repository
//!
//! These tests verify:
//! - Version assignment and chaining across writes
//! - Create-only and expected-version preconditions
//! - Read/delete semantics for absent documents
//! - The update retry loop (bounded, conflict-only)
//! - Refresh gating
//! - Search through the repository

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use veristore::{
    Backoff, BincodeCodec, DocumentStore, ExponentialBackoff, MemoryStore, Repository,
    RepositoryConfig, RequestOptions, StoreError, UniformBackoff,
};

// =============================================================================
// Helper Functions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Account {
    owner: String,
    balance: i64,
}

fn account(owner: &str, balance: i64) -> Account {
    Account {
        owner: owner.to_string(),
        balance,
    }
}

/// Backoff short enough that retry tests don't stall the suite
fn fast_backoff() -> Arc<UniformBackoff> {
    Arc::new(UniformBackoff {
        min: Duration::ZERO,
        max: Duration::from_millis(1),
    })
}

fn test_config() -> RepositoryConfig {
    RepositoryConfig::builder("accounts")
        .backoff(fast_backoff())
        .build()
}

fn setup_repo() -> (Arc<MemoryStore>, Repository<Account>) {
    let store = Arc::new(MemoryStore::new());
    let repo = Repository::new(
        store.clone() as Arc<dyn DocumentStore>,
        Arc::new(BincodeCodec::new()),
        test_config(),
    );
    (store, repo)
}

fn setup_repo_over(store: Arc<dyn DocumentStore>) -> Repository<Account> {
    Repository::new(store, Arc::new(BincodeCodec::new()), test_config())
}

/// Store wrapper that fails the next N index calls with a version conflict
struct ConflictingStore {
    inner: MemoryStore,
    conflicts_left: AtomicU32,
}

impl ConflictingStore {
    fn new(conflicts: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            conflicts_left: AtomicU32::new(conflicts),
        }
    }
}

impl DocumentStore for ConflictingStore {
    fn index(
        &self,
        collection: &str,
        id: &str,
        payload: Bytes,
        create_only: bool,
        expected_version: Option<u64>,
        opts: &RequestOptions,
    ) -> veristore::Result<u64> {
        // Only conditional writes consume the injection budget
        if let Some(expected) = expected_version {
            let injected = self
                .conflicts_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if injected {
                return Err(StoreError::VersionConflict {
                    id: id.to_string(),
                    expected,
                    actual: None,
                });
            }
        }
        self.inner
            .index(collection, id, payload, create_only, expected_version, opts)
    }

    fn get(
        &self,
        collection: &str,
        id: &str,
        opts: &RequestOptions,
    ) -> veristore::Result<Option<(Bytes, u64)>> {
        self.inner.get(collection, id, opts)
    }

    fn delete(&self, collection: &str, id: &str, opts: &RequestOptions) -> veristore::Result<()> {
        self.inner.delete(collection, id, opts)
    }

    fn bulk_execute(
        &self,
        collection: &str,
        ops: Vec<veristore::BulkOp>,
        opts: &RequestOptions,
    ) -> veristore::Result<Vec<veristore::BulkOutcome>> {
        self.inner.bulk_execute(collection, ops, opts)
    }

    fn search(
        &self,
        collection: &str,
        query: Bytes,
        opts: &RequestOptions,
    ) -> veristore::Result<veristore::SearchResponse> {
        self.inner.search(collection, query, opts)
    }

    fn refresh(&self, collection: &str, opts: &RequestOptions) -> veristore::Result<()> {
        self.inner.refresh(collection, opts)
    }
}

// =============================================================================
// Versioning Tests
// =============================================================================

#[test]
fn test_index_assigns_version_zero_on_create() {
    let (_store, repo) = setup_repo();

    let version = repo.index("alice", &account("alice", 100)).unwrap();

    assert_eq!(version, 0);
}

#[test]
fn test_versions_increment_by_one_per_write() {
    let (_store, repo) = setup_repo();

    // Creation is write number zero
    let mut version = repo.index("alice", &account("alice", 0)).unwrap();
    assert_eq!(version, 0);

    // Each chained write observes exactly one more than it targeted
    for k in 1..=5 {
        version = repo
            .index_with("alice", &account("alice", k), false, Some(version))
            .unwrap();
        assert_eq!(version, k as u64);
    }
}

#[test]
fn test_index_create_conflict_on_existing_id() {
    let (_store, repo) = setup_repo();

    repo.index("alice", &account("alice", 100)).unwrap();
    let err = repo.index("alice", &account("alice", 200)).unwrap_err();

    assert!(matches!(err, StoreError::CreateConflict { .. }));
}

#[test]
fn test_index_with_correct_expected_version_succeeds() {
    let (_store, repo) = setup_repo();

    let v0 = repo.index("alice", &account("alice", 100)).unwrap();
    let v1 = repo
        .index_with("alice", &account("alice", 200), false, Some(v0))
        .unwrap();

    assert_eq!(v1, 1);
    let (stored, _) = repo.get("alice").unwrap().unwrap();
    assert_eq!(stored.balance, 200);
}

#[test]
fn test_index_with_stale_expected_version_conflicts() {
    let (_store, repo) = setup_repo();

    repo.index("alice", &account("alice", 100)).unwrap();
    repo.index_with("alice", &account("alice", 200), false, Some(0))
        .unwrap(); // now at version 1

    let err = repo
        .index_with("alice", &account("alice", 300), false, Some(0))
        .unwrap_err();

    match err {
        StoreError::VersionConflict {
            expected, actual, ..
        } => {
            assert_eq!(expected, 0);
            assert_eq!(actual, Some(1));
        }
        other => panic!("Expected VersionConflict, got {:?}", other),
    }
}

// =============================================================================
// Read/Delete Tests
// =============================================================================

#[test]
fn test_get_absent_returns_none() {
    let (_store, repo) = setup_repo();

    assert!(repo.get("nobody").unwrap().is_none());
}

#[test]
fn test_get_returns_value_and_version() {
    let (_store, repo) = setup_repo();

    repo.index("alice", &account("alice", 100)).unwrap();

    let (value, version) = repo.get("alice").unwrap().unwrap();
    assert_eq!(value, account("alice", 100));
    assert_eq!(version, 0);
}

#[test]
fn test_delete_removes_document() {
    let (_store, repo) = setup_repo();

    repo.index("alice", &account("alice", 100)).unwrap();
    repo.delete("alice").unwrap();

    assert!(repo.get("alice").unwrap().is_none());
}

#[test]
fn test_delete_absent_is_idempotent() {
    let (_store, repo) = setup_repo();

    // Should not error
    repo.delete("nobody").unwrap();
    repo.delete("nobody").unwrap();
}

// =============================================================================
// Update Loop Tests
// =============================================================================

#[test]
fn test_update_applies_transform() {
    let (_store, repo) = setup_repo();

    repo.index("alice", &account("alice", 100)).unwrap();

    let (updated, version) = repo
        .update("alice", |mut a| {
            a.balance += 50;
            a
        })
        .unwrap();

    assert_eq!(updated.balance, 150);
    assert_eq!(version, 1);
    let (stored, _) = repo.get("alice").unwrap().unwrap();
    assert_eq!(stored.balance, 150);
}

#[test]
fn test_update_absent_document_is_fatal() {
    let (_store, repo) = setup_repo();

    let err = repo.update("nobody", |a| a).unwrap_err();

    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn test_update_retries_through_conflicts() {
    let store = Arc::new(ConflictingStore::new(1));
    let repo = setup_repo_over(store.clone());

    repo.index("alice", &account("alice", 100)).unwrap();

    // One injected conflict, budget of two retries: must succeed
    let (updated, _) = repo
        .update_with_retries("alice", 2, |mut a| {
            a.balance += 1;
            a
        })
        .unwrap();

    assert_eq!(updated.balance, 101);
}

#[test]
fn test_update_fails_after_retries_exhausted() {
    let store = Arc::new(ConflictingStore::new(3));
    let repo = setup_repo_over(store.clone());

    repo.index("alice", &account("alice", 100)).unwrap();

    let err = repo
        .update_with_retries("alice", 2, |mut a| {
            a.balance += 1;
            a
        })
        .unwrap_err();

    match err {
        StoreError::UpdateFailed { id, attempts } => {
            assert_eq!(id, "alice");
            assert_eq!(attempts, 3); // initial try + two retries
        }
        other => panic!("Expected UpdateFailed, got {:?}", other),
    }

    // The conflicted attempts must not have written anything
    let (stored, _) = repo.get("alice").unwrap().unwrap();
    assert_eq!(stored.balance, 100);
}

#[test]
fn test_update_zero_retries_fails_on_first_conflict() {
    let store = Arc::new(ConflictingStore::new(1));
    let repo = setup_repo_over(store.clone());

    repo.index("alice", &account("alice", 100)).unwrap();

    let err = repo
        .update_with_retries("alice", 0, |a| a)
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::UpdateFailed { attempts: 1, .. }
    ));
}

#[test]
fn test_update_propagates_non_retryable_errors() {
    // A store that fails writes with a transport error
    struct BrokenStore {
        inner: MemoryStore,
    }

    impl DocumentStore for BrokenStore {
        fn index(
            &self,
            collection: &str,
            id: &str,
            payload: Bytes,
            create_only: bool,
            expected_version: Option<u64>,
            opts: &RequestOptions,
        ) -> veristore::Result<u64> {
            if expected_version.is_some() {
                return Err(StoreError::Transport("wire down".to_string()));
            }
            self.inner
                .index(collection, id, payload, create_only, expected_version, opts)
        }

        fn get(
            &self,
            collection: &str,
            id: &str,
            opts: &RequestOptions,
        ) -> veristore::Result<Option<(Bytes, u64)>> {
            self.inner.get(collection, id, opts)
        }

        fn delete(
            &self,
            collection: &str,
            id: &str,
            opts: &RequestOptions,
        ) -> veristore::Result<()> {
            self.inner.delete(collection, id, opts)
        }

        fn bulk_execute(
            &self,
            collection: &str,
            ops: Vec<veristore::BulkOp>,
            opts: &RequestOptions,
        ) -> veristore::Result<Vec<veristore::BulkOutcome>> {
            self.inner.bulk_execute(collection, ops, opts)
        }

        fn search(
            &self,
            collection: &str,
            query: Bytes,
            opts: &RequestOptions,
        ) -> veristore::Result<veristore::SearchResponse> {
            self.inner.search(collection, query, opts)
        }

        fn refresh(&self, collection: &str, opts: &RequestOptions) -> veristore::Result<()> {
            self.inner.refresh(collection, opts)
        }
    }

    let store = Arc::new(BrokenStore {
        inner: MemoryStore::new(),
    });
    let repo = setup_repo_over(store);

    repo.index("alice", &account("alice", 100)).unwrap();

    // Transport failures are never retried, even with budget left
    let err = repo
        .update_with_retries("alice", 5, |a| a)
        .unwrap_err();

    assert!(matches!(err, StoreError::Transport(_)));
}

// =============================================================================
// Refresh Tests
// =============================================================================

#[test]
fn test_refresh_disallowed_by_default() {
    let (_store, repo) = setup_repo();

    let err = repo.refresh().unwrap_err();
    assert!(matches!(err, StoreError::Unsupported(_)));
}

#[test]
fn test_refresh_allowed_when_configured() {
    let store = Arc::new(MemoryStore::new());
    let config = RepositoryConfig::builder("accounts")
        .refresh_allowed(true)
        .backoff(fast_backoff())
        .build();
    let repo: Repository<Account> = Repository::new(
        store as Arc<dyn DocumentStore>,
        Arc::new(BincodeCodec::new()),
        config,
    );

    repo.refresh().unwrap();
}

// =============================================================================
// Backoff Tests
// =============================================================================

#[test]
fn test_uniform_backoff_stays_in_window() {
    let backoff = UniformBackoff {
        min: Duration::from_millis(50),
        max: Duration::from_millis(500),
    };

    for attempt in 0..20 {
        let delay = backoff.delay(attempt);
        assert!(delay >= Duration::from_millis(50));
        assert!(delay <= Duration::from_millis(500));
    }
}

#[test]
fn test_exponential_backoff_is_capped() {
    let backoff = ExponentialBackoff {
        base: Duration::from_millis(10),
        cap: Duration::from_millis(80),
    };

    // Even absurd attempt counts must not overflow or exceed the cap
    for attempt in [0, 1, 5, 31, 32, 63, u32::MAX] {
        assert!(backoff.delay(attempt) <= Duration::from_millis(80));
    }
}

// =============================================================================
// Search Tests
// =============================================================================

#[test]
fn test_search_returns_decoded_hits() {
    let (_store, repo) = setup_repo();

    repo.index("alice", &account("alice", 100)).unwrap();
    repo.index("bob", &account("bob", 200)).unwrap();

    let cursor = repo.search(Bytes::new()).unwrap();
    assert_eq!(cursor.total_hits(), 2);

    let hits: Vec<_> = cursor.map(|h| h.unwrap()).collect();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "alice");
    assert_eq!(hits[0].value.balance, 100);
    assert_eq!(hits[1].id, "bob");
    assert_eq!(hits[1].value.balance, 200);
}
