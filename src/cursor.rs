//! Search Result Cursor
//!
//! Lazy, single-pass decoding of raw search hits into typed results.

use std::sync::Arc;

use crate::codec::Codec;
use crate::error::Result;
use crate::store::{RawHit, SearchResponse};

/// One decoded search result
#[derive(Debug, Clone, PartialEq)]
pub struct Hit<T> {
    /// Document id
    pub id: String,

    /// Relevance score assigned by the store
    pub score: f32,

    /// Decoded document
    pub value: T,
}

/// Iterator over search results, decoding each hit on demand
///
/// Hits are decoded one at a time as the cursor is advanced; nothing is
/// materialized up front. The reported total is available through
/// [`total_hits`](Self::total_hits) without consuming anything. Single
/// pass: once exhausted, the cursor stays exhausted.
pub struct SearchCursor<T> {
    hits: std::vec::IntoIter<RawHit>,
    codec: Arc<dyn Codec<T>>,
    total_hits: u64,
}

impl<T> SearchCursor<T> {
    /// Wrap a raw search response
    pub(crate) fn new(response: SearchResponse, codec: Arc<dyn Codec<T>>) -> Self {
        Self {
            hits: response.hits.into_iter(),
            codec,
            total_hits: response.total_hits,
        }
    }

    /// Total matches reported by the store
    ///
    /// Independent of how many hits were returned or consumed.
    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Number of raw hits not yet decoded
    pub fn remaining(&self) -> usize {
        self.hits.len()
    }
}

impl<T> Iterator for SearchCursor<T> {
    /// A decoded hit, or the error that made its payload undecodable
    type Item = Result<Hit<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        // Hits whose payload decodes to "absent" are skipped, not surfaced
        loop {
            let hit = self.hits.next()?;

            match self.codec.deserialize_hit(&hit) {
                Ok(Some(value)) => {
                    return Some(Ok(Hit {
                        id: hit.id,
                        score: hit.score,
                        value,
                    }))
                }
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
