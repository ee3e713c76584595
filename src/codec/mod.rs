//! Codec Module
//!
//! Serialization boundary between typed documents and store payloads.
//!
//! ## Responsibilities
//! - Trait for payload encode/decode, object-safe so repositories can hold
//!   `Arc<dyn Codec<T>>`
//! - Hit decoding with an explicit "absent" case (a store may return hits
//!   without a source payload)
//! - Bincode-backed default implementation

mod bincode;

pub use self::bincode::BincodeCodec;

use bytes::Bytes;

use crate::error::Result;
use crate::store::RawHit;

/// Serializes and deserializes typed document payloads
pub trait Codec<T>: Send + Sync {
    /// Encode a value to a store payload
    fn serialize(&self, value: &T) -> Result<Bytes>;

    /// Decode a store payload into a value
    fn deserialize(&self, bytes: &[u8]) -> Result<T>;

    /// Decode a raw search hit
    ///
    /// Returns:
    /// - `Ok(Some(value))` — hit carried a decodable payload
    /// - `Ok(None)` — hit carried no payload (skipped by cursors)
    /// - `Err(_)` — payload present but undecodable
    fn deserialize_hit(&self, hit: &RawHit) -> Result<Option<T>> {
        if hit.payload.is_empty() {
            return Ok(None);
        }
        self.deserialize(&hit.payload).map(Some)
    }
}
